pub mod contabilidad;
pub mod cron;
pub mod dashboard;
pub mod eventos;
pub mod formulario;
pub mod resource;

#[cfg(test)]
pub(crate) mod testing;
