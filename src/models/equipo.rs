use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::persona::check_birthdate;
use super::{Resource, param, require, require_if_present, trim};
use crate::error::AppError;
use crate::pocketbase::Filter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MiembroEquipo {
    pub id: String,
    pub nombre: String,
    pub apellido: String,
    pub cargo: String,
    pub dni: String,
    pub telefono: String,
    pub email: String,
    pub cumpleanio: String,
    pub pais: String,
    pub ciudad: String,
    pub created: String,
    pub updated: String,
}

impl MiembroEquipo {
    pub fn nombre_completo(&self) -> String {
        format!("{} {}", self.nombre, self.apellido).trim().to_string()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MiembroEquipoInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apellido: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dni: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumpleanio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pais: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciudad: Option<String>,
}

pub struct Equipo;

impl Resource for Equipo {
    const COLLECTION: &'static str = "equipo";
    const LABEL: &'static str = "miembro del equipo";
    const SEARCH_FIELDS: &'static [&'static str] = &["nombre", "apellido", "cargo", "email", "dni"];
    const DEFAULT_SORT: &'static str = "apellido,nombre";

    type Record = MiembroEquipo;
    type Input = MiembroEquipoInput;

    fn validate_new(input: &mut MiembroEquipoInput) -> Result<(), AppError> {
        require("nombre", &mut input.nombre)?;
        require("apellido", &mut input.apellido)?;
        trim(&mut input.dni);
        trim(&mut input.email);
        check_birthdate(&mut input.cumpleanio)
    }

    fn validate_patch(input: &mut MiembroEquipoInput) -> Result<(), AppError> {
        require_if_present("nombre", &mut input.nombre)?;
        require_if_present("apellido", &mut input.apellido)?;
        trim(&mut input.dni);
        trim(&mut input.email);
        check_birthdate(&mut input.cumpleanio)
    }

    fn filters(params: &HashMap<String, String>, filter: Filter) -> Result<Filter, AppError> {
        Ok(match param(params, "cargo") {
            Some(cargo) => filter.eq("cargo", cargo),
            None => filter,
        })
    }
}
