use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Resource, param, require, require_if_present, trim};
use crate::error::AppError;
use crate::pocketbase::Filter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Proveedor {
    pub id: String,
    pub nombre: String,
    pub categoria: String,
    pub contacto: String,
    pub telefono: String,
    pub email: String,
    pub created: String,
    pub updated: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProveedorInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categoria: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub struct Proveedores;

impl Resource for Proveedores {
    const COLLECTION: &'static str = "proveedores";
    const LABEL: &'static str = "proveedor";
    const SEARCH_FIELDS: &'static [&'static str] = &["nombre", "categoria", "contacto", "email"];
    const DEFAULT_SORT: &'static str = "nombre";

    type Record = Proveedor;
    type Input = ProveedorInput;

    fn validate_new(input: &mut ProveedorInput) -> Result<(), AppError> {
        require("nombre", &mut input.nombre)?;
        trim(&mut input.categoria);
        trim(&mut input.email);
        Ok(())
    }

    fn validate_patch(input: &mut ProveedorInput) -> Result<(), AppError> {
        require_if_present("nombre", &mut input.nombre)?;
        trim(&mut input.categoria);
        trim(&mut input.email);
        Ok(())
    }

    fn filters(params: &HashMap<String, String>, filter: Filter) -> Result<Filter, AppError> {
        Ok(match param(params, "categoria") {
            Some(categoria) => filter.eq("categoria", categoria),
            None => filter,
        })
    }
}
