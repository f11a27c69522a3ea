use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Resource, param, require, require_if_present, trim};
use crate::birthdays::parse_birthdate;
use crate::error::AppError;
use crate::pocketbase::Filter;
use crate::pocketbase::fields::one_or_many;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub id: String,
    pub nombre: String,
    pub apellido: String,
    pub telefono: String,
    pub email: String,
    pub cumpleanio: String,
    #[serde(deserialize_with = "one_or_many")]
    pub cliente_id: Vec<String>,
    pub created: String,
    pub updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<Value>,
}

impl Persona {
    pub fn nombre_completo(&self) -> String {
        format!("{} {}", self.nombre, self.apellido).trim().to_string()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersonaInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apellido: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumpleanio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cliente_id: Option<Vec<String>>,
}

/// Birthdates must be readable so the reminder job can match them.
pub(crate) fn check_birthdate(value: &mut Option<String>) -> Result<(), AppError> {
    trim(value);
    match value.as_deref() {
        Some(date) if !date.is_empty() && parse_birthdate(date).is_none() => Err(
            AppError::Validation("cumpleanio must be a YYYY-MM-DD or DD/MM/YYYY date".into()),
        ),
        _ => Ok(()),
    }
}

pub struct Personas;

impl Resource for Personas {
    const COLLECTION: &'static str = "personas";
    const LABEL: &'static str = "persona";
    const SEARCH_FIELDS: &'static [&'static str] = &["nombre", "apellido", "email", "telefono"];
    const DEFAULT_SORT: &'static str = "apellido,nombre";

    type Record = Persona;
    type Input = PersonaInput;

    fn validate_new(input: &mut PersonaInput) -> Result<(), AppError> {
        require("nombre", &mut input.nombre)?;
        require("apellido", &mut input.apellido)?;
        trim(&mut input.email);
        trim(&mut input.telefono);
        check_birthdate(&mut input.cumpleanio)
    }

    fn validate_patch(input: &mut PersonaInput) -> Result<(), AppError> {
        require_if_present("nombre", &mut input.nombre)?;
        require_if_present("apellido", &mut input.apellido)?;
        trim(&mut input.email);
        trim(&mut input.telefono);
        check_birthdate(&mut input.cumpleanio)
    }

    fn filters(params: &HashMap<String, String>, filter: Filter) -> Result<Filter, AppError> {
        Ok(match param(params, "cliente_id") {
            Some(cliente) => filter.like("cliente_id", cliente),
            None => filter,
        })
    }
}
