use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Resource, require, require_if_present, trim};
use crate::error::AppError;
use crate::pocketbase::fields::one_or_many;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Cliente {
    pub id: String,
    pub nombre: String,
    pub contacto: String,
    pub email: String,
    #[serde(deserialize_with = "one_or_many")]
    pub persona_id: Vec<String>,
    pub created: String,
    pub updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClienteInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<Vec<String>>,
}

pub struct Clientes;

impl Resource for Clientes {
    const COLLECTION: &'static str = "clientes";
    const LABEL: &'static str = "cliente";
    const SEARCH_FIELDS: &'static [&'static str] = &["nombre", "contacto", "email"];
    const DEFAULT_SORT: &'static str = "nombre";

    type Record = Cliente;
    type Input = ClienteInput;

    fn validate_new(input: &mut ClienteInput) -> Result<(), AppError> {
        require("nombre", &mut input.nombre)?;
        require("contacto", &mut input.contacto)?;
        trim(&mut input.email);
        Ok(())
    }

    fn validate_patch(input: &mut ClienteInput) -> Result<(), AppError> {
        require_if_present("nombre", &mut input.nombre)?;
        require_if_present("contacto", &mut input.contacto)?;
        trim(&mut input.email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nombre_and_contacto_are_required() {
        let mut input = ClienteInput {
            contacto: Some("11 5555 0000".into()),
            ..Default::default()
        };
        assert!(Clientes::validate_new(&mut input).is_err());

        let mut input = ClienteInput {
            nombre: Some("Ana".into()),
            ..Default::default()
        };
        assert!(Clientes::validate_new(&mut input).is_err());
    }

    #[test]
    fn missing_fields_default_when_reading() {
        let cliente: Cliente =
            serde_json::from_str(r#"{"id": "c1", "nombre": "Ana", "persona_id": "p1"}"#).unwrap();
        assert_eq!(cliente.contacto, "");
        assert_eq!(cliente.persona_id, vec!["p1"]);
    }

    #[test]
    fn input_serializes_only_given_fields() {
        let input = ClienteInput {
            email: Some("ana@example.com".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            serde_json::json!({ "email": "ana@example.com" })
        );
    }
}
