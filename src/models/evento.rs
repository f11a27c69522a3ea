use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::cliente::Cliente;
use super::{Resource, end_of_day, param, require, require_if_present, trim};
use crate::error::AppError;
use crate::pocketbase::Filter;
use crate::util::text::fold_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoEvento {
    Casamiento,
    Cumpleanos,
    Quince,
    Corporativo,
    Bautismo,
    Comunion,
    Aniversario,
    Festejo,
}

impl TipoEvento {
    pub fn as_str(self) -> &'static str {
        match self {
            TipoEvento::Casamiento => "casamiento",
            TipoEvento::Cumpleanos => "cumpleanos",
            TipoEvento::Quince => "quince",
            TipoEvento::Corporativo => "corporativo",
            TipoEvento::Bautismo => "bautismo",
            TipoEvento::Comunion => "comunion",
            TipoEvento::Aniversario => "aniversario",
            TipoEvento::Festejo => "festejo",
        }
    }

    /// Maps free text onto the closed set; anything unknown is a `festejo`.
    pub fn normalize(input: &str) -> Self {
        match fold_key(input).as_str() {
            "casamiento" | "boda" | "matrimonio" => TipoEvento::Casamiento,
            "cumpleanos" | "cumple" => TipoEvento::Cumpleanos,
            "quince" | "xv" | "quinceanera" | "15" => TipoEvento::Quince,
            "corporativo" | "empresa" | "empresarial" => TipoEvento::Corporativo,
            "bautismo" | "bautizo" => TipoEvento::Bautismo,
            "comunion" | "primeracomunion" => TipoEvento::Comunion,
            "aniversario" => TipoEvento::Aniversario,
            _ => TipoEvento::Festejo,
        }
    }
}

impl fmt::Display for TipoEvento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstadoEvento {
    #[serde(rename = "en-curso")]
    EnCurso,
    #[serde(rename = "finalizado")]
    Finalizado,
    #[serde(rename = "cancelado")]
    Cancelado,
}

impl EstadoEvento {
    pub fn as_str(self) -> &'static str {
        match self {
            EstadoEvento::EnCurso => "en-curso",
            EstadoEvento::Finalizado => "finalizado",
            EstadoEvento::Cancelado => "cancelado",
        }
    }

    /// Maps free text onto the closed set; anything unknown is `en-curso`.
    pub fn normalize(input: &str) -> Self {
        match fold_key(input).as_str() {
            "finalizado" | "completado" | "terminado" | "realizado" => EstadoEvento::Finalizado,
            "cancelado" | "cancelada" | "anulado" | "suspendido" => EstadoEvento::Cancelado,
            _ => EstadoEvento::EnCurso,
        }
    }
}

impl fmt::Display for EstadoEvento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventoExpand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cliente_id: Option<Cliente>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_id: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Evento {
    pub id: String,
    pub nombre: String,
    pub tipo: String,
    pub fecha: String,
    pub estado: String,
    pub cliente_id: String,
    pub planner_id: String,
    pub ubicacion: String,
    pub notas: String,
    pub created: String,
    pub updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<EventoExpand>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventoInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fecha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estado: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cliente_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ubicacion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,
}

pub struct Eventos;

impl Resource for Eventos {
    const COLLECTION: &'static str = "eventos";
    const LABEL: &'static str = "evento";
    const SEARCH_FIELDS: &'static [&'static str] = &["nombre", "ubicacion", "cliente_id.nombre"];
    const DEFAULT_SORT: &'static str = "-fecha";

    type Record = Evento;
    type Input = EventoInput;

    fn validate_new(input: &mut EventoInput) -> Result<(), AppError> {
        require("nombre", &mut input.nombre)?;
        require("fecha", &mut input.fecha)?;
        let tipo = TipoEvento::normalize(input.tipo.as_deref().unwrap_or_default());
        let estado = EstadoEvento::normalize(input.estado.as_deref().unwrap_or_default());
        input.tipo = Some(tipo.to_string());
        input.estado = Some(estado.to_string());
        trim(&mut input.cliente_id);
        trim(&mut input.planner_id);
        Ok(())
    }

    fn validate_patch(input: &mut EventoInput) -> Result<(), AppError> {
        require_if_present("nombre", &mut input.nombre)?;
        require_if_present("fecha", &mut input.fecha)?;
        if let Some(tipo) = input.tipo.as_mut() {
            *tipo = TipoEvento::normalize(tipo).to_string();
        }
        if let Some(estado) = input.estado.as_mut() {
            *estado = EstadoEvento::normalize(estado).to_string();
        }
        trim(&mut input.cliente_id);
        trim(&mut input.planner_id);
        Ok(())
    }

    fn filters(params: &HashMap<String, String>, mut filter: Filter) -> Result<Filter, AppError> {
        if let Some(estado) = param(params, "estado") {
            filter = filter.eq("estado", EstadoEvento::normalize(estado).as_str());
        }
        if let Some(tipo) = param(params, "tipo") {
            filter = filter.eq("tipo", TipoEvento::normalize(tipo).as_str());
        }
        for field in ["cliente_id", "planner_id"] {
            if let Some(id) = param(params, field) {
                filter = filter.eq(field, id);
            }
        }
        if let Some(desde) = param(params, "desde") {
            filter = filter.gte("fecha", desde);
        }
        if let Some(hasta) = param(params, "hasta") {
            filter = filter.lte("fecha", &end_of_day(hasta));
        }
        Ok(filter)
    }
}
