use axum::{Extension, Json, extract::State};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::{
    auth::user::User,
    birthdays::{birthday_matches, candidate_filter, today_in_argentina},
    error::AppError,
    models::{
        Resource,
        cliente::Clientes,
        equipo::{Equipo, MiembroEquipo},
        evento::{EstadoEvento, Evento, Eventos},
        persona::{Persona, Personas},
    },
    pocketbase::{Filter, ListQuery},
    router::AppState,
};

const PROXIMOS: u32 = 5;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub clientes: i64,
    pub eventos_en_curso: i64,
    pub proximos_eventos: Vec<Evento>,
    pub cumpleanios_hoy: usize,
}

/// Only the totals are needed; ask for the smallest page.
fn count_query(filter: Option<String>) -> ListQuery {
    ListQuery {
        per_page: 1,
        filter,
        ..ListQuery::default()
    }
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Dashboard>, AppError> {
    let pb = &state.pocketbase;
    let today = today_in_argentina(Utc::now());
    let en_curso = Filter::new().eq("estado", EstadoEvento::EnCurso.as_str());

    let clientes_query = count_query(None);
    let en_curso_query = count_query(en_curso.clone().build());
    let proximos_query = ListQuery {
        per_page: PROXIMOS,
        sort: Some("fecha".into()),
        filter: en_curso.gte("fecha", &today.to_string()).build(),
        expand: Some("cliente_id".into()),
        ..ListQuery::default()
    };
    let clientes = pb.collection(Clientes::COLLECTION, &user.token);
    let eventos = pb.collection(Eventos::COLLECTION, &user.token);
    let personas = pb.collection(Personas::COLLECTION, &user.token);
    let equipo = pb.collection(Equipo::COLLECTION, &user.token);

    let (clientes, en_curso, proximos, personas, equipo) = tokio::try_join!(
        clientes.list::<Value>(&clientes_query),
        eventos.list::<Value>(&en_curso_query),
        eventos.list::<Evento>(&proximos_query),
        personas.full_list::<Persona>(candidate_filter(today).build(), None),
        equipo.full_list::<MiembroEquipo>(candidate_filter(today).build(), None),
    )?;

    let cumpleanios_hoy = personas
        .iter()
        .map(|p| p.cumpleanio.as_str())
        .chain(equipo.iter().map(|m| m.cumpleanio.as_str()))
        .filter(|fecha| birthday_matches(fecha, today))
        .count();

    Ok(Json(Dashboard {
        clientes: clientes.total_items,
        eventos_en_curso: en_curso.total_items,
        proximos_eventos: proximos.items,
        cumpleanios_hoy,
    }))
}
