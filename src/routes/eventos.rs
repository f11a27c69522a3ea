use axum::{
    Extension, Json, Router,
    extract::State,
    routing::get,
};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::resource;
use crate::{
    auth::user::User,
    email::{Delivery, WelcomeEvent},
    error::AppError,
    models::{
        Resource,
        cliente::{Cliente, Clientes},
        evento::{Evento, EventoInput, Eventos},
    },
    router::AppState,
    util::text::non_blank,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            &resource::collection_path::<Eventos>(),
            get(resource::list::<Eventos>).post(create),
        )
        .route(
            &resource::record_path::<Eventos>(),
            get(resource::show::<Eventos>)
                .patch(resource::update::<Eventos>)
                .delete(resource::destroy::<Eventos>),
        )
}

#[derive(Debug, Serialize)]
pub struct EventoCreado {
    #[serde(flatten)]
    pub evento: Evento,
    pub email_enviado: bool,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(mut input), _): WithRejection<Json<EventoInput>, AppError>,
) -> Result<Json<EventoCreado>, AppError> {
    user.require_writer()?;
    Eventos::validate_new(&mut input)?;

    let evento: Evento = state
        .pocketbase
        .collection(Eventos::COLLECTION, &user.token)
        .create(&input)
        .await?;
    info!(id = %evento.id, tipo = %evento.tipo, user = %user.id, "Created evento");

    let email_enviado = welcome_client(&state, &user.token, &evento).await;
    Ok(Json(EventoCreado {
        evento,
        email_enviado,
    }))
}

/// Best-effort: failures are logged and reported as `false`.
async fn welcome_client(state: &AppState, token: &str, evento: &Evento) -> bool {
    let Some(cliente_id) = non_blank(Some(&evento.cliente_id)) else {
        return false;
    };

    let cliente: Cliente = match state
        .pocketbase
        .collection(Clientes::COLLECTION, token)
        .get_one(cliente_id, None)
        .await
    {
        Ok(cliente) => cliente,
        Err(err) => {
            warn!(evento = %evento.id, %cliente_id, error = %err, "Could not load client for welcome email");
            return false;
        }
    };

    let Some(email) = non_blank(Some(&cliente.email)) else {
        debug!(%cliente_id, "Client has no email");
        return false;
    };

    let detalle = WelcomeEvent {
        nombre: &evento.nombre,
        fecha: non_blank(Some(evento.fecha.get(..10).unwrap_or(&evento.fecha))),
    };
    match state
        .mailer
        .send_welcome(email, &cliente.nombre, Some(detalle))
        .await
    {
        Ok(Delivery::Sent(id)) => {
            debug!(evento = %evento.id, email_id = %id, "Welcome email sent");
            true
        }
        Ok(Delivery::Disabled) => false,
        Err(err) => {
            warn!(evento = %evento.id, error = %err, "Welcome email failed");
            false
        }
    }
}
