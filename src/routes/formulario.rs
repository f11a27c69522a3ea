use axum::{Json, extract::State};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    email::Delivery,
    error::AppError,
    models::{
        Resource,
        cliente::{Cliente, ClienteInput, Clientes},
    },
    router::AppState,
    util::text::non_blank,
};

#[derive(Debug, Default, Deserialize)]
pub struct Formulario {
    pub nombre: Option<String>,
    pub contacto: Option<String>,
    pub email: Option<String>,
    pub mensaje: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FormularioRecibido {
    pub cliente: Cliente,
    pub email_enviado: bool,
}

/// Public intake: anyone can leave their details, which become a client
/// created with the superuser token.
pub async fn formulario(
    State(state): State<AppState>,
    WithRejection(Json(form), _): WithRejection<Json<Formulario>, AppError>,
) -> Result<Json<FormularioRecibido>, AppError> {
    let mut input = ClienteInput {
        nombre: form.nombre,
        contacto: form.contacto,
        email: form.email,
        persona_id: None,
    };
    Clientes::validate_new(&mut input)?;

    let token = state.pocketbase.admin_token().await?;
    let cliente: Cliente = state
        .pocketbase
        .collection(Clientes::COLLECTION, &token)
        .create(&input)
        .await?;
    info!(id = %cliente.id, mensaje = ?non_blank(form.mensaje.as_deref()), "Intake form received");

    let email_enviado = match non_blank(Some(&cliente.email)) {
        Some(email) => match state.mailer.send_welcome(email, &cliente.nombre, None).await {
            Ok(delivery) => matches!(delivery, Delivery::Sent(_)),
            Err(err) => {
                warn!(id = %cliente.id, error = %err, "Welcome email failed");
                false
            }
        },
        None => false,
    };

    Ok(Json(FormularioRecibido {
        cliente,
        email_enviado,
    }))
}
