use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, header},
};
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{
    birthdays::{self, ResultadoCumpleanios, today_in_argentina},
    error::AppError,
    router::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct CronParams {
    #[serde(default)]
    pub force: bool,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Compares digests so the time taken does not depend on where the inputs
/// first differ.
fn secrets_match(provided: &str, expected: &str) -> bool {
    Sha256::digest(provided.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// `GET /api/cron/cumpleanios`, for an external scheduler.
pub async fn cumpleanios(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CronParams>,
) -> Result<Json<ResultadoCumpleanios>, AppError> {
    let Some(expected) = state.cron_secret.as_deref() else {
        warn!("Cron call rejected: CRON_SECRET is not configured");
        return Err(AppError::Unauthorized("Cron is not configured".to_string()));
    };
    if !bearer_token(&headers).is_some_and(|provided| secrets_match(provided, expected)) {
        warn!("Cron call rejected: bad secret");
        return Err(AppError::Unauthorized("Invalid cron secret".to_string()));
    }

    let today = today_in_argentina(Utc::now());
    let resultado = birthdays::run(&state, today, params.force).await?;
    Ok(Json(resultado))
}
