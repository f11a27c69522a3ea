use std::collections::HashMap;

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    routing::get,
};
use tracing::debug;

use super::resource;
use crate::{
    auth::user::User,
    error::AppError,
    models::{
        Resource,
        contabilidad::{
            Balance, BalanceMoneda, Contabilidad, Moneda, Movimiento, Reporte,
            balances_por_moneda, reporte,
        },
        param,
    },
    router::AppState,
};

pub fn routes() -> Router<AppState> {
    resource::routes::<Contabilidad>()
        .route("/api/contabilidad/balance", get(balance))
        .route("/api/contabilidad/reporte", get(report))
}

/// Every record matching the list filters, across all pages.
async fn matching(
    state: &AppState,
    user: &User,
    params: &HashMap<String, String>,
) -> Result<Vec<Movimiento>, AppError> {
    let query = resource::list_query::<Contabilidad>(params)?;
    let movimientos: Vec<Movimiento> = state
        .pocketbase
        .collection(Contabilidad::COLLECTION, &user.token)
        .full_list(query.filter, query.sort)
        .await?;
    debug!(count = movimientos.len(), "Loaded movimientos for aggregation");
    Ok(movimientos)
}

pub async fn balance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<BalanceMoneda>>, AppError> {
    let movimientos = matching(&state, &user, &params).await?;
    let mut balances = balances_por_moneda(&movimientos);

    // Asking for one currency always answers for it, even with no records.
    if let Some(moneda) = param(&params, "moneda") {
        let moneda: Moneda = moneda.parse()?;
        if !balances.iter().any(|b| b.moneda == moneda) {
            balances.push(BalanceMoneda {
                moneda,
                balance: Balance::default(),
            });
        }
    }
    Ok(Json(balances))
}

pub async fn report(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Reporte>, AppError> {
    let movimientos = matching(&state, &user, &params).await?;
    Ok(Json(reporte(&movimientos)))
}
