use std::collections::HashMap;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use axum_extra::extract::WithRejection;
use serde_json::{Value, json};
use tracing::info;

use crate::{
    auth::user::User,
    error::AppError,
    models::Resource,
    pocketbase::{Filter, ListQuery, ListResult, MAX_PER_PAGE, filter::is_safe_sort},
    router::AppState,
};

/// `GET/POST /api/{collection}` and `GET/PATCH/DELETE /api/{collection}/{id}`.
pub fn routes<R: Resource>() -> Router<AppState> {
    Router::new()
        .route(&collection_path::<R>(), get(list::<R>).post(create::<R>))
        .route(
            &record_path::<R>(),
            get(show::<R>).patch(update::<R>).delete(destroy::<R>),
        )
}

pub fn collection_path<R: Resource>() -> String {
    format!("/api/{}", R::COLLECTION)
}

pub fn record_path<R: Resource>() -> String {
    format!("/api/{}/{{id}}", R::COLLECTION)
}

fn parse_number(
    params: &HashMap<String, String>,
    key: &str,
    default: u32,
    range: std::ops::RangeInclusive<u32>,
) -> Result<u32, AppError> {
    let Some(raw) = params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.parse::<u32>() {
        Ok(n) if range.contains(&n) => Ok(n),
        _ => Err(AppError::Validation(format!(
            "{key} must be a number between {} and {}",
            range.start(),
            range.end()
        ))),
    }
}

/// PocketBase ids are short alphanumeric strings; anything else cannot exist.
fn check_id<R: Resource>(id: &str) -> Result<(), AppError> {
    let plausible = !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plausible {
        Ok(())
    } else {
        Err(AppError::NotFound(R::LABEL.to_string()))
    }
}

fn checked_expression(params: &HashMap<String, String>, key: &str) -> Result<Option<String>, AppError> {
    match params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) if is_safe_sort(value) => Ok(Some(value.to_string())),
        Some(_) => Err(AppError::Validation(format!("{key} contains invalid characters"))),
        None => Ok(None),
    }
}

/// Builds the PocketBase query for a list request: paging, sort, expand, the
/// `q` search and the collection's own filters.
pub fn list_query<R: Resource>(params: &HashMap<String, String>) -> Result<ListQuery, AppError> {
    let page = parse_number(params, "page", 1, 1..=u32::MAX)?;
    let per_page = parse_number(params, "perPage", ListQuery::default().per_page, 1..=MAX_PER_PAGE)?;
    let sort = checked_expression(params, "sort")?.or_else(|| Some(R::DEFAULT_SORT.to_string()));
    let expand = checked_expression(params, "expand")?;

    let mut filter = Filter::new();
    if let Some(q) = params.get("q").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        filter = filter.any_like(R::SEARCH_FIELDS, q);
    }
    let filter = R::filters(params, filter)?;

    Ok(ListQuery {
        page,
        per_page,
        sort,
        filter: filter.build(),
        expand,
    })
}

pub async fn list<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResult<R::Record>>, AppError> {
    let query = list_query::<R>(&params)?;
    let result = state
        .pocketbase
        .collection(R::COLLECTION, &user.token)
        .list(&query)
        .await?;
    Ok(Json(result))
}

pub async fn show<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<R::Record>, AppError> {
    check_id::<R>(&id)?;
    let expand = checked_expression(&params, "expand")?;
    let record = state
        .pocketbase
        .collection(R::COLLECTION, &user.token)
        .get_one(&id, expand.as_deref())
        .await?;
    Ok(Json(record))
}

pub async fn create<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    WithRejection(Json(mut input), _): WithRejection<Json<R::Input>, AppError>,
) -> Result<Json<R::Record>, AppError> {
    user.require_writer()?;
    R::validate_new(&mut input)?;
    let record = state
        .pocketbase
        .collection(R::COLLECTION, &user.token)
        .create(&input)
        .await?;
    info!(collection = R::COLLECTION, user = %user.id, "Created {}", R::LABEL);
    Ok(Json(record))
}

pub async fn update<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    WithRejection(Json(mut input), _): WithRejection<Json<R::Input>, AppError>,
) -> Result<Json<R::Record>, AppError> {
    user.require_writer()?;
    check_id::<R>(&id)?;
    R::validate_patch(&mut input)?;
    let record = state
        .pocketbase
        .collection(R::COLLECTION, &user.token)
        .update(&id, &input)
        .await?;
    info!(collection = R::COLLECTION, %id, user = %user.id, "Updated {}", R::LABEL);
    Ok(Json(record))
}

pub async fn destroy<R: Resource>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    user.require_writer()?;
    check_id::<R>(&id)?;
    state
        .pocketbase
        .collection(R::COLLECTION, &user.token)
        .delete(&id)
        .await?;
    info!(collection = R::COLLECTION, %id, user = %user.id, "Deleted {}", R::LABEL);
    Ok(Json(json!({ "id": id, "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::user::Rol;
    use crate::models::cliente::Clientes;
    use crate::models::evento::Eventos;
    use crate::routes::testing::{TestApp, call, params};
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn list_query_defaults() {
        let query = list_query::<Clientes>(&params(&[])).unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, 30);
        assert_eq!(query.sort.as_deref(), Some("nombre"));
        assert_eq!(query.filter, None);
    }

    #[test]
    fn list_query_rejects_bad_paging_and_sort() {
        for bad in [
            &[("page", "0")][..],
            &[("perPage", "501")][..],
            &[("perPage", "abc")][..],
            &[("sort", "nombre'||1")][..],
            &[("expand", "cliente_id)")][..],
        ] {
            assert!(
                matches!(list_query::<Clientes>(&params(bad)), Err(AppError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn search_is_quoted_and_combined_with_filters() {
        let query = list_query::<Eventos>(&params(&[("q", "O'Brien"), ("tipo", "boda")])).unwrap();
        assert_eq!(
            query.filter.as_deref(),
            Some("(nombre ~ 'O\\'Brien' || ubicacion ~ 'O\\'Brien' || cliente_id.nombre ~ 'O\\'Brien') && tipo = 'casamiento'")
        );
    }

    #[tokio::test]
    async fn create_without_required_fields_never_reaches_pocketbase() {
        let app = TestApp::start().await;
        Mock::given(method("POST"))
            .and(path("/api/collections/clientes/records"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&app.pocketbase)
            .await;

        let (status, body) = app
            .send_as(Rol::Admin, "POST", "/api/clientes", Some(json!({ "nombre": "Ana" })))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "code": "invalid_input", "message": "contacto is required" })
        );
    }

    #[tokio::test]
    async fn mistyped_body_is_an_invalid_input_envelope() {
        let app = TestApp::start().await;
        let (status, body) = app
            .send_as(
                Rol::Admin,
                "POST",
                "/api/contabilidad",
                Some(json!({
                    "type": "cobro",
                    "moneda": "ars",
                    "montoEspera": "abc",
                    "fechaEspera": "2026-01-01"
                })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
        assert!(body["message"].as_str().unwrap().contains("montoEspera"));
        assert!(app.pocketbase.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn body_without_json_content_type_is_400() {
        let app = TestApp::start().await;
        let request = axum::http::Request::builder()
            .method("PATCH")
            .uri("/api/clientes/abc123")
            .body(axum::body::Body::from(r#"{"nombre":"Ana"}"#))
            .unwrap();

        let (status, body) = call(app.router_as(Rol::Admin), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn viewers_cannot_write() {
        let app = TestApp::start().await;
        let (status, body) = app
            .send_as(Rol::Viewer, "DELETE", "/api/clientes/abc", None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn list_forwards_query_and_token() {
        let app = TestApp::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections/clientes/records"))
            .and(query_param("page", "2"))
            .and(query_param("perPage", "10"))
            .and(query_param("sort", "-created"))
            .and(query_param("filter", "(nombre ~ 'ana' || contacto ~ 'ana' || email ~ 'ana')"))
            .and(wiremock::matchers::header("authorization", "user-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "page": 2, "perPage": 10, "totalItems": 11, "totalPages": 2,
                "items": [{ "id": "c1", "nombre": "Ana", "contacto": "Ana Pérez", "persona_id": "p1" }]
            })))
            .expect(1)
            .mount(&app.pocketbase)
            .await;

        let (status, body) = app
            .send_as(
                Rol::Planner,
                "GET",
                "/api/clientes?page=2&perPage=10&sort=-created&q=ana",
                None,
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalItems"], 11);
        assert_eq!(body["items"][0]["persona_id"], json!(["p1"]));
    }

    #[tokio::test]
    async fn missing_record_is_404() {
        let app = TestApp::start().await;
        Mock::given(method("GET"))
            .and(path("/api/collections/personas/records/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404, "message": "The requested resource wasn't found.", "data": {}
            })))
            .mount(&app.pocketbase)
            .await;

        let (status, body) = app.send_as(Rol::Staff, "GET", "/api/personas/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn malformed_ids_are_404_without_a_lookup() {
        let app = TestApp::start().await;
        let (status, body) = app
            .send_as(Rol::Admin, "GET", "/api/eventos/a%27b", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "evento not found");
        assert!(app.pocketbase.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collections_require_a_session() {
        let app = TestApp::start().await;
        let (status, _) = app.send_anonymous("GET", "/api/clientes", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
