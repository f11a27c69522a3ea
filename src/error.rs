use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::email::MailError;
use crate::pocketbase::PocketBaseError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    PocketBase(#[from] PocketBaseError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Malformed, mistyped or non-JSON bodies are input errors like any other.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    pub fn required(field: &str) -> Self {
        AppError::Validation(format!("{field} is required"))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
}

fn envelope(status: StatusCode, code: &'static str, message: String) -> Response {
    (status, Json(ErrorEnvelope { code, message })).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(message) => {
                envelope(StatusCode::BAD_REQUEST, "invalid_input", message)
            }
            AppError::Unauthorized(message) => {
                envelope(StatusCode::UNAUTHORIZED, "unauthorized", message)
            }
            AppError::NotFound(what) => {
                envelope(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
            }
            AppError::PocketBase(PocketBaseError::MissingAdminCredentials) => {
                warn!("Superuser credentials are not configured");
                envelope(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "Missing admin credentials".to_string(),
                )
            }
            AppError::PocketBase(err) => match err.status() {
                Some(400) => envelope(StatusCode::BAD_REQUEST, "invalid_input", err.detail()),
                Some(401) | Some(403) => envelope(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "Not authorized".to_string(),
                ),
                Some(404) => envelope(
                    StatusCode::NOT_FOUND,
                    "not_found",
                    "Record not found".to_string(),
                ),
                _ => internal(&err),
            },
            AppError::Mail(err) => internal(&err),
            AppError::Internal(err) => internal(&*err),
        }
    }
}

fn internal(err: &(dyn std::error::Error + 'static)) -> Response {
    error!(error = %err, "Request failed");
    envelope(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Internal server error".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    async fn body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_is_bad_request() {
        let response = AppError::required("nombre").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(response).await,
            json!({ "code": "invalid_input", "message": "nombre is required" })
        );
    }

    #[tokio::test]
    async fn pocketbase_statuses_are_mapped() {
        let api = |status| {
            AppError::PocketBase(PocketBaseError::Api {
                status,
                message: "boom".into(),
                data: Value::Null,
            })
        };

        assert_eq!(api(400).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(api(403).into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(api(404).into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            api(502).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn json_rejections_become_invalid_input() {
        use axum::extract::FromRequest;

        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let rejection = Json::<Value>::from_request(request, &()).await.unwrap_err();

        let response = AppError::from(rejection).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(response).await["code"], "invalid_input");
    }

    #[tokio::test]
    async fn internal_errors_hide_the_cause() {
        let response = AppError::Internal(anyhow::anyhow!("db password leaked")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await["message"], "Internal server error");
    }
}
