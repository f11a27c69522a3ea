use axum::{
    Json, Router,
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::user::{AuthSession, BackendError, Credentials, User};
use crate::error::AppError;
use crate::router::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(self::post::login))
        .route("/api/auth/logout", post(self::post::logout))
        .route("/api/auth/session", get(self::get::session))
}

fn session_error(err: impl std::fmt::Display) -> AppError {
    AppError::Internal(anyhow::anyhow!("session error: {err}"))
}

/// Rejects requests without a logged-in user and hands handlers the user,
/// with a fresh PocketBase token, as an `Extension<User>`.
pub async fn require_user(auth_session: AuthSession, mut request: Request, next: Next) -> Response {
    let Some(user) = auth_session.user.clone() else {
        return AppError::Unauthorized("Not logged in".to_string()).into_response();
    };

    match auth_session.backend.ensure_valid_token(&user).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) if matches!(err.status(), Some(401 | 403)) => {
            warn!(user = %user.id, "PocketBase token expired");
            auth_session.backend.forget(&user.login_id).await;
            AppError::Unauthorized("Session expired".to_string()).into_response()
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

mod post {
    use super::*;

    pub async fn login(
        mut auth_session: AuthSession,
        WithRejection(Json(creds), _): WithRejection<Json<Credentials>, AppError>,
    ) -> Result<Json<User>, AppError> {
        if creds.identity.trim().is_empty() {
            return Err(AppError::required("identity"));
        }
        if creds.password.is_empty() {
            return Err(AppError::required("password"));
        }

        let user = match auth_session.authenticate(creds).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AppError::Unauthorized("Invalid credentials".to_string())),
            Err(axum_login::Error::Backend(BackendError::PocketBase(err))) => {
                return Err(err.into());
            }
            Err(err) => return Err(session_error(err)),
        };

        auth_session.login(&user).await.map_err(session_error)?;
        info!(user = %user.id, rol = ?user.rol, "Logged in");
        Ok(Json(user))
    }

    pub async fn logout(mut auth_session: AuthSession) -> Result<Json<Value>, AppError> {
        let user = auth_session.logout().await.map_err(session_error)?;
        if let Some(user) = user {
            auth_session.backend.forget(&user.login_id).await;
            info!(user = %user.id, "Logged out");
        }
        Ok(Json(json!({ "ok": true })))
    }
}

mod get {
    use super::*;

    pub async fn session(auth_session: AuthSession) -> Result<Json<User>, AppError> {
        auth_session
            .user
            .map(Json)
            .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))
    }
}
