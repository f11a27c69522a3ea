use std::collections::HashMap;
use std::time::Instant;

use axum::{
    Extension, Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::auth::user::{Rol, User};
use crate::config::AdminCredentials;
use crate::email::Mailer;
use crate::pocketbase::PocketBase;
use crate::resend::ResendClient;
use crate::router::{AppState, HttpOptions, create_router, protected_routes};

pub const CRON_SECRET: &str = "s3cret";
pub const NOTIFY: &str = "avisos@example.com";

pub fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn user(rol: Rol) -> User {
    User {
        id: "u1".into(),
        username: "ana".into(),
        email: "ana@example.com".into(),
        rol,
        login_id: "login-1".into(),
        token: "user-token".into(),
        authenticated_at: Instant::now(),
    }
}

/// A PocketBase and a Resend double plus app state wired to both.
pub struct TestApp {
    pub pocketbase: MockServer,
    pub resend: MockServer,
    pub state: AppState,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::build(None).await
    }

    /// Same, with superuser credentials whose login the double accepts.
    pub async fn with_admin() -> Self {
        let app = Self::build(Some(AdminCredentials {
            email: "admin@example.com".into(),
            password: "admin-pw".into(),
            collection: "_superusers".into(),
        }))
        .await;
        Mock::given(method("POST"))
            .and(path("/api/collections/_superusers/auth-with-password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "admin-token",
                "record": { "id": "su1" }
            })))
            .mount(&app.pocketbase)
            .await;
        app
    }

    async fn build(admin: Option<AdminCredentials>) -> Self {
        let pocketbase = MockServer::start().await;
        let resend = MockServer::start().await;
        let mailer = Mailer::new(
            Some(ResendClient::new("re_test".into()).with_base_url(resend.uri())),
            "Eventos <hola@example.com>".into(),
            Some(NOTIFY.into()),
        )
        .unwrap();
        let state = AppState::new(
            PocketBase::new(pocketbase.uri()).with_admin(admin),
            mailer,
            Some(CRON_SECRET.into()),
        );
        Self {
            pocketbase,
            resend,
            state,
        }
    }

    /// The full application, sessions included.
    pub fn router(&self) -> Router {
        create_router(self.state.clone(), HttpOptions::default()).unwrap()
    }

    /// Session-protected routes with `rol` already logged in.
    pub fn router_as(&self, rol: Rol) -> Router {
        protected_routes()
            .layer(Extension(user(rol)))
            .with_state(self.state.clone())
    }

    pub async fn send_as(
        &self,
        rol: Rol,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        call(self.router_as(rol), json_request(method, uri, body)).await
    }

    pub async fn send_anonymous(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        call(self.router(), json_request(method, uri, body)).await
    }

    /// Resend messages received so far, as JSON.
    pub async fn sent_emails(&self) -> Vec<Value> {
        self.resend
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }

    pub async fn accept_emails(&self) {
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "em_1" })))
            .mount(&self.resend)
            .await;
    }
}

pub fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn call(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}
