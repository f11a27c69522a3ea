use crate::{
    auth::{router as auth_router, user::Backend},
    config::Config,
    email::Mailer,
    middleware::request_id::request_id,
    models::{cliente::Clientes, equipo::Equipo, persona::Personas, proveedor::Proveedores},
    pocketbase::PocketBase,
    routes::{contabilidad, cron, dashboard::dashboard, eventos, formulario::formulario, resource},
};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use axum_login::{
    AuthManagerLayerBuilder,
    tower_sessions::{
        Expiry, SessionManagerLayer,
        cookie::{SameSite, time},
    },
};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::{signal, sync::Mutex, task::AbortHandle};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::MemoryStore;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub pocketbase: PocketBase,
    pub mailer: Mailer,
    pub cron_secret: Option<String>,
    /// Date of the last completed birthday run.
    pub birthday_last_run: Arc<Mutex<Option<NaiveDate>>>,
}

impl AppState {
    pub fn new(pocketbase: PocketBase, mailer: Mailer, cron_secret: Option<String>) -> Self {
        Self {
            pocketbase,
            mailer,
            cron_secret,
            birthday_last_run: Arc::new(Mutex::new(None)),
        }
    }
}

/// Session-only settings for [`create_router`].
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    pub session_secure: bool,
    pub allowed_origin: Option<String>,
}

impl From<&Config> for HttpOptions {
    fn from(config: &Config) -> Self {
        Self {
            session_secure: config.session_secure,
            allowed_origin: config.allowed_origin.clone(),
        }
    }
}

/// Routes that expect an `Extension<User>`, installed by
/// [`auth_router::require_user`].
pub(crate) fn protected_routes() -> Router<AppState> {
    Router::new()
        .merge(resource::routes::<Clientes>())
        .merge(resource::routes::<Personas>())
        .merge(eventos::routes())
        .merge(resource::routes::<Proveedores>())
        .merge(contabilidad::routes())
        .merge(resource::routes::<Equipo>())
        .route("/api/dashboard", get(dashboard))
}

pub fn create_router(state: AppState, options: HttpOptions) -> anyhow::Result<Router> {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(options.session_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(1)));

    // Auth service.
    //
    // This combines the session layer with our backend to establish the auth
    // service which will provide the auth session as a request extension.
    let backend = Backend::new(state.pocketbase.clone());
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let protected =
        protected_routes().route_layer(middleware::from_fn(auth_router::require_user));

    let app = Router::new()
        .merge(protected)
        .merge(auth_router::router())
        .route("/api/formulario", post(formulario))
        .route("/api/cron/cumpleanios", get(cron::cumpleanios))
        .with_state(state)
        .layer(auth_layer)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id));

    let app = match options.allowed_origin.as_deref() {
        Some(origin) => {
            info!(%origin, "CORS enabled");
            app.layer(
                CorsLayer::new()
                    .allow_origin(HeaderValue::from_str(origin)?)
                    .allow_credentials(true)
                    .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
            )
        }
        None => app,
    };
    Ok(app)
}

pub async fn shutdown_signal(scheduler_abort_handle: Option<AbortHandle>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down");
    if let Some(handle) = scheduler_abort_handle {
        handle.abort();
    }
}
