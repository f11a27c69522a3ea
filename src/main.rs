mod auth;
mod birthdays;
mod config;
mod email;
mod error;
mod middleware;
mod models;
mod pocketbase;
mod resend;
mod router;
mod routes;
mod util;

use crate::{
    config::Config,
    email::Mailer,
    pocketbase::PocketBase,
    resend::ResendClient,
    router::{AppState, HttpOptions, create_router, shutdown_signal},
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pocketbase = PocketBase::new(config.pocketbase_url.clone()).with_admin(config.admin.clone());
    if !pocketbase.has_admin() {
        warn!("PocketBase superuser credentials are not set; the intake form and birthday job will fail");
    }

    let resend = config
        .resend_api_key
        .clone()
        .map(|key| ResendClient::new(key).with_base_url(config.resend_url.clone()));
    if resend.is_none() {
        warn!("RESEND_API_KEY is not set; emails will be logged and skipped");
    }
    let mailer = Mailer::new(resend, config.email_from.clone(), config.notify_email.clone())?;

    let state = AppState::new(pocketbase, mailer, config.cron_secret.clone());

    let scheduler = config.birthday_schedule_hour.map(|hour| {
        info!(hour, "Birthday scheduler enabled");
        birthdays::spawn_daily(state.clone(), hour)
    });

    let app = create_router(state, HttpOptions::from(&config))?;

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, pocketbase = %config.pocketbase_url, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(
            scheduler.as_ref().map(|task| task.abort_handle()),
        ))
        .await?;

    Ok(())
}
