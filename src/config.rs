use std::env;
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_ADMIN_COLLECTION: &str = "_superusers";
const DEFAULT_RESEND_URL: &str = "https://api.resend.com";
const DEFAULT_EMAIL_FROM: &str = "Eventos <onboarding@resend.dev>";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub pocketbase_url: String,
    pub admin: Option<AdminCredentials>,
    pub resend_api_key: Option<String>,
    pub resend_url: String,
    pub email_from: String,
    pub notify_email: Option<String>,
    pub cron_secret: Option<String>,
    pub birthday_schedule_hour: Option<u32>,
    pub allowed_origin: Option<String>,
    pub session_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine in deployed environments.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let rust_log = var("RUST_LOG").unwrap_or_else(|| "debug".into());
        let pocketbase_url = var("POCKETBASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or(ConfigError::Missing("POCKETBASE_URL"))?;

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_addr.parse::<SocketAddr>().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_addr.clone(),
        })?;

        let admin = match (var("POCKETBASE_ADMIN_EMAIL"), var("POCKETBASE_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminCredentials {
                email,
                password,
                collection: var("POCKETBASE_ADMIN_COLLECTION")
                    .unwrap_or_else(|| DEFAULT_ADMIN_COLLECTION.into()),
            }),
            _ => None,
        };

        let birthday_schedule_hour = match var("BIRTHDAY_SCHEDULE_HOUR") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(hour) if hour < 24 => Some(hour),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BIRTHDAY_SCHEDULE_HOUR",
                        value,
                    });
                }
            },
            None => None,
        };

        let session_secure = match var("SESSION_SECURE").as_deref() {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_SECURE",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            rust_log,
            bind_addr,
            pocketbase_url,
            admin,
            resend_api_key: var("RESEND_API_KEY"),
            resend_url: var("RESEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_RESEND_URL.into()),
            email_from: var("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.into()),
            notify_email: var("NOTIFY_EMAIL"),
            cron_secret: var("CRON_SECRET"),
            birthday_schedule_hour,
            allowed_origin: var("ALLOWED_ORIGIN"),
            session_secure,
        })
    }
}
