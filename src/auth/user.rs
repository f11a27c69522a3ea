use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum_login::{AuthUser, AuthnBackend, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::pocketbase::{AuthResponse, PocketBase, PocketBaseError, USERS};

/// PocketBase tokens are refreshed once they are this old.
const TOKEN_REFRESH_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Rol {
    Admin,
    Planner,
    Staff,
    Viewer,
}

impl Rol {
    /// Unknown or missing roles get the least privilege.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "admin" => Rol::Admin,
            "planner" => Rol::Planner,
            "staff" => Rol::Staff,
            _ => Rol::Viewer,
        }
    }

    pub fn can_write(self) -> bool {
        !matches!(self, Rol::Viewer)
    }
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    rol: String,
}

/// A logged-in user. Each login gets its own `login_id`, which is what the
/// session stores, so one account can be signed in from several browsers.
#[derive(Clone, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub rol: Rol,
    #[serde(skip)]
    pub login_id: String,
    #[serde(skip)]
    pub token: String,
    #[serde(skip)]
    pub authenticated_at: Instant,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("rol", &self.rol)
            .field("login_id", &self.login_id)
            .finish_non_exhaustive()
    }
}

impl User {
    fn from_auth(auth: AuthResponse<UserRecord>, login_id: String) -> Self {
        Self {
            id: auth.record.id,
            username: auth.record.username,
            email: auth.record.email,
            rol: Rol::parse(&auth.record.rol),
            login_id,
            token: auth.token,
            authenticated_at: Instant::now(),
        }
    }

    pub fn require_writer(&self) -> Result<(), AppError> {
        if self.rol.can_write() {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "Viewers cannot modify records".to_string(),
            ))
        }
    }
}

impl AuthUser for User {
    type Id = String;

    fn id(&self) -> Self::Id {
        self.login_id.clone()
    }

    fn session_auth_hash(&self) -> &[u8] {
        self.login_id.as_bytes()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    PocketBase(#[from] PocketBaseError),
}

#[derive(Clone)]
pub struct Backend {
    pocketbase: PocketBase,
    logins: Arc<RwLock<HashMap<String, User>>>,
}

impl Backend {
    pub fn new(pocketbase: PocketBase) -> Self {
        Self {
            pocketbase,
            logins: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn forget(&self, login_id: &str) {
        self.logins.write().await.remove(login_id);
    }

    /// Returns `user` with a token young enough to use, refreshing it
    /// against PocketBase when needed.
    pub async fn ensure_valid_token(&self, user: &User) -> Result<User, PocketBaseError> {
        if user.authenticated_at.elapsed() < TOKEN_REFRESH_AFTER {
            return Ok(user.clone());
        }

        debug!(user = %user.id, "Refreshing PocketBase token");
        let auth: AuthResponse<UserRecord> =
            self.pocketbase.auth_refresh(USERS, &user.token).await?;
        let refreshed = User::from_auth(auth, user.login_id.clone());
        self.logins
            .write()
            .await
            .insert(refreshed.login_id.clone(), refreshed.clone());
        Ok(refreshed)
    }
}

#[async_trait]
impl AuthnBackend for Backend {
    type User = User;
    type Credentials = Credentials;
    type Error = BackendError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        let auth = match self
            .pocketbase
            .auth_with_password::<UserRecord>(USERS, &creds.identity, &creds.password)
            .await
        {
            Ok(auth) => auth,
            // PocketBase answers bad credentials with a 400.
            Err(err) if matches!(err.status(), Some(400 | 401 | 403 | 404)) => {
                debug!(identity = %creds.identity, "Rejected login");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let user = User::from_auth(auth, Uuid::new_v4().to_string());
        debug!(user = %user.id, rol = ?user.rol, "Authenticated user");
        self.logins
            .write()
            .await
            .insert(user.login_id.clone(), user.clone());
        Ok(Some(user))
    }

    async fn get_user(&self, login_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        Ok(self.logins.read().await.get(login_id).cloned())
    }
}

pub type AuthSession = axum_login::AuthSession<Backend>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn auth_body(token: &str) -> serde_json::Value {
        json!({
            "token": token,
            "record": { "id": "u1", "username": "ana", "email": "ana@example.com", "rol": "planner" }
        })
    }

    #[test]
    fn unknown_roles_are_viewers() {
        assert_eq!(Rol::parse("Admin"), Rol::Admin);
        assert_eq!(Rol::parse("superuser"), Rol::Viewer);
        assert_eq!(Rol::parse(""), Rol::Viewer);
        assert!(!Rol::Viewer.can_write());
        assert!(Rol::Staff.can_write());
    }

    #[test]
    fn token_is_not_serialized() {
        let user = User {
            id: "u1".into(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            rol: Rol::Planner,
            login_id: "l1".into(),
            token: "secret".into(),
            authenticated_at: Instant::now(),
        };
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({ "id": "u1", "username": "ana", "email": "ana@example.com", "rol": "planner" })
        );
        assert!(!format!("{user:?}").contains("secret"));
    }

    #[tokio::test]
    async fn authenticate_caches_the_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/collections/users/auth-with-password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("tok")))
            .mount(&server)
            .await;

        let backend = Backend::new(PocketBase::new(server.uri()));
        let user = backend
            .authenticate(Credentials {
                identity: "ana".into(),
                password: "pw".into(),
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(user.rol, Rol::Planner);
        assert_eq!(user.token, "tok");
        let cached = backend.get_user(&user.login_id).await.unwrap().unwrap();
        assert_eq!(cached.id, "u1");

        backend.forget(&user.login_id).await;
        assert!(backend.get_user(&user.login_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_credentials_are_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/collections/users/auth-with-password"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 400, "message": "Failed to authenticate.", "data": {}
            })))
            .mount(&server)
            .await;

        let backend = Backend::new(PocketBase::new(server.uri()));
        let result = backend.authenticate(Credentials::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn stale_tokens_are_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/collections/users/auth-refresh"))
            .and(header("authorization", "old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(auth_body("new")))
            .expect(1)
            .mount(&server)
            .await;

        let backend = Backend::new(PocketBase::new(server.uri()));
        let Some(long_ago) = Instant::now().checked_sub(TOKEN_REFRESH_AFTER * 2) else {
            // Monotonic clock too young to go back that far.
            return;
        };
        let user = User {
            id: "u1".into(),
            username: "ana".into(),
            email: "ana@example.com".into(),
            rol: Rol::Planner,
            login_id: "l1".into(),
            token: "old".into(),
            authenticated_at: long_ago,
        };

        let refreshed = backend.ensure_valid_token(&user).await.unwrap();
        assert_eq!(refreshed.token, "new");
        assert_eq!(refreshed.login_id, "l1");
        assert_eq!(backend.get_user(&"l1".to_string()).await.unwrap().unwrap().token, "new");
    }
}
