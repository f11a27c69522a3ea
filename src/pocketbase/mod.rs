use std::sync::Arc;
use std::time::{Duration, Instant};

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::AdminCredentials;

pub mod fields;
pub mod filter;

pub use filter::Filter;

pub const USERS: &str = "users";
pub const MAX_PER_PAGE: u32 = 500;

const ADMIN_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, thiserror::Error)]
pub enum PocketBaseError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("PocketBase responded {status}: {message}")]
    Api {
        status: u16,
        message: String,
        data: Value,
    },

    #[error("superuser credentials are not configured")]
    MissingAdminCredentials,
}

impl PocketBaseError {
    pub fn status(&self) -> Option<u16> {
        match self {
            PocketBaseError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The top-level message plus any per-field messages PocketBase sent.
    pub fn detail(&self) -> String {
        match self {
            PocketBaseError::Api { message, data, .. } => {
                let mut parts = vec![message.clone()];
                if let Some(fields) = data.as_object() {
                    for (field, error) in fields {
                        if let Some(msg) = error["message"].as_str() {
                            parts.push(format!("{field}: {msg}"));
                        }
                    }
                }
                parts.join(" ")
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_items: i64,
    pub total_pages: i64,
    pub items: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: u32,
    pub per_page: u32,
    pub sort: Option<String>,
    pub filter: Option<String>,
    pub expand: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 30,
            sort: None,
            filter: None,
            expand: None,
        }
    }
}

impl ListQuery {
    fn to_query_string(&self) -> String {
        let mut query = format!("page={}&perPage={}", self.page, self.per_page);
        for (key, value) in [
            ("sort", &self.sort),
            ("filter", &self.filter),
            ("expand", &self.expand),
        ] {
            if let Some(value) = value {
                query.push_str(&format!(
                    "&{key}={}",
                    utf8_percent_encode(value, NON_ALPHANUMERIC)
                ));
            }
        }
        query
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse<R> {
    pub token: String,
    pub record: R,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    obtained: Instant,
}

/// Client for a PocketBase instance. Cheap to clone; clones share the HTTP
/// connection pool and the cached superuser token.
#[derive(Clone)]
pub struct PocketBase {
    base_url: String,
    http: reqwest::Client,
    admin: Option<AdminCredentials>,
    admin_token: Arc<RwLock<Option<CachedToken>>>,
}

impl PocketBase {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            admin: None,
            admin_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_admin(mut self, admin: Option<AdminCredentials>) -> Self {
        self.admin = admin;
        self
    }

    pub fn has_admin(&self) -> bool {
        self.admin.is_some()
    }

    pub fn collection<'a>(&'a self, name: &'a str, token: &'a str) -> Collection<'a> {
        Collection {
            pb: self,
            name,
            token,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/api/collections/{}",
            self.base_url,
            utf8_percent_encode(collection, NON_ALPHANUMERIC)
        )
    }

    pub async fn auth_with_password<R: DeserializeOwned>(
        &self,
        collection: &str,
        identity: &str,
        password: &str,
    ) -> Result<AuthResponse<R>, PocketBaseError> {
        let response = self
            .http
            .post(format!("{}/auth-with-password", self.collection_url(collection)))
            .json(&json!({ "identity": identity, "password": password }))
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn auth_refresh<R: DeserializeOwned>(
        &self,
        collection: &str,
        token: &str,
    ) -> Result<AuthResponse<R>, PocketBaseError> {
        let response = self
            .http
            .post(format!("{}/auth-refresh", self.collection_url(collection)))
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await?;
        read_json(response).await
    }

    /// A superuser token, re-authenticating when the cached one is stale.
    pub async fn admin_token(&self) -> Result<String, PocketBaseError> {
        let admin = self
            .admin
            .as_ref()
            .ok_or(PocketBaseError::MissingAdminCredentials)?;

        if let Some(cached) = self.admin_token.read().await.as_ref() {
            if cached.obtained.elapsed() < ADMIN_TOKEN_TTL {
                return Ok(cached.token.clone());
            }
        }

        let mut slot = self.admin_token.write().await;
        if let Some(cached) = slot.as_ref() {
            if cached.obtained.elapsed() < ADMIN_TOKEN_TTL {
                return Ok(cached.token.clone());
            }
        }

        debug!("Authenticating PocketBase superuser");
        let auth: AuthResponse<Value> = self
            .auth_with_password(&admin.collection, &admin.email, &admin.password)
            .await?;
        *slot = Some(CachedToken {
            token: auth.token.clone(),
            obtained: Instant::now(),
        });
        Ok(auth.token)
    }
}

/// Record operations on one collection, authorized with `token`. An empty
/// token sends the request anonymously.
pub struct Collection<'a> {
    pb: &'a PocketBase,
    name: &'a str,
    token: &'a str,
}

impl Collection<'_> {
    fn records_url(&self) -> String {
        format!("{}/records", self.pb.collection_url(self.name))
    }

    fn record_url(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.records_url(),
            utf8_percent_encode(id, NON_ALPHANUMERIC)
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.header(reqwest::header::AUTHORIZATION, self.token)
        }
    }

    pub async fn list<T: DeserializeOwned>(
        &self,
        query: &ListQuery,
    ) -> Result<ListResult<T>, PocketBaseError> {
        let url = format!("{}?{}", self.records_url(), query.to_query_string());
        debug!(collection = self.name, %url, "Listing records");
        let response = self.authorize(self.pb.http.get(url)).send().await?;
        read_json(response).await
    }

    /// Walks every page of a filtered listing.
    pub async fn full_list<T: DeserializeOwned>(
        &self,
        filter: Option<String>,
        sort: Option<String>,
    ) -> Result<Vec<T>, PocketBaseError> {
        let mut query = ListQuery {
            page: 1,
            per_page: MAX_PER_PAGE,
            sort,
            filter,
            expand: None,
        };
        let mut items = Vec::new();
        loop {
            let page: ListResult<T> = self.list(&query).await?;
            let done = page.items.is_empty() || i64::from(page.page) >= page.total_pages;
            items.extend(page.items);
            if done {
                return Ok(items);
            }
            query.page += 1;
        }
    }

    pub async fn get_one<T: DeserializeOwned>(
        &self,
        id: &str,
        expand: Option<&str>,
    ) -> Result<T, PocketBaseError> {
        let mut url = self.record_url(id);
        if let Some(expand) = expand {
            url.push_str(&format!(
                "?expand={}",
                utf8_percent_encode(expand, NON_ALPHANUMERIC)
            ));
        }
        let response = self.authorize(self.pb.http.get(url)).send().await?;
        read_json(response).await
    }

    pub async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        body: &B,
    ) -> Result<T, PocketBaseError> {
        let response = self
            .authorize(self.pb.http.post(self.records_url()))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        id: &str,
        body: &B,
    ) -> Result<T, PocketBaseError> {
        let response = self
            .authorize(self.pb.http.patch(self.record_url(id)))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), PocketBaseError> {
        let response = self
            .authorize(self.pb.http.delete(self.record_url(id)))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(read_error(response).await)
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PocketBaseError> {
    if response.status().is_success() {
        Ok(response.json::<T>().await?)
    } else {
        Err(read_error(response).await)
    }
}

async fn read_error(response: reqwest::Response) -> PocketBaseError {
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    PocketBaseError::Api {
        status,
        message: body["message"]
            .as_str()
            .unwrap_or("Unexpected response")
            .to_string(),
        data: body["data"].clone(),
    }
}
