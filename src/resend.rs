use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ResendError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("Resend responded {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SentEmail {
    pub id: String,
}

#[derive(Clone)]
pub struct ResendClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl ResendClient {
    pub fn new(api_key: String) -> Self {
        Self {
            base_url: "https://api.resend.com".to_string(),
            api_key,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<SentEmail, ResendError> {
        let response = self
            .http
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<SentEmail>().await?);
        }

        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        Err(ResendError::Api {
            status: status.as_u16(),
            message: body["message"]
                .as_str()
                .unwrap_or("Unexpected response")
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            from: "Eventos <hola@example.com>".into(),
            to: vec!["ana@example.com".into()],
            subject: "Hola".into(),
            html: "<p>Hola</p>".into(),
            text: "Hola".into(),
        }
    }

    #[test]
    fn resend_client_has_default_base_url() {
        let client = ResendClient::new("key".into());
        assert_eq!(client.base_url, "https://api.resend.com");
    }

    #[tokio::test]
    async fn send_posts_bearer_authorized_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({ "to": ["ana@example.com"], "subject": "Hola" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "em_1" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ResendClient::new("re_test".into()).with_base_url(server.uri());
        let sent = client.send(&email()).await.unwrap();
        assert_eq!(sent.id, "em_1");
    }

    #[tokio::test]
    async fn send_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({ "statusCode": 422, "message": "Invalid `to` field." })),
            )
            .mount(&server)
            .await;

        let client = ResendClient::new("re_test".into()).with_base_url(server.uri());
        match client.send(&email()).await {
            Err(ResendError::Api { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "Invalid `to` field.");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
