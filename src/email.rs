use std::sync::Arc;

use minijinja::{Environment, context};
use serde::Serialize;
use tracing::{info, warn};

use crate::resend::{OutgoingEmail, ResendClient, ResendError};

const WELCOME_HTML: &str = r#"<div style="font-family: sans-serif">
  <h1>¡Hola {{ nombre }}!</h1>
  <p>Gracias por confiar en nosotros para tu evento.</p>
  {% if evento %}<p>Ya registramos <strong>{{ evento.nombre }}</strong>{% if evento.fecha %} para el {{ evento.fecha }}{% endif %}. Tu planner se va a comunicar pronto.</p>{% endif %}
  <p>Saludos,<br>El equipo</p>
</div>"#;

const WELCOME_TEXT: &str = "¡Hola {{ nombre }}!\n\nGracias por confiar en nosotros para tu evento.\n{% if evento %}Ya registramos {{ evento.nombre }}{% if evento.fecha %} para el {{ evento.fecha }}{% endif %}. Tu planner se va a comunicar pronto.\n{% endif %}\nSaludos,\nEl equipo\n";

const BIRTHDAY_HTML: &str = r#"<div style="font-family: sans-serif">
  <h1>¡Feliz cumpleaños, {{ nombre }}!</h1>
  <p>Te deseamos un día lleno de festejos.</p>
</div>"#;

const BIRTHDAY_TEXT: &str = "¡Feliz cumpleaños, {{ nombre }}!\n\nTe deseamos un día lleno de festejos.\n";

const DIGEST_HTML: &str = r#"<div style="font-family: sans-serif">
  <h1>Cumpleaños del {{ fecha }}</h1>
  <ul>{% for nombre in nombres %}<li>{{ nombre }}</li>{% endfor %}</ul>
</div>"#;

const DIGEST_TEXT: &str =
    "Cumpleaños del {{ fecha }}\n\n{% for nombre in nombres %}- {{ nombre }}\n{% endfor %}";

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error(transparent)]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Resend(#[from] ResendError),
}

/// Outcome of a send attempt. Without a Resend key configured every send is
/// skipped rather than failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent(String),
    Disabled,
}

#[derive(Debug, Serialize)]
pub struct WelcomeEvent<'a> {
    pub nombre: &'a str,
    pub fecha: Option<&'a str>,
}

#[derive(Clone)]
pub struct Mailer {
    client: Option<ResendClient>,
    from: String,
    notify: Option<String>,
    templates: Arc<Environment<'static>>,
}

impl Mailer {
    pub fn new(
        client: Option<ResendClient>,
        from: String,
        notify: Option<String>,
    ) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("bienvenida.html", WELCOME_HTML)?;
        env.add_template("bienvenida.txt", WELCOME_TEXT)?;
        env.add_template("cumpleanios.html", BIRTHDAY_HTML)?;
        env.add_template("cumpleanios.txt", BIRTHDAY_TEXT)?;
        env.add_template("resumen.html", DIGEST_HTML)?;
        env.add_template("resumen.txt", DIGEST_TEXT)?;

        Ok(Self {
            client,
            from,
            notify,
            templates: Arc::new(env),
        })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<(String, String), MailError> {
        let html = self
            .templates
            .get_template(&format!("{name}.html"))?
            .render(&ctx)?;
        let text = self
            .templates
            .get_template(&format!("{name}.txt"))?
            .render(&ctx)?;
        Ok((html, text))
    }

    async fn deliver(
        &self,
        to: Vec<String>,
        subject: String,
        (html, text): (String, String),
    ) -> Result<Delivery, MailError> {
        let Some(client) = &self.client else {
            warn!(?to, %subject, "Email disabled, skipping send");
            return Ok(Delivery::Disabled);
        };

        let sent = client
            .send(&OutgoingEmail {
                from: self.from.clone(),
                to,
                subject,
                html,
                text,
            })
            .await?;
        info!(id = %sent.id, "Email sent");
        Ok(Delivery::Sent(sent.id))
    }

    pub async fn send_welcome(
        &self,
        to: &str,
        nombre: &str,
        evento: Option<WelcomeEvent<'_>>,
    ) -> Result<Delivery, MailError> {
        let body = self.render("bienvenida", context! { nombre, evento })?;
        self.deliver(vec![to.to_string()], format!("¡Bienvenido/a, {nombre}!"), body)
            .await
    }

    pub async fn send_birthday(&self, to: &str, nombre: &str) -> Result<Delivery, MailError> {
        let body = self.render("cumpleanios", context! { nombre })?;
        self.deliver(
            vec![to.to_string()],
            format!("¡Feliz cumpleaños, {nombre}!"),
            body,
        )
        .await
    }

    /// Sends the list of today's birthdays to the notification address, if
    /// one is configured.
    pub async fn send_birthday_digest(
        &self,
        fecha: &str,
        nombres: &[String],
    ) -> Result<Option<Delivery>, MailError> {
        let Some(notify) = &self.notify else {
            return Ok(None);
        };
        if nombres.is_empty() {
            return Ok(None);
        }
        let body = self.render("resumen", context! { fecha, nombres })?;
        let delivery = self
            .deliver(vec![notify.clone()], format!("Cumpleaños del {fecha}"), body)
            .await?;
        Ok(Some(delivery))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mailer() -> Mailer {
        Mailer::new(None, "Eventos <hola@example.com>".into(), None).unwrap()
    }

    #[test]
    fn welcome_mentions_the_event() {
        let (html, text) = mailer()
            .render(
                "bienvenida",
                context! {
                    nombre => "Ana",
                    evento => WelcomeEvent { nombre: "Boda de Ana", fecha: Some("2026-12-05") },
                },
            )
            .unwrap();

        assert!(html.contains("¡Hola Ana!"));
        assert!(html.contains("<strong>Boda de Ana</strong> para el 2026-12-05"));
        assert!(text.contains("Ya registramos Boda de Ana para el 2026-12-05."));
    }

    #[test]
    fn html_bodies_escape_names() {
        let (html, text) = mailer()
            .render("cumpleanios", context! { nombre => "<b>Leo</b>" })
            .unwrap();

        assert!(html.contains("&lt;b&gt;Leo&lt;/b&gt;"));
        assert!(text.contains("<b>Leo</b>"));
    }

    #[tokio::test]
    async fn sends_are_skipped_without_a_client() {
        let delivery = mailer().send_birthday("leo@example.com", "Leo").await.unwrap();
        assert_eq!(delivery, Delivery::Disabled);
    }

    #[tokio::test]
    async fn digest_needs_a_recipient() {
        let sent = mailer()
            .send_birthday_digest("2026-05-06", &["Leo".to_string()])
            .await
            .unwrap();
        assert_eq!(sent, None);
    }
}
