use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::email::Delivery;
use crate::error::AppError;
use crate::models::Resource;
use crate::models::equipo::{Equipo, MiembroEquipo};
use crate::models::persona::{Persona, Personas};
use crate::pocketbase::Filter;
use crate::router::AppState;

/// Argentina is UTC−03:00 all year.
fn argentina_offset() -> TimeDelta {
    TimeDelta::hours(3)
}

pub fn today_in_argentina(now: DateTime<Utc>) -> NaiveDate {
    (now - argentina_offset()).date_naive()
}

/// `-MM-DD`, the substring every ISO birthdate for `date` contains.
pub fn date_pattern(date: NaiveDate) -> String {
    month_day_pattern(date.month(), date.day())
}

fn month_day_pattern(month: u32, day: u32) -> String {
    format!("-{month:02}-{day:02}")
}

/// Reads `YYYY-MM-DD` (anything after the date is ignored, so PocketBase
/// datetimes work) or `DD/MM/YYYY`.
pub fn parse_birthdate(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let head = value.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%d/%m/%Y"))
        .ok()
}

fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Same month and day. 29 February birthdays fall on the 28th in common
/// years.
pub fn is_birthday(birthdate: NaiveDate, today: NaiveDate) -> bool {
    if (birthdate.month(), birthdate.day()) == (today.month(), today.day()) {
        return true;
    }
    (birthdate.month(), birthdate.day()) == (2, 29)
        && (today.month(), today.day()) == (2, 28)
        && !is_leap_year(today.year())
}

pub fn birthday_matches(stored: &str, today: NaiveDate) -> bool {
    parse_birthdate(stored).is_some_and(|birthdate| is_birthday(birthdate, today))
}

/// Narrows the PocketBase query; every candidate is re-checked with
/// [`birthday_matches`].
pub fn candidate_filter(today: NaiveDate) -> Filter {
    let mut days = vec![(today.month(), today.day())];
    if (today.month(), today.day()) == (2, 28) && !is_leap_year(today.year()) {
        days.push((2, 29));
    }
    let alternatives = days
        .into_iter()
        .flat_map(|(month, day)| {
            [
                Filter::new().like("cumpleanio", &month_day_pattern(month, day)),
                Filter::new().like("cumpleanio", &format!("{day:02}/{month:02}/")),
            ]
        })
        .collect();
    Filter::new().any_of(alternatives)
}

#[derive(Debug, Clone, Serialize)]
pub struct Coincidencia {
    pub id: String,
    pub nombre: String,
    pub email: Option<String>,
    pub origen: &'static str,
    pub enviado: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultadoCumpleanios {
    pub fecha: String,
    /// The job already ran for this date and was not forced.
    pub omitido: bool,
    pub coincidencias: Vec<Coincidencia>,
    pub enviados: usize,
    pub fallidos: usize,
    /// The digest reached `NOTIFY_EMAIL`.
    pub resumen_enviado: bool,
}

impl ResultadoCumpleanios {
    fn empty(today: NaiveDate, omitido: bool) -> Self {
        Self {
            fecha: today.to_string(),
            omitido,
            coincidencias: Vec::new(),
            enviados: 0,
            fallidos: 0,
            resumen_enviado: false,
        }
    }
}

/// Finds today's birthdays among people and team members, greets each one
/// that has an email and sends the digest. A date is marked done only when
/// every send succeeded; after that it is skipped unless `force` is set.
pub async fn run(
    state: &AppState,
    today: NaiveDate,
    force: bool,
) -> Result<ResultadoCumpleanios, AppError> {
    // Held for the whole run so concurrent triggers queue up.
    let mut last_run = state.birthday_last_run.lock().await;
    if !force && *last_run == Some(today) {
        info!(%today, "Birthday job already ran today");
        return Ok(ResultadoCumpleanios::empty(today, true));
    }

    let token = state.pocketbase.admin_token().await?;
    let filter = candidate_filter(today).build();

    let personas: Vec<Persona> = state
        .pocketbase
        .collection(Personas::COLLECTION, &token)
        .full_list(filter.clone(), None)
        .await?;
    let equipo: Vec<MiembroEquipo> = state
        .pocketbase
        .collection(Equipo::COLLECTION, &token)
        .full_list(filter, None)
        .await?;

    let mut coincidencias: Vec<Coincidencia> = personas
        .into_iter()
        .filter(|p| birthday_matches(&p.cumpleanio, today))
        .map(|p| Coincidencia {
            nombre: p.nombre_completo(),
            email: Some(p.email).filter(|e| !e.trim().is_empty()),
            id: p.id,
            origen: "persona",
            enviado: false,
        })
        .chain(
            equipo
                .into_iter()
                .filter(|m| birthday_matches(&m.cumpleanio, today))
                .map(|m| Coincidencia {
                    nombre: m.nombre_completo(),
                    email: Some(m.email).filter(|e| !e.trim().is_empty()),
                    id: m.id,
                    origen: "equipo",
                    enviado: false,
                }),
        )
        .collect();

    let mut result = ResultadoCumpleanios::empty(today, false);
    for coincidencia in &mut coincidencias {
        let Some(email) = coincidencia.email.as_deref() else {
            continue;
        };
        match state.mailer.send_birthday(email, &coincidencia.nombre).await {
            Ok(Delivery::Sent(_)) => {
                coincidencia.enviado = true;
                result.enviados += 1;
            }
            Ok(Delivery::Disabled) => {}
            Err(err) => {
                warn!(id = %coincidencia.id, error = %err, "Birthday email failed");
                result.fallidos += 1;
            }
        }
    }

    let nombres: Vec<String> = coincidencias.iter().map(|c| c.nombre.clone()).collect();
    let mut digest_failed = false;
    match state
        .mailer
        .send_birthday_digest(&result.fecha, &nombres)
        .await
    {
        Ok(delivery) => result.resumen_enviado = matches!(delivery, Some(Delivery::Sent(_))),
        Err(err) => {
            warn!(error = %err, "Birthday digest failed");
            digest_failed = true;
        }
    }

    info!(
        %today,
        pattern = %date_pattern(today),
        matches = coincidencias.len(),
        sent = result.enviados,
        failed = result.fallidos,
        digest = result.resumen_enviado,
        "Birthday job finished"
    );
    result.coincidencias = coincidencias;
    // Any failure leaves the day open so the next trigger retries.
    if result.fallidos == 0 && !digest_failed {
        *last_run = Some(today);
    }
    Ok(result)
}

/// Time until the next `hour`:00 in Argentina.
pub fn until_next_run(now: DateTime<Utc>, hour: u32) -> Duration {
    let local = now.naive_utc() - argentina_offset();
    let next = match local.date().and_hms_opt(hour, 0, 0) {
        Some(at) if at > local => at,
        Some(at) => at + TimeDelta::days(1),
        None => local + TimeDelta::days(1),
    };
    (next - local).to_std().unwrap_or_default()
}

pub fn spawn_daily(state: AppState, hour: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next_run(Utc::now(), hour);
            info!(seconds = wait.as_secs(), "Next birthday run scheduled");
            tokio::time::sleep(wait).await;

            let today = today_in_argentina(Utc::now());
            if let Err(err) = run(&state, today, false).await {
                error!(error = %err, "Scheduled birthday job failed");
            }
        }
    })
}
