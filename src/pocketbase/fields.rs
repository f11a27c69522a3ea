//! Deserializers for the loose shapes PocketBase sends back.

use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Unset text and date fields arrive as `""`.
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Relation fields are a bare id for single relations and an array for
/// multiple ones.
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(id)) if !id.is_empty() => vec![id],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(id) if !id.is_empty() => Some(id),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Select fields: anything outside the closed set reads as absent.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| s.parse().ok()))
}

/// Number fields that may be `null`, missing, or sent as a numeric string.
pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "empty_as_none")]
        fecha: Option<String>,
        #[serde(default, deserialize_with = "one_or_many")]
        rel: Vec<String>,
        #[serde(default, deserialize_with = "number")]
        monto: Option<f64>,
        #[serde(default, deserialize_with = "lenient")]
        hora: Option<u8>,
    }

    fn sample(json: &str) -> Sample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn empty_dates_are_none() {
        assert_eq!(sample(r#"{"fecha": ""}"#).fecha, None);
        assert_eq!(sample(r#"{"fecha": null}"#).fecha, None);
        assert_eq!(sample("{}").fecha, None);
        assert_eq!(
            sample(r#"{"fecha": "2026-03-01 00:00:00.000Z"}"#).fecha.as_deref(),
            Some("2026-03-01 00:00:00.000Z")
        );
    }

    #[test]
    fn relations_accept_single_and_multiple() {
        assert_eq!(sample(r#"{"rel": "abc"}"#).rel, vec!["abc"]);
        assert_eq!(sample(r#"{"rel": ["a", "", "b"]}"#).rel, vec!["a", "b"]);
        assert!(sample(r#"{"rel": ""}"#).rel.is_empty());
    }

    #[test]
    fn numbers_accept_strings_and_null() {
        assert_eq!(sample(r#"{"monto": 12.5}"#).monto, Some(12.5));
        assert_eq!(sample(r#"{"monto": "40"}"#).monto, Some(40.0));
        assert_eq!(sample(r#"{"monto": null}"#).monto, None);
    }

    #[test]
    fn unknown_select_values_are_none() {
        assert_eq!(sample(r#"{"hora": "7"}"#).hora, Some(7));
        assert_eq!(sample(r#"{"hora": "siete"}"#).hora, None);
    }
}
