//! Loose JSON accessors. Venues return numbers as strings, numbers, or empty
//! strings depending on the endpoint.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use super::ExchangeError;

pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

pub(crate) fn f64_field(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(number)
}

/// Numeric field, absent or empty treated as zero.
pub(crate) fn f64_or_zero(value: &Value, key: &str) -> f64 {
    f64_field(value, key).unwrap_or(0.0)
}

pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn millis(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    let ms = value.get(key).and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })?;
    Utc.timestamp_millis_opt(ms).single()
}

pub(crate) fn seconds(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    let secs = value.get(key).and_then(number)?;
    Utc.timestamp_millis_opt((secs * 1000.0) as i64).single()
}

/// `YYYY-MM-DD HH:MM:SS`, interpreted as UTC.
pub(crate) fn utc_datetime(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    let raw = value.get(key)?.as_str()?;
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

pub(crate) fn array<'a>(
    value: &'a Value,
    exchange: &str,
    what: &str,
) -> Result<&'a Vec<Value>, ExchangeError> {
    value
        .as_array()
        .ok_or_else(|| ExchangeError::malformed(exchange, format!("{what} is not a list")))
}

/// Array under `pointer`, where a JSON `null` counts as empty.
pub(crate) fn array_at<'a>(
    value: &'a Value,
    pointer: &str,
    exchange: &str,
) -> Result<Vec<&'a Value>, ExchangeError> {
    match value.pointer(pointer) {
        Some(Value::Array(items)) => Ok(items.iter().collect()),
        Some(Value::Null) => Ok(Vec::new()),
        _ => Err(ExchangeError::malformed(
            exchange,
            format!("missing list at {pointer}"),
        )),
    }
}
