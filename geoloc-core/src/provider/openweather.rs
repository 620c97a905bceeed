use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{GeoError, Result},
    model::{ErrorRecord, GeoResult, LocationRecord},
};

use super::{Endpoint, Reply};

pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org/geo/1.0";

/// A single element of a geocoding response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OwEntry {
    Error(ErrorRecord),
    Location(LocationRecord),
}

/// `direct` and `reverse` answer with a list, `zip` with a bare object, and
/// failures come as either a bare error object or a list holding one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OwPayload {
    Many(Vec<OwEntry>),
    One(OwEntry),
}

impl From<OwEntry> for GeoResult {
    fn from(entry: OwEntry) -> Self {
        match entry {
            OwEntry::Error(record) => GeoResult::Error(record),
            OwEntry::Location(record) => GeoResult::Location(record),
        }
    }
}

pub fn direct_params(
    city: &str,
    state: &str,
    country: &str,
    limit: u8,
) -> Vec<(&'static str, String)> {
    vec![
        ("q", format!("{city},{state},{country}")),
        ("limit", limit.to_string()),
    ]
}

pub fn zip_params(code: &str, country: &str) -> Vec<(&'static str, String)> {
    vec![("zip", format!("{code},{country}"))]
}

pub fn reverse_params(lat: f64, lon: f64) -> Vec<(&'static str, String)> {
    vec![
        ("lat", lat.to_string()),
        ("lon", lon.to_string()),
        ("limit", "1".to_string()),
    ]
}

/// Normalize any response shape into a list of results.
///
/// `label` names the query in [`GeoError::EmptyResult`]. A non-2xx reply is
/// accepted only when its body is an API error payload.
pub fn decode(endpoint: Endpoint, label: &str, reply: &Reply) -> Result<Vec<GeoResult>> {
    let upstream = || GeoError::Upstream {
        endpoint,
        status: reply.status,
        body: truncate_body(&reply.body),
    };

    let value: Value = match serde_json::from_str(&reply.body) {
        Ok(value) => value,
        Err(_) if !reply.is_success() => return Err(upstream()),
        Err(source) => return Err(GeoError::Decode { endpoint, source }),
    };

    if is_empty(&value) {
        return Err(if reply.is_success() {
            GeoError::EmptyResult(label.to_string())
        } else {
            upstream()
        });
    }

    let payload: OwPayload = match serde_json::from_value(value) {
        Ok(payload) => payload,
        Err(_) if !reply.is_success() => return Err(upstream()),
        Err(source) => return Err(GeoError::Decode { endpoint, source }),
    };

    let results: Vec<GeoResult> = match payload {
        OwPayload::Many(entries) => entries.into_iter().map(GeoResult::from).collect(),
        OwPayload::One(entry) => vec![entry.into()],
    };

    if !reply.is_success() && results.iter().any(|r| r.as_error().is_none()) {
        return Err(upstream());
    }

    Ok(results)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
