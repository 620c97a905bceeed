use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

use crate::{error::GeoError, states};

/// A parsed location identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `"City, ST"` or `"City, ST, Country"`. `state` holds the full name
    /// for recognized states, otherwise the raw text.
    CityState {
        city: String,
        state: String,
        country: Option<String>,
    },
    /// Anything without a comma is treated as a postal code.
    Zip(String),
}

impl Query {
    /// Classify a raw CLI argument.
    ///
    /// A two-letter state part must be one of the 50 US abbreviations, and
    /// at most three comma-separated parts are accepted.
    pub fn parse(raw: &str) -> Result<Self, GeoError> {
        if !raw.contains(',') {
            return Ok(Query::Zip(raw.trim().to_string()));
        }

        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        let (city, state, country) = match parts.as_slice() {
            [city, state] => (*city, *state, None),
            [city, state, country] => (*city, *state, Some(*country)),
            _ => return Err(GeoError::MalformedQuery(raw.to_string())),
        };

        let state = if states::is_abbreviation(state) {
            states::state_name(state)
                .ok_or_else(|| GeoError::InvalidStateCode(state.to_string()))?
                .to_string()
        } else {
            states::canonical_name(state)
                .map(str::to_string)
                .unwrap_or_else(|| state.to_string())
        };

        Ok(Query::CityState {
            city: city.to_string(),
            state,
            country: country.filter(|c| !c.is_empty()).map(str::to_string),
        })
    }
}

/// One geocoding hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub local_names: Option<BTreeMap<String, String>>,
}

/// The API sends `cod` as a string for most failures and as a number for
/// some (e.g. `401`). Keep whichever form arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Text(String),
    Number(i64),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Text(s) => f.write_str(s),
            ErrorCode::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Failure reported by the API inside a response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "cod")]
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoResult {
    Location(LocationRecord),
    Error(ErrorRecord),
}

impl GeoResult {
    #[cfg(test)]
    pub(crate) fn as_location(&self) -> Option<&LocationRecord> {
        match self {
            GeoResult::Location(record) => Some(record),
            GeoResult::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorRecord> {
        match self {
            GeoResult::Location(_) => None,
            GeoResult::Error(record) => Some(record),
        }
    }
}
