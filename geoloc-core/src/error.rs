use thiserror::Error;

use crate::provider::Endpoint;

/// Everything that can go wrong while resolving a single query.
///
/// API error payloads (`{"cod": "404", "message": "not found"}`) are not
/// errors: they decode into [`crate::ErrorRecord`] and travel as data.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Timeout, DNS or connection failure.
    #[error("Failed to send request to OpenWeather ({endpoint}): {}", network_cause(.source))]
    Network {
        endpoint: Endpoint,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response whose body is not an API error payload.
    #[error("OpenWeather {endpoint} request failed with status {status}: {body}")]
    Upstream {
        endpoint: Endpoint,
        status: u16,
        body: String,
    },

    /// Well-formed response that carried no data.
    #[error("No data found for {0}")]
    EmptyResult(String),

    #[error("Unknown state code '{0}'. Expected one of the 50 US state abbreviations")]
    InvalidStateCode(String),

    #[error("Cannot parse '{0}'. Expected 'City, ST', 'City, ST, Country' or a ZIP code")]
    MalformedQuery(String),

    /// JSON that matches none of the shapes the API is known to return.
    #[error("Failed to parse OpenWeather {endpoint} JSON: {source}")]
    Decode {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, GeoError>;

/// reqwest's own message is just "error sending request"; the cause
/// (refused, timed out, DNS) lives further down the source chain.
fn network_cause(err: &reqwest::Error) -> String {
    let mut text = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };

    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
