use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::{fmt::Debug, time::Duration};
use tracing::{debug, warn};

use crate::{
    Config,
    error::{GeoError, Result},
};

pub mod openweather;

/// The three geocoding endpoints under the API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Direct,
    Zip,
    Reverse,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Direct => "direct",
            Endpoint::Zip => "zip",
            Endpoint::Reverse => "reverse",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw HTTP answer: status code plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET against a geocoding endpoint.
///
/// `params` excludes the API key; implementations append it themselves so
/// callers never handle it.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn get(&self, endpoint: Endpoint, params: &[(&str, String)]) -> Result<Reply>;
}

/// reqwest-backed transport talking to the real API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    api_key: String,
    http: Client,
}

impl HttpTransport {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        })
    }

    /// Build a transport from config.
    ///
    /// A missing key is only warned about: requests go out with an empty
    /// `appid` and the API answers each one with its own 401 payload.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = match config.api_key() {
            Ok(key) => key.to_owned(),
            Err(hint) => {
                warn!("{hint}");
                String::new()
            }
        };
        Self::new(config.base_url.clone(), api_key, config.timeout())
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.as_str())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: Endpoint, params: &[(&str, String)]) -> Result<Reply> {
        debug!(%endpoint, ?params, "sending geocoding request");

        let res = self
            .http
            .get(self.url(endpoint))
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            // Strip the URL so the key cannot leak through the error text.
            .map_err(|source| GeoError::Network {
                endpoint,
                source: source.without_url(),
            })?;

        let status = res.status().as_u16();
        let body = res.text().await.map_err(|source| GeoError::Network {
            endpoint,
            source: source.without_url(),
        })?;

        debug!(%endpoint, status, bytes = body.len(), "received geocoding response");

        Ok(Reply { status, body })
    }
}
