//! Core library for the `geoloc` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The US state table and query parsing
//! - The HTTP transport seam and OpenWeather response decoding
//! - The [`LocationResolver`], which resolves and prints locations
//!
//! It is used by `geoloc-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod render;
pub mod resolver;
pub mod states;

pub use config::Config;
pub use error::GeoError;
pub use model::{ErrorCode, ErrorRecord, GeoResult, LocationRecord, Query};
pub use provider::{Endpoint, HttpTransport, Reply, Transport};
pub use resolver::LocationResolver;
