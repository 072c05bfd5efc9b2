//! Core types for the geocoding subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// A resolved building location.
///
/// `postal` is 0 and `title` is empty when the upstream service did not
/// supply them. Treat those as unknown, never as real values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub title: String,
    pub lat: f64,
    pub long: f64,
    pub postal: u32,
}

impl GeocodeResult {
    pub fn new(title: impl Into<String>, lat: f64, long: f64, postal: u32) -> Self {
        Self {
            title: title.into(),
            lat,
            long,
            postal,
        }
    }
}

impl fmt::Display for GeocodeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},{})", self.title, self.lat, self.long, self.postal)
    }
}

/// Which step of the cascade produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    Cached,
    Basic,
    SuffixStripped,
    Reverse,
}

impl fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached => write!(f, "cache"),
            Self::Basic => write!(f, "geocode"),
            Self::SuffixStripped => write!(f, "geocode without block suffix"),
            Self::Reverse => write!(f, "geocode_reverse"),
        }
    }
}

/// One address of a batch with the result and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub address: String,
    pub result: GeocodeResult,
    pub strategy: ResolveStrategy,
}

/// Geocoding errors.
///
/// A backend that simply finds nothing returns `Ok(None)`; every variant here
/// is fatal for the batch it occurs in.
#[derive(Debug, Error)]
pub enum GeoError {
    #[error("This address was not found: {0}")]
    AddressNotFound(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Unexpected upstream response: {0}")]
    Upstream(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

impl From<ureq::Error> for GeoError {
    fn from(err: ureq::Error) -> Self {
        Self::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
