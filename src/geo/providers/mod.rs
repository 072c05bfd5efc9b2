//! Geocoding backends: OneMap (public JSON API) and Street Directory
//! (page scraped through an automation session).

mod auth;
mod onemap;
mod street_directory;

pub use auth::{OneMapAuth, Token};
pub use onemap::OneMap;
pub use street_directory::{HttpPageDriver, PageDriver, StreetDirectory};

use super::types::{GeocodeResult, GeoError, Result};
use serde_json::Value;

/// The capability every upstream service offers the resolver.
///
/// `Ok(None)` means the service could not resolve the address and the
/// resolver should move on. `Err` aborts the batch.
pub trait GeoBackend {
    fn name(&self) -> &str;

    /// Forward lookup of a full `"<block> <street>"` address.
    fn geocode(&mut self, address: &str) -> Result<Option<GeocodeResult>>;

    /// Locate `street`, then look for the building numbered exactly `block`
    /// around it.
    fn geocode_reverse(&mut self, block: &str, street: &str) -> Result<Option<GeocodeResult>>;
}

/// Numbers arrive either as JSON numbers or as numeric strings.
pub(crate) fn number_field(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Same as [`number_field`] but missing coordinates are an upstream fault.
pub(crate) fn coordinate(value: Option<&Value>, key: &str) -> Result<f64> {
    number_field(value).ok_or_else(|| GeoError::Upstream(format!("missing or invalid {}", key)))
}

/// Postal codes default to 0 when absent or unparseable ("NIL").
pub(crate) fn postal_field(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// String-ish fields, numbers included.
pub(crate) fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
