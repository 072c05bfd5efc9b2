//! Geocoding subsystem.
//!
//! Resolves block addresses through OneMap and Street Directory with a
//! cascading fallback, backed by a persistent resolution cache.

pub mod address;
pub mod batch;
pub mod cache;
pub mod providers;
pub mod resolver;
pub mod throttle;
pub mod types;

pub use batch::Geocoding;
pub use cache::ResolutionCache;
pub use providers::GeoBackend;
pub use resolver::AddressResolver;
pub use throttle::Throttle;
pub use types::{GeocodeResult, GeoError, Resolution, ResolveStrategy, Result};
