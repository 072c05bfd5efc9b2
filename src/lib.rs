//! HDB block geocoding.
//!
//! Resolves free-form block addresses to coordinates through a cascade of
//! upstream services, backed by a persistent resolution cache.

pub mod cleanup_log;
pub mod config;
pub mod enrich;
pub mod geo;
