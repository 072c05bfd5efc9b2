//! Live batch entry point: one resolver, one set of backend sessions, one
//! cache load and save per call.

use super::cache::ResolutionCache;
use super::providers::{GeoBackend, OneMap, StreetDirectory};
use super::resolver::AddressResolver;
use super::throttle::Throttle;
use super::types::{GeocodeResult, Resolution, Result};
use crate::config::GeoConfig;
use log::info;

/// Geocodes record groups against the live services.
pub struct Geocoding {
    config: GeoConfig,
}

impl Geocoding {
    pub fn new(config: GeoConfig) -> Self {
        Self { config }
    }

    /// Backends in cascade order, all spacing their requests on one clock.
    fn backends(&self) -> Vec<Box<dyn GeoBackend>> {
        let throttle = Throttle::new(self.config.throttle());
        vec![
            Box::new(OneMap::new(&self.config, throttle.clone())),
            Box::new(StreetDirectory::new(&self.config, throttle)),
        ]
    }

    /// Resolve `addresses` in order.
    pub fn geocode<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<GeocodeResult>> {
        Ok(self
            .geocode_detailed(addresses)?
            .into_iter()
            .map(|r| r.result)
            .collect())
    }

    /// Like [`Geocoding::geocode`], also reporting how each address was
    /// resolved.
    ///
    /// Backend sessions live exactly as long as this call; they are released
    /// on return whether the batch succeeded or not.
    pub fn geocode_detailed<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<Resolution>> {
        let cache = ResolutionCache::load(self.config.cache_path())?;
        info!(
            "Geocoding {} addresses ({} cached entries)",
            addresses.len(),
            cache.len()
        );
        let mut resolver = AddressResolver::new(cache, self.backends());
        resolver.resolve_batch_detailed(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::types::ResolveStrategy;
    use tempfile::TempDir;

    #[test]
    fn test_fully_cached_batch_needs_no_network() {
        let dir = TempDir::new().unwrap();
        let config = GeoConfig {
            data_dir: dir.path().to_path_buf(),
            ..GeoConfig::default()
        };
        let mut cache = ResolutionCache::empty(config.cache_path());
        cache.insert("123A EXAMPLE ST", GeocodeResult::new("Block 123A", 1.234, 103.456, 560123));
        cache.save().unwrap();

        let results = Geocoding::new(config).geocode(&["123A EXAMPLE ST"]).unwrap();
        assert_eq!(results[0].postal, 560123);
    }

    #[test]
    fn test_detailed_batch_marks_cache_hits() {
        let dir = TempDir::new().unwrap();
        let config = GeoConfig {
            data_dir: dir.path().to_path_buf(),
            ..GeoConfig::default()
        };
        let mut cache = ResolutionCache::empty(config.cache_path());
        cache.insert("370 ANG MO KIO AVE 1", GeocodeResult::new("", 1.3691432115, 103.849538, 0));
        cache.save().unwrap();

        let resolutions = Geocoding::new(config)
            .geocode_detailed(&["370 ANG MO KIO AVE 1"])
            .unwrap();
        assert_eq!(resolutions[0].address, "370 ANG MO KIO AVE 1");
        assert_eq!(resolutions[0].strategy, ResolveStrategy::Cached);
    }

    #[test]
    fn test_empty_batch_writes_empty_cache() {
        let dir = TempDir::new().unwrap();
        let config = GeoConfig {
            data_dir: dir.path().to_path_buf(),
            ..GeoConfig::default()
        };
        let path = config.cache_path();
        let none: [&str; 0] = [];

        assert!(Geocoding::new(config).geocode(&none).unwrap().is_empty());
        assert!(ResolutionCache::load(path).unwrap().is_empty());
    }
}
