//! Address resolver — orchestrates the fallback cascade.
//!
//! Per address:  Cache → geocode (each backend) → geocode without block
//! suffix (each backend) → geocode_reverse (each backend) → AddressNotFound
//!
//! The cache is loaded by the caller, mutated here per miss, and saved once
//! at the end of a successful batch. Request spacing is the backends' job:
//! each one waits on the shared [`Throttle`](super::throttle::Throttle)
//! before every upstream request.

use super::address;
use super::cache::ResolutionCache;
use super::providers::GeoBackend;
use super::types::{GeocodeResult, GeoError, Resolution, ResolveStrategy, Result};
use log::{debug, info, warn};

/// The resolver with its fallback cascade over an ordered list of backends.
pub struct AddressResolver {
    cache: ResolutionCache,
    backends: Vec<Box<dyn GeoBackend>>,
}

impl AddressResolver {
    pub fn new(cache: ResolutionCache, backends: Vec<Box<dyn GeoBackend>>) -> Self {
        Self { cache, backends }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolve every address in order and persist the cache once at the end.
    ///
    /// The first address that cannot be resolved aborts the batch; nothing
    /// resolved in this batch is persisted in that case.
    pub fn resolve_batch<S: AsRef<str>>(&mut self, addresses: &[S]) -> Result<Vec<GeocodeResult>> {
        Ok(self
            .resolve_batch_detailed(addresses)?
            .into_iter()
            .map(|r| r.result)
            .collect())
    }

    /// Like [`resolve_batch`](Self::resolve_batch), keeping the strategy that
    /// produced each result so reverse-geocoded addresses can be audited.
    pub fn resolve_batch_detailed<S: AsRef<str>>(&mut self, addresses: &[S]) -> Result<Vec<Resolution>> {
        let mut resolutions = Vec::with_capacity(addresses.len());
        let mut hits = 0;

        for address in addresses {
            let address = address.as_ref();
            if let Some(cached) = self.cache.get(address) {
                debug!("Cache hit for {}", address);
                hits += 1;
                resolutions.push(Resolution {
                    address: address.to_string(),
                    result: cached.clone(),
                    strategy: ResolveStrategy::Cached,
                });
                continue;
            }
            let (result, strategy) = self.resolve(address)?;
            debug!("Resolved {} via {}", address, strategy);
            self.cache.insert(address, result.clone());
            resolutions.push(Resolution {
                address: address.to_string(),
                result,
                strategy,
            });
        }

        self.cache.save()?;
        info!(
            "Geocoded {} addresses ({} from cache)",
            resolutions.len(),
            hits
        );
        Ok(resolutions)
    }

    /// Run the cascade for one address, bypassing the cache.
    pub fn resolve(&mut self, address: &str) -> Result<(GeocodeResult, ResolveStrategy)> {
        // 1. Address as given
        if let Some(result) = self.basic_geocode(address)? {
            return Ok((result, ResolveStrategy::Basic));
        }

        // 2. Block wing letter dropped ("123A" → "123"); skipped without one
        if let Some(stripped) = address::without_block_suffix(address) {
            if let Some(result) = self.basic_geocode(&stripped)? {
                return Ok((result, ResolveStrategy::SuffixStripped));
            }
        }

        // 3. Street, then buildings around it
        let Some((block, street)) = address::split_block(address) else {
            return Err(GeoError::AddressNotFound(address.to_string()));
        };
        for backend in self.backends.iter_mut() {
            if let Some(result) = backend.geocode_reverse(block, street)? {
                warn!("{} is via geocode_reverse() on {}", address, backend.name());
                return Ok((result, ResolveStrategy::Reverse));
            }
        }

        Err(GeoError::AddressNotFound(address.to_string()))
    }

    fn basic_geocode(&mut self, address: &str) -> Result<Option<GeocodeResult>> {
        for backend in self.backends.iter_mut() {
            if let Some(result) = backend.geocode(address)? {
                return Ok(Some(result));
            }
            debug!("{} found nothing for {}", backend.name(), address);
        }
        Ok(None)
    }
}
