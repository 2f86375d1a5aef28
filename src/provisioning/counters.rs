// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters kept by the provisioning service.
#[derive(Debug, Default)]
pub struct ProvisioningMetrics {
	cache_hits: AtomicU64,
	endpoint_calls: AtomicU64,
	coalesced: AtomicU64,
	failures: AtomicU64,
}
impl ProvisioningMetrics {
	/// Requests served straight from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Calls made to the token endpoint.
	pub fn endpoint_calls(&self) -> u64 {
		self.endpoint_calls.load(Ordering::Relaxed)
	}

	/// Requests that joined a renewal already in flight.
	pub fn coalesced(&self) -> u64 {
		self.coalesced.load(Ordering::Relaxed)
	}

	/// Renewals that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_endpoint_call(&self) {
		self.endpoint_calls.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_coalesced(&self) {
		self.coalesced.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
