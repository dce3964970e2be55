//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for [`crate::AgasClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
	/// Maximum number of cached ranges.
	pub cache_capacity: usize,
	/// Whether resolutions are cached at all.
	pub cache_enabled: bool,
	/// Per-request timeout for remote transports, in milliseconds.
	pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			cache_capacity: 4096,
			cache_enabled: true,
			request_timeout_ms: 5_000,
		}
	}
}

impl ClientConfig {
	/// Request timeout as a [`Duration`].
	#[must_use]
	pub const fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	/// Capacity the cache is actually built with; zero disables it.
	#[must_use]
	pub const fn effective_cache_capacity(&self) -> usize {
		if self.cache_enabled { self.cache_capacity } else { 0 }
	}
}
