//! Manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading a [`ManagerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The TOML source could not be parsed.
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// A value parsed but is out of range.
	#[error("invalid value for '{field}': {reason}")]
	Invalid {
		/// The offending field name.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
}

/// Configuration for a [`RequestManager`](crate::RequestManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
	/// Maximum number of read callbacks running at once. `None` is unbounded.
	pub max_concurrent_reads: Option<usize>,
	/// How long shutdown waits for outstanding slots to vacate, in milliseconds.
	pub shutdown_timeout_ms: u64,
}

/// Returns the default shutdown drain timeout in milliseconds.
const fn default_shutdown_timeout_ms() -> u64 {
	5_000
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			max_concurrent_reads: None,
			shutdown_timeout_ms: default_shutdown_timeout_ms(),
		}
	}
}

impl ManagerConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Bounds concurrently running reads.
	///
	/// # Panics
	///
	/// Panics if `limit` is zero.
	#[must_use]
	pub fn max_concurrent_reads(mut self, limit: usize) -> Self {
		assert!(limit > 0, "max_concurrent_reads must be > 0");
		self.max_concurrent_reads = Some(limit);
		self
	}

	/// Sets the shutdown drain timeout.
	#[must_use]
	pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
		self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
		self
	}

	pub fn shutdown_timeout_duration(&self) -> Duration {
		Duration::from_millis(self.shutdown_timeout_ms)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_concurrent_reads == Some(0) {
			return Err(ConfigError::Invalid {
				field: "max_concurrent_reads",
				reason: "must be greater than zero".to_string(),
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		let config = ManagerConfig::from_toml_str("").unwrap();
		assert_eq!(config, ManagerConfig::default());
		assert_eq!(config.shutdown_timeout_duration(), Duration::from_secs(5));
	}

	#[test]
	fn parses_all_fields() {
		let config = ManagerConfig::from_toml_str("max_concurrent_reads = 4\nshutdown_timeout_ms = 250\n").unwrap();
		assert_eq!(config.max_concurrent_reads, Some(4));
		assert_eq!(config.shutdown_timeout_duration(), Duration::from_millis(250));
	}

	#[test]
	fn rejects_zero_read_bound() {
		let err = ManagerConfig::from_toml_str("max_concurrent_reads = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "max_concurrent_reads", .. }));
	}

	#[test]
	fn rejects_unknown_keys() {
		let err = ManagerConfig::from_toml_str("max_reads = 2").unwrap_err();
		assert!(matches!(err, ConfigError::Parse(_)));
	}

	#[test]
	fn builder_sets_fields() {
		let config = ManagerConfig::default().max_concurrent_reads(2).shutdown_timeout(Duration::from_millis(10));
		assert_eq!(config.max_concurrent_reads, Some(2));
		assert_eq!(config.shutdown_timeout_ms, 10);
	}
}
