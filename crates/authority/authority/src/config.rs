//! Authority configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How `decrement` treats an identifier that has no reference count yet.
///
/// Bound identifiers implicitly carry [`agas_primitives::INITIAL_CREDIT`]
/// without a table entry, so the first decrement may legitimately find none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecrementPolicy {
	/// Create the record at the initial credit, then decrement it.
	#[default]
	SeedInitialCredit,
	/// Reject the decrement; only identifiers incremented earlier may be decremented.
	RequireRecord,
}

/// Configuration for the namespace authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorityConfig {
	/// Address the IPC server listens on.
	pub listen: SocketAddr,
	/// Treatment of decrements without a reference count.
	pub decrement_policy: DecrementPolicy,
	/// Maximum number of registered localities.
	pub max_localities: usize,
}

impl Default for AuthorityConfig {
	fn default() -> Self {
		Self {
			listen: agas_proto::addr::default_authority_addr(),
			decrement_policy: DecrementPolicy::default(),
			max_localities: u32::MAX as usize,
		}
	}
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Error parsing TOML.
	#[error("invalid configuration in {path}: {error}")]
	Parse {
		/// Path to the file that failed to parse.
		path: PathBuf,
		/// The underlying parse error.
		error: toml::de::Error,
	},

	/// A value is out of range.
	#[error("invalid value for {field}: {reason}")]
	Invalid {
		/// Offending field.
		field: &'static str,
		/// Why it was rejected.
		reason: String,
	},
}

impl AuthorityConfig {
	/// Parse a TOML document. Missing fields take their defaults.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Parse`] for malformed TOML or unknown fields and
	/// [`ConfigError::Invalid`] for out-of-range values.
	pub fn from_toml(path: &Path, source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source).map_err(|error| ConfigError::Parse {
			path: path.to_path_buf(),
			error,
		})?;
		config.validate()?;
		Ok(config)
	}

	/// Read and parse a TOML configuration file.
	///
	/// # Errors
	///
	/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
	/// [`AuthorityConfig::from_toml`].
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml(path, &source)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.max_localities == 0 {
			return Err(ConfigError::Invalid {
				field: "max_localities",
				reason: "at least one locality must be allowed".to_string(),
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn empty_file_yields_defaults() {
		let config = AuthorityConfig::from_toml(Path::new("agas.toml"), "").unwrap();
		assert_eq!(config, AuthorityConfig::default());
	}

	#[test]
	fn load_reads_policy_and_limits() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"listen = \"0.0.0.0:9000\"\ndecrement_policy = \"require_record\"\nmax_localities = 4"
		)
		.unwrap();

		let config = AuthorityConfig::load(file.path()).unwrap();
		assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
		assert_eq!(config.decrement_policy, DecrementPolicy::RequireRecord);
		assert_eq!(config.max_localities, 4);
	}

	#[test]
	fn unknown_field_is_rejected() {
		let err = AuthorityConfig::from_toml(Path::new("agas.toml"), "journal = true").unwrap_err();
		assert!(matches!(err, ConfigError::Parse { .. }));
	}

	#[test]
	fn zero_localities_is_rejected() {
		let err = AuthorityConfig::from_toml(Path::new("agas.toml"), "max_localities = 0").unwrap_err();
		assert!(matches!(err, ConfigError::Invalid { field: "max_localities", .. }));
	}

	#[test]
	fn missing_file_is_io_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = AuthorityConfig::load(dir.path().join("absent.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Io { .. }));
	}
}
