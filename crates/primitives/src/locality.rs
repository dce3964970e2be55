//! Locality endpoints and registration results.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::gid::{Gid, Prefix};
use crate::gva::GvaRecord;

/// Network endpoint identifying one locality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint(pub SocketAddr);

impl From<SocketAddr> for Endpoint {
	fn from(addr: SocketAddr) -> Self {
		Self(addr)
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// Outcome of registering a locality or growing its identifier window.
///
/// When identifiers were allocated, `lower..=upper` is the new window and both
/// bounds carry [`crate::INITIAL_CREDIT`]. For a plain query (count 0),
/// `lower` is the prefix base and `upper` the current allocation cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityAllocation {
	/// First identifier of the window.
	pub lower: Gid,
	/// Last identifier of the window.
	pub upper: Gid,
	/// Prefix owned by the locality.
	pub prefix: Prefix,
	/// True if this call registered the locality.
	pub is_new: bool,
}

/// Address of a locality's own runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityAddress {
	/// The locality's prefix base identifier.
	pub gid: Gid,
	/// Record bound at that identifier.
	pub record: GvaRecord,
}
