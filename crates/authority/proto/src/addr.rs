//! Resolution of the authority's listen/connect address.

use std::net::{Ipv4Addr, SocketAddr};

/// Port the authority listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 7910;

/// Returns the address clients connect to and the authority listens on by default.
///
/// # Resolution Order
///
/// 1. `AGAS_AUTHORITY_ADDR` environment variable, if it parses as a socket address.
/// 2. `127.0.0.1:7910`.
#[must_use]
pub fn default_authority_addr() -> SocketAddr {
	std::env::var("AGAS_AUTHORITY_ADDR")
		.ok()
		.and_then(|s| s.parse().ok())
		.unwrap_or(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)))
}
