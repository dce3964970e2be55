//! Typed namespace operations with cached resolution.

use std::net::SocketAddr;
use std::sync::Arc;

use agas_authority::Authority;
use agas_primitives::{
	Endpoint, Gid, GvaRecord, LocalityAddress, LocalityAllocation, ObjectKind, Prefix, Resolution,
};
use agas_proto::{RequestPayload, ResponsePayload};

use crate::cache::{CacheStats, ResolveCache};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::{LocalTransport, TcpTransport, Transport};

/// Client stub for the namespace authority.
///
/// Every operation goes to the authority except `resolve_gid`, which is
/// answered from the [`ResolveCache`] when possible. Requests that rebind a
/// range evict it both before they are sent and after they are answered, so a
/// resolution racing the change on another task is never cached.
pub struct AgasClient {
	transport: Arc<dyn Transport>,
	cache: ResolveCache,
}

impl std::fmt::Debug for AgasClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AgasClient")
			.field("transport", &"<dyn Transport>")
			.field("cache", &self.cache)
			.finish()
	}
}

fn unexpected(op: &'static str) -> ClientError {
	ClientError::UnexpectedReply { op }
}

impl AgasClient {
	async fn send(&self, payload: RequestPayload) -> Result<ResponsePayload> {
		let Some((gid, count)) = payload.rebound_range() else {
			return self.transport.request(payload).await;
		};
		self.cache.invalidate(gid, count);
		let reply = self.transport.request(payload).await;
		self.cache.invalidate(gid, count);
		reply
	}

	/// Create a client over any transport.
	#[must_use]
	pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
		Self {
			transport,
			cache: ResolveCache::new(config.effective_cache_capacity()),
		}
	}

	/// Create a client for an authority in this process.
	#[must_use]
	pub fn local(authority: Arc<Authority>, config: &ClientConfig) -> Self {
		Self::new(Arc::new(LocalTransport::new(authority)), config)
	}

	/// Connect to a remote authority.
	///
	/// # Errors
	///
	/// Fails if the authority is unreachable or speaks another protocol version.
	pub async fn connect(addr: SocketAddr, config: &ClientConfig) -> Result<Self> {
		let transport = TcpTransport::connect(addr, config.request_timeout()).await?;
		Ok(Self::new(Arc::new(transport), config))
	}

	/// Round-trip check.
	///
	/// # Errors
	///
	/// Fails if the authority cannot be reached.
	pub async fn ping(&self) -> Result<()> {
		match self.send(RequestPayload::Ping).await? {
			ResponsePayload::Pong => Ok(()),
			_ => Err(unexpected("ping")),
		}
	}

	/// Registers `endpoint` if needed and allocates `count` identifiers.
	///
	/// # Errors
	///
	/// Fails on exhaustion or transport errors.
	pub async fn bind_locality(&self, endpoint: Endpoint, count: u64) -> Result<LocalityAllocation> {
		match self
			.send(RequestPayload::BindLocality { endpoint, count })
			.await?
		{
			ResponsePayload::LocalityBound(allocation) => Ok(allocation),
			_ => Err(unexpected("bind_locality")),
		}
	}

	/// Binds `[gid, gid + record.count)`; returns `false` for an in-place rebind.
	///
	/// Cached ranges overlapping the new binding are evicted.
	///
	/// # Errors
	///
	/// Fails if the authority rejects the binding or cannot be reached.
	pub async fn bind_gid(&self, gid: Gid, record: GvaRecord) -> Result<bool> {
		match self.send(RequestPayload::BindGid { gid, record }).await? {
			ResponsePayload::GidBound { created } => Ok(created),
			_ => Err(unexpected("bind_gid")),
		}
	}

	/// Resolves the runtime address of `endpoint`.
	///
	/// # Errors
	///
	/// Fails if the authority cannot be reached.
	pub async fn resolve_locality(&self, endpoint: Endpoint) -> Result<Option<LocalityAddress>> {
		match self
			.send(RequestPayload::ResolveLocality { endpoint })
			.await?
		{
			ResponsePayload::LocalityResolved(address) => Ok(address),
			_ => Err(unexpected("resolve_locality")),
		}
	}

	/// Resolves `gid`, consulting the cache first.
	///
	/// # Errors
	///
	/// Fails if the cache misses and the authority cannot be reached.
	pub async fn resolve_gid(&self, gid: Gid) -> Result<Option<Resolution>> {
		if let Some(hit) = self.cache.lookup(gid) {
			return Ok(Some(hit));
		}
		let generation = self.cache.generation();
		match self.send(RequestPayload::ResolveGid { gid }).await? {
			ResponsePayload::GidResolved(resolution) => {
				if let Some(resolution) = &resolution {
					self.cache.insert(resolution, generation);
				}
				Ok(resolution)
			}
			_ => Err(unexpected("resolve_gid")),
		}
	}

	/// Removes the binding `[gid, gid + count)`.
	///
	/// # Errors
	///
	/// Fails if the request does not name a binding exactly or the authority
	/// cannot be reached.
	pub async fn unbind(&self, gid: Gid, count: u64) -> Result<Option<GvaRecord>> {
		match self.send(RequestPayload::Unbind { gid, count }).await? {
			ResponsePayload::Unbound(record) => Ok(record),
			_ => Err(unexpected("unbind")),
		}
	}

	/// Adds `credits` to `gid`'s reference count.
	///
	/// # Errors
	///
	/// Fails on overflow or transport errors.
	pub async fn increment(&self, gid: Gid, credits: u64) -> Result<u64> {
		match self.send(RequestPayload::Increment { gid, credits }).await? {
			ResponsePayload::Incremented { total } => Ok(total),
			_ => Err(unexpected("increment")),
		}
	}

	/// Releases `credits`; returns the remaining count and the freed kind at zero.
	///
	/// # Errors
	///
	/// Fails on bad credit amounts, inconsistency or transport errors.
	pub async fn decrement(&self, gid: Gid, credits: u64) -> Result<(u64, Option<ObjectKind>)> {
		match self.send(RequestPayload::Decrement { gid, credits }).await? {
			ResponsePayload::Decremented { total, freed } => Ok((total, freed)),
			_ => Err(unexpected("decrement")),
		}
	}

	/// Registered locality prefixes.
	///
	/// # Errors
	///
	/// Fails if the authority cannot be reached.
	pub async fn localities(&self) -> Result<Vec<Prefix>> {
		match self.send(RequestPayload::Localities).await? {
			ResponsePayload::Localities(prefixes) => Ok(prefixes),
			_ => Err(unexpected("localities")),
		}
	}

	/// Cache counters.
	#[must_use]
	pub fn cache_stats(&self) -> CacheStats {
		self.cache.stats()
	}

	/// Drops all cached resolutions.
	pub fn clear_cache(&self) {
		self.cache.clear();
	}
}
