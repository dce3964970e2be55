//! Per-locality namespace context and identifier pool.

use std::sync::Arc;

use agas_primitives::{Endpoint, Gid, INITIAL_CREDIT, Prefix};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::stub::AgasClient;

/// A registered locality and its connection to the authority.
///
/// Built once at startup by [`AgasContext::register`] and handed to the
/// components that need the namespace.
#[derive(Debug, Clone)]
pub struct AgasContext {
	client: Arc<AgasClient>,
	endpoint: Endpoint,
	prefix: Prefix,
}

impl AgasContext {
	/// Registers `endpoint` with the authority without allocating identifiers.
	///
	/// Registering an endpoint that is already known returns its existing prefix.
	///
	/// # Errors
	///
	/// Fails if the authority is out of prefixes or cannot be reached.
	pub async fn register(client: Arc<AgasClient>, endpoint: Endpoint) -> Result<Self> {
		let allocation = client.bind_locality(endpoint, 0).await?;
		tracing::info!(%endpoint, prefix = %allocation.prefix, is_new = allocation.is_new, "locality registered");
		Ok(Self {
			client,
			endpoint,
			prefix: allocation.prefix,
		})
	}

	/// Namespace client.
	#[must_use]
	pub fn client(&self) -> &Arc<AgasClient> {
		&self.client
	}

	/// This locality's endpoint.
	#[must_use]
	pub fn endpoint(&self) -> Endpoint {
		self.endpoint
	}

	/// This locality's prefix.
	#[must_use]
	pub fn prefix(&self) -> Prefix {
		self.prefix
	}

	/// Identifier naming this locality's runtime.
	#[must_use]
	pub fn locality_gid(&self) -> Gid {
		Gid::from_prefix(self.prefix)
	}

	/// Pool handing out identifiers in windows of `batch`.
	#[must_use]
	pub fn id_pool(&self, batch: u64) -> IdPool {
		IdPool {
			client: self.client.clone(),
			endpoint: self.endpoint,
			batch: batch.max(1),
			window: Mutex::new(None),
		}
	}
}

/// Hands out fresh identifiers, fetching a new window when the current one runs out.
#[derive(Debug)]
pub struct IdPool {
	client: Arc<AgasClient>,
	endpoint: Endpoint,
	batch: u64,
	/// Next identifier and how many remain in the window.
	window: Mutex<Option<(Gid, u64)>>,
}

impl IdPool {
	/// Next unused identifier, carrying [`INITIAL_CREDIT`].
	///
	/// # Errors
	///
	/// Fails if a new window is needed and the authority cannot provide one.
	pub async fn next_id(&self) -> Result<Gid> {
		let mut window = self.window.lock().await;
		let (id, left) = match *window {
			Some(current) => current,
			None => {
				let allocation = self.client.bind_locality(self.endpoint, self.batch).await?;
				tracing::debug!(endpoint = %self.endpoint, lower = %allocation.lower, count = self.batch, "id window refilled");
				(allocation.lower.strip_credit(), self.batch)
			}
		};
		*window = if left > 1 {
			id.checked_add(1).map(|next| (next, left - 1))
		} else {
			None
		};
		Ok(id.with_credit(INITIAL_CREDIT))
	}
}
