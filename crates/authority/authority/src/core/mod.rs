//! Namespace authority: locality partitions, range bindings and reference counts.
//!
//! # Purpose
//!
//! - Own the three namespace tables and expose every administrative operation on them.
//! - Define the single dispatch point ([`Authority::dispatch`]) shared by the IPC server and in-process clients.
//! - Exclude transport, client-side caching and object destruction; the authority only reports which kind was freed.
//!
//! # Mental model
//!
//! - Each locality (a runtime instance, keyed by [`Endpoint`](agas_primitives::Endpoint)) owns one 32-bit [`Prefix`](agas_primitives::Prefix) and hands out identifiers from it in contiguous windows.
//! - The prefix base identifier `(prefix << 48, 0)` is bound to the locality itself, so resolving it answers "where is that runtime".
//! - Objects are bound as ranges `[lower, lower + count)` of identifiers to a [`GvaRecord`](agas_primitives::GvaRecord); resolution is a predecessor search on the lower bounds.
//! - Reference counts are stored only for identifiers that were incremented or decremented; an absent count means [`INITIAL_CREDIT`](agas_primitives::INITIAL_CREDIT).
//! - Credit bits travel with identifiers but never take part in table keys or comparisons.
//!
//! # Key types
//!
//! | Type | Meaning | Constraints | Constructed / mutated in |
//! |---|---|---|---|
//! | [`Authority`] | Namespace state machine | MUST be the only owner of the tables | `Authority::*` |
//! | [`Tables`] | Partition, binding and refcount tables | MUST only be accessed under the tables lock | `Authority::bind_locality`, `Authority::bind_gid`, `Authority::unbind`, `Authority::increment`, `Authority::decrement` |
//! | [`partition::PartitionTable`] | Endpoint to prefix and allocation cursor | Prefixes MUST be unique and never reused | `Authority::bind_locality` |
//! | [`gva::GvaTable`] | Non-overlapping bound ranges | Keys MUST be credit-free; ranges MUST NOT overlap or leave their prefix | `Authority::bind_gid`, `Authority::unbind` |
//! | [`refcnt::RefcountTable`] | Identifier to credit count | Entries MUST be removed when they reach zero | `Authority::increment`, `Authority::decrement` |
//!
//! # Invariants
//!
//! 1. Locality prefixes MUST be unique, non-zero and never reused.
//!    - Enforced in: `PartitionTable::reserve`
//!    - Tested by: `core::tests::partition::prefixes_are_unique_across_localities`
//!    - Failure symptom: two runtimes mint the same identifiers and resolve each other's objects.
//!
//! 2. Allocation windows MUST stay inside the locality's prefix and MUST NOT straddle two high words.
//!    - Enforced in: `Partition::window`
//!    - Tested by: `core::partition::tests::window_straddling_high_word_is_rebased`, `core::partition::tests::window_leaving_prefix_is_rejected`
//!    - Failure symptom: identifiers from one locality resolve into another locality's range.
//!
//! 3. Bound ranges MUST NOT overlap, and an exact rebind MUST keep the block size.
//!    - Enforced in: `GvaTable::bind`
//!    - Tested by: `core::tests::binding::overlapping_bind_is_rejected_without_mutation`, `core::tests::binding::rebind_with_other_size_is_rejected`
//!    - Failure symptom: resolution becomes order-dependent and returns the wrong owner.
//!
//! 4. Rejected operations MUST leave every table unchanged. The one exception is
//!    `UnknownKindWhileCollecting`: the exhausted count is already removed when
//!    the missing binding is detected.
//!    - Enforced in: `Authority::bind_locality`, `GvaTable::bind`, `GvaTable::unbind`, `RefcountTable::decrement`
//!    - Tested by: `core::tests::binding::overlapping_bind_is_rejected_without_mutation`, `core::tests::refcount::underflow_is_rejected_without_mutation`
//!    - Failure symptom: a failed request still changes ownership or counts, and retries diverge.
//!
//! 5. A count that reaches zero MUST be removed and MUST report the kind of the covering binding.
//!    - Enforced in: `Authority::decrement`
//!    - Tested by: `core::tests::refcount::exhausted_count_reports_bound_kind`, `core::tests::refcount::exhausted_count_without_binding_is_inconsistent`, `core::tests::refcount::decrement_after_collection_starts_from_initial_credit`
//!    - Failure symptom: objects are never destroyed, or are destroyed with the wrong deleter.
//!
//! # Concurrency
//!
//! All three tables sit behind one lock so that `bind_locality` (partition plus
//! binding) and `decrement` (refcount plus binding lookup) are atomic. The lock
//! is never held across I/O or `.await`, and log lines are emitted after it is
//! released.
//!
//! # Failure modes
//!
//! - Exhaustion (prefix space, locality limit, window leaving its prefix) is reported to the caller.
//! - Invariant violations by the caller (overlap, size mismatch, bad credits) are rejected with `BadParameter`.
//! - Internal inconsistency between the refcount and binding tables is logged at error level and reported as `Inconsistent`.

mod gva;
mod partition;
mod refcnt;

use std::sync::Arc;

use agas_proto::{
	ErrorCode, PROTOCOL_VERSION, Request, RequestPayload, Response, ResponsePayload, ServiceError,
};
use parking_lot::Mutex;

use crate::config::AuthorityConfig;
use crate::error::{AuthorityError, Result};

/// Table sizes, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityStats {
	/// Registered localities.
	pub localities: usize,
	/// Bound ranges, including locality base bindings.
	pub bindings: usize,
	/// Explicit reference counts.
	pub refcounts: usize,
}

/// The authoritative namespace service state.
#[derive(Debug)]
pub struct Authority {
	tables: Mutex<Tables>,
	config: AuthorityConfig,
}

#[derive(Debug)]
struct Tables {
	partitions: partition::PartitionTable,
	gvas: gva::GvaTable,
	refcnts: refcnt::RefcountTable,
}

impl Authority {
	/// Create an authority with default configuration.
	#[must_use]
	pub fn new() -> Arc<Self> {
		Self::new_with_config(AuthorityConfig::default())
	}

	/// Create an authority with custom configuration.
	#[must_use]
	pub fn new_with_config(config: AuthorityConfig) -> Arc<Self> {
		let tables = Tables {
			partitions: partition::PartitionTable::new(config.max_localities),
			gvas: gva::GvaTable::default(),
			refcnts: refcnt::RefcountTable::new(config.decrement_policy),
		};
		Arc::new(Self {
			tables: Mutex::new(tables),
			config,
		})
	}

	/// Configuration this authority was built with.
	#[must_use]
	pub fn config(&self) -> &AuthorityConfig {
		&self.config
	}

	/// Current table sizes.
	#[must_use]
	pub fn stats(&self) -> AuthorityStats {
		let tables = self.tables.lock();
		AuthorityStats {
			localities: tables.partitions.len(),
			bindings: tables.gvas.len(),
			refcounts: tables.refcnts.len(),
		}
	}

	/// Executes one operation against the tables.
	///
	/// # Errors
	///
	/// Returns the operation's [`AuthorityError`], or
	/// [`AuthorityError::VersionMismatch`] for a `Hello` with another version.
	pub fn apply(&self, payload: RequestPayload) -> Result<ResponsePayload> {
		Ok(match payload {
			RequestPayload::Ping => ResponsePayload::Pong,
			RequestPayload::Hello { version } => {
				if version != PROTOCOL_VERSION {
					return Err(AuthorityError::VersionMismatch {
						local: PROTOCOL_VERSION,
						remote: version,
					});
				}
				ResponsePayload::Welcome {
					version: PROTOCOL_VERSION,
				}
			}
			RequestPayload::BindLocality { endpoint, count } => {
				ResponsePayload::LocalityBound(self.bind_locality(endpoint, count)?)
			}
			RequestPayload::BindGid { gid, record } => ResponsePayload::GidBound {
				created: self.bind_gid(gid, record)?,
			},
			RequestPayload::ResolveLocality { endpoint } => {
				ResponsePayload::LocalityResolved(self.resolve_locality(endpoint))
			}
			RequestPayload::ResolveGid { gid } => ResponsePayload::GidResolved(self.resolve_gid(gid)),
			RequestPayload::Unbind { gid, count } => ResponsePayload::Unbound(self.unbind(gid, count)?),
			RequestPayload::Increment { gid, credits } => ResponsePayload::Incremented {
				total: self.increment(gid, credits)?,
			},
			RequestPayload::Decrement { gid, credits } => {
				let (total, freed) = self.decrement(gid, credits)?;
				ResponsePayload::Decremented { total, freed }
			}
			RequestPayload::Localities => ResponsePayload::Localities(self.localities()),
		})
	}

	/// [`Authority::apply`] with errors logged and converted to their wire form.
	///
	/// # Errors
	///
	/// Returns the rejected operation as a [`ServiceError`].
	pub fn dispatch(&self, payload: RequestPayload) -> std::result::Result<ResponsePayload, ServiceError> {
		let op = payload.name();
		self.apply(payload).map_err(|err| {
			match err.code() {
				ErrorCode::Inconsistent | ErrorCode::Internal => {
					tracing::error!(op, error = %err, "namespace operation failed");
				}
				_ => tracing::warn!(op, error = %err, "namespace operation rejected"),
			}
			ServiceError::from(err)
		})
	}

	/// Answers a complete request envelope.
	#[must_use]
	pub fn handle(&self, request: Request) -> Response {
		match self.dispatch(request.payload) {
			Ok(payload) => Response::ok(request.id, payload),
			Err(err) => Response::error(request.id, err),
		}
	}
}

#[cfg(test)]
impl Authority {
	fn refcount_for_test(&self, gid: agas_primitives::Gid) -> Option<u64> {
		self.tables.lock().refcnts.get(gid)
	}
}
