//! Locality registration and identifier window allocation.

use std::collections::BTreeMap;

use agas_primitives::{
	Endpoint, Gid, GvaRecord, INITIAL_CREDIT, LocalityAddress, LocalityAllocation, Prefix,
};

use super::Authority;
use crate::error::{AuthorityError, Result};

/// Allocation state of one locality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Partition {
	pub prefix: Prefix,
	/// Last identifier handed out (the prefix base before any allocation).
	pub cursor: Gid,
}

impl Partition {
	fn fresh(prefix: Prefix) -> Self {
		Self {
			prefix,
			cursor: Gid::from_prefix(prefix),
		}
	}

	/// Computes the next window of `count > 0` identifiers after the cursor.
	///
	/// Windows never straddle two high words: a window that would is moved to
	/// the start of the next block. A window that would leave the prefix is
	/// rejected.
	fn window(self, count: u64) -> Result<(Gid, Gid)> {
		debug_assert!(count > 0);
		let crosses = |lower: Gid, upper: Gid| AuthorityError::RangeCrossesPrefix { lower, upper };

		let mut lower = self
			.cursor
			.checked_add(1)
			.ok_or_else(|| crosses(self.cursor, self.cursor))?;
		let mut upper = lower.checked_add(count - 1).ok_or_else(|| crosses(lower, lower))?;

		if upper.msb() != lower.msb() {
			lower = Gid::new(upper.msb(), 0);
			upper = lower.checked_add(count - 1).ok_or_else(|| crosses(lower, lower))?;
		}

		if lower.prefix() != self.prefix || upper.prefix() != self.prefix {
			return Err(crosses(lower, upper));
		}
		Ok((lower, upper))
	}
}

/// Endpoint to partition map plus the prefix allocator.
#[derive(Debug)]
pub(crate) struct PartitionTable {
	by_endpoint: BTreeMap<Endpoint, Partition>,
	/// Highest prefix handed out so far; prefixes are never reused.
	last_prefix: u32,
	max_localities: usize,
}

impl PartitionTable {
	pub fn new(max_localities: usize) -> Self {
		Self {
			by_endpoint: BTreeMap::new(),
			last_prefix: 0,
			max_localities,
		}
	}

	pub fn get(&self, endpoint: &Endpoint) -> Option<Partition> {
		self.by_endpoint.get(endpoint).copied()
	}

	pub fn len(&self) -> usize {
		self.by_endpoint.len()
	}

	/// Registered prefixes in ascending order.
	pub fn prefixes(&self) -> Vec<Prefix> {
		let mut prefixes: Vec<_> = self.by_endpoint.values().map(|p| p.prefix).collect();
		prefixes.sort_unstable();
		prefixes
	}

	/// Picks a partition for a new locality without registering it.
	///
	/// Skips prefix 0 and any prefix whose base identifier `is_taken`.
	fn reserve(&self, is_taken: impl Fn(Prefix) -> bool) -> Result<Partition> {
		if self.by_endpoint.len() >= self.max_localities {
			return Err(AuthorityError::PartitionTableExhausted {
				limit: self.max_localities,
			});
		}

		let mut candidate = self.last_prefix;
		loop {
			candidate = candidate
				.checked_add(1)
				.ok_or(AuthorityError::PrefixSpaceExhausted)?;
			if !is_taken(Prefix(candidate)) {
				return Ok(Partition::fresh(Prefix(candidate)));
			}
		}
	}

	fn store(&mut self, endpoint: Endpoint, partition: Partition) {
		self.last_prefix = self.last_prefix.max(partition.prefix.0);
		self.by_endpoint.insert(endpoint, partition);
	}
}

impl Authority {
	/// Registers `endpoint` if needed and allocates `count` identifiers for it.
	///
	/// * Unknown endpoint: assigns the next free prefix, binds the prefix base
	///   identifier to the locality itself, and allocates the first window.
	/// * Known endpoint with `count == 0`: returns `(base, cursor)` unchanged.
	/// * Known endpoint with `count > 0`: allocates the next window.
	///
	/// Allocated bounds carry [`INITIAL_CREDIT`].
	///
	/// # Errors
	///
	/// Fails with an exhaustion error when no prefix is left, the locality
	/// limit is reached, or the window would leave the locality's prefix.
	/// Nothing is mutated on failure.
	pub fn bind_locality(&self, endpoint: Endpoint, count: u64) -> Result<LocalityAllocation> {
		let (allocation, is_new) = {
			let mut guard = self.tables.lock();
			let tables = &mut *guard;

			let (partition, is_new) = match tables.partitions.get(&endpoint) {
				Some(partition) => (partition, false),
				None => {
					let gvas = &tables.gvas;
					let partition = tables
						.partitions
						.reserve(|prefix| gvas.is_bound(Gid::from_prefix(prefix)))?;
					(partition, true)
				}
			};

			let base = Gid::from_prefix(partition.prefix);
			let window = match count {
				0 => None,
				n => Some(partition.window(n)?),
			};

			if is_new {
				tables.gvas.bind(base, GvaRecord::locality(endpoint))?;
			}

			let mut next = partition;
			let allocation = match window {
				Some((lower, upper)) => {
					next.cursor = upper;
					LocalityAllocation {
						lower: lower.with_credit(INITIAL_CREDIT),
						upper: upper.with_credit(INITIAL_CREDIT),
						prefix: partition.prefix,
						is_new,
					}
				}
				None => LocalityAllocation {
					lower: base,
					upper: partition.cursor,
					prefix: partition.prefix,
					is_new,
				},
			};
			tables.partitions.store(endpoint, next);
			(allocation, is_new)
		};

		if is_new {
			tracing::info!(%endpoint, prefix = %allocation.prefix, "locality registered");
		}
		tracing::debug!(
			%endpoint,
			count,
			lower = %allocation.lower,
			upper = %allocation.upper,
			"bind_locality"
		);
		Ok(allocation)
	}

	/// Resolves the address of `endpoint`'s own runtime.
	///
	/// Returns `None` if the endpoint never registered or its base binding was removed.
	#[must_use]
	pub fn resolve_locality(&self, endpoint: Endpoint) -> Option<LocalityAddress> {
		let tables = self.tables.lock();
		let partition = tables.partitions.get(&endpoint)?;
		let gid = Gid::from_prefix(partition.prefix);
		let resolution = tables.gvas.resolve(gid)?;
		Some(LocalityAddress {
			gid,
			record: resolution.record,
		})
	}

	/// Snapshot of all registered prefixes, ascending.
	#[must_use]
	pub fn localities(&self) -> Vec<Prefix> {
		self.tables.lock().partitions.prefixes()
	}
}
