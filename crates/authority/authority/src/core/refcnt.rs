//! Credit-based reference counts.

use std::collections::BTreeMap;

use agas_primitives::{Gid, INITIAL_CREDIT, ObjectKind};

use super::Authority;
use crate::config::DecrementPolicy;
use crate::error::{AuthorityError, Result};

const INITIAL: u64 = INITIAL_CREDIT as u64;

/// Identifier to credit count. An absent entry means "never counted".
#[derive(Debug)]
pub(crate) struct RefcountTable {
	counts: BTreeMap<Gid, u64>,
	policy: DecrementPolicy,
}

impl RefcountTable {
	pub fn new(policy: DecrementPolicy) -> Self {
		Self {
			counts: BTreeMap::new(),
			policy,
		}
	}

	pub fn len(&self) -> usize {
		self.counts.len()
	}

	#[cfg(test)]
	pub fn get(&self, gid: Gid) -> Option<u64> {
		self.counts.get(&gid.strip_credit()).copied()
	}

	pub fn increment(&mut self, gid: Gid, credits: u64) -> Result<u64> {
		let gid = gid.strip_credit();
		let held = self.counts.get(&gid).copied().unwrap_or(INITIAL);
		let total = held
			.checked_add(credits)
			.ok_or(AuthorityError::CreditOverflow { gid })?;
		self.counts.insert(gid, total);
		Ok(total)
	}

	/// Releases `credits`; an entry that reaches zero is removed.
	pub fn decrement(&mut self, gid: Gid, credits: u64) -> Result<u64> {
		if credits > INITIAL {
			return Err(AuthorityError::ExcessiveDecrement {
				requested: credits,
				max: INITIAL,
			});
		}

		let gid = gid.strip_credit();
		let held = match (self.counts.get(&gid), self.policy) {
			(Some(&held), _) => held,
			(None, DecrementPolicy::SeedInitialCredit) => INITIAL,
			(None, DecrementPolicy::RequireRecord) => {
				return Err(AuthorityError::MissingRefcount { gid });
			}
		};

		let total = held
			.checked_sub(credits)
			.ok_or(AuthorityError::CreditUnderflow {
				gid,
				held,
				requested: credits,
			})?;
		if total == 0 {
			self.counts.remove(&gid);
		} else {
			self.counts.insert(gid, total);
		}
		Ok(total)
	}
}

impl Authority {
	/// Adds `credits` to `gid`'s reference count and returns the new total.
	///
	/// An identifier without a count starts from [`INITIAL_CREDIT`].
	///
	/// # Errors
	///
	/// Returns [`AuthorityError::CreditOverflow`] if the total would overflow.
	pub fn increment(&self, gid: Gid, credits: u64) -> Result<u64> {
		let total = self.tables.lock().refcnts.increment(gid, credits)?;
		tracing::debug!(gid = %gid.strip_credit(), credits, total, "increment");
		Ok(total)
	}

	/// Releases `credits` from `gid`'s reference count.
	///
	/// Returns the remaining total. When it reaches zero the count is dropped
	/// and the kind of the binding covering `gid` is returned so the caller can
	/// destroy the object.
	///
	/// # Errors
	///
	/// * [`AuthorityError::ExcessiveDecrement`]: more than [`INITIAL_CREDIT`] released at once.
	/// * [`AuthorityError::CreditUnderflow`]: more released than held; nothing changes.
	/// * [`AuthorityError::MissingRefcount`]: no count exists under
	///   [`DecrementPolicy::RequireRecord`].
	/// * [`AuthorityError::UnknownKindWhileCollecting`]: the count reached zero
	///   but no binding covers `gid`. The count is already gone at that point.
	pub fn decrement(&self, gid: Gid, credits: u64) -> Result<(u64, Option<ObjectKind>)> {
		let gid = gid.strip_credit();
		let (total, freed) = {
			let mut tables = self.tables.lock();
			let total = tables.refcnts.decrement(gid, credits)?;
			let freed = match total {
				0 => Some(tables.gvas.kind_at(gid)),
				_ => None,
			};
			(total, freed)
		};

		match freed {
			None => {
				tracing::debug!(%gid, credits, total, "decrement");
				Ok((total, None))
			}
			Some(Some(kind)) => {
				tracing::debug!(%gid, credits, %kind, "decrement collected object");
				Ok((0, Some(kind)))
			}
			Some(None) => {
				tracing::error!(%gid, "reference count exhausted for an unbound identifier");
				Err(AuthorityError::UnknownKindWhileCollecting { gid })
			}
		}
	}
}
