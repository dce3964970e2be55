//! Identifier range bindings.

use std::collections::BTreeMap;

use agas_primitives::{Gid, GvaRecord, ObjectKind, Resolution};

use super::Authority;
use crate::error::{AuthorityError, Result};

/// Non-overlapping ranges keyed by their (credit-free) lower bound.
#[derive(Debug, Default)]
pub(crate) struct GvaTable {
	ranges: BTreeMap<Gid, GvaRecord>,
}

impl GvaTable {
	pub fn len(&self) -> usize {
		self.ranges.len()
	}

	/// The binding containing `gid`, if any.
	fn covering(&self, gid: Gid) -> Option<(Gid, &GvaRecord)> {
		let (&lower, record) = self.ranges.range(..=gid).next_back()?;
		record.covers(lower, gid).then_some((lower, record))
	}

	pub fn is_bound(&self, gid: Gid) -> bool {
		self.covering(gid.strip_credit()).is_some()
	}

	pub fn kind_at(&self, gid: Gid) -> Option<ObjectKind> {
		self.covering(gid.strip_credit()).map(|(_, record)| record.kind)
	}

	/// Inserts a new binding or updates an exact one in place.
	///
	/// Returns `true` for a new binding and `false` for an in-place update.
	pub fn bind(&mut self, gid: Gid, record: GvaRecord) -> Result<bool> {
		let gid = gid.strip_credit();
		let count = record.count;

		if !gid.prefix().is_valid() {
			return Err(AuthorityError::ReservedGid {
				gid,
				prefix: gid.prefix(),
			});
		}
		if count == 0 {
			return Err(AuthorityError::EmptyRange { gid });
		}
		if !record.kind.is_valid() {
			return Err(AuthorityError::InvalidKind { gid });
		}

		if let Some(existing) = self.ranges.get_mut(&gid) {
			if existing.count != count {
				return Err(AuthorityError::BlockSizeMismatch {
					gid,
					bound: existing.count,
					requested: count,
				});
			}
			*existing = record;
			return Ok(false);
		}

		if let Some((&lower, prev)) = self.ranges.range(..gid).next_back()
			&& prev.covers(lower, gid)
		{
			return Err(AuthorityError::OverlappingRange {
				gid,
				count,
				existing: lower,
			});
		}

		let Some(upper) = record.upper(gid).filter(|upper| upper.same_prefix(gid)) else {
			return Err(AuthorityError::RangeCrossesPrefix {
				lower: gid,
				upper: record.upper(gid).unwrap_or(gid),
			});
		};

		if let Some((&next, _)) = self.ranges.range(gid..=upper).next() {
			return Err(AuthorityError::OverlappingRange {
				gid,
				count,
				existing: next,
			});
		}

		self.ranges.insert(gid, record);
		Ok(true)
	}

	pub fn resolve(&self, gid: Gid) -> Option<Resolution> {
		let gid = gid.strip_credit();
		let (lower, range) = self.covering(gid)?;
		Resolution::at(gid, lower, *range)
	}

	/// Removes the binding that starts at `gid` and spans exactly `count`.
	///
	/// Returns `None` if no binding touches the requested range.
	pub fn unbind(&mut self, gid: Gid, count: u64) -> Result<Option<GvaRecord>> {
		let gid = gid.strip_credit();

		if let Some(existing) = self.ranges.get(&gid) {
			if existing.count != count {
				return Err(AuthorityError::UnbindCountMismatch {
					gid,
					bound: existing.count,
					requested: count,
				});
			}
			return Ok(self.ranges.remove(&gid));
		}

		let partial = |existing| AuthorityError::PartialUnbind {
			gid,
			count,
			existing,
		};
		if let Some((lower, _)) = self.covering(gid) {
			return Err(partial(lower));
		}
		if count > 0 {
			let inside = match gid.checked_add(count - 1) {
				Some(upper) => self.ranges.range(gid..=upper).next(),
				None => self.ranges.range(gid..).next(),
			};
			if let Some((&lower, _)) = inside {
				return Err(partial(lower));
			}
		}
		Ok(None)
	}
}

impl Authority {
	/// Binds `[gid, gid + record.count)` to `record`.
	///
	/// Credit bits on `gid` are ignored. If a binding already starts at `gid`
	/// with the same size it is updated in place and `false` is returned.
	///
	/// # Errors
	///
	/// Rejects empty ranges, invalid kinds, the reserved prefix, size changes
	/// of an existing binding, overlaps, and ranges that leave their prefix.
	/// The table is unchanged on error.
	pub fn bind_gid(&self, gid: Gid, record: GvaRecord) -> Result<bool> {
		let created = self.tables.lock().gvas.bind(gid, record)?;
		tracing::debug!(
			gid = %gid.strip_credit(),
			count = record.count,
			kind = %record.kind,
			endpoint = %record.endpoint,
			created,
			"bind_gid"
		);
		Ok(created)
	}

	/// Resolves `gid` to the binding containing it.
	///
	/// Returns `None` when nothing covers `gid`; that is not an error.
	#[must_use]
	pub fn resolve_gid(&self, gid: Gid) -> Option<Resolution> {
		self.tables.lock().gvas.resolve(gid)
	}

	/// Removes the binding `[gid, gid + count)` and returns it.
	///
	/// # Errors
	///
	/// Fails if a binding starts at `gid` with another size, or if the request
	/// overlaps a binding it does not name exactly.
	pub fn unbind(&self, gid: Gid, count: u64) -> Result<Option<GvaRecord>> {
		let removed = self.tables.lock().gvas.unbind(gid, count)?;
		tracing::debug!(gid = %gid.strip_credit(), count, removed = removed.is_some(), "unbind");
		Ok(removed)
	}
}
