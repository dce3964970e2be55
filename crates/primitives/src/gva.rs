//! Global virtual address records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gid::Gid;
use crate::locality::Endpoint;

/// Kind of object bound at an address, used by collectors to pick destruction logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKind(pub u32);

impl ObjectKind {
	/// A locality's own runtime, bound at its prefix base identifier.
	pub const RUNTIME_SUPPORT: Self = Self(0);
	/// Placeholder kind; never accepted in a binding.
	pub const INVALID: Self = Self(u32::MAX);

	/// Returns false for [`ObjectKind::INVALID`].
	#[must_use]
	pub const fn is_valid(self) -> bool {
		self.0 != Self::INVALID.0
	}
}

impl fmt::Display for ObjectKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			Self::RUNTIME_SUPPORT => f.write_str("runtime_support"),
			Self::INVALID => f.write_str("invalid"),
			Self(raw) => write!(f, "kind#{raw}"),
		}
	}
}

/// Binding of a contiguous block of `count` identifiers to physical memory.
///
/// Every identifier in the block lives on the same locality. The object at
/// `lower + i` sits at `address + i * element_size + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GvaRecord {
	/// Locality holding the objects.
	pub endpoint: Endpoint,
	/// Kind of every object in the block.
	pub kind: ObjectKind,
	/// Number of identifiers covered.
	pub count: u64,
	/// Local base address of the first object.
	pub address: u64,
	/// Constant displacement added to every resolved address.
	pub offset: u64,
	/// Stride in bytes between consecutive objects (the size of `kind`).
	pub element_size: u64,
}

impl GvaRecord {
	/// Record binding a locality's own runtime at its prefix base identifier.
	#[must_use]
	pub const fn locality(endpoint: Endpoint) -> Self {
		Self {
			endpoint,
			kind: ObjectKind::RUNTIME_SUPPORT,
			count: 1,
			address: 0,
			offset: 0,
			element_size: 0,
		}
	}

	/// Returns true if `gid` falls inside `[lower, lower + count)`.
	#[must_use]
	pub fn covers(&self, lower: Gid, gid: Gid) -> bool {
		gid.offset_from(lower).is_some_and(|diff| diff < self.count)
	}

	/// Last identifier of the block starting at `lower`.
	#[must_use]
	pub fn upper(&self, lower: Gid) -> Option<Gid> {
		lower.checked_add(self.count.checked_sub(1)?)
	}

	/// Resolves the single object at `gid` in the block starting at `lower`.
	///
	/// The returned record has `count == 1`, `offset == 0` and the computed
	/// physical address. Address arithmetic wraps like pointer arithmetic in
	/// the owning process would.
	#[must_use]
	pub fn resolve(&self, lower: Gid, gid: Gid) -> Option<Self> {
		let diff = gid.offset_from(lower).filter(|&diff| diff < self.count)?;
		let address = self
			.address
			.wrapping_add(diff.wrapping_mul(self.element_size))
			.wrapping_add(self.offset);
		Some(Self {
			count: 1,
			address,
			offset: 0,
			..*self
		})
	}
}

/// Result of resolving one identifier: the containing range and the record at the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
	/// Lower bound of the containing range.
	pub lower: Gid,
	/// The containing range exactly as bound.
	pub range: GvaRecord,
	/// The record resolved at the requested identifier.
	pub record: GvaRecord,
}

impl Resolution {
	/// Resolves `gid` against the range `(lower, range)`, if it is covered.
	///
	/// Credit on either identifier is ignored.
	#[must_use]
	pub fn at(gid: Gid, lower: Gid, range: GvaRecord) -> Option<Self> {
		let lower = lower.strip_credit();
		let record = range.resolve(lower, gid.strip_credit())?;
		Some(Self {
			lower,
			range,
			record,
		})
	}

	/// Physical address of the resolved object.
	#[must_use]
	pub const fn address(&self) -> u64 {
		self.record.address
	}
}
