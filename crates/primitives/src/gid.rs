//! 128-bit global identifiers.
//!
//! A [`Gid`] is split into a high word (`msb`) and a low word (`lsb`). The high
//! word is laid out, most significant bit first, as:
//!
//! | Bits | Field |
//! |---|---|
//! | 63..48 | credit |
//! | 47..16 | locality prefix |
//! | 15..0 | offset block |
//!
//! The low word is the dense offset within a block. Table lookups always use
//! credit-stripped identifiers; the remaining 112 bits form one offset space in
//! which carries out of the low word flow into the block and then into the
//! prefix. Callers that must stay inside one prefix check [`Gid::prefix`] after
//! doing arithmetic.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Credit attached to freshly allocated identifiers and to implicitly created
/// reference counts.
pub const INITIAL_CREDIT: u16 = 255;

const CREDIT_SHIFT: u32 = 48;
const CREDIT_MASK: u64 = 0xffff << CREDIT_SHIFT;
const PREFIX_SHIFT: u32 = 16;
const PREFIX_MASK: u64 = 0xffff_ffff << PREFIX_SHIFT;
const BLOCK_MASK: u64 = 0xffff;

/// Largest value of the credit-free offset space.
const SPACE_MAX: u128 = (1 << 112) - 1;

/// Identifier-space prefix assigned to one locality.
///
/// Prefix `0` is reserved and never handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Prefix(pub u32);

impl Prefix {
	/// The reserved, never-assigned prefix.
	pub const INVALID: Self = Self(0);

	/// Returns true unless this is the reserved prefix.
	#[must_use]
	pub const fn is_valid(self) -> bool {
		self.0 != 0
	}
}

impl fmt::Display for Prefix {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:08x}", self.0)
	}
}

/// Location-independent global identifier.
///
/// `Eq`/`Ord` compare the full value, credit included. Table keys are always
/// passed through [`Gid::strip_credit`] first, so two identifiers differing only
/// in credit name the same object.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gid {
	msb: u64,
	lsb: u64,
}

impl Gid {
	/// The all-zero identifier, never bound.
	pub const INVALID: Self = Self::new(0, 0);

	/// Builds an identifier from its raw words.
	#[must_use]
	pub const fn new(msb: u64, lsb: u64) -> Self {
		Self { msb, lsb }
	}

	/// Raw high word, credit included.
	#[must_use]
	pub const fn msb(self) -> u64 {
		self.msb
	}

	/// Raw low word.
	#[must_use]
	pub const fn lsb(self) -> u64 {
		self.lsb
	}

	/// The base identifier of a prefix: block 0, offset 0, no credit.
	///
	/// A locality's own runtime is bound at this identifier.
	#[must_use]
	pub const fn from_prefix(prefix: Prefix) -> Self {
		Self::new((prefix.0 as u64) << PREFIX_SHIFT, 0)
	}

	/// The locality prefix this identifier was allocated from.
	#[must_use]
	pub const fn prefix(self) -> Prefix {
		Prefix(((self.msb & PREFIX_MASK) >> PREFIX_SHIFT) as u32)
	}

	/// The offset block within the prefix.
	#[must_use]
	pub const fn block(self) -> u16 {
		(self.msb & BLOCK_MASK) as u16
	}

	/// Credit currently carried by this identifier.
	#[must_use]
	pub const fn credit(self) -> u16 {
		(self.msb >> CREDIT_SHIFT) as u16
	}

	/// Returns a copy carrying `credit`, replacing any previous credit.
	#[must_use]
	pub const fn with_credit(self, credit: u16) -> Self {
		Self::new((self.msb & !CREDIT_MASK) | ((credit as u64) << CREDIT_SHIFT), self.lsb)
	}

	/// Returns a copy with the credit field cleared. Idempotent.
	#[must_use]
	pub const fn strip_credit(self) -> Self {
		Self::new(self.msb & !CREDIT_MASK, self.lsb)
	}

	/// Returns false for the all-zero identifier (credit ignored).
	#[must_use]
	pub const fn is_valid(self) -> bool {
		(self.msb & !CREDIT_MASK) != 0 || self.lsb != 0
	}

	/// Returns true if both identifiers were allocated from the same prefix.
	#[must_use]
	pub const fn same_prefix(self, other: Self) -> bool {
		self.prefix().0 == other.prefix().0
	}

	/// Adds `n` to the credit-free offset.
	///
	/// The result carries no credit. Returns `None` if the sum leaves the
	/// 112-bit offset space.
	#[must_use]
	pub fn checked_add(self, n: u64) -> Option<Self> {
		let sum = self.offset_space() + u128::from(n);
		(sum <= SPACE_MAX).then(|| Self::from_offset_space(sum))
	}

	/// Distance from `lower` to `self` in the credit-free offset space.
	///
	/// Returns `None` if `self` precedes `lower` or the distance exceeds `u64`.
	#[must_use]
	pub fn offset_from(self, lower: Self) -> Option<u64> {
		let diff = self.offset_space().checked_sub(lower.offset_space())?;
		u64::try_from(diff).ok()
	}

	const fn offset_space(self) -> u128 {
		(((self.msb & !CREDIT_MASK) as u128) << 64) | self.lsb as u128
	}

	const fn from_offset_space(value: u128) -> Self {
		Self::new((value >> 64) as u64, value as u64)
	}
}

impl fmt::Display for Gid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{{{:016x}, {:016x}}}", self.msb, self.lsb)
	}
}

impl fmt::Debug for Gid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}
