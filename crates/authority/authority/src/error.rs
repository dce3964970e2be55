//! Errors raised by the namespace tables.

use agas_primitives::{Gid, Prefix};
use agas_proto::{ErrorCode, ServiceError};
use thiserror::Error;

/// Result type for authority operations.
pub type Result<T> = std::result::Result<T, AuthorityError>;

/// A rejected namespace operation.
///
/// Every variant leaves the tables exactly as they were before the call, with
/// the exception of [`AuthorityError::UnknownKindWhileCollecting`], which is
/// reported after the exhausted reference count has already been removed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
	/// Every locality prefix has been handed out.
	#[error("locality prefix space has been exhausted")]
	PrefixSpaceExhausted,

	/// The configured maximum number of localities is registered.
	#[error("partition table is full ({limit} localities)")]
	PartitionTableExhausted {
		/// Configured limit.
		limit: usize,
	},

	/// A computed or requested range would straddle two prefixes.
	#[error("range {lower}..={upper} crosses a prefix boundary")]
	RangeCrossesPrefix {
		/// Lower bound of the offending range.
		lower: Gid,
		/// Upper bound of the offending range (may be the first identifier past the space).
		upper: Gid,
	},

	/// A new binding would overlap an existing one.
	#[error("range of {count} at {gid} overlaps the binding at {existing}")]
	OverlappingRange {
		/// Requested lower bound.
		gid: Gid,
		/// Requested size.
		count: u64,
		/// Lower bound of the existing binding.
		existing: Gid,
	},

	/// A rebind tried to change the size of an existing binding.
	#[error("cannot change block size of the binding at {gid} from {bound} to {requested}")]
	BlockSizeMismatch {
		/// Lower bound of the binding.
		gid: Gid,
		/// Stored size.
		bound: u64,
		/// Requested size.
		requested: u64,
	},

	/// An unbind named the right lower bound but the wrong size.
	#[error("unbind of {gid} requested {requested} identifiers, but {bound} are bound")]
	UnbindCountMismatch {
		/// Lower bound of the binding.
		gid: Gid,
		/// Stored size.
		bound: u64,
		/// Requested size.
		requested: u64,
	},

	/// An unbind request overlaps a binding without naming it exactly.
	#[error("unbind of {count} at {gid} partially overlaps the binding at {existing}")]
	PartialUnbind {
		/// Requested lower bound.
		gid: Gid,
		/// Requested size.
		count: u64,
		/// Lower bound of the overlapped binding.
		existing: Gid,
	},

	/// A binding must cover at least one identifier.
	#[error("binding at {gid} covers no identifiers")]
	EmptyRange {
		/// Requested lower bound.
		gid: Gid,
	},

	/// Bindings must name a real object kind.
	#[error("binding at {gid} has an invalid object kind")]
	InvalidKind {
		/// Requested lower bound.
		gid: Gid,
	},

	/// Identifier 0 and prefix 0 are reserved.
	#[error("{gid} lies in the reserved prefix {prefix}")]
	ReservedGid {
		/// Offending identifier.
		gid: Gid,
		/// Its prefix.
		prefix: Prefix,
	},

	/// A single decrement released more than a fresh identifier ever carries.
	#[error("cannot decrement by {requested} credits, the maximum is {max}")]
	ExcessiveDecrement {
		/// Requested credits.
		requested: u64,
		/// Initial credit.
		max: u64,
	},

	/// A decrement released more credits than are held.
	#[error("bogus credit while decrementing {gid}: {held} held, {requested} released")]
	CreditUnderflow {
		/// Target identifier.
		gid: Gid,
		/// Credits held.
		held: u64,
		/// Credits requested.
		requested: u64,
	},

	/// An increment would overflow the reference count.
	#[error("reference count of {gid} would overflow")]
	CreditOverflow {
		/// Target identifier.
		gid: Gid,
	},

	/// Decrement of an identifier that never had a reference count, under a
	/// policy that forbids implicit seeding.
	#[error("{gid} has no reference count to decrement")]
	MissingRefcount {
		/// Target identifier.
		gid: Gid,
	},

	/// A reference count reached zero but no binding covers the identifier.
	#[error("unknown kind while collecting {gid}: no binding covers it")]
	UnknownKindWhileCollecting {
		/// Collected identifier.
		gid: Gid,
	},

	/// The client speaks another protocol version.
	#[error("protocol version {remote} is not supported (authority speaks {local})")]
	VersionMismatch {
		/// Authority version.
		local: u32,
		/// Client version.
		remote: u32,
	},
}

impl AuthorityError {
	/// Wire classification of this error.
	#[must_use]
	pub const fn code(&self) -> ErrorCode {
		match self {
			Self::PrefixSpaceExhausted | Self::PartitionTableExhausted { .. } => ErrorCode::Exhausted,
			Self::RangeCrossesPrefix { .. } => ErrorCode::Internal,
			Self::OverlappingRange { .. }
			| Self::BlockSizeMismatch { .. }
			| Self::UnbindCountMismatch { .. }
			| Self::PartialUnbind { .. }
			| Self::EmptyRange { .. }
			| Self::InvalidKind { .. }
			| Self::ReservedGid { .. }
			| Self::ExcessiveDecrement { .. }
			| Self::CreditUnderflow { .. }
			| Self::CreditOverflow { .. }
			| Self::MissingRefcount { .. } => ErrorCode::BadParameter,
			Self::UnknownKindWhileCollecting { .. } => ErrorCode::Inconsistent,
			Self::VersionMismatch { .. } => ErrorCode::VersionMismatch,
		}
	}
}

impl From<AuthorityError> for ServiceError {
	fn from(err: AuthorityError) -> Self {
		Self::new(err.code(), err.to_string())
	}
}
