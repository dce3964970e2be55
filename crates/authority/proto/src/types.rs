//! Wire types for the namespace authority protocol.
//!
//! Every administrative call is a [`Request`] carrying one [`RequestPayload`]
//! variant, answered by a [`Response`] envelope with a [`Status`], an optional
//! [`ResponsePayload`] and an optional human-readable message.

use agas_primitives::{
	Endpoint, Gid, GvaRecord, LocalityAddress, LocalityAllocation, ObjectKind, Prefix, Resolution,
};
use serde::{Deserialize, Serialize};

/// Protocol version announced in the [`RequestPayload::Hello`] handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Unique identifier for requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Classification of frames transmitted over the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpcFrame {
	/// A request initiated by a client.
	Request(Request),
	/// A response from the authority.
	Response(Response),
}

/// A request from a client to the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Unique request identifier for correlation.
	pub id: RequestId,
	/// The request payload.
	pub payload: RequestPayload,
}

impl Request {
	/// Wraps a payload in a new request.
	#[must_use]
	pub fn new(payload: RequestPayload) -> Self {
		Self {
			id: RequestId(0),
			payload,
		}
	}
}

/// Namespace operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestPayload {
	/// Connectivity check.
	Ping,
	/// Version handshake sent once per connection.
	Hello {
		/// Protocol version spoken by the client.
		version: u32,
	},
	/// Register a locality and/or allocate identifiers for it.
	BindLocality {
		/// The locality's endpoint.
		endpoint: Endpoint,
		/// Number of identifiers to allocate; 0 only queries.
		count: u64,
	},
	/// Bind (or rebind in place) a range of identifiers.
	BindGid {
		/// Lower bound of the range.
		gid: Gid,
		/// Address record, including the range size.
		record: GvaRecord,
	},
	/// Resolve a locality's own address.
	ResolveLocality {
		/// The locality's endpoint.
		endpoint: Endpoint,
	},
	/// Resolve one identifier.
	ResolveGid {
		/// The identifier to resolve.
		gid: Gid,
	},
	/// Remove a binding exactly as it was bound.
	Unbind {
		/// Lower bound of the range.
		gid: Gid,
		/// Size of the range.
		count: u64,
	},
	/// Add credits to an identifier's reference count.
	Increment {
		/// Target identifier.
		gid: Gid,
		/// Credits to add.
		credits: u64,
	},
	/// Release credits from an identifier's reference count.
	Decrement {
		/// Target identifier.
		gid: Gid,
		/// Credits to release.
		credits: u64,
	},
	/// List registered locality prefixes.
	Localities,
}

impl RequestPayload {
	/// Stable operation name for logs and diagnostics.
	#[must_use]
	pub const fn name(&self) -> &'static str {
		match self {
			Self::Ping => "ping",
			Self::Hello { .. } => "hello",
			Self::BindLocality { .. } => "bind_locality",
			Self::BindGid { .. } => "bind_gid",
			Self::ResolveLocality { .. } => "resolve_locality",
			Self::ResolveGid { .. } => "resolve_gid",
			Self::Unbind { .. } => "unbind",
			Self::Increment { .. } => "increment",
			Self::Decrement { .. } => "decrement",
			Self::Localities => "localities",
		}
	}

	/// Identifier range whose resolution this request may change.
	///
	/// Only binding changes qualify; credit and locality operations never
	/// alter what an identifier resolves to.
	#[must_use]
	pub const fn rebound_range(&self) -> Option<(Gid, u64)> {
		match self {
			Self::BindGid { gid, record } => Some((*gid, record.count)),
			Self::Unbind { gid, count } => Some((*gid, *count)),
			_ => None,
		}
	}
}

/// Outcome classification carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
	/// The operation succeeded.
	Success,
	/// The operation completed with a negative result (not found, nothing
	/// removed, or an in-place rebind instead of a new binding).
	NoSuccess,
	/// The operation was rejected.
	Error(ErrorCode),
}

/// A response from the authority to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	/// The request this responds to.
	pub request_id: RequestId,
	/// Outcome of the operation.
	pub status: Status,
	/// The response payload when the operation completed.
	pub payload: Option<ResponsePayload>,
	/// Human-readable detail, set on errors.
	pub message: Option<String>,
}

impl Response {
	/// A completed operation; the status follows from the payload.
	#[must_use]
	pub fn ok(request_id: RequestId, payload: ResponsePayload) -> Self {
		Self {
			request_id,
			status: payload.status(),
			payload: Some(payload),
			message: None,
		}
	}

	/// A rejected operation.
	#[must_use]
	pub fn error(request_id: RequestId, error: ServiceError) -> Self {
		Self {
			request_id,
			status: Status::Error(error.code),
			payload: None,
			message: Some(error.message),
		}
	}
}

/// Response payload variants, one per operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
	/// Reply to [`RequestPayload::Ping`].
	Pong,
	/// Reply to [`RequestPayload::Hello`].
	Welcome {
		/// Protocol version spoken by the authority.
		version: u32,
	},
	/// Reply to [`RequestPayload::BindLocality`].
	LocalityBound(LocalityAllocation),
	/// Reply to [`RequestPayload::BindGid`].
	GidBound {
		/// True if a new binding was inserted, false if one was updated in place.
		created: bool,
	},
	/// Reply to [`RequestPayload::ResolveLocality`].
	LocalityResolved(Option<LocalityAddress>),
	/// Reply to [`RequestPayload::ResolveGid`].
	GidResolved(Option<Resolution>),
	/// Reply to [`RequestPayload::Unbind`].
	Unbound(Option<GvaRecord>),
	/// Reply to [`RequestPayload::Increment`].
	Incremented {
		/// Reference count after the increment.
		total: u64,
	},
	/// Reply to [`RequestPayload::Decrement`].
	Decremented {
		/// Reference count after the decrement.
		total: u64,
		/// Kind of the collected object when the count reached zero.
		freed: Option<ObjectKind>,
	},
	/// Reply to [`RequestPayload::Localities`].
	Localities(Vec<Prefix>),
}

impl ResponsePayload {
	/// Status implied by this payload.
	#[must_use]
	pub const fn status(&self) -> Status {
		match self {
			Self::GidBound { created: false }
			| Self::LocalityResolved(None)
			| Self::GidResolved(None)
			| Self::Unbound(None) => Status::NoSuccess,
			_ => Status::Success,
		}
	}
}

/// Error codes for rejected operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
	/// Generic internal error, including ranges that cross a prefix boundary.
	Internal,
	/// The caller broke a table invariant (overlap, size mismatch, bad credits).
	BadParameter,
	/// Identifier or locality space is used up.
	Exhausted,
	/// The authority's tables disagree with each other.
	Inconsistent,
	/// The client speaks an incompatible protocol version.
	VersionMismatch,
}

/// Error produced by a request handler, sent back as an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
	/// Machine-readable classification.
	pub code: ErrorCode,
	/// Which invariant failed.
	pub message: String,
}

impl ServiceError {
	/// Builds a handler error.
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}
}
