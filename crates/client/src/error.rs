//! Client-side errors.

use agas_proto::{ErrorCode, ServiceError};
use thiserror::Error;

/// Result type for client operations.
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// A failed namespace call.
#[derive(Debug, Error)]
pub enum ClientError {
	/// The authority rejected the operation.
	#[error("authority rejected request ({code:?}): {message}")]
	Namespace {
		/// Wire classification.
		code: ErrorCode,
		/// Human-readable detail from the authority.
		message: String,
	},

	/// The connection to the authority failed.
	#[error(transparent)]
	Transport(#[from] agas_rpc::Error),

	/// The authority answered with a payload that does not fit the request.
	#[error("unexpected reply to {op}")]
	UnexpectedReply {
		/// Operation that received the reply.
		op: &'static str,
	},
}

impl ClientError {
	/// Wire error code, if the authority produced this error.
	#[must_use]
	pub fn code(&self) -> Option<ErrorCode> {
		match self {
			Self::Namespace { code, .. } => Some(*code),
			_ => None,
		}
	}
}

impl From<ServiceError> for ClientError {
	fn from(err: ServiceError) -> Self {
		Self::Namespace {
			code: err.code,
			message: err.message,
		}
	}
}
