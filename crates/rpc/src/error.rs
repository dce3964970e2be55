//! Transport-level errors.

use std::time::Duration;

/// A convenient type alias for `Result` with `E` = [`enum@Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the connection itself, as opposed to errors reported by the peer's handler.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// Input/output errors from the underlying stream.
	#[error("{0}")]
	Io(#[from] std::io::Error),
	/// The peer closed the stream between frames.
	#[error("the underlying stream reached EOF")]
	Eof,
	/// A frame could not be decoded.
	#[error("malformed frame: {0}")]
	Decode(String),
	/// A frame could not be encoded.
	#[error("unencodable message: {0}")]
	Encode(String),
	/// A frame announced a length above the protocol limit.
	#[error("frame of {len} bytes exceeds the {limit} byte limit")]
	FrameTooLarge {
		/// Announced length.
		len: usize,
		/// Maximum accepted length.
		limit: usize,
	},
	/// The peer violated the request/reply discipline.
	#[error("protocol error: {0}")]
	Protocol(String),
	/// The peer speaks a different protocol version.
	#[error("protocol version mismatch: local {local}, remote {remote}")]
	VersionMismatch {
		/// Version spoken by this side.
		local: u32,
		/// Version announced by the peer.
		remote: u32,
	},
	/// An earlier call was abandoned mid-frame, so the stream can no longer be trusted.
	#[error("connection abandoned mid-call; reconnect required")]
	Broken,
	/// No reply arrived in time.
	#[error("request timed out after {0:?}")]
	Timeout(Duration),
}

impl Error {
	/// Returns true if the error represents the peer going away.
	#[must_use]
	pub fn is_disconnect(&self) -> bool {
		match self {
			Self::Eof | Self::Broken => true,
			Self::Io(e) => matches!(
				e.kind(),
				std::io::ErrorKind::BrokenPipe
					| std::io::ErrorKind::ConnectionReset
					| std::io::ErrorKind::ConnectionAborted
					| std::io::ErrorKind::UnexpectedEof
			),
			_ => false,
		}
	}
}
