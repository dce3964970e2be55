//! Shared wire types for the AGAS namespace authority.
//!
//! This crate defines the messages exchanged between clients and the authority
//! and their binary framing: a little-endian `u32` length prefix followed by a
//! postcard-encoded [`IpcFrame`].

#![warn(missing_docs)]

pub mod addr;
pub mod protocol;
pub mod types;

pub use protocol::{AgasProtocol, MAX_FRAME_LEN, read_frame, write_frame};
pub use types::*;
