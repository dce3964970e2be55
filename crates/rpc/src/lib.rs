//! Generic async request/reply pump and protocol framework.
//!
//! This crate provides protocol-agnostic primitives for building request/reply RPC:
//! * `Protocol`: Trait for defining wire formats and message semantics
//! * `serve_connection`: Server-side pump driving a tower `Service` per connection
//! * `Channel`: Client-side handle issuing requests in order over one connection
//! * `Error`: Transport failures, kept distinct from handler-level errors

#![warn(missing_docs)]

pub mod channel;
pub mod error;
pub mod protocol;
pub mod server;

pub use channel::Channel;
pub use error::{Error, Result};
pub use protocol::{CounterIdGen, Inbound, Protocol};
pub use server::serve_connection;
