//! Client access to the AGAS namespace authority.
//!
//! [`AgasClient`] issues namespace operations through a [`Transport`] and keeps
//! a bounded [`ResolveCache`] of recent resolutions. [`AgasContext`] ties a
//! client to the locality it runs on, and [`IdPool`] hands out identifiers from
//! that locality's allocated windows.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod stub;
pub mod transport;

pub use cache::{CacheStats, ResolveCache};
pub use config::ClientConfig;
pub use context::{AgasContext, IdPool};
pub use error::{ClientError, Result};
pub use stub::AgasClient;
pub use transport::{LocalTransport, TcpTransport, Transport};
