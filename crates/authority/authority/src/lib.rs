//! AGAS namespace authority: identifier allocation, binding, resolution and
//! credit-based reference counting for a distributed runtime.

#![warn(missing_docs)]

pub mod config;
pub mod core;
pub mod error;
pub mod ipc;
pub mod service;

pub use agas_proto as proto;
pub use config::{AuthorityConfig, ConfigError, DecrementPolicy};
pub use crate::core::{Authority, AuthorityStats};
pub use error::AuthorityError;
