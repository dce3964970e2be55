//! Core value types for global address resolution: identifiers, localities, and address records.

/// Global identifiers and their credit/prefix layout.
pub mod gid;
/// Global virtual address records and range resolution.
pub mod gva;
/// Locality endpoints and the results of locality registration.
pub mod locality;

pub use gid::{Gid, INITIAL_CREDIT, Prefix};
pub use gva::{GvaRecord, ObjectKind, Resolution};
pub use locality::{Endpoint, LocalityAddress, LocalityAllocation};
