//! Tests for locality registration and window allocation.

use std::collections::HashSet;

use agas_primitives::{Gid, INITIAL_CREDIT, ObjectKind, Prefix};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::helpers::{endpoint, gid_in, record};
use crate::config::AuthorityConfig;
use crate::core::Authority;
use crate::error::AuthorityError;

#[tokio::test(flavor = "current_thread")]
async fn first_bind_registers_locality_and_allocates() {
	let authority = Authority::new();
	let alloc = authority.bind_locality(endpoint(1), 10).unwrap();

	assert!(alloc.is_new);
	assert_eq!(alloc.prefix, Prefix(1));
	assert_eq!(alloc.lower.strip_credit(), gid_in(1, 1));
	assert_eq!(alloc.upper.strip_credit(), gid_in(1, 10));
	assert_eq!(alloc.lower.credit(), INITIAL_CREDIT);
	assert_eq!(alloc.upper.credit(), INITIAL_CREDIT);

	let base = authority.resolve_locality(endpoint(1)).unwrap();
	assert_eq!(base.gid, Gid::from_prefix(Prefix(1)));
	assert_eq!(base.record.kind, ObjectKind::RUNTIME_SUPPORT);
	assert_eq!(base.record.endpoint, endpoint(1));
}

#[tokio::test(flavor = "current_thread")]
async fn windows_are_contiguous_and_disjoint() {
	let authority = Authority::new();
	let first = authority.bind_locality(endpoint(1), 4).unwrap();
	let second = authority.bind_locality(endpoint(1), 3).unwrap();

	assert!(!second.is_new);
	assert_eq!(second.prefix, first.prefix);
	assert_eq!(second.lower.strip_credit(), first.upper.checked_add(1).unwrap());
	assert_eq!(second.upper.strip_credit(), gid_in(1, 7));
}

#[tokio::test(flavor = "current_thread")]
async fn zero_count_queries_without_allocating() {
	let authority = Authority::new();
	let first = authority.bind_locality(endpoint(1), 5).unwrap();

	let query = authority.bind_locality(endpoint(1), 0).unwrap();
	assert!(!query.is_new);
	assert_eq!(query.lower, Gid::from_prefix(Prefix(1)));
	assert_eq!(query.upper, first.upper.strip_credit());

	let next = authority.bind_locality(endpoint(1), 1).unwrap();
	assert_eq!(next.lower.strip_credit(), gid_in(1, 6));
}

#[tokio::test(flavor = "current_thread")]
async fn zero_count_registers_unknown_endpoint() {
	let authority = Authority::new();
	let alloc = authority.bind_locality(endpoint(9), 0).unwrap();
	assert!(alloc.is_new);
	assert_eq!(alloc.lower, Gid::from_prefix(alloc.prefix));
	assert_eq!(alloc.upper, alloc.lower);
	assert_eq!(authority.localities(), vec![alloc.prefix]);
}

#[tokio::test(flavor = "current_thread")]
async fn prefix_with_bound_base_is_skipped() {
	let authority = Authority::new();
	authority
		.bind_gid(Gid::from_prefix(Prefix(1)), record(endpoint(200), 5, 1))
		.unwrap();

	let alloc = authority.bind_locality(endpoint(1), 1).unwrap();
	assert_eq!(alloc.prefix, Prefix(2));
}

#[tokio::test(flavor = "current_thread")]
async fn locality_limit_is_enforced_without_mutation() {
	let authority = Authority::new_with_config(AuthorityConfig {
		max_localities: 2,
		..AuthorityConfig::default()
	});
	authority.bind_locality(endpoint(1), 1).unwrap();
	authority.bind_locality(endpoint(2), 1).unwrap();
	let before = authority.stats();

	let err = authority.bind_locality(endpoint(3), 1).unwrap_err();
	assert_eq!(err, AuthorityError::PartitionTableExhausted { limit: 2 });
	assert_eq!(authority.stats(), before);
	assert!(authority.resolve_locality(endpoint(3)).is_none());

	// Known localities keep allocating.
	authority.bind_locality(endpoint(1), 1).unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_endpoint_does_not_resolve() {
	let authority = Authority::new();
	assert!(authority.resolve_locality(endpoint(1)).is_none());
}

proptest! {
	#[test]
	fn prefixes_are_unique_across_localities(
		endpoints in proptest::collection::vec(1u8..=40, 1..60),
		counts in proptest::collection::vec(0u64..1_000, 60),
	) {
		let authority = Authority::new();
		let mut seen = std::collections::HashMap::new();
		let mut last_upper = std::collections::HashMap::new();
		let mut allocated = Vec::new();

		for (n, count) in endpoints.iter().zip(counts) {
			let alloc = authority.bind_locality(endpoint(*n), count).unwrap();
			let prefix = *seen.entry(*n).or_insert(alloc.prefix);
			prop_assert_eq!(prefix, alloc.prefix);
			prop_assert!(alloc.prefix.is_valid());
			if count > 0 {
				let (lower, upper) = (alloc.lower.strip_credit(), alloc.upper.strip_credit());
				prop_assert!(lower.same_prefix(upper));
				prop_assert_eq!(upper.offset_from(lower), Some(count - 1));
				if let Some(previous) = last_upper.insert(*n, upper) {
					prop_assert!(lower > previous, "window {} does not follow {}", lower, previous);
				}
				allocated.push((lower, upper));
			}
		}

		allocated.sort();
		for pair in allocated.windows(2) {
			prop_assert!(pair[1].0 > pair[0].1, "windows {:?} and {:?} overlap", pair[0], pair[1]);
		}

		let prefixes = authority.localities();
		let unique: HashSet<_> = prefixes.iter().copied().collect();
		prop_assert_eq!(unique.len(), prefixes.len());
		prop_assert_eq!(prefixes.len(), seen.len());
	}
}
