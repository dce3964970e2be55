use agas_primitives::{Endpoint, Gid, GvaRecord, ObjectKind, Prefix};

/// Endpoint `10.0.0.<n>:7910`.
pub fn endpoint(n: u8) -> Endpoint {
	Endpoint(std::net::SocketAddr::from(([10, 0, 0, n], 7910)))
}

/// Identifier `offset` inside the first block of `prefix`.
pub fn gid_in(prefix: u32, offset: u64) -> Gid {
	Gid::new(Gid::from_prefix(Prefix(prefix)).msb(), offset)
}

pub fn record(endpoint: Endpoint, kind: u32, count: u64) -> GvaRecord {
	GvaRecord {
		endpoint,
		kind: ObjectKind(kind),
		count,
		address: 0x10_0000,
		offset: 0,
		element_size: 64,
	}
}
