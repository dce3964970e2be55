//! The resolution cache changes how often the authority is asked, never the answers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use agas_authority::Authority;
use agas_client::{AgasClient, ClientConfig, LocalTransport, Result, Transport};
use agas_primitives::{Endpoint, GvaRecord, ObjectKind};
use agas_proto::{RequestPayload, ResponsePayload};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

/// Local transport that counts resolve requests reaching the authority.
struct Counting {
	inner: LocalTransport,
	resolves: AtomicUsize,
}

#[async_trait]
impl Transport for Counting {
	async fn request(&self, payload: RequestPayload) -> Result<ResponsePayload> {
		if matches!(payload, RequestPayload::ResolveGid { .. }) {
			self.resolves.fetch_add(1, Ordering::Relaxed);
		}
		self.inner.request(payload).await
	}
}

fn endpoint() -> Endpoint {
	Endpoint("192.168.0.7:7000".parse().unwrap())
}

fn record(count: u64) -> GvaRecord {
	GvaRecord {
		endpoint: endpoint(),
		kind: ObjectKind(2),
		count,
		address: 0x1000,
		offset: 0,
		element_size: 24,
	}
}

fn client(authority: Arc<Authority>, cache_enabled: bool) -> (AgasClient, Arc<Counting>) {
	let transport = Arc::new(Counting {
		inner: LocalTransport::new(authority),
		resolves: AtomicUsize::new(0),
	});
	let config = ClientConfig {
		cache_enabled,
		..ClientConfig::default()
	};
	(AgasClient::new(transport.clone(), &config), transport)
}

#[tokio::test(flavor = "current_thread")]
async fn cached_and_uncached_clients_agree() {
	let authority = Authority::new();
	let (cached, cached_calls) = client(authority.clone(), true);
	let (plain, plain_calls) = client(authority.clone(), false);

	let alloc = cached.bind_locality(endpoint(), 32).await.unwrap();
	cached.bind_gid(alloc.lower, record(32)).await.unwrap();

	for _ in 0..3 {
		for i in 0..32 {
			let gid = alloc.lower.checked_add(i).unwrap();
			let a = cached.resolve_gid(gid).await.unwrap();
			let b = plain.resolve_gid(gid).await.unwrap();
			assert_eq!(a, b);
			assert_eq!(a.unwrap().address(), 0x1000 + i * 24);
		}
	}

	assert_eq!(cached_calls.resolves.load(Ordering::Relaxed), 1);
	assert_eq!(plain_calls.resolves.load(Ordering::Relaxed), 96);
	let stats = cached.cache_stats();
	assert_eq!((stats.hits, stats.misses), (95, 1));
	assert_eq!(plain.cache_stats().capacity, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn unbind_and_rebind_invalidate_cached_ranges() {
	let authority = Authority::new();
	let (client, calls) = client(authority, true);
	let alloc = client.bind_locality(endpoint(), 8).await.unwrap();

	client.bind_gid(alloc.lower, record(8)).await.unwrap();
	assert!(client.resolve_gid(alloc.lower).await.unwrap().is_some());

	assert_eq!(client.unbind(alloc.lower, 8).await.unwrap(), Some(record(8)));
	assert!(client.resolve_gid(alloc.lower).await.unwrap().is_none());

	let mut moved = record(8);
	moved.address = 0x9000;
	client.bind_gid(alloc.lower, moved).await.unwrap();
	let resolved = client.resolve_gid(alloc.lower.checked_add(1).unwrap()).await.unwrap().unwrap();
	assert_eq!(resolved.address(), 0x9000 + 24);

	assert_eq!(calls.resolves.load(Ordering::Relaxed), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn misses_are_not_cached() {
	let authority = Authority::new();
	let (client, calls) = client(authority, true);
	let alloc = client.bind_locality(endpoint(), 1).await.unwrap();

	assert!(client.resolve_gid(alloc.lower).await.unwrap().is_none());
	assert!(client.resolve_gid(alloc.lower).await.unwrap().is_none());
	assert_eq!(calls.resolves.load(Ordering::Relaxed), 2);
}

/// Local transport whose first resolve reply is held back until released.
///
/// The answer is computed when the request arrives, so releasing it late
/// models a reply that was in flight while another task changed the binding.
struct Delayed {
	inner: LocalTransport,
	hold: AtomicBool,
	release: Notify,
}

#[async_trait]
impl Transport for Delayed {
	async fn request(&self, payload: RequestPayload) -> Result<ResponsePayload> {
		let held = matches!(payload, RequestPayload::ResolveGid { .. }) && self.hold.swap(false, Ordering::SeqCst);
		let reply = self.inner.request(payload).await;
		if held {
			self.release.notified().await;
		}
		reply
	}
}

fn delayed_client(authority: Arc<Authority>) -> (AgasClient, Arc<Delayed>) {
	let transport = Arc::new(Delayed {
		inner: LocalTransport::new(authority),
		hold: AtomicBool::new(true),
		release: Notify::new(),
	});
	(AgasClient::new(transport.clone(), &ClientConfig::default()), transport)
}

#[tokio::test(flavor = "current_thread")]
async fn resolution_in_flight_during_unbind_is_not_cached() {
	let authority = Authority::new();
	let (client, transport) = delayed_client(authority.clone());
	let alloc = client.bind_locality(endpoint(), 4).await.unwrap();
	client.bind_gid(alloc.lower, record(4)).await.unwrap();

	let (raced, removed) = tokio::join!(client.resolve_gid(alloc.lower), async {
		let removed = client.unbind(alloc.lower, 4).await;
		transport.release.notify_one();
		removed
	});
	assert!(raced.unwrap().is_some());
	assert_eq!(removed.unwrap(), Some(record(4)));

	assert!(authority.resolve_gid(alloc.lower).is_none());
	assert!(client.resolve_gid(alloc.lower).await.unwrap().is_none());
	assert_eq!(client.cache_stats().entries, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn resolution_in_flight_during_relocation_is_not_cached() {
	let authority = Authority::new();
	let (client, transport) = delayed_client(authority);
	let alloc = client.bind_locality(endpoint(), 4).await.unwrap();
	client.bind_gid(alloc.lower, record(4)).await.unwrap();

	let mut moved = record(4);
	moved.address = 0x7000;
	let (raced, created) = tokio::join!(client.resolve_gid(alloc.lower), async {
		let created = client.bind_gid(alloc.lower, moved).await;
		transport.release.notify_one();
		created
	});
	assert_eq!(raced.unwrap().unwrap().address(), 0x1000);
	assert!(!created.unwrap());

	let resolved = client.resolve_gid(alloc.lower).await.unwrap().unwrap();
	assert_eq!(resolved.address(), 0x7000);
}
