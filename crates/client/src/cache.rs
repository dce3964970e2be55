//! Bounded cache of resolved ranges.
//!
//! Entries are whole bound ranges keyed by their lower bound, so one remote
//! resolution answers later lookups for every identifier in the range. Cached
//! ranges never overlap: inserting a range first evicts whatever it overlaps.
//!
//! Every invalidation advances a generation counter. A resolution fetched
//! while the generation moved is dropped instead of cached, since it may
//! describe a binding that has since been removed or relocated.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use agas_primitives::{Gid, GvaRecord, Resolution};
use lru::LruCache;
use parking_lot::Mutex;

/// Cache counters, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
	/// Lookups answered from the cache.
	pub hits: u64,
	/// Lookups that fell through to the authority.
	pub misses: u64,
	/// Ranges currently cached.
	pub entries: usize,
	/// Maximum number of cached ranges.
	pub capacity: usize,
}

/// Least-recently-used cache of `lower -> range` resolutions.
#[derive(Debug)]
pub struct ResolveCache {
	entries: Option<Mutex<Entries>>,
	hits: AtomicU64,
	misses: AtomicU64,
}

#[derive(Debug)]
struct Entries {
	lru: LruCache<Gid, GvaRecord>,
	/// Ordered copy of the LRU keys for predecessor search.
	index: BTreeSet<Gid>,
	generation: u64,
}

impl Entries {
	fn find(&mut self, gid: Gid) -> Option<Resolution> {
		let lower = *self.index.range(..=gid).next_back()?;
		let range = *self.lru.get(&lower)?;
		Resolution::at(gid, lower, range)
	}

	fn insert(&mut self, lower: Gid, range: GvaRecord) {
		self.remove_overlapping(lower, range.count);
		if let Some((evicted, _)) = self.lru.push(lower, range)
			&& evicted != lower
		{
			self.index.remove(&evicted);
		}
		self.index.insert(lower);
	}

	fn remove_overlapping(&mut self, lower: Gid, count: u64) {
		let mut doomed = Vec::new();
		if let Some(&prev) = self.index.range(..lower).next_back()
			&& self.lru.peek(&prev).is_some_and(|r| r.covers(prev, lower))
		{
			doomed.push(prev);
		}
		let inside = match lower.checked_add(count.saturating_sub(1)) {
			Some(upper) => self.index.range(lower..=upper),
			None => self.index.range(lower..),
		};
		doomed.extend(inside.copied());

		for key in doomed {
			self.index.remove(&key);
			self.lru.pop(&key);
		}
	}
}

impl ResolveCache {
	/// Create a cache holding up to `capacity` ranges. Zero disables caching.
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		let entries = NonZeroUsize::new(capacity).map(|cap| {
			Mutex::new(Entries {
				lru: LruCache::new(cap),
				index: BTreeSet::new(),
				generation: 0,
			})
		});
		Self {
			entries,
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
		}
	}

	/// Returns true unless the cache was built with zero capacity.
	#[must_use]
	pub fn is_enabled(&self) -> bool {
		self.entries.is_some()
	}

	/// Resolves `gid` from a cached range, recomputing its address.
	///
	/// Always `None` when the cache is disabled; disabled lookups are not counted.
	pub fn lookup(&self, gid: Gid) -> Option<Resolution> {
		let entries = self.entries.as_ref()?;
		let found = entries.lock().find(gid.strip_credit());
		let counter = if found.is_some() { &self.hits } else { &self.misses };
		counter.fetch_add(1, Ordering::Relaxed);
		found
	}

	/// Current invalidation generation. Take it before asking the authority.
	#[must_use]
	pub fn generation(&self) -> u64 {
		self.entries.as_ref().map_or(0, |entries| entries.lock().generation)
	}

	/// Caches the range a remote resolution came from, unless an invalidation
	/// happened since `generation` was read.
	///
	/// Returns true if the range was cached.
	pub fn insert(&self, resolution: &Resolution, generation: u64) -> bool {
		let Some(entries) = &self.entries else {
			return false;
		};
		let mut entries = entries.lock();
		if entries.generation != generation {
			tracing::trace!(lower = %resolution.lower, "dropping resolution raced by invalidation");
			return false;
		}
		entries.insert(resolution.lower, resolution.range);
		true
	}

	/// Evicts every cached range overlapping `[gid, gid + count)`.
	///
	/// A `count` of zero is treated as one.
	pub fn invalidate(&self, gid: Gid, count: u64) {
		if let Some(entries) = &self.entries {
			let mut entries = entries.lock();
			entries.generation = entries.generation.wrapping_add(1);
			entries.remove_overlapping(gid.strip_credit(), count.max(1));
		}
	}

	/// Drops every cached range. Counters are kept.
	pub fn clear(&self) {
		if let Some(entries) = &self.entries {
			let mut entries = entries.lock();
			entries.generation = entries.generation.wrapping_add(1);
			entries.lru.clear();
			entries.index.clear();
		}
	}

	/// Current counters and occupancy.
	#[must_use]
	pub fn stats(&self) -> CacheStats {
		let (entries, capacity) = self.entries.as_ref().map_or((0, 0), |entries| {
			let entries = entries.lock();
			(entries.lru.len(), entries.lru.cap().get())
		});
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			entries,
			capacity,
		}
	}
}
