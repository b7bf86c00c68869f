//! Result cache — fetched event lists keyed by canonical query.
//!
//! Construct one cache at application start and share it (behind an `Arc`)
//! between every client and controller; call [`ResultCache::clear`] at
//! shutdown. All access goes through `get`/`set` so the freshness, eviction
//! and write-ordering rules below are enforced in one place:
//!
//! - younger than `fresh_for`: served as [`CacheLookup::Fresh`]
//! - younger than `max_age`: served as [`CacheLookup::Stale`] (the caller is
//!   expected to revalidate in the background)
//! - older: dropped
//! - more than `max_entries` entries: least recently used entry dropped
//! - a write tagged with an older generation than the stored entry is ignored

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use geosync_domain::event::Event;
use geosync_domain::query::CacheKey;
use lru::LruCache;
use tokio::time::Instant;

/// Freshness and size limits of a [`ResultCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Age below which an entry is served without revalidation.
    pub fresh_for: Duration,
    /// Age at which an entry is evicted.
    pub max_age: Duration,
    /// Maximum number of entries kept.
    pub max_entries: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fresh_for: Duration::from_secs(60),
            max_age: Duration::from_secs(5 * 60),
            max_entries: 64,
        }
    }
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Fresh(Arc<Vec<Event>>),
    Stale(Arc<Vec<Event>>),
    Miss,
}

#[derive(Debug)]
struct CacheEntry {
    events: Arc<Vec<Event>>,
    generation: u64,
    stored_at: Instant,
}

/// Shared, thread-safe cache of fetch results.
#[derive(Debug)]
pub struct ResultCache {
    policy: CachePolicy,
    generations: AtomicU64,
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl ResultCache {
    /// A `max_entries` of zero is treated as one.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        let capacity = NonZeroUsize::new(policy.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            policy,
            generations: AtomicU64::new(0),
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    #[must_use]
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Mint the generation for a fetch that is about to be issued.
    ///
    /// Generations increase in issue order, so a result written with an
    /// older generation can never replace one written with a newer one,
    /// whatever order the writes complete in.
    pub fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look up `key` as of now.
    pub fn get(&self, key: &CacheKey) -> CacheLookup {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`. A hit marks the entry as most recently used.
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> CacheLookup {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get(key) else {
            return CacheLookup::Miss;
        };

        let age = now.saturating_duration_since(entry.stored_at);
        if age >= self.policy.max_age {
            entries.pop(key);
            tracing::debug!(%key, "cache entry expired");
            CacheLookup::Miss
        } else if age < self.policy.fresh_for {
            CacheLookup::Fresh(Arc::clone(&entry.events))
        } else {
            CacheLookup::Stale(Arc::clone(&entry.events))
        }
    }

    /// Store `events` for `key`, fetched by the fetch of `generation` and
    /// completed at `stored_at`.
    ///
    /// Returns `false` when a newer generation is already stored; the write
    /// is then dropped.
    pub fn set(
        &self,
        key: CacheKey,
        events: Arc<Vec<Event>>,
        generation: u64,
        stored_at: Instant,
    ) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = entries.peek(&key) {
            if existing.generation > generation {
                tracing::debug!(
                    %key,
                    stored = existing.generation,
                    incoming = generation,
                    "ignoring out-of-order cache write"
                );
                return false;
            }
        }

        self.drop_expired(&mut entries, stored_at);
        let entry = CacheEntry {
            events,
            generation,
            stored_at,
        };
        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                tracing::debug!(key = %evicted, "evicted least recently used cache entry");
            }
        }
        true
    }

    /// Drop the entry for `key`, if any.
    pub fn invalidate(&self, key: &CacheKey) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(key);
    }

    /// Drop every entry older than the hard ceiling. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        self.drop_expired(&mut entries, Instant::now())
    }

    fn drop_expired(&self, entries: &mut LruCache<CacheKey, CacheEntry>, now: Instant) -> usize {
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.stored_at) >= self.policy.max_age)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{canonical, events};

    fn key(category: &str) -> CacheKey {
        canonical(&[category]).key
    }

    fn cache() -> ResultCache {
        ResultCache::new(CachePolicy {
            fresh_for: Duration::from_secs(60),
            max_age: Duration::from_secs(300),
            max_entries: 3,
        })
    }

    #[test]
    fn should_miss_unknown_key() {
        assert_eq!(cache().get(&key("floods")), CacheLookup::Miss);
    }

    #[test]
    fn should_serve_fresh_within_freshness_window() {
        let cache = cache();
        let t0 = Instant::now();
        let stored = Arc::new(events("a", 2));
        cache.set(key("floods"), Arc::clone(&stored), cache.next_generation(), t0);

        let lookup = cache.get_at(&key("floods"), t0 + Duration::from_secs(59));
        assert_eq!(lookup, CacheLookup::Fresh(stored));
    }

    #[test]
    fn should_serve_stale_between_freshness_and_hard_ceiling() {
        let cache = cache();
        let t0 = Instant::now();
        let stored = Arc::new(events("a", 2));
        cache.set(key("floods"), Arc::clone(&stored), cache.next_generation(), t0);

        let lookup = cache.get_at(&key("floods"), t0 + Duration::from_secs(60));
        assert_eq!(lookup, CacheLookup::Stale(Arc::clone(&stored)));
        let lookup = cache.get_at(&key("floods"), t0 + Duration::from_secs(299));
        assert_eq!(lookup, CacheLookup::Stale(stored));
    }

    #[test]
    fn should_evict_after_hard_ceiling() {
        let cache = cache();
        let t0 = Instant::now();
        cache.set(key("floods"), Arc::new(events("a", 1)), cache.next_generation(), t0);

        let lookup = cache.get_at(&key("floods"), t0 + Duration::from_secs(300));
        assert_eq!(lookup, CacheLookup::Miss);
        assert!(cache.is_empty());
    }

    #[test]
    fn should_ignore_write_from_older_generation() {
        let cache = cache();
        let t0 = Instant::now();
        let older = cache.next_generation();
        let newer = cache.next_generation();

        assert!(cache.set(key("floods"), Arc::new(events("new", 1)), newer, t0));
        assert!(!cache.set(
            key("floods"),
            Arc::new(events("old", 1)),
            older,
            t0 + Duration::from_secs(1),
        ));

        let CacheLookup::Fresh(stored) = cache.get_at(&key("floods"), t0 + Duration::from_secs(2)) else {
            panic!("expected fresh entry");
        };
        assert_eq!(stored[0].id, "new-0");
    }

    #[test]
    fn should_overwrite_with_newer_generation() {
        let cache = cache();
        let t0 = Instant::now();
        cache.set(key("floods"), Arc::new(events("old", 1)), cache.next_generation(), t0);
        cache.set(key("floods"), Arc::new(events("new", 1)), cache.next_generation(), t0);

        let CacheLookup::Fresh(stored) = cache.get_at(&key("floods"), t0) else {
            panic!("expected fresh entry");
        };
        assert_eq!(stored[0].id, "new-0");
    }

    #[test]
    fn should_evict_least_recently_used_when_full() {
        let cache = cache();
        let t0 = Instant::now();
        for (offset, category) in ["floods", "snow", "volcanoes"].into_iter().enumerate() {
            let at = t0 + Duration::from_secs(offset as u64);
            cache.set(key(category), Arc::new(events(category, 1)), cache.next_generation(), at);
        }
        // Touch the oldest so `snow` becomes least recently used.
        cache.get_at(&key("floods"), t0 + Duration::from_secs(10));

        cache.set(
            key("wildfires"),
            Arc::new(events("wildfires", 1)),
            cache.next_generation(),
            t0 + Duration::from_secs(11),
        );

        let now = t0 + Duration::from_secs(12);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get_at(&key("snow"), now), CacheLookup::Miss);
        assert!(matches!(cache.get_at(&key("floods"), now), CacheLookup::Fresh(_)));
        assert!(matches!(cache.get_at(&key("volcanoes"), now), CacheLookup::Fresh(_)));
        assert!(matches!(cache.get_at(&key("wildfires"), now), CacheLookup::Fresh(_)));
    }

    #[test]
    fn should_rewrite_key_in_place_when_full() {
        let cache = cache();
        let t0 = Instant::now();
        for category in ["floods", "snow", "volcanoes"] {
            cache.set(key(category), Arc::new(events(category, 1)), cache.next_generation(), t0);
        }

        cache.set(key("floods"), Arc::new(events("again", 1)), cache.next_generation(), t0);

        assert_eq!(cache.len(), 3);
        assert!(matches!(cache.get_at(&key("snow"), t0), CacheLookup::Fresh(_)));
        let CacheLookup::Fresh(stored) = cache.get_at(&key("floods"), t0) else {
            panic!("expected fresh entry");
        };
        assert_eq!(stored[0].id, "again-0");
    }

    #[test]
    fn should_keep_one_entry_when_capacity_is_zero() {
        let cache = ResultCache::new(CachePolicy {
            max_entries: 0,
            ..CachePolicy::default()
        });
        let t0 = Instant::now();
        cache.set(key("floods"), Arc::new(events("a", 1)), cache.next_generation(), t0);
        cache.set(key("snow"), Arc::new(events("b", 1)), cache.next_generation(), t0);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&key("floods"), t0), CacheLookup::Miss);
    }

    #[test]
    fn should_invalidate_and_clear() {
        let cache = cache();
        let t0 = Instant::now();
        cache.set(key("floods"), Arc::new(events("a", 1)), cache.next_generation(), t0);
        cache.set(key("snow"), Arc::new(events("b", 1)), cache.next_generation(), t0);

        cache.invalidate(&key("floods"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_purge_expired_entries() {
        let cache = cache();
        cache.set(key("floods"), Arc::new(events("a", 1)), cache.next_generation(), Instant::now());
        tokio::time::advance(Duration::from_secs(200)).await;
        cache.set(key("snow"), Arc::new(events("b", 1)), cache.next_generation(), Instant::now());
        tokio::time::advance(Duration::from_secs(150)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.get(&key("snow")), CacheLookup::Stale(_)));
    }
}
