//! Read-through TTL cache over the store.
//!
//! Two independent entries: the region list and the full subregion map.
//! An entry is served only while it is younger than the TTL (default 24h)
//! and was loaded from the store version that is still current.

use super::store::{LocalityStore, Snapshot};
use super::types::{Region, Subregion, SubregionMap};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub const DEFAULT_TTL_SECS: i64 = 24 * 3600;

struct CacheEntry<T> {
    value: Arc<T>,
    stored_at: DateTime<Utc>,
    version: u64,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration, version: u64) -> bool {
        self.version == version && now - self.stored_at < ttl
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct LocalityCache {
    store: Arc<LocalityStore>,
    ttl: Duration,
    regions: Mutex<Option<CacheEntry<Vec<Region>>>>,
    subregions: Mutex<Option<CacheEntry<SubregionMap>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalityCache {
    pub fn new(store: Arc<LocalityStore>) -> Self {
        Self::with_ttl(store, Duration::seconds(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(store: Arc<LocalityStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            regions: Mutex::new(None),
            subregions: Mutex::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn regions(&self) -> Arc<Vec<Region>> {
        self.read_through(&self.regions, "regions", |s| Arc::clone(s.hierarchy.regions()))
    }

    pub fn subregions(&self) -> Arc<SubregionMap> {
        self.read_through(&self.subregions, "subregions", |s| {
            Arc::clone(s.hierarchy.subregions())
        })
    }

    /// Subregions of one region, served from the cached map.
    pub fn subregions_of(&self, region_id: u32) -> Vec<Subregion> {
        self.subregions().get(&region_id).cloned().unwrap_or_default()
    }

    /// Drop both entries regardless of their remaining TTL.
    pub fn invalidate(&self) {
        *self.regions.lock().unwrap_or_else(PoisonError::into_inner) = None;
        *self.subregions.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("locality cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn read_through<T>(
        &self,
        slot: &Mutex<Option<CacheEntry<T>>>,
        name: &'static str,
        load: impl FnOnce(&Snapshot) -> Arc<T>,
    ) -> Arc<T> {
        let now = Utc::now();
        let version = self.store.version();
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = entry.as_ref() {
            if cached.is_fresh(now, self.ttl, version) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Arc::clone(&cached.value);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        // Load and stamp from one snapshot so the version matches the data.
        let snapshot = self.store.snapshot();
        let value = load(&snapshot);
        debug!(entry = name, version = snapshot.version, "locality cache reload");
        *entry = Some(CacheEntry {
            value: Arc::clone(&value),
            stored_at: now,
            version: snapshot.version,
        });
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locality::types::HierarchyBuilder;

    fn seeded_store() -> Arc<LocalityStore> {
        let store = Arc::new(LocalityStore::in_memory());
        let mut b = HierarchyBuilder::new();
        b.push_region(Region { id: 1, name_latin: "Adrar".into(), name_arabic: "أدرار".into() });
        b.push_subregion(Subregion { id: 101, region_id: 1, name_latin: "Adrar".into(), name_arabic: "أدرار".into() });
        let h = b.build();
        let counts = h.counts();
        store.replace_all(h, counts).unwrap();
        store
    }

    #[test]
    fn test_second_read_is_a_hit() {
        let cache = LocalityCache::new(seeded_store());
        assert_eq!(cache.regions().len(), 1);
        assert_eq!(cache.regions().len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_entries_are_independent() {
        let cache = LocalityCache::new(seeded_store());
        cache.regions();
        cache.subregions();
        assert_eq!(cache.stats().misses, 2);
        cache.subregions_of(1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_zero_ttl_always_reloads() {
        let cache = LocalityCache::with_ttl(seeded_store(), Duration::zero());
        cache.regions();
        cache.regions();
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 2 });
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let cache = LocalityCache::new(seeded_store());
        cache.regions();
        cache.invalidate();
        cache.regions();
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_store_mutation_invalidates_without_explicit_call() {
        let store = seeded_store();
        let cache = LocalityCache::new(Arc::clone(&store));
        assert_eq!(cache.regions().len(), 1);
        assert_eq!(cache.subregions_of(1).len(), 1);

        store.clear().unwrap();

        assert!(cache.regions().is_empty());
        assert!(cache.subregions_of(1).is_empty());
    }

    #[test]
    fn test_unknown_region_is_empty() {
        let cache = LocalityCache::new(seeded_store());
        assert!(cache.subregions_of(42).is_empty());
    }
}
