//! Product snapshot cache.
//!
//! Remembers the price and display data the server returned for each product
//! so a later optimistic add of the same product can show something better
//! than an empty line. Cached data is only ever used as *provisional* data.

use moka::sync::Cache;
use pineapple_basket_core::{Collection, ProductId, ProductSnapshot};

use crate::config::SnapshotCacheConfig;

/// In-memory cache of server-provided product snapshots.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Cache<ProductId, ProductSnapshot>,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

impl SnapshotCache {
    /// Create a cache with the configured capacity and TTL.
    #[must_use]
    pub fn new(config: &SnapshotCacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_live(config.ttl)
            .build();
        Self { inner }
    }

    /// Remember product data from every reconciled entry of a collection.
    pub fn remember(&self, collection: &Collection) {
        for entry in collection
            .iter()
            .filter(|e| !e.is_provisional() && !e.snapshot.product().is_empty())
        {
            self.inner
                .insert(entry.id.clone(), entry.snapshot.product().clone());
        }
    }

    #[must_use]
    pub fn lookup(&self, id: &ProductId) -> Option<ProductSnapshot> {
        self.inner.get(id)
    }

    /// Product data for an optimistic add.
    ///
    /// Caller-supplied data wins when it carries anything; otherwise the
    /// cached snapshot is used, falling back to an empty snapshot.
    #[must_use]
    pub fn provisional_for(&self, id: &ProductId, supplied: Option<ProductSnapshot>) -> ProductSnapshot {
        supplied
            .filter(|s| !s.is_empty())
            .or_else(|| self.lookup(id))
            .unwrap_or_default()
    }

    /// Forget everything (identity change).
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}
