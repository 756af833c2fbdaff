//! Process-wide conversion cache.
//!
//! The refresh task owns the only [`CacheWriter`]; every other component
//! holds a [`ConversionCache`] and reads immutable snapshots from it.

use crate::core::error::CacheError;
use crate::core::rates::ConversionRates;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

type Slot = Option<Arc<ConversionRates>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing published yet.
    Empty,
    Populated,
    /// Older than the refresh interval but still served.
    Stale,
}

/// Write side of the cache, held by the refresh task.
pub struct CacheWriter {
    tx: watch::Sender<Slot>,
}

/// Read side of the cache. Cheap to clone.
#[derive(Clone)]
pub struct ConversionCache {
    rx: watch::Receiver<Slot>,
}

/// Creates an empty cache and its single writer.
pub fn conversion_cache() -> (CacheWriter, ConversionCache) {
    let (tx, rx) = watch::channel(None);
    (CacheWriter { tx }, ConversionCache { rx })
}

impl CacheWriter {
    /// Replaces the served snapshot and wakes any reader waiting on population.
    pub fn publish(&self, rates: ConversionRates) -> Arc<ConversionRates> {
        debug!(last_updated = rates.last_updated, "Cache PUBLISH");
        let snapshot = Arc::new(rates);
        self.tx.send_replace(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// Returns the cache to its empty state.
    pub fn reset(&self) {
        debug!("Cache RESET");
        self.tx.send_replace(None);
    }
}

impl ConversionCache {
    /// Current snapshot, if the cache has been populated.
    pub fn snapshot(&self) -> Option<Arc<ConversionRates>> {
        let snapshot = self.rx.borrow().clone();
        if snapshot.is_some() {
            debug!("Cache HIT");
        } else {
            debug!("Cache MISS");
        }
        snapshot
    }

    /// Waits until the first refresh has published rates.
    ///
    /// Resolves immediately once populated. Fails only if the writer is
    /// dropped while the cache is still empty.
    pub async fn wait_ready(&self) -> Result<Arc<ConversionRates>, CacheError> {
        let mut rx = self.rx.clone();
        let guard = rx
            .wait_for(|slot| slot.is_some())
            .await
            .map_err(|_| CacheError::Closed)?;
        let snapshot: Slot = (*guard).clone();
        snapshot.ok_or(CacheError::Closed)
    }

    pub fn state(&self, now_ms: i64, interval: Duration) -> CacheState {
        match self.rx.borrow().as_ref() {
            None => CacheState::Empty,
            Some(rates) if rates.is_stale(now_ms, interval) => CacheState::Stale,
            Some(_) => CacheState::Populated,
        }
    }
}
