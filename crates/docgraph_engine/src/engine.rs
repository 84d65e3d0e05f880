//! The engine: shared cache, paced transport access and statistics.

use crate::cache::EntityCache;
use crate::config::EngineConfig;
use crate::data::DataHandle;
use crate::error::{EngineError, EngineResult};
use crate::observer::Observer;
use crate::pacer::Pacer;
use crate::transport::RemoteTransport;
use docgraph_protocol::{Pointer, Record, SubtreeRequest, SyncRecordValuesRequest, Table};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;
use std::time::Instant;

/// Statistics about engine activity.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Total number of flushes that delivered every operation.
    pub flushes_completed: u64,
    /// Total number of submit calls that succeeded.
    pub batches_sent: u64,
    /// Total number of operations delivered.
    pub operations_sent: u64,
    /// Total number of subtree loads.
    pub subtrees_loaded: u64,
    /// Total number of records re-fetched after flushes or on request.
    pub records_refreshed: u64,
    /// Total number of failed network calls.
    pub failures: u64,
    /// Last completed flush time.
    pub last_flush_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Owns the entity cache and mediates every remote call.
///
/// All network calls (subtree loads, refreshes and submits) go through one
/// [`Pacer`], so the configured interval holds across all of them.
pub struct Engine<T: RemoteTransport> {
    config: EngineConfig,
    transport: Arc<T>,
    cache: RwLock<EntityCache>,
    pacer: Pacer,
    stats: RwLock<EngineStats>,
}

impl<T: RemoteTransport> Engine<T> {
    /// Creates a new engine.
    pub fn new(config: EngineConfig, transport: T) -> Self {
        Self::with_shared_transport(config, Arc::new(transport))
    }

    /// Creates a new engine over a transport shared with the caller.
    pub fn with_shared_transport(config: EngineConfig, transport: Arc<T>) -> Self {
        let cache = EntityCache::with_observer(config.observer.clone());
        let pacer = Pacer::new(config.interval);
        Self {
            config,
            transport,
            cache: RwLock::new(cache),
            pacer,
            stats: RwLock::new(EngineStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the observer.
    pub fn observer(&self) -> &dyn Observer {
        self.config.observer.as_ref()
    }

    /// Locks the cache for reading.
    pub fn cache(&self) -> RwLockReadGuard<'_, EntityCache> {
        self.cache.read()
    }

    /// Locks the cache for writing.
    pub fn cache_mut(&self) -> RwLockWriteGuard<'_, EntityCache> {
        self.cache.write()
    }

    pub(crate) fn cache_lock(&self) -> &RwLock<EntityCache> {
        &self.cache
    }

    /// Returns a copy of a cached record.
    pub fn get(&self, table: Table, id: &str) -> Option<Record> {
        self.cache.read().get(table, id).cloned()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// Returns a handle on one entity.
    pub fn handle(&self, table: Table, id: impl Into<String>) -> DataHandle<'_, T> {
        DataHandle::new(self, Pointer::new(table, id))
    }

    /// Fetches the subtree rooted at `root` and stores it in the cache.
    ///
    /// The whole response is stored under one write lock; on failure the
    /// cache is left untouched. Returns the number of records stored.
    pub fn load_subtree(&self, root: &Pointer) -> EngineResult<usize> {
        let request = SubtreeRequest::new(root.clone(), self.config.fetch_limit);
        tracing::debug!(%root, limit = request.limit, "loading subtree");

        let response = self
            .paced(|| self.transport.load_subtree(&request))
            .inspect_err(|e| self.handle_error(e))?;

        let stored = self.cache.write().absorb(response.record_map);
        self.stats.write().subtrees_loaded += 1;
        tracing::debug!(%root, stored, "subtree loaded");
        Ok(stored)
    }

    /// Re-fetches `pointers` and overwrites their cached copies.
    ///
    /// Returns the number of records stored. An empty list makes no call.
    pub fn refresh(&self, pointers: &[Pointer]) -> EngineResult<usize> {
        if pointers.is_empty() {
            return Ok(0);
        }
        let request = SyncRecordValuesRequest::latest(pointers);
        tracing::debug!(records = pointers.len(), "refreshing records");

        let response = self
            .paced(|| self.transport.sync_record_values(&request))
            .inspect_err(|e| self.handle_error(e))?;

        let stored = self.cache.write().absorb(response.record_map);
        self.stats.write().records_refreshed += stored as u64;
        Ok(stored)
    }

    /// Runs a network call under the pacer.
    pub(crate) fn paced<R>(&self, call: impl FnOnce() -> R) -> R {
        self.pacer.pace(call)
    }

    pub(crate) fn stats_mut(&self) -> RwLockWriteGuard<'_, EngineStats> {
        self.stats.write()
    }

    /// Records a failed call in the stats.
    pub(crate) fn handle_error(&self, error: &EngineError) {
        tracing::warn!(%error, "remote call failed");
        let mut stats = self.stats.write();
        stats.failures += 1;
        stats.last_error = Some(error.to_string());
    }
}
