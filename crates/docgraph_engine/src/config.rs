//! Configuration for the engine.

use crate::observer::{NoopObserver, Observer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Clone)]
pub struct EngineConfig {
    /// Id of the acting user. Stamped as `last_edited_by_id` on edits.
    pub user_id: String,
    /// Space that submitted transactions belong to.
    pub space_id: String,
    /// Shard of that space.
    pub shard_id: u32,
    /// Minimum gap between consecutive network calls.
    pub interval: Duration,
    /// Maximum number of operations per submitted request.
    pub max_batch_size: usize,
    /// Maximum number of records per subtree chunk.
    pub fetch_limit: u32,
    /// Receives create/read/update/delete notifications.
    pub observer: Arc<dyn Observer>,
}

impl EngineConfig {
    /// Creates a new configuration.
    pub fn new(user_id: impl Into<String>, space_id: impl Into<String>, shard_id: u32) -> Self {
        Self {
            user_id: user_id.into(),
            space_id: space_id.into(),
            shard_id,
            interval: Duration::from_millis(500),
            max_batch_size: 100,
            fetch_limit: 100,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Sets the pacing interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the maximum batch size. Zero is treated as one.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    /// Sets the subtree chunk limit.
    pub fn with_fetch_limit(mut self, limit: u32) -> Self {
        self.fetch_limit = limit;
        self
    }

    /// Sets the observer.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }
}

/// Fields the remote service expects on every edited entity.
pub(crate) fn last_edited_props(user_id: &str) -> Map<String, Value> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0);
    let mut props = Map::new();
    props.insert("last_edited_time".into(), Value::from(now));
    props.insert("last_edited_by_table".into(), Value::from("notion_user"));
    props.insert("last_edited_by_id".into(), Value::from(user_id));
    props
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("", "", 0)
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("user_id", &self.user_id)
            .field("space_id", &self.space_id)
            .field("shard_id", &self.shard_id)
            .field("interval", &self.interval)
            .field("max_batch_size", &self.max_batch_size)
            .field("fetch_limit", &self.fetch_limit)
            .finish_non_exhaustive()
    }
}
