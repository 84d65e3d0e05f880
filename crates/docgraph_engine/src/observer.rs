//! Injectable observers for engine activity.

use docgraph_protocol::Pointer;
use parking_lot::Mutex;
use std::fmt;

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Entity was created locally.
    Create,
    /// Entity was selected.
    Read,
    /// Entity was patched.
    Update,
    /// Entity was deleted.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "CREATE",
            Action::Read => "READ",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
        })
    }
}

/// Receives notifications about engine activity.
///
/// `subject` names what the caller works with (`"Page"`, `"Block"`,
/// `"SchemaUnit"`, ...), which is not always the table name.
pub trait Observer: Send + Sync {
    /// An entity was created, selected, patched or deleted.
    fn record(&self, action: Action, subject: &str, id: &str);

    /// A read returned a record whose alive flag is false.
    fn stale(&self, _pointer: &Pointer) {}

    /// A create was skipped because the key is already taken.
    fn collision(&self, _subject: &str, _key: &str) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record(&self, _action: Action, _subject: &str, _id: &str) {}
}

/// Observer that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record(&self, action: Action, subject: &str, id: &str) {
        tracing::info!(%action, subject, id, "entity");
    }

    fn stale(&self, pointer: &Pointer) {
        tracing::warn!(%pointer, "read of deleted entity");
    }

    fn collision(&self, subject: &str, key: &str) {
        tracing::warn!(subject, key, "key already exists, skipping");
    }
}

/// An observed notification, as captured by [`MemoryObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    /// See [`Observer::record`].
    Record {
        /// What happened.
        action: Action,
        /// Caller-facing subject.
        subject: String,
        /// Entity or key id.
        id: String,
    },
    /// See [`Observer::stale`].
    Stale(Pointer),
    /// See [`Observer::collision`].
    Collision {
        /// Caller-facing subject.
        subject: String,
        /// Colliding key.
        key: String,
    },
}

/// Observer that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl MemoryObserver {
    /// Creates an empty observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured events.
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    /// Returns the ids recorded for an action, in order.
    pub fn ids_for(&self, action: Action) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ObservedEvent::Record { action: a, id, .. } if *a == action => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clears captured events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Observer for MemoryObserver {
    fn record(&self, action: Action, subject: &str, id: &str) {
        self.events.lock().push(ObservedEvent::Record {
            action,
            subject: subject.to_string(),
            id: id.to_string(),
        });
    }

    fn stale(&self, pointer: &Pointer) {
        self.events.lock().push(ObservedEvent::Stale(pointer.clone()));
    }

    fn collision(&self, subject: &str, key: &str) {
        self.events.lock().push(ObservedEvent::Collision {
            subject: subject.to_string(),
            key: key.to_string(),
        });
    }
}
