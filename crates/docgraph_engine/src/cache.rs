//! In-memory mirror of remote entities.

use crate::observer::{NoopObserver, Observer};
use docgraph_protocol::{Pointer, Record, RecordMap, Table};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Last known value of every entity seen by this process, keyed by
/// `(table, id)`.
///
/// Deletes are normally soft: [`mark_dead`](Self::mark_dead) keeps the
/// record with `alive = false` so a repeated delete can be detected.
/// Reads of dead records succeed and are reported to the observer.
pub struct EntityCache {
    tables: HashMap<Table, HashMap<String, Record>>,
    observer: Arc<dyn Observer>,
}

impl EntityCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(NoopObserver))
    }

    /// Creates an empty cache reporting stale reads to `observer`.
    pub fn with_observer(observer: Arc<dyn Observer>) -> Self {
        Self {
            tables: HashMap::new(),
            observer,
        }
    }

    /// Returns a record, reporting it when it is no longer alive.
    pub fn get(&self, table: Table, id: &str) -> Option<&Record> {
        let record = self.peek(table, id)?;
        if !record.alive() {
            let pointer = Pointer::new(table, id);
            tracing::warn!(%pointer, "reading deleted entity");
            self.observer.stale(&pointer);
        }
        Some(record)
    }

    /// Returns a record without stale reporting.
    pub fn peek(&self, table: Table, id: &str) -> Option<&Record> {
        self.tables.get(&table).and_then(|records| records.get(id))
    }

    /// Returns a mutable record.
    pub fn get_mut(&mut self, table: Table, id: &str) -> Option<&mut Record> {
        self.tables
            .get_mut(&table)
            .and_then(|records| records.get_mut(id))
    }

    /// Inserts or replaces a record.
    pub fn put(&mut self, table: Table, id: impl Into<String>, record: Record) {
        self.tables
            .entry(table)
            .or_default()
            .insert(id.into(), record);
    }

    /// Removes a record entirely.
    pub fn delete(&mut self, table: Table, id: &str) -> Option<Record> {
        self.tables
            .get_mut(&table)
            .and_then(|records| records.remove(id))
    }

    /// Sets `alive = false` on a record.
    ///
    /// Returns `Some(true)` if the record was alive, `Some(false)` if it
    /// was already dead and `None` if it is not cached.
    pub fn mark_dead(&mut self, table: Table, id: &str) -> Option<bool> {
        let record = self.get_mut(table, id)?;
        let was_alive = record.alive();
        record.set_alive(false);
        Some(was_alive)
    }

    /// Returns true if the record is cached, dead or alive.
    pub fn contains(&self, table: Table, id: &str) -> bool {
        self.peek(table, id).is_some()
    }

    /// Iterates over every cached record of a table.
    pub fn iter(&self, table: Table) -> impl Iterator<Item = (&str, &Record)> {
        self.tables
            .get(&table)
            .into_iter()
            .flat_map(|records| records.iter().map(|(id, record)| (id.as_str(), record)))
    }

    /// Stores every record of a fetch response, replacing cached copies.
    ///
    /// Returns the number of records stored.
    pub fn absorb(&mut self, record_map: RecordMap) -> usize {
        let mut count = 0;
        for (pointer, record) in record_map.into_records() {
            self.put(pointer.table, pointer.id, record);
            count += 1;
        }
        count
    }

    /// Returns the total number of cached records.
    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .tables
            .iter()
            .map(|(table, records)| (table.as_str(), records.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("EntityCache")
            .field("tables", &counts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{MemoryObserver, ObservedEvent};

    #[test]
    fn put_get_delete() {
        let mut cache = EntityCache::new();
        cache.put(Table::Block, "a", Record::new("a"));
        assert!(cache.contains(Table::Block, "a"));
        assert!(!cache.contains(Table::Collection, "a"));
        assert_eq!(cache.len(), 1);

        assert!(cache.delete(Table::Block, "a").is_some());
        assert!(cache.get(Table::Block, "a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn mark_dead_keeps_record() {
        let mut cache = EntityCache::new();
        cache.put(Table::Block, "a", Record::new("a"));

        assert_eq!(cache.mark_dead(Table::Block, "a"), Some(true));
        assert_eq!(cache.mark_dead(Table::Block, "a"), Some(false));
        assert_eq!(cache.mark_dead(Table::Block, "missing"), None);

        let record = cache.get(Table::Block, "a").unwrap();
        assert!(!record.alive());
    }

    #[test]
    fn stale_reads_are_reported() {
        let observer = Arc::new(MemoryObserver::new());
        let mut cache = EntityCache::with_observer(observer.clone());
        cache.put(Table::Block, "a", Record::new("a"));
        cache.get(Table::Block, "a");
        assert!(observer.events().is_empty());

        cache.mark_dead(Table::Block, "a");
        cache.get(Table::Block, "a");
        cache.peek(Table::Block, "a");
        assert_eq!(
            observer.events(),
            vec![ObservedEvent::Stale(Pointer::new(Table::Block, "a"))]
        );
    }

    #[test]
    fn absorb_replaces_cached_copies() {
        let mut cache = EntityCache::new();
        cache.put(Table::Space, "s", Record::new("s").with("name", "old"));

        let mut record_map = RecordMap::new();
        record_map
            .insert(Table::Space, Record::new("s").with("name", "new"))
            .unwrap();
        record_map.insert(Table::Block, Record::new("p")).unwrap();

        assert_eq!(cache.absorb(record_map), 2);
        assert_eq!(cache.peek(Table::Space, "s").unwrap().get("name").unwrap(), "new");
        assert_eq!(cache.iter(Table::Block).count(), 1);
    }
}
