//! Entity records and record maps.

use crate::error::{ProtocolError, ProtocolResult};
use crate::position::Position;
use crate::table::{Pointer, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The last known value of a remote entity.
///
/// Records are JSON objects. The well-known fields (`id`, `alive`, `type`,
/// `parent_id`, `parent_table`, `is_template`) have typed accessors; all
/// other fields are reachable through [`Record::get`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates a live record with only an id.
    pub fn new(id: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(id.into()));
        map.insert("alive".into(), Value::Bool(true));
        Self(map)
    }

    /// Wraps a JSON value; fails unless it is an object.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ProtocolError::invalid_record(format!(
                "expected object, got {other}"
            ))),
        }
    }

    /// Sets a field and returns the record (builder style).
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Returns the entity id.
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    /// Returns false once the entity has been logically deleted.
    ///
    /// A record without an `alive` field is alive.
    pub fn alive(&self) -> bool {
        self.0.get("alive").and_then(Value::as_bool).unwrap_or(true)
    }

    /// Sets the alive flag.
    pub fn set_alive(&mut self, alive: bool) {
        self.0.insert("alive".into(), Value::Bool(alive));
    }

    /// Returns the block subtype (`type` field).
    pub fn block_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Returns the id of the parent entity.
    pub fn parent_id(&self) -> Option<&str> {
        self.0.get("parent_id").and_then(Value::as_str)
    }

    /// Returns the table of the parent entity.
    pub fn parent_table(&self) -> Option<Table> {
        self.0
            .get("parent_table")
            .and_then(Value::as_str)
            .and_then(|name| Table::from_name(name).ok())
    }

    /// Returns true for template pages.
    pub fn is_template(&self) -> bool {
        self.0
            .get("is_template")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Returns a field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a mutable field value.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.to_string(), value.into())
    }

    /// Removes a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns the string ids stored in a list field, in stored order.
    ///
    /// A missing or non-list field yields an empty list.
    pub fn id_list(&self, path: &str) -> Vec<String> {
        self.0
            .get(path)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Shallow-merges a patch into the record and returns the written keys.
    pub fn merge(&mut self, patch: &Map<String, Value>) -> Vec<String> {
        patch
            .iter()
            .map(|(key, value)| {
                self.0.insert(key.clone(), value.clone());
                key.clone()
            })
            .collect()
    }

    /// Places `child_id` into the `path` list.
    pub fn insert_child(&mut self, path: &str, child_id: &str, position: &Position) {
        let mut list = self.id_list(path);
        position.placement(&list).apply(&mut list, child_id);
        self.write_list(path, list);
    }

    /// Removes `child_id` from the `path` list. Returns true if it was present.
    pub fn remove_child(&mut self, path: &str, child_id: &str) -> bool {
        let mut list = self.id_list(path);
        let before = list.len();
        list.retain(|id| id != child_id);
        let removed = list.len() != before;
        if removed {
            self.write_list(path, list);
        }
        removed
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Returns the slot at `path`, creating intermediate objects.
    pub(crate) fn slot_mut(&mut self, path: &[String]) -> ProtocolResult<&mut Value> {
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| ProtocolError::invalid_path(path, "empty path"))?;
        let mut slot = self.0.entry(first.clone()).or_insert(Value::Null);
        for key in rest {
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            slot = match slot {
                Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                _ => return Err(ProtocolError::invalid_path(path, "not an object")),
            };
        }
        Ok(slot)
    }

    fn write_list(&mut self, path: &str, list: Vec<String>) {
        self.0.insert(
            path.to_string(),
            Value::Array(list.into_iter().map(Value::String).collect()),
        );
    }
}

/// One entry of a [`RecordMap`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordEntry {
    /// The caller's role on the entity, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// The entity value; absent when the caller has no access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Record>,
}

/// Records grouped by table, as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordMap(BTreeMap<Table, BTreeMap<String, RecordEntry>>);

impl RecordMap {
    /// Creates an empty record map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record under its own id.
    pub fn insert(&mut self, table: Table, record: Record) -> ProtocolResult<()> {
        let id = record
            .id()
            .ok_or_else(|| ProtocolError::invalid_record("record has no id"))?
            .to_string();
        self.0.entry(table).or_default().insert(
            id,
            RecordEntry {
                role: None,
                value: Some(record),
            },
        );
        Ok(())
    }

    /// Returns the record at `(table, id)` if present with a value.
    pub fn get(&self, table: Table, id: &str) -> Option<&Record> {
        self.0
            .get(&table)
            .and_then(|entries| entries.get(id))
            .and_then(|entry| entry.value.as_ref())
    }

    /// Returns a mutable record.
    pub fn get_mut(&mut self, table: Table, id: &str) -> Option<&mut Record> {
        self.0
            .get_mut(&table)
            .and_then(|entries| entries.get_mut(id))
            .and_then(|entry| entry.value.as_mut())
    }

    /// Iterates over every record that carries a value.
    pub fn records(&self) -> impl Iterator<Item = (Pointer, &Record)> {
        self.0.iter().flat_map(|(table, entries)| {
            entries.iter().filter_map(move |(id, entry)| {
                entry
                    .value
                    .as_ref()
                    .map(|record| (Pointer::new(*table, id.clone()), record))
            })
        })
    }

    /// Consumes the map into its records.
    pub fn into_records(self) -> impl Iterator<Item = (Pointer, Record)> {
        self.0.into_iter().flat_map(|(table, entries)| {
            entries.into_iter().filter_map(move |(id, entry)| {
                entry.value.map(|record| (Pointer::new(table, id), record))
            })
        })
    }

    /// Merges another map into this one; entries of `other` win.
    pub fn merge(&mut self, other: RecordMap) {
        for (table, entries) in other.0 {
            self.0.entry(table).or_default().extend(entries);
        }
    }

    /// Returns the number of records carrying a value.
    pub fn len(&self) -> usize {
        self.records().count()
    }

    /// Returns true if no record carries a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
