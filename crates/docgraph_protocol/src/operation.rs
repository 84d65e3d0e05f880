//! Remote write operations.

use crate::error::{ProtocolError, ProtocolResult};
use crate::position::Placement;
use crate::record::Record;
use crate::table::{Pointer, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of write an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    /// Replace the value at the path.
    Set,
    /// Shallow-merge an object into the value at the path.
    Update,
    /// Insert an id into the list at the path, before an anchor.
    ListBefore,
    /// Insert an id into the list at the path, after an anchor.
    ListAfter,
    /// Remove an id from the list at the path.
    ListRemove,
}

impl Command {
    /// Returns true for the list commands.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Command::ListBefore | Command::ListAfter | Command::ListRemove
        )
    }
}

/// A single remote write intent.
///
/// Every operation targets exactly one `(table, id)` entity. `path`
/// addresses a field inside the entity; an empty path means the entity
/// itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Table of the target entity.
    pub table: Table,
    /// Id of the target entity.
    pub id: String,
    /// Field path inside the entity.
    pub path: Vec<String>,
    /// What to do at the path.
    pub command: Command,
    /// Command arguments.
    pub args: Value,
}

impl Operation {
    /// Creates a new operation.
    pub fn new(
        table: Table,
        id: impl Into<String>,
        path: &[&str],
        command: Command,
        args: Value,
    ) -> Self {
        Self {
            table,
            id: id.into(),
            path: path.iter().map(|p| p.to_string()).collect(),
            command,
            args,
        }
    }

    /// Creates a `set` operation.
    pub fn set(table: Table, id: impl Into<String>, path: &[&str], args: Value) -> Self {
        Self::new(table, id, path, Command::Set, args)
    }

    /// Creates an `update` operation.
    pub fn update(table: Table, id: impl Into<String>, path: &[&str], args: Value) -> Self {
        Self::new(table, id, path, Command::Update, args)
    }

    /// Creates a `listBefore` operation. Without an anchor the id goes to
    /// the front of the list.
    pub fn list_before(
        table: Table,
        id: impl Into<String>,
        path: &[&str],
        child_id: &str,
        before: Option<&str>,
    ) -> Self {
        Self::new(
            table,
            id,
            path,
            Command::ListBefore,
            list_args(child_id, "before", before),
        )
    }

    /// Creates a `listAfter` operation. Without an anchor the id goes to
    /// the back of the list.
    pub fn list_after(
        table: Table,
        id: impl Into<String>,
        path: &[&str],
        child_id: &str,
        after: Option<&str>,
    ) -> Self {
        Self::new(
            table,
            id,
            path,
            Command::ListAfter,
            list_args(child_id, "after", after),
        )
    }

    /// Creates a `listRemove` operation.
    pub fn list_remove(table: Table, id: impl Into<String>, path: &[&str], child_id: &str) -> Self {
        Self::new(
            table,
            id,
            path,
            Command::ListRemove,
            list_args(child_id, "id", None),
        )
    }

    /// Returns the address of the target entity.
    pub fn pointer(&self) -> Pointer {
        Pointer::new(self.table, self.id.clone())
    }

    /// Returns the child id carried by a list command.
    pub fn child_id(&self) -> Option<&str> {
        if self.command.is_list() {
            self.args.get("id").and_then(Value::as_str)
        } else {
            None
        }
    }

    /// Applies this operation to a record the way the remote service does.
    pub fn apply_to(&self, record: &mut Record) -> ProtocolResult<()> {
        match self.command {
            Command::Set if self.path.is_empty() => {
                *record = Record::from_value(self.args.clone())?;
            }
            Command::Set => {
                *record.slot_mut(&self.path)? = self.args.clone();
            }
            Command::Update => {
                let patch = self.args.as_object().ok_or_else(|| {
                    ProtocolError::invalid_path(&self.path, "update args must be an object")
                })?;
                if self.path.is_empty() {
                    record.merge(patch);
                } else {
                    let slot = record.slot_mut(&self.path)?;
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                    if let Value::Object(target) = slot {
                        for (key, value) in patch {
                            target.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            Command::ListBefore | Command::ListAfter | Command::ListRemove => {
                let child_id = self
                    .child_id()
                    .ok_or_else(|| ProtocolError::invalid_path(&self.path, "missing list id"))?
                    .to_string();
                let slot = record.slot_mut(&self.path)?;
                let mut list: Vec<String> = match &*slot {
                    Value::Null => Vec::new(),
                    Value::Array(items) => items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                    _ => {
                        return Err(ProtocolError::invalid_path(&self.path, "not a list"));
                    }
                };
                let anchor = |key: &str| self.args.get(key).and_then(Value::as_str);
                match self.command {
                    Command::ListBefore => Placement::Before(anchor("before").map(str::to_string))
                        .apply(&mut list, &child_id),
                    Command::ListAfter => Placement::After(anchor("after").map(str::to_string))
                        .apply(&mut list, &child_id),
                    _ => list.retain(|id| *id != child_id),
                }
                *slot = Value::Array(list.into_iter().map(Value::String).collect());
            }
        }
        Ok(())
    }
}

fn list_args(child_id: &str, anchor_key: &str, anchor: Option<&str>) -> Value {
    let mut args = Map::new();
    args.insert("id".into(), Value::String(child_id.to_string()));
    if let Some(anchor) = anchor {
        args.insert(anchor_key.into(), Value::String(anchor.to_string()));
    }
    Value::Object(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_format() {
        let op = Operation::update(Table::Block, "b1", &[], json!({ "alive": false }));
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value,
            json!({
                "table": "block",
                "id": "b1",
                "path": [],
                "command": "update",
                "args": { "alive": false }
            })
        );

        let op = Operation::list_remove(Table::Space, "s1", &["pages"], "p1");
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["command"], "listRemove");
        assert_eq!(value["args"], json!({ "id": "p1" }));
    }

    #[test]
    fn child_id_only_for_list_commands() {
        let op = Operation::list_after(Table::Block, "p", &["content"], "c", None);
        assert_eq!(op.child_id(), Some("c"));
        let op = Operation::set(Table::Block, "p", &[], json!({ "id": "p" }));
        assert_eq!(op.child_id(), None);
    }

    #[test]
    fn apply_update_and_list_commands() {
        let mut record = Record::new("p");
        Operation::update(Table::Block, "p", &[], json!({ "type": "page" }))
            .apply_to(&mut record)
            .unwrap();
        assert_eq!(record.block_type(), Some("page"));

        Operation::list_after(Table::Block, "p", &["content"], "a", None)
            .apply_to(&mut record)
            .unwrap();
        Operation::list_before(Table::Block, "p", &["content"], "b", Some("a"))
            .apply_to(&mut record)
            .unwrap();
        assert_eq!(record.id_list("content"), vec!["b", "a"]);

        Operation::list_remove(Table::Block, "p", &["content"], "b")
            .apply_to(&mut record)
            .unwrap();
        assert_eq!(record.id_list("content"), vec!["a"]);
    }

    #[test]
    fn apply_nested_update() {
        let mut record = Record::new("u");
        Operation::update(
            Table::UserSettings,
            "u",
            &["settings"],
            json!({ "time_zone": "UTC" }),
        )
        .apply_to(&mut record)
        .unwrap();
        assert_eq!(record.get("settings").unwrap()["time_zone"], "UTC");
    }

    #[test]
    fn apply_list_on_scalar_fails() {
        let mut record = Record::new("p").with("content", "oops");
        let result = Operation::list_after(Table::Block, "p", &["content"], "a", None)
            .apply_to(&mut record);
        assert!(matches!(result, Err(ProtocolError::InvalidPath { .. })));
    }
}
