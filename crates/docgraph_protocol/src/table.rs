//! Entity kinds and addresses.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a remote entity.
///
/// The set is closed: every record the service returns lives in exactly
/// one of these tables, and a record never moves between tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Pages and every content block subtype.
    Block,
    /// Database collections (schema + rows).
    Collection,
    /// Views over a collection (table, board, list, ...).
    CollectionView,
    /// Workspaces.
    Space,
    /// Per-user membership of a space.
    SpaceView,
    /// User profile.
    User,
    /// Per-user list of space views.
    UserRoot,
    /// Per-user settings.
    UserSettings,
}

impl Table {
    /// All tables, in wire order.
    pub const ALL: [Table; 8] = [
        Table::Block,
        Table::Collection,
        Table::CollectionView,
        Table::Space,
        Table::SpaceView,
        Table::User,
        Table::UserRoot,
        Table::UserSettings,
    ];

    /// Returns the wire name of the table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Block => "block",
            Table::Collection => "collection",
            Table::CollectionView => "collection_view",
            Table::Space => "space",
            Table::SpaceView => "space_view",
            Table::User => "user",
            Table::UserRoot => "user_root",
            Table::UserSettings => "user_settings",
        }
    }

    /// Parses a wire name.
    pub fn from_name(name: &str) -> ProtocolResult<Self> {
        Self::ALL
            .into_iter()
            .find(|table| table.as_str() == name)
            .ok_or_else(|| ProtocolError::UnknownTable(name.to_string()))
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(table, id)` address of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pointer {
    /// Table the entity lives in.
    pub table: Table,
    /// Entity id, unique within the table.
    pub id: String,
}

impl Pointer {
    /// Creates a new pointer.
    pub fn new(table: Table, id: impl Into<String>) -> Self {
        Self {
            table,
            id: id.into(),
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_roundtrip() {
        for table in Table::ALL {
            assert_eq!(Table::from_name(table.as_str()).unwrap(), table);
        }
        assert!(matches!(
            Table::from_name("widget"),
            Err(ProtocolError::UnknownTable(_))
        ));
    }

    #[test]
    fn table_serializes_as_wire_name() {
        let json = serde_json::to_string(&Table::CollectionView).unwrap();
        assert_eq!(json, "\"collection_view\"");
    }

    #[test]
    fn pointer_display() {
        let pointer = Pointer::new(Table::Space, "s1");
        assert_eq!(pointer.to_string(), "space:s1");
    }
}
