//! Record fixtures.
//!
//! Builders for the record shapes the remote service returns, plus a
//! builder that groups them into a subtree response.

use docgraph_protocol::{Pointer, Record, RecordMap, Table};
use serde_json::{json, Value};

/// A page block with a `content` list.
pub fn page(id: &str, content: &[&str]) -> Record {
    Record::new(id)
        .with("type", "page")
        .with("content", json!(content))
}

/// A page block whose parent is another entity.
pub fn child_page(id: &str, parent_id: &str, parent_table: Table) -> Record {
    Record::new(id)
        .with("type", "page")
        .with("parent_id", parent_id)
        .with("parent_table", parent_table.as_str())
}

/// A collection row: a page pointing at the collection.
pub fn row(id: &str, collection_id: &str) -> Record {
    child_page(id, collection_id, Table::Collection)
}

/// A template page of a collection.
pub fn template(id: &str, collection_id: &str) -> Record {
    row(id, collection_id).with("is_template", true)
}

/// A non-page block under a parent block.
pub fn block(id: &str, block_type: &str, parent_id: &str) -> Record {
    Record::new(id)
        .with("type", block_type)
        .with("parent_id", parent_id)
        .with("parent_table", Table::Block.as_str())
}

/// A collection with template pages and a schema holding a title column.
pub fn collection(id: &str, template_pages: &[&str]) -> Record {
    Record::new(id)
        .with("name", json!([[id]]))
        .with("template_pages", json!(template_pages))
        .with("schema", json!({ "title": { "name": "Name", "type": "title" } }))
}

/// A space with a `pages` list.
pub fn space(id: &str, pages: &[&str]) -> Record {
    Record::new(id).with("pages", json!(pages))
}

/// Returns a copy of `record` with `alive = false`.
pub fn dead(mut record: Record) -> Record {
    record.set_alive(false);
    record
}

/// Builds a [`RecordMap`] for canned responses.
#[derive(Debug, Default)]
pub struct SubtreeBuilder {
    record_map: RecordMap,
}

impl SubtreeBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds any record.
    pub fn record(mut self, table: Table, record: Record) -> Self {
        // Fixture records always carry an id.
        let _ = self.record_map.insert(table, record);
        self
    }

    /// Adds a page block.
    pub fn page(self, id: &str, content: &[&str]) -> Self {
        self.record(Table::Block, page(id, content))
    }

    /// Adds a block.
    pub fn block(self, id: &str, block_type: &str, parent_id: &str) -> Self {
        self.record(Table::Block, block(id, block_type, parent_id))
    }

    /// Adds a collection.
    pub fn collection(self, id: &str, template_pages: &[&str]) -> Self {
        self.record(Table::Collection, collection(id, template_pages))
    }

    /// Adds a template page of a collection.
    pub fn template(self, id: &str, collection_id: &str) -> Self {
        self.record(Table::Block, template(id, collection_id))
    }

    /// Adds a collection row.
    pub fn row(self, id: &str, collection_id: &str) -> Self {
        self.record(Table::Block, row(id, collection_id))
    }

    /// Adds a space.
    pub fn space(self, id: &str, pages: &[&str]) -> Self {
        self.record(Table::Space, space(id, pages))
    }

    /// Returns the record map.
    pub fn build(self) -> RecordMap {
        self.record_map
    }
}

/// Pointer shorthand.
pub fn ptr(table: Table, id: &str) -> Pointer {
    Pointer::new(table, id)
}

/// Ids as owned strings.
pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Returns `record[key]`, or `Null`.
pub fn field(record: &Record, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_shapes() {
        let t = template("t", "c");
        assert!(t.is_template());
        assert_eq!(t.parent_id(), Some("c"));
        assert_eq!(t.parent_table(), Some(Table::Collection));

        let p = page("p", &["a", "b"]);
        assert_eq!(p.id_list("content"), ids(&["a", "b"]));
        assert!(!dead(p).alive());
    }

    #[test]
    fn subtree_builder() {
        let map = SubtreeBuilder::new()
            .collection("c", &["t1"])
            .template("t1", "c")
            .row("r1", "c")
            .space("s", &[])
            .build();
        assert_eq!(map.len(), 4);
        assert_eq!(
            map.get(Table::Collection, "c").unwrap().id_list("template_pages"),
            ids(&["t1"])
        );
        assert_eq!(field(map.get(Table::Block, "r1").unwrap(), "type"), "page");
    }
}
