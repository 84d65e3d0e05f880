//! Editing the schema of a collection.
//!
//! A collection's `schema` field maps column keys to column definitions.
//! Columns are not entities, but they are selected, patched and removed
//! with the same [`Selector`] machinery as entity children. Every edit
//! writes the whole schema back with one update operation.

use crate::data::DataHandle;
use crate::error::{EngineError, EngineResult};
use crate::observer::Action;
use crate::select::{select, Selector};
use crate::stack::OperationStack;
use crate::transport::RemoteTransport;
use docgraph_protocol::{Operation, Table};
use serde_json::{json, Map, Value};

const SUBJECT: &str = "SchemaUnit";

/// Derives a column key from a column name: lowercase, whitespace to `_`.
pub fn normalize_key(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// One column of a collection schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaUnit {
    /// Column key.
    pub key: String,
    /// Column definition (`name`, `type` and type-specific options).
    pub value: Map<String, Value>,
}

impl SchemaUnit {
    /// Returns the display name.
    pub fn name(&self) -> Option<&str> {
        self.value.get("name").and_then(Value::as_str)
    }

    /// Returns the column type.
    pub fn kind(&self) -> Option<&str> {
        self.value.get("type").and_then(Value::as_str)
    }
}

/// A column to create.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaUnitInput {
    /// Display name; the key is derived from it.
    pub name: String,
    /// Column type (`text`, `number`, `select`, ...).
    pub kind: String,
    /// Type-specific options.
    pub options: Map<String, Value>,
}

impl SchemaUnitInput {
    /// Creates an input without options.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            options: Map::new(),
        }
    }

    /// Adds an option.
    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    fn into_definition(self) -> Map<String, Value> {
        let mut definition = self.options;
        definition.insert("name".into(), Value::String(self.name));
        definition.insert("type".into(), Value::String(self.kind));
        definition
    }
}

/// Schema editing on a collection handle.
pub struct SchemaEditor<'h, 'e, T: RemoteTransport> {
    handle: &'h mut DataHandle<'e, T>,
}

impl<'e, T: RemoteTransport> DataHandle<'e, T> {
    /// Returns a schema editor. Fails unless this is a collection.
    pub fn schema(&mut self) -> EngineResult<SchemaEditor<'_, 'e, T>> {
        if self.table() != Table::Collection {
            return Err(EngineError::WrongTable {
                expected: Table::Collection,
                pointer: self.pointer().clone(),
            });
        }
        Ok(SchemaEditor { handle: self })
    }
}

impl<'h, 'e, T: RemoteTransport> SchemaEditor<'h, 'e, T> {
    /// Adds columns.
    ///
    /// An input whose key is already taken is skipped with a collision
    /// warning; the others are still created. Returns the created units.
    pub fn create(
        &mut self,
        stack: &mut OperationStack,
        inputs: Vec<SchemaUnitInput>,
    ) -> EngineResult<Vec<SchemaUnit>> {
        stack.ensure_accepting()?;
        let mut schema = self.load()?;
        let observer = self.handle.engine().observer();
        let mut created = Vec::new();

        for input in inputs {
            let key = normalize_key(&input.name);
            if schema.contains_key(&key) {
                tracing::warn!(collection = self.handle.id(), %key, "schema unit already exists");
                observer.collision(SUBJECT, &key);
                continue;
            }
            let value = input.into_definition();
            schema.insert(key.clone(), Value::Object(value.clone()));
            observer.record(Action::Create, SUBJECT, &key);
            created.push(SchemaUnit { key, value });
        }

        if !created.is_empty() {
            self.store(stack, schema)?;
        }
        Ok(created)
    }

    /// Returns the selected columns, in key order.
    pub fn get(
        &mut self,
        selector: Selector<'_, SchemaUnit>,
        multiple: bool,
    ) -> EngineResult<Vec<SchemaUnit>> {
        let schema = self.load()?;
        let matched = self.matched(&schema, selector, multiple);
        let observer = self.handle.engine().observer();
        Ok(matched
            .into_iter()
            .filter_map(|key| {
                observer.record(Action::Read, SUBJECT, &key);
                unit(&schema, &key)
            })
            .collect())
    }

    /// Patches the selected columns. `patch_source` returns the fields to
    /// change, or `None` to leave a column alone. Returns the patched keys.
    pub fn update(
        &mut self,
        stack: &mut OperationStack,
        targets: Selector<'_, SchemaUnit>,
        multiple: bool,
        mut patch_source: impl FnMut(&SchemaUnit) -> Option<Map<String, Value>>,
    ) -> EngineResult<Vec<String>> {
        stack.ensure_accepting()?;
        let mut schema = self.load()?;
        let matched = self.matched(&schema, targets, multiple);
        let observer = self.handle.engine().observer();
        let mut updated = Vec::new();

        for key in matched {
            let Some(current) = unit(&schema, &key) else {
                continue;
            };
            let Some(patch) = patch_source(&current) else {
                continue;
            };
            if let Some(Value::Object(definition)) = schema.get_mut(&key) {
                definition.extend(patch);
            }
            observer.record(Action::Update, SUBJECT, &key);
            updated.push(key);
        }

        if !updated.is_empty() {
            self.store(stack, schema)?;
        }
        Ok(updated)
    }

    /// Removes the selected columns. Returns the removed keys.
    pub fn delete(
        &mut self,
        stack: &mut OperationStack,
        targets: Selector<'_, SchemaUnit>,
        multiple: bool,
    ) -> EngineResult<Vec<String>> {
        stack.ensure_accepting()?;
        let mut schema = self.load()?;
        let matched = self.matched(&schema, targets, multiple);
        let observer = self.handle.engine().observer();

        for key in &matched {
            schema.remove(key);
            observer.record(Action::Delete, SUBJECT, key);
        }

        if !matched.is_empty() {
            self.store(stack, schema)?;
        }
        Ok(matched)
    }

    fn load(&mut self) -> EngineResult<Map<String, Value>> {
        self.handle.ensure_loaded()?;
        let record = self.handle.cached_data()?;
        Ok(record
            .get("schema")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default())
    }

    fn matched(
        &self,
        schema: &Map<String, Value>,
        selector: Selector<'_, SchemaUnit>,
        multiple: bool,
    ) -> Vec<String> {
        let mut selector = selector;
        let keys: Vec<String> = schema.keys().cloned().collect();
        select(&keys, &mut selector, multiple, |key| unit(schema, key))
    }

    fn store(&self, stack: &mut OperationStack, schema: Map<String, Value>) -> EngineResult<()> {
        let pointer = self.handle.pointer();
        let operation = Operation::update(
            pointer.table,
            pointer.id.as_str(),
            &[],
            json!({ "schema": schema }),
        );
        {
            let engine = self.handle.engine();
            let mut cache = engine.cache_mut();
            let record = cache
                .get_mut(pointer.table, &pointer.id)
                .ok_or_else(|| EngineError::MissingRecord {
                    pointer: pointer.clone(),
                })?;
            operation.apply_to(record)?;
        }
        stack.push(operation)?;
        stack.record_sync(pointer.clone());
        Ok(())
    }
}

fn unit(schema: &Map<String, Value>, key: &str) -> Option<SchemaUnit> {
    schema.get(key).and_then(Value::as_object).map(|value| SchemaUnit {
        key: key.to_string(),
        value: value.clone(),
    })
}
