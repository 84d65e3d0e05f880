//! Per-entity handles that wrappers build on.

use crate::config::last_edited_props;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::executor::Execution;
use crate::iterate::Iteration;
use crate::loader::LazyLoader;
use crate::observer::Action;
use crate::resolver::{resolve, ChildRelation};
use crate::select::{select, Selector};
use crate::stack::OperationStack;
use crate::transport::RemoteTransport;
use docgraph_protocol::{Operation, Pointer, Position, Record, Table};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A handle on one cached entity.
///
/// Typed wrappers (pages, collections, views, ...) hold a `DataHandle` and
/// supply relations and transforms; the handle owns the cache and stack
/// bookkeeping. Each handle lazily loads its subtree the first time a
/// child query runs.
pub struct DataHandle<'e, T: RemoteTransport> {
    pub(crate) engine: &'e Engine<T>,
    pub(crate) pointer: Pointer,
    loader: LazyLoader,
}

impl<'e, T: RemoteTransport> DataHandle<'e, T> {
    pub(crate) fn new(engine: &'e Engine<T>, pointer: Pointer) -> Self {
        Self {
            engine,
            pointer,
            loader: LazyLoader::new(),
        }
    }

    /// Returns the entity id.
    pub fn id(&self) -> &str {
        &self.pointer.id
    }

    /// Returns the entity table.
    pub fn table(&self) -> Table {
        self.pointer.table
    }

    /// Returns the entity address.
    pub fn pointer(&self) -> &Pointer {
        &self.pointer
    }

    /// Returns the engine.
    pub fn engine(&self) -> &'e Engine<T> {
        self.engine
    }

    /// Returns true once this handle has loaded its subtree.
    pub fn is_initialized(&self) -> bool {
        self.loader.is_initialized()
    }

    /// Returns a copy of the cached record.
    ///
    /// A dead record is still returned; the read is reported as stale.
    pub fn cached_data(&self) -> EngineResult<Record> {
        self.engine
            .get(self.pointer.table, &self.pointer.id)
            .ok_or_else(|| self.missing())
    }

    /// Re-fetches this entity.
    pub fn refresh(&self) -> EngineResult<()> {
        self.engine.refresh(std::slice::from_ref(&self.pointer))?;
        Ok(())
    }

    /// Removes this entity from the cache entirely.
    pub fn delete_cached_data(&self) -> Option<Record> {
        self.engine
            .cache_mut()
            .delete(self.pointer.table, &self.pointer.id)
    }

    /// Loads this entity's subtree unless this handle already did.
    pub fn ensure_loaded(&mut self) -> EngineResult<()> {
        self.loader.ensure_loaded(self.engine, &self.pointer)
    }

    /// Returns the stored child relation of this entity.
    pub fn relation(&self) -> EngineResult<ChildRelation> {
        let cache = self.engine.cache();
        let record = cache
            .peek(self.pointer.table, &self.pointer.id)
            .ok_or_else(|| self.missing())?;
        ChildRelation::detect(self.pointer.table, record).ok_or_else(|| EngineError::NoRelation {
            pointer: self.pointer.clone(),
        })
    }

    /// Writes the allowed keys of `patch` to the cached record.
    ///
    /// Keys not in `keys` are ignored. The matching update operation is
    /// appended to `stack` when one is given, and the entity is recorded
    /// for refresh. User settings live under the `settings` field. Returns
    /// the keys written.
    pub fn update_locally(
        &self,
        stack: Option<&mut OperationStack>,
        patch: &Map<String, Value>,
        keys: &[&str],
    ) -> EngineResult<Vec<String>> {
        if let Some(stack) = stack.as_deref() {
            stack.ensure_accepting()?;
        }
        let mut allowed: Map<String, Value> = patch
            .iter()
            .filter(|(key, _)| keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if allowed.is_empty() {
            return Ok(Vec::new());
        }
        let written: Vec<String> = allowed.keys().cloned().collect();

        let path: &[&str] = match self.pointer.table {
            Table::UserSettings => &["settings"],
            _ => {
                allowed.extend(last_edited_props(&self.engine.config().user_id));
                &[]
            }
        };
        let operation = Operation::update(
            self.pointer.table,
            self.pointer.id.as_str(),
            path,
            Value::Object(allowed),
        );
        {
            let mut cache = self.engine.cache_mut();
            let record = cache
                .get_mut(self.pointer.table, &self.pointer.id)
                .ok_or_else(|| self.missing())?;
            operation.apply_to(record)?;
        }

        if let Some(stack) = stack {
            stack.push(operation)?;
            stack.record_sync(self.pointer.clone());
        }
        self.engine
            .observer()
            .record(Action::Update, self.pointer.table.as_str(), &self.pointer.id);
        Ok(written)
    }

    /// Places `child_id` in this entity's stored child list.
    pub fn add_to_child_array(
        &self,
        stack: &mut OperationStack,
        child_id: &str,
        position: &Position,
    ) -> EngineResult<()> {
        stack.ensure_accepting()?;
        let relation = self.relation()?;
        let path = relation.path().ok_or_else(|| EngineError::NoRelation {
            pointer: self.pointer.clone(),
        })?;
        self.insert_child(stack, path, child_id, position)
    }

    /// Creates a child optimistically and attaches it to this entity.
    ///
    /// The child gets a fresh id unless `record` carries one, plus parent
    /// back-references. A `set` operation is appended, followed by a list
    /// insert at `position` when the relation is stored. Returns the id.
    pub fn create_child(
        &self,
        stack: &mut OperationStack,
        relation: &ChildRelation,
        record: Record,
        position: &Position,
    ) -> EngineResult<String> {
        stack.ensure_accepting()?;
        let id = record
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut record = record;
        record.set("id", id.as_str());
        record.set_alive(true);
        record.set("parent_id", self.pointer.id.as_str());
        record.set("parent_table", self.pointer.table.as_str());
        let config = self.engine.config();
        if !config.space_id.is_empty() && record.get("space_id").is_none() {
            record.set("space_id", config.space_id.as_str());
        }
        record.merge(&last_edited_props(&config.user_id));

        let child = Pointer::new(relation.child_table, id.as_str());
        stack.push(Operation::set(
            child.table,
            id.as_str(),
            &[],
            record.clone().into_value(),
        ))?;
        self.engine.cache_mut().put(child.table, id.as_str(), record);
        if let Some(path) = relation.path() {
            self.insert_child(stack, path, &id, position)?;
        }
        stack.record_sync(child);
        self.engine
            .observer()
            .record(Action::Create, relation.child_table.as_str(), &id);
        Ok(id)
    }

    /// Returns the ids of the selected children, loading the subtree first.
    pub fn get_children<D>(
        &mut self,
        relation: &ChildRelation,
        selector: Selector<'_, D>,
        multiple: bool,
        transform: impl FnMut(&Record) -> Option<D>,
    ) -> EngineResult<Vec<String>> {
        self.ensure_loaded()?;
        let mut selector = selector;
        let mut transform = transform;
        let candidates = resolve(&self.engine.cache(), &self.pointer, relation)?;
        let matched = select(&candidates, &mut selector, multiple, |id| {
            let record = self.engine.cache().peek(relation.child_table, id).cloned()?;
            transform(&record)
        });
        let observer = self.engine.observer();
        for id in &matched {
            observer.record(Action::Read, relation.child_table.as_str(), id);
        }
        Ok(matched)
    }

    /// Returns the first selected child, if any.
    pub fn get_child<D>(
        &mut self,
        relation: &ChildRelation,
        selector: Selector<'_, D>,
        transform: impl FnMut(&Record) -> Option<D>,
    ) -> EngineResult<Option<String>> {
        Ok(self
            .get_children(relation, selector, false, transform)?
            .into_iter()
            .next())
    }

    /// Patches the selected children, loading the subtree first.
    ///
    /// See [`Iteration::update`].
    pub fn update_children<D>(
        &mut self,
        stack: &mut OperationStack,
        relation: &ChildRelation,
        targets: Selector<'_, D>,
        multiple: bool,
        transform: impl FnMut(&Record) -> Option<D>,
        patch_source: impl FnMut(&str, &D) -> Option<Map<String, Value>>,
    ) -> EngineResult<Vec<String>> {
        stack.ensure_accepting()?;
        self.ensure_loaded()?;
        let candidates = resolve(&self.engine.cache(), &self.pointer, relation)?;
        let mut iteration = Iteration::new(
            self.engine.cache_lock(),
            stack,
            self.engine.observer(),
            &self.pointer,
            relation,
        )
        .edited_by(&self.engine.config().user_id)
        .multiple(multiple);
        iteration.update(&candidates, targets, transform, patch_source)
    }

    /// Soft-deletes the selected children, loading the subtree first.
    ///
    /// See [`Iteration::delete`].
    pub fn delete_children<D>(
        &mut self,
        stack: &mut OperationStack,
        relation: &ChildRelation,
        targets: Selector<'_, D>,
        multiple: bool,
        transform: impl FnMut(&Record) -> Option<D>,
    ) -> EngineResult<Vec<String>> {
        stack.ensure_accepting()?;
        self.ensure_loaded()?;
        let candidates = resolve(&self.engine.cache(), &self.pointer, relation)?;
        let mut iteration = Iteration::new(
            self.engine.cache_lock(),
            stack,
            self.engine.observer(),
            &self.pointer,
            relation,
        )
        .edited_by(&self.engine.config().user_id)
        .multiple(multiple);
        iteration.delete(&candidates, targets, transform)
    }

    /// Flushes `stack`, or hands it back when `execute` is false.
    pub fn execute(&self, stack: OperationStack, execute: bool) -> EngineResult<Execution> {
        self.engine.execute(stack, execute)
    }

    fn insert_child(
        &self,
        stack: &mut OperationStack,
        path: &str,
        child_id: &str,
        position: &Position,
    ) -> EngineResult<()> {
        let operation = {
            let mut cache = self.engine.cache_mut();
            let parent = cache
                .get_mut(self.pointer.table, &self.pointer.id)
                .ok_or_else(|| self.missing())?;
            let container = parent.id_list(path);
            let operation = position.to_operation(
                self.pointer.table,
                &self.pointer.id,
                path,
                child_id,
                &container,
            );
            parent.insert_child(path, child_id, position);
            operation
        };
        stack.push(operation)?;
        stack.record_sync(self.pointer.clone());
        Ok(())
    }

    fn missing(&self) -> EngineError {
        EngineError::MissingRecord {
            pointer: self.pointer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::observer::MemoryObserver;
    use crate::transport::MockTransport;
    use docgraph_protocol::{Command, RecordMap};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine_with(observer: Arc<MemoryObserver>) -> Engine<MockTransport> {
        let config = EngineConfig::new("u", "s", 1)
            .with_interval(Duration::ZERO)
            .with_observer(observer);
        Engine::new(config, MockTransport::new())
    }

    fn page_subtree(engine: &Engine<MockTransport>) {
        let mut record_map = RecordMap::new();
        record_map
            .insert(
                Table::Block,
                Record::new("p")
                    .with("type", "page")
                    .with("content", json!(["a", "b"])),
            )
            .unwrap();
        record_map
            .insert(Table::Block, Record::new("a").with("type", "text"))
            .unwrap();
        record_map
            .insert(Table::Block, Record::new("b").with("type", "todo"))
            .unwrap();
        engine
            .transport()
            .set_subtree(Pointer::new(Table::Block, "p"), record_map);
    }

    fn content() -> ChildRelation {
        ChildRelation::stored(Table::Block, "content")
    }

    fn block_type(record: &Record) -> Option<String> {
        record.block_type().map(str::to_string)
    }

    #[test]
    fn cached_data_of_missing_entity() {
        let engine = engine_with(Arc::new(MemoryObserver::new()));
        let handle = engine.handle(Table::Block, "nope");
        assert!(matches!(
            handle.cached_data(),
            Err(EngineError::MissingRecord { .. })
        ));
    }

    #[test]
    fn get_children_loads_and_selects() {
        let observer = Arc::new(MemoryObserver::new());
        let engine = engine_with(observer.clone());
        page_subtree(&engine);

        let mut handle = engine.handle(Table::Block, "p");
        assert!(!handle.is_initialized());
        let ids = handle
            .get_children(
                &content(),
                Selector::filter(|kind: &String, _| kind == "todo"),
                true,
                block_type,
            )
            .unwrap();
        assert_eq!(ids, vec!["b"]);
        assert!(handle.is_initialized());
        assert_eq!(observer.ids_for(Action::Read), vec!["b"]);

        let first = handle.get_child(&content(), Selector::All, block_type).unwrap();
        assert_eq!(first.as_deref(), Some("a"));
        let none = handle
            .get_child(&content(), Selector::id("zz"), block_type)
            .unwrap();
        assert!(none.is_none());
        assert_eq!(engine.transport().fetch_count(), 1);
    }

    #[test]
    fn update_locally_filters_keys() {
        let engine = engine_with(Arc::new(MemoryObserver::new()));
        engine
            .cache_mut()
            .put(Table::Collection, "c", Record::new("c").with("name", "Old"));
        let handle = engine.handle(Table::Collection, "c");
        let mut stack = OperationStack::new();

        let patch = json!({ "name": "New", "secret": 1 });
        let written = handle
            .update_locally(
                Some(&mut stack),
                patch.as_object().unwrap(),
                &["name", "icon"],
            )
            .unwrap();
        assert_eq!(written, vec!["name"]);

        let record = handle.cached_data().unwrap();
        assert_eq!(record.get("name").unwrap(), "New");
        assert!(record.get("secret").is_none());
        let args = &stack.operations()[0].args;
        assert_eq!(args["name"], "New");
        assert_eq!(args["last_edited_by_id"], "u");
        assert!(args.get("secret").is_none());
        assert_eq!(record.get("last_edited_by_id").unwrap(), "u");
        assert_eq!(stack.sync_records(), &[Pointer::new(Table::Collection, "c")]);

        let nothing = handle
            .update_locally(None, patch.as_object().unwrap(), &["icon"])
            .unwrap();
        assert!(nothing.is_empty());
    }

    #[test]
    fn update_locally_targets_settings_field() {
        let engine = engine_with(Arc::new(MemoryObserver::new()));
        engine
            .cache_mut()
            .put(Table::UserSettings, "u", Record::new("u"));
        let handle = engine.handle(Table::UserSettings, "u");
        let mut stack = OperationStack::new();

        let patch = json!({ "time_zone": "UTC" });
        handle
            .update_locally(Some(&mut stack), patch.as_object().unwrap(), &["time_zone"])
            .unwrap();
        assert_eq!(stack.operations()[0].path, vec!["settings"]);
        assert_eq!(
            handle.cached_data().unwrap().get("settings").unwrap()["time_zone"],
            "UTC"
        );
    }

    #[test]
    fn create_child_sets_then_attaches() {
        let observer = Arc::new(MemoryObserver::new());
        let engine = engine_with(observer.clone());
        engine.cache_mut().put(
            Table::Block,
            "p",
            Record::new("p")
                .with("type", "page")
                .with("content", json!(["a", "b"])),
        );
        let handle = engine.handle(Table::Block, "p");
        let mut stack = OperationStack::new();

        let id = handle
            .create_child(
                &mut stack,
                &content(),
                Record::from_value(json!({ "type": "text" })).unwrap(),
                &Position::Index(1),
            )
            .unwrap();

        let commands: Vec<_> = stack.operations().iter().map(|op| op.command).collect();
        assert_eq!(commands, vec![Command::Set, Command::ListBefore]);
        assert_eq!(stack.operations()[1].args, json!({ "id": id, "before": "b" }));

        let child = engine.get(Table::Block, &id).unwrap();
        assert_eq!(child.parent_id(), Some("p"));
        assert_eq!(child.parent_table(), Some(Table::Block));
        assert_eq!(child.get("space_id").unwrap(), "s");
        assert_eq!(
            engine.get(Table::Block, "p").unwrap().id_list("content"),
            vec!["a".to_string(), id.clone(), "b".to_string()]
        );
        assert_eq!(observer.ids_for(Action::Create), vec![id]);
    }

    #[test]
    fn create_derived_child_has_no_list_insert() {
        let engine = engine_with(Arc::new(MemoryObserver::new()));
        engine
            .cache_mut()
            .put(Table::Collection, "c", Record::new("c"));
        let handle = engine.handle(Table::Collection, "c");
        let mut stack = OperationStack::new();

        let id = handle
            .create_child(
                &mut stack,
                &ChildRelation::rows(),
                Record::new("row").with("type", "page"),
                &Position::End,
            )
            .unwrap();
        assert_eq!(id, "row");
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.operations()[0].command, Command::Set);
    }

    #[test]
    fn add_to_child_array_requires_relation() {
        let engine = engine_with(Arc::new(MemoryObserver::new()));
        engine
            .cache_mut()
            .put(Table::Block, "t", Record::new("t").with("type", "text"));
        let handle = engine.handle(Table::Block, "t");
        let mut stack = OperationStack::new();
        let result = handle.add_to_child_array(&mut stack, "x", &Position::End);
        assert!(matches!(result, Err(EngineError::NoRelation { .. })));
    }

    #[test]
    fn delete_cached_data_is_hard() {
        let engine = engine_with(Arc::new(MemoryObserver::new()));
        engine.cache_mut().put(Table::Space, "s", Record::new("s"));
        let handle = engine.handle(Table::Space, "s");
        assert!(handle.delete_cached_data().is_some());
        assert!(engine.get(Table::Space, "s").is_none());
    }

    #[test]
    fn rejected_stack_stages_nothing_locally() {
        let engine = engine_with(Arc::new(MemoryObserver::new()));
        page_subtree(&engine);
        let mut handle = engine.handle(Table::Block, "p");
        handle.ensure_loaded().unwrap();
        let mut remainder = OperationStack::failed(Vec::new(), Vec::new());

        let created = handle.create_child(
            &mut remainder,
            &content(),
            Record::new("n").with("type", "text"),
            &Position::End,
        );
        assert!(matches!(
            created,
            Err(EngineError::InvalidStateTransition { .. })
        ));
        assert!(engine.get(Table::Block, "n").is_none());

        let patch = json!({ "title": "x" });
        let updated =
            handle.update_locally(Some(&mut remainder), patch.as_object().unwrap(), &["title"]);
        assert!(updated.is_err());
        assert!(engine.get(Table::Block, "p").unwrap().get("title").is_none());

        let deleted =
            handle.delete_children(&mut remainder, &content(), Selector::id("a"), false, block_type);
        assert!(deleted.is_err());
        assert!(engine.get(Table::Block, "a").unwrap().alive());
        assert_eq!(
            engine.get(Table::Block, "p").unwrap().id_list("content"),
            vec!["a", "b"]
        );
        assert!(remainder.is_empty());
    }
}
