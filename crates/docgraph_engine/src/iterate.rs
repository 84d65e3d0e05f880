//! Update and delete iteration over a parent's children.

use crate::cache::EntityCache;
use crate::config::last_edited_props;
use crate::error::EngineResult;
use crate::observer::{Action, Observer};
use crate::resolver::ChildRelation;
use crate::select::{select, Selector};
use crate::stack::OperationStack;
use docgraph_protocol::{Operation, Pointer, Record, Table};
use parking_lot::RwLock;
use serde_json::{Map, Value};

/// One update or delete pass over the children of `parent`.
///
/// Every matched child is changed in the cache first, then the matching
/// remote operations are appended to the stack and the child is recorded
/// for refresh.
///
/// The cache lock is only held to copy a record out or to write a change
/// back. Transforms, selectors, patch sources and the observer run without
/// it, so they may read the engine.
pub struct Iteration<'a> {
    cache: &'a RwLock<EntityCache>,
    stack: &'a mut OperationStack,
    observer: &'a dyn Observer,
    parent: &'a Pointer,
    relation: &'a ChildRelation,
    subject: &'a str,
    editor: Option<&'a str>,
    multiple: bool,
}

impl<'a> Iteration<'a> {
    /// Creates an iteration matching any number of children.
    pub fn new(
        cache: &'a RwLock<EntityCache>,
        stack: &'a mut OperationStack,
        observer: &'a dyn Observer,
        parent: &'a Pointer,
        relation: &'a ChildRelation,
    ) -> Self {
        Self {
            cache,
            stack,
            observer,
            parent,
            relation,
            subject: relation.child_table.as_str(),
            editor: None,
            multiple: true,
        }
    }

    /// Sets the name reported to the observer.
    pub fn subject(mut self, subject: &'a str) -> Self {
        self.subject = subject;
        self
    }

    /// Stamps `last_edited_*` fields naming `user_id` on every change.
    pub fn edited_by(mut self, user_id: &'a str) -> Self {
        self.editor = Some(user_id);
        self
    }

    /// Limits the pass to the first match when `multiple` is false.
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Patches the selected children.
    ///
    /// `transform` turns a cached record into what `targets` and
    /// `patch_source` see. `patch_source` returns the fields to change, or
    /// `None` to leave the child alone. Returns the ids that were patched.
    /// Fails without touching the cache if the stack no longer accepts
    /// operations.
    pub fn update<T>(
        &mut self,
        candidates: &[String],
        mut targets: Selector<'_, T>,
        mut transform: impl FnMut(&Record) -> Option<T>,
        mut patch_source: impl FnMut(&str, &T) -> Option<Map<String, Value>>,
    ) -> EngineResult<Vec<String>> {
        self.stack.ensure_accepting()?;
        let table = self.relation.child_table;
        let matched = self.select(candidates, &mut targets, &mut transform);

        let mut updated = Vec::new();
        for id in matched {
            let Some(record) = self.snapshot(table, &id) else {
                tracing::warn!(%table, %id, "selected child is not cached, skipping");
                continue;
            };
            let Some(data) = transform(&record) else {
                continue;
            };
            let Some(mut patch) = patch_source(&id, &data).filter(|patch| !patch.is_empty())
            else {
                continue;
            };
            if let Some(user_id) = self.editor {
                patch.extend(last_edited_props(user_id));
            }

            let applied = match self.cache.write().get_mut(table, &id) {
                Some(record) => {
                    record.merge(&patch);
                    true
                }
                None => false,
            };
            if !applied {
                tracing::warn!(%table, %id, "child left the cache during update, skipping");
                continue;
            }

            self.stack
                .push(Operation::update(table, id.as_str(), &[], Value::Object(patch)))?;
            self.stack.record_sync(Pointer::new(table, id.as_str()));
            self.observer.record(Action::Update, self.subject, &id);
            updated.push(id);
        }
        Ok(updated)
    }

    /// Soft-deletes the selected children.
    ///
    /// A live child is marked dead and gets an `alive = false` update; a
    /// stored relation also gets a list removal on the parent. A child that
    /// is already dead still counts as deleted but appends nothing.
    /// Returns the ids that were matched. Fails without touching the cache
    /// if the stack no longer accepts operations.
    pub fn delete<T>(
        &mut self,
        candidates: &[String],
        mut targets: Selector<'_, T>,
        mut transform: impl FnMut(&Record) -> Option<T>,
    ) -> EngineResult<Vec<String>> {
        self.stack.ensure_accepting()?;
        let table = self.relation.child_table;
        let matched = self.select(candidates, &mut targets, &mut transform);

        let mut deleted = Vec::new();
        for id in matched {
            let mut patch = Map::new();
            patch.insert("alive".into(), Value::Bool(false));
            if let Some(user_id) = self.editor {
                patch.extend(last_edited_props(user_id));
            }

            let was_alive = {
                let mut cache = self.cache.write();
                let was_alive = cache.mark_dead(table, &id);
                if was_alive == Some(true) {
                    if let Some(record) = cache.get_mut(table, &id) {
                        record.merge(&patch);
                    }
                    if let Some(path) = self.relation.path() {
                        if let Some(parent) = cache.get_mut(self.parent.table, &self.parent.id) {
                            parent.remove_child(path, &id);
                        }
                    }
                }
                was_alive
            };

            match was_alive {
                None => {
                    tracing::warn!(%table, %id, "selected child is not cached, skipping");
                    continue;
                }
                Some(false) => {
                    tracing::debug!(%table, %id, "child already deleted");
                }
                Some(true) => {
                    self.stack
                        .push(Operation::update(table, id.as_str(), &[], Value::Object(patch)))?;
                    if let Some(path) = self.relation.path() {
                        self.stack.push(Operation::list_remove(
                            self.parent.table,
                            self.parent.id.as_str(),
                            &[path],
                            &id,
                        ))?;
                        self.stack.record_sync(self.parent.clone());
                    }
                    self.stack.record_sync(Pointer::new(table, id.as_str()));
                }
            }
            self.observer.record(Action::Delete, self.subject, &id);
            deleted.push(id);
        }
        Ok(deleted)
    }

    fn select<T>(
        &self,
        candidates: &[String],
        targets: &mut Selector<'_, T>,
        transform: &mut impl FnMut(&Record) -> Option<T>,
    ) -> Vec<String> {
        let table = self.relation.child_table;
        select(candidates, targets, self.multiple, |id| {
            self.snapshot(table, id).and_then(|record| transform(&record))
        })
    }

    fn snapshot(&self, table: Table, id: &str) -> Option<Record> {
        self.cache.read().peek(table, id).cloned()
    }
}
