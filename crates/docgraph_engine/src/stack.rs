//! Ordered stack of pending remote operations.

use crate::error::{EngineError, EngineResult};
use docgraph_protocol::{Operation, Pointer};

/// Lifecycle of one change-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackState {
    /// Operations may be appended.
    #[default]
    Accumulating,
    /// A flush is sending the operations.
    Executing,
    /// Every operation was delivered.
    Idle,
    /// A flush stopped partway; the stack holds the unsent remainder.
    Failed,
}

impl StackState {
    /// Returns true if operations may still be appended.
    pub fn accepts_operations(&self) -> bool {
        matches!(self, StackState::Accumulating)
    }

    /// Returns true if the stack may be flushed.
    pub fn can_execute(&self) -> bool {
        matches!(self, StackState::Accumulating | StackState::Failed)
    }
}

/// Pending operations of one logical change-set, in append order, plus the
/// entities to re-fetch once they are delivered.
///
/// A stack is owned by the call chain building the change-set and passed
/// by `&mut` into every staging call. Dropping it discards the change-set
/// without remote side effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationStack {
    operations: Vec<Operation>,
    sync_records: Vec<Pointer>,
    state: StackState,
}

impl OperationStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation.
    ///
    /// Fails once a flush has started for this stack.
    pub fn push(&mut self, operation: Operation) -> EngineResult<()> {
        self.ensure_accepting()?;
        self.operations.push(operation);
        Ok(())
    }

    /// Appends several operations in order.
    pub fn extend(&mut self, operations: impl IntoIterator<Item = Operation>) -> EngineResult<()> {
        self.ensure_accepting()?;
        self.operations.extend(operations);
        Ok(())
    }

    /// Records an entity for post-flush refresh. Duplicates are ignored.
    pub fn record_sync(&mut self, pointer: Pointer) {
        if !self.sync_records.contains(&pointer) {
            self.sync_records.push(pointer);
        }
    }

    /// Moves every operation and sync record of `other` onto this stack.
    pub fn append(&mut self, other: OperationStack) -> EngineResult<()> {
        self.extend(other.operations)?;
        for pointer in other.sync_records {
            self.record_sync(pointer);
        }
        Ok(())
    }

    /// Returns the pending operations in append order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the entities to refresh after a flush.
    pub fn sync_records(&self) -> &[Pointer] {
        &self.sync_records
    }

    /// Returns the number of pending operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if no operation is pending.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Returns the current state.
    pub fn state(&self) -> StackState {
        self.state
    }

    /// Moves the stack into `Executing` and hands out its contents.
    pub(crate) fn begin_flush(&mut self) -> EngineResult<(Vec<Operation>, Vec<Pointer>)> {
        if !self.state.can_execute() {
            return Err(self.transition_error(StackState::Executing));
        }
        self.state = StackState::Executing;
        Ok((
            std::mem::take(&mut self.operations),
            std::mem::take(&mut self.sync_records),
        ))
    }

    /// Marks the flush as fully delivered.
    pub(crate) fn finish_flush(&mut self) {
        self.state = StackState::Idle;
    }

    /// Builds the remainder of a failed flush.
    pub(crate) fn failed(operations: Vec<Operation>, sync_records: Vec<Pointer>) -> Self {
        Self {
            operations,
            sync_records,
            state: StackState::Failed,
        }
    }

    /// Fails unless operations may be appended.
    ///
    /// Staging calls check this before they touch the cache, so a rejected
    /// call leaves no local trace.
    pub fn ensure_accepting(&self) -> EngineResult<()> {
        if self.state.accepts_operations() {
            Ok(())
        } else {
            Err(self.transition_error(StackState::Accumulating))
        }
    }

    fn transition_error(&self, to: StackState) -> EngineError {
        EngineError::InvalidStateTransition {
            from: format!("{:?}", self.state),
            to: format!("{to:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_protocol::Table;
    use serde_json::json;

    fn op(id: &str) -> Operation {
        Operation::update(Table::Block, id, &[], json!({ "title": id }))
    }

    #[test]
    fn stack_state_checks() {
        assert!(StackState::Accumulating.accepts_operations());
        assert!(!StackState::Failed.accepts_operations());
        assert!(StackState::Failed.can_execute());
        assert!(!StackState::Executing.can_execute());
        assert!(!StackState::Idle.can_execute());
    }

    #[test]
    fn push_preserves_order() {
        let mut stack = OperationStack::new();
        for id in ["a", "b", "c"] {
            stack.push(op(id)).unwrap();
        }
        let ids: Vec<_> = stack.operations().iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn sync_records_are_deduplicated() {
        let mut stack = OperationStack::new();
        stack.record_sync(Pointer::new(Table::Block, "a"));
        stack.record_sync(Pointer::new(Table::Block, "a"));
        stack.record_sync(Pointer::new(Table::Collection, "a"));
        assert_eq!(stack.sync_records().len(), 2);
    }

    #[test]
    fn append_combines_change_sets() {
        let mut first = OperationStack::new();
        first.push(op("a")).unwrap();
        first.record_sync(Pointer::new(Table::Block, "a"));

        let mut second = OperationStack::new();
        second.push(op("b")).unwrap();
        second.record_sync(Pointer::new(Table::Block, "a"));
        second.record_sync(Pointer::new(Table::Block, "b"));

        first.append(second).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.sync_records().len(), 2);
    }

    #[test]
    fn push_rejected_after_flush_began() {
        let mut stack = OperationStack::new();
        stack.push(op("a")).unwrap();
        let (operations, _) = stack.begin_flush().unwrap();
        assert_eq!(operations.len(), 1);
        assert_eq!(stack.state(), StackState::Executing);

        let result = stack.push(op("b"));
        assert!(matches!(
            result,
            Err(EngineError::InvalidStateTransition { .. })
        ));
        assert!(stack.begin_flush().is_err());

        stack.finish_flush();
        assert_eq!(stack.state(), StackState::Idle);
        assert!(stack.push(op("c")).is_err());
    }

    #[test]
    fn failed_remainder_can_be_flushed_again() {
        let mut remainder = OperationStack::failed(vec![op("b")], Vec::new());
        assert!(remainder.push(op("c")).is_err());
        let (operations, _) = remainder.begin_flush().unwrap();
        assert_eq!(operations[0].id, "b");
    }
}
