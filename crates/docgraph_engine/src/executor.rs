//! Flushing operation stacks to the remote service.

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::stack::OperationStack;
use crate::transport::RemoteTransport;
use docgraph_protocol::{Operation, SubmitTransactionRequest, Transaction};
use std::time::Instant;
use uuid::Uuid;

/// Outcome of [`Engine::execute`].
#[derive(Debug)]
pub enum Execution {
    /// Execution was deferred; the stack is handed back unchanged.
    Staged(OperationStack),
    /// Every operation was delivered and the sync records refreshed.
    Flushed(FlushSummary),
}

impl Execution {
    /// Returns the stack of a deferred execution.
    pub fn into_stack(self) -> Option<OperationStack> {
        match self {
            Execution::Staged(stack) => Some(stack),
            Execution::Flushed(_) => None,
        }
    }

    /// Returns the summary of a completed flush.
    pub fn summary(&self) -> Option<&FlushSummary> {
        match self {
            Execution::Staged(_) => None,
            Execution::Flushed(summary) => Some(summary),
        }
    }

    /// Returns true if the stack was flushed.
    pub fn is_flushed(&self) -> bool {
        matches!(self, Execution::Flushed(_))
    }
}

/// What a completed flush did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushSummary {
    /// Operations delivered.
    pub operations: usize,
    /// Submit calls made.
    pub batches: usize,
    /// Records re-fetched afterwards.
    pub refreshed: usize,
}

impl<T: RemoteTransport> Engine<T> {
    /// Flushes `stack`, or hands it back when `execute` is false.
    ///
    /// Operations are sent in append order, at most `max_batch_size` per
    /// submit call, with the pacing interval between calls. There are no
    /// retries: on the first failed submit the unsent remainder comes back
    /// in [`EngineError::FlushFailed`] and can be executed again. Cached
    /// optimistic writes are not rolled back.
    ///
    /// After every operation is delivered the stack's sync records are
    /// re-fetched so server-computed fields reach the cache.
    pub fn execute(&self, mut stack: OperationStack, execute: bool) -> EngineResult<Execution> {
        if !execute {
            return Ok(Execution::Staged(stack));
        }

        let (operations, sync_records) = stack.begin_flush()?;
        let batch_size = self.config().max_batch_size.max(1);
        let mut summary = FlushSummary::default();

        for batch in operations.chunks(batch_size) {
            let request = self.transaction(batch.to_vec());
            tracing::debug!(
                request_id = %request.request_id,
                operations = batch.len(),
                "submitting batch"
            );

            if let Err(error) = self.paced(|| self.transport().submit_transaction(&request)) {
                self.handle_error(&error);
                let remaining = operations[summary.operations..].to_vec();
                return Err(EngineError::FlushFailed {
                    sent: summary.operations,
                    remaining: Box::new(OperationStack::failed(remaining, sync_records)),
                    source: Box::new(error),
                });
            }

            summary.operations += batch.len();
            summary.batches += 1;
            let mut stats = self.stats_mut();
            stats.batches_sent += 1;
            stats.operations_sent += batch.len() as u64;
        }

        stack.finish_flush();
        {
            let mut stats = self.stats_mut();
            stats.flushes_completed += 1;
            stats.last_flush_time = Some(Instant::now());
            stats.last_error = None;
        }

        summary.refreshed =
            self.refresh(&sync_records)
                .map_err(|error| EngineError::RefreshFailed {
                    records: sync_records.clone(),
                    source: Box::new(error),
                })?;

        tracing::debug!(
            operations = summary.operations,
            batches = summary.batches,
            refreshed = summary.refreshed,
            "flush complete"
        );
        Ok(Execution::Flushed(summary))
    }

    fn transaction(&self, operations: Vec<Operation>) -> SubmitTransactionRequest {
        let config = self.config();
        SubmitTransactionRequest {
            request_id: Uuid::new_v4().to_string(),
            transactions: vec![Transaction {
                id: Uuid::new_v4().to_string(),
                space_id: config.space_id.clone(),
                shard_id: config.shard_id,
                operations,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::stack::StackState;
    use crate::transport::MockTransport;
    use docgraph_protocol::{Pointer, Record, Table};
    use serde_json::json;
    use std::time::Duration;

    fn engine(batch: usize) -> Engine<MockTransport> {
        let config = EngineConfig::new("u", "space", 3)
            .with_interval(Duration::ZERO)
            .with_max_batch_size(batch);
        Engine::new(config, MockTransport::new())
    }

    fn stack(ids: &[&str]) -> OperationStack {
        let mut stack = OperationStack::new();
        for id in ids {
            stack
                .push(Operation::update(Table::Block, *id, &[], json!({ "n": id })))
                .unwrap();
        }
        stack
    }

    #[test]
    fn deferred_execution_returns_stack() {
        let engine = engine(10);
        let execution = engine.execute(stack(&["a", "b"]), false).unwrap();
        assert!(!execution.is_flushed());
        let stack = execution.into_stack().unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.state(), StackState::Accumulating);
        assert!(engine.transport().submissions().is_empty());
    }

    #[test]
    fn flush_batches_in_order() {
        let engine = engine(2);
        let execution = engine.execute(stack(&["a", "b", "c"]), true).unwrap();
        assert_eq!(
            execution.summary(),
            Some(&FlushSummary {
                operations: 3,
                batches: 2,
                refreshed: 0
            })
        );

        let submissions = engine.transport().submissions();
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].operations.len(), 2);
        let ids: Vec<_> = engine
            .transport()
            .submitted_operations()
            .into_iter()
            .map(|op| op.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let stats = engine.stats();
        assert_eq!(stats.flushes_completed, 1);
        assert_eq!(stats.batches_sent, 2);
        assert_eq!(stats.operations_sent, 3);
    }

    #[test]
    fn empty_flush_makes_no_calls() {
        let engine = engine(10);
        let execution = engine.execute(OperationStack::new(), true).unwrap();
        assert_eq!(execution.summary().unwrap().batches, 0);
        assert!(engine.transport().submissions().is_empty());
        assert_eq!(engine.transport().refresh_count(), 0);
    }

    #[test]
    fn flush_refreshes_sync_records() {
        let engine = engine(10);
        let pointer = Pointer::new(Table::Block, "a");
        engine.transport().insert_record(&pointer, Record::new("a"));
        engine.cache_mut().put(Table::Block, "a", Record::new("a"));

        let mut stack = stack(&["a"]);
        stack.record_sync(pointer);
        let execution = engine.execute(stack, true).unwrap();
        assert_eq!(execution.summary().unwrap().refreshed, 1);

        // The server bumped the version; the cache now has it.
        let cached = engine.get(Table::Block, "a").unwrap();
        assert_eq!(cached.get("version").unwrap(), 1);
        assert_eq!(cached.get("n").unwrap(), "a");
    }

    #[test]
    fn failed_batch_returns_remainder() {
        let engine = engine(1);
        engine.transport().fail_submission_at(1);

        let mut stack = stack(&["a", "b", "c"]);
        stack.record_sync(Pointer::new(Table::Block, "a"));
        let err = engine.execute(stack, true).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, EngineError::FlushFailed { sent: 1, .. }));

        let remaining = err.into_remaining().unwrap();
        assert_eq!(remaining.state(), StackState::Failed);
        let ids: Vec<_> = remaining.operations().iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(remaining.sync_records().len(), 1);
        assert_eq!(engine.stats().failures, 1);

        let execution = engine.execute(remaining, true).unwrap();
        assert_eq!(execution.summary().unwrap().operations, 2);
        let ids: Vec<_> = engine
            .transport()
            .submitted_operations()
            .into_iter()
            .map(|op| op.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn failed_refresh_is_reported() {
        let engine = engine(10);
        let mut stack = stack(&["a"]);
        stack.record_sync(Pointer::new(Table::Block, "a"));
        engine.transport().fail_fetches(true);

        let err = engine.execute(stack, true).unwrap_err();
        match err {
            EngineError::RefreshFailed { records, .. } => assert_eq!(records.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.transport().submitted_operations().len(), 1);
    }

    #[test]
    fn transactions_carry_space_and_shard() {
        let engine = engine(10);
        let request = engine.transaction(Vec::new());
        assert_eq!(request.transactions[0].space_id, "space");
        assert_eq!(request.transactions[0].shard_id, 3);
        assert_ne!(request.request_id, request.transactions[0].id);
    }
}
