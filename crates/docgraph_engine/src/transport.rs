//! Transport layer abstraction for remote calls.

use crate::error::{EngineError, EngineResult};
use docgraph_protocol::{
    Operation, Pointer, Record, RecordMap, SubmitTransactionRequest, SubtreeRequest,
    SubtreeResponse, SyncRecordValuesRequest, SyncRecordValuesResponse,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// A remote transport handles network communication with the service.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, mock for testing, etc.).
pub trait RemoteTransport: Send + Sync {
    /// Fetches an entity and everything below it.
    fn load_subtree(&self, request: &SubtreeRequest) -> EngineResult<SubtreeResponse>;

    /// Fetches the current values of specific entities.
    fn sync_record_values(
        &self,
        request: &SyncRecordValuesRequest,
    ) -> EngineResult<SyncRecordValuesResponse>;

    /// Submits operations. The service applies them in order.
    fn submit_transaction(&self, request: &SubmitTransactionRequest) -> EngineResult<()>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> EngineResult<()>;
}

/// One submit call received by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct Submission {
    /// When the call arrived.
    pub at: Instant,
    /// Operations it carried, in order.
    pub operations: Vec<Operation>,
}

/// An in-memory remote service for testing.
///
/// Submitted operations are applied to a server-side record store, so a
/// refresh after a flush observes them. Every submit bumps the `version`
/// field of the records it touches, standing in for server-computed
/// fields.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    store: Mutex<RecordMap>,
    subtrees: Mutex<HashMap<Pointer, RecordMap>>,
    submissions: Mutex<Vec<Submission>>,
    fetch_count: AtomicUsize,
    refresh_count: AtomicUsize,
    submit_count: AtomicUsize,
    fail_submission_at: Mutex<Option<usize>>,
    fail_fetches: AtomicBool,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            store: Mutex::new(RecordMap::new()),
            subtrees: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            fetch_count: AtomicUsize::new(0),
            refresh_count: AtomicUsize::new(0),
            submit_count: AtomicUsize::new(0),
            fail_submission_at: Mutex::new(None),
            fail_fetches: AtomicBool::new(false),
        }
    }

    /// Sets the records returned for a subtree load of `root`. The records
    /// are also stored server-side.
    pub fn set_subtree(&self, root: Pointer, record_map: RecordMap) {
        self.store.lock().merge(record_map.clone());
        self.subtrees.lock().insert(root, record_map);
    }

    /// Stores a record server-side.
    pub fn insert_record(&self, pointer: &Pointer, record: Record) {
        // The pointer id wins over the record's own id field.
        let record = record.with("id", pointer.id.as_str());
        let _ = self.store.lock().insert(pointer.table, record);
    }

    /// Returns the server-side copy of a record.
    pub fn record(&self, pointer: &Pointer) -> Option<Record> {
        self.store.lock().get(pointer.table, &pointer.id).cloned()
    }

    /// Makes the `n`th submit call (zero-based) fail with a retryable
    /// transport error. Later calls succeed again.
    pub fn fail_submission_at(&self, n: usize) {
        *self.fail_submission_at.lock() = Some(self.submit_count.load(Ordering::SeqCst) + n);
    }

    /// Makes every subtree load and refresh fail.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Clears injected failures.
    pub fn clear_failures(&self) {
        *self.fail_submission_at.lock() = None;
        self.fail_fetches.store(false, Ordering::SeqCst);
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns the number of subtree loads served.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Returns the number of record syncs served.
    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Returns every successful submit call.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    /// Returns every successfully submitted operation in arrival order.
    pub fn submitted_operations(&self) -> Vec<Operation> {
        self.submissions
            .lock()
            .iter()
            .flat_map(|submission| submission.operations.iter().cloned())
            .collect()
    }

    fn check_connected(&self) -> EngineResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(EngineError::NotConnected)
        }
    }

    fn check_fetch(&self) -> EngineResult<()> {
        self.check_connected()?;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(EngineError::transport_retryable("injected fetch failure"));
        }
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteTransport for MockTransport {
    fn load_subtree(&self, request: &SubtreeRequest) -> EngineResult<SubtreeResponse> {
        self.check_fetch()?;
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        if let Some(record_map) = self.subtrees.lock().get(&request.pointer) {
            return Ok(SubtreeResponse::new(record_map.clone()));
        }
        let mut record_map = RecordMap::new();
        if let Some(record) = self.record(&request.pointer) {
            record_map.insert(request.pointer.table, record)?;
        }
        Ok(SubtreeResponse::new(record_map))
    }

    fn sync_record_values(
        &self,
        request: &SyncRecordValuesRequest,
    ) -> EngineResult<SyncRecordValuesResponse> {
        self.check_fetch()?;
        self.refresh_count.fetch_add(1, Ordering::SeqCst);

        let store = self.store.lock();
        let mut record_map = RecordMap::new();
        for entry in &request.requests {
            if let Some(record) = store.get(entry.pointer.table, &entry.pointer.id) {
                record_map.insert(entry.pointer.table, record.clone())?;
            }
        }
        Ok(SyncRecordValuesResponse { record_map })
    }

    fn submit_transaction(&self, request: &SubmitTransactionRequest) -> EngineResult<()> {
        self.check_connected()?;
        let call = self.submit_count.fetch_add(1, Ordering::SeqCst);
        if *self.fail_submission_at.lock() == Some(call) {
            return Err(EngineError::transport_retryable("injected submit failure"));
        }

        let mut store = self.store.lock();
        for operation in request.operations() {
            if store.get(operation.table, &operation.id).is_none() {
                store.insert(operation.table, Record::new(operation.id.as_str()))?;
            }
            if let Some(record) = store.get_mut(operation.table, &operation.id) {
                operation.apply_to(record)?;
                let version = record.get("version").and_then(Value::as_u64).unwrap_or(0);
                record.set("version", version + 1);
            }
        }
        drop(store);

        self.submissions.lock().push(Submission {
            at: Instant::now(),
            operations: request.operations().cloned().collect(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> EngineResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
