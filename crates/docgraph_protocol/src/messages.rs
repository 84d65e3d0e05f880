//! Request and response messages exchanged with the remote service.

use crate::error::ProtocolResult;
use crate::operation::Operation;
use crate::record::RecordMap;
use crate::table::Pointer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// JSON body encoding shared by every message.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Encodes to JSON bytes.
    fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON bytes.
    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Request for an entity and everything reachable below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeRequest {
    /// Root of the subtree.
    pub pointer: Pointer,
    /// Maximum number of records per chunk.
    pub limit: u32,
    /// Zero-based chunk index.
    pub chunk_number: u32,
}

impl SubtreeRequest {
    /// Creates a request for the first chunk.
    pub fn new(pointer: Pointer, limit: u32) -> Self {
        Self {
            pointer,
            limit,
            chunk_number: 0,
        }
    }
}

/// Records making up a subtree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeResponse {
    /// The root and its descendants.
    pub record_map: RecordMap,
}

impl SubtreeResponse {
    /// Creates a new response.
    pub fn new(record_map: RecordMap) -> Self {
        Self { record_map }
    }
}

/// One entry of a [`SyncRecordValuesRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    /// Entity to fetch.
    pub pointer: Pointer,
    /// Known version; `-1` asks for the latest.
    pub version: i64,
}

/// Request for the current values of specific entities.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecordValuesRequest {
    /// Entities to fetch.
    pub requests: Vec<RecordRequest>,
}

impl SyncRecordValuesRequest {
    /// Creates a request for the latest version of every pointer.
    pub fn latest<'a>(pointers: impl IntoIterator<Item = &'a Pointer>) -> Self {
        Self {
            requests: pointers
                .into_iter()
                .map(|pointer| RecordRequest {
                    pointer: pointer.clone(),
                    version: -1,
                })
                .collect(),
        }
    }
}

/// Current values of the requested entities.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecordValuesResponse {
    /// Fetched records.
    pub record_map: RecordMap,
}

/// An ordered group of operations applied by the service as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction id.
    pub id: String,
    /// Space the operations belong to.
    pub space_id: String,
    /// Shard of the space.
    pub shard_id: u32,
    /// Operations, in application order.
    pub operations: Vec<Operation>,
}

/// Submission of one or more transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionRequest {
    /// Idempotency key for the request.
    pub request_id: String,
    /// Transactions, in application order.
    pub transactions: Vec<Transaction>,
}

impl SubmitTransactionRequest {
    /// Returns every operation of the request in order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.transactions.iter().flat_map(|txn| txn.operations.iter())
    }
}

impl WireMessage for SubtreeRequest {}
impl WireMessage for SubtreeResponse {}
impl WireMessage for SyncRecordValuesRequest {}
impl WireMessage for SyncRecordValuesResponse {}
impl WireMessage for SubmitTransactionRequest {}
