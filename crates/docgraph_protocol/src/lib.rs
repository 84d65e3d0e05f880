//! # docgraph Protocol
//!
//! Wire and data types shared by the docgraph client crates.
//!
//! This crate provides:
//! - `Table` and `Pointer` for addressing remote entities
//! - `Record` and `RecordMap` for entity payloads
//! - `Operation` for remote write intents
//! - `Position` for ordered child-list placement
//! - Request/response messages for subtree loads, record syncs and transactions
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod operation;
mod position;
mod record;
mod table;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    RecordRequest, SubmitTransactionRequest, SubtreeRequest, SubtreeResponse,
    SyncRecordValuesRequest, SyncRecordValuesResponse, Transaction, WireMessage,
};
pub use operation::{Command, Operation};
pub use position::{Placement, Position};
pub use record::{Record, RecordEntry, RecordMap};
pub use table::{Pointer, Table};
