//! # docgraph Engine
//!
//! Operation staging and cache synchronization for a remote document-graph
//! service.
//!
//! This crate provides:
//! - An entity cache keyed by `(table, id)`
//! - Child relation resolution (stored id lists and derived scans)
//! - Lazy subtree loading
//! - Select/update/delete iteration over child containers
//! - An ordered operation stack with paced, batched flushing
//! - Post-flush refresh of server-computed fields
//! - Transport abstraction with an HTTP implementation and a mock
//!
//! ## Architecture
//!
//! A caller owns one [`OperationStack`] per logical change-set. Engine
//! calls mutate the cache optimistically and append operations to the
//! stack. [`Engine::execute`] either hands the stack back for further
//! staging or flushes it in append order, then re-fetches every entity
//! recorded for refresh.
//!
//! ## Key Invariants
//!
//! - Operations are sent in append order
//! - Consecutive network calls are separated by the pacing interval
//! - Subtree loads land in the cache all at once or not at all
//! - Deletes are soft: records stay cached with `alive = false`
//! - No internal retries; failures hand the unsent remainder back

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod data;
mod engine;
mod error;
mod executor;
mod http;
mod iterate;
mod loader;
mod observer;
mod pacer;
mod resolver;
mod schema;
mod select;
mod stack;
mod transport;

pub use cache::EntityCache;
pub use config::EngineConfig;
pub use data::DataHandle;
pub use engine::{Engine, EngineStats};
pub use error::{EngineError, EngineResult};
pub use executor::{Execution, FlushSummary};
pub use http::{HttpClient, HttpFailure, HttpTransport};
pub use iterate::Iteration;
pub use loader::LazyLoader;
pub use observer::{Action, MemoryObserver, NoopObserver, ObservedEvent, Observer, TracingObserver};
pub use pacer::Pacer;
pub use resolver::{resolve, ChildRelation, ChildSource, DerivedFilter, TemplateFilter};
pub use schema::{normalize_key, SchemaEditor, SchemaUnit, SchemaUnitInput};
pub use select::{select, Selector};
pub use stack::{OperationStack, StackState};
pub use transport::{MockTransport, RemoteTransport, Submission};

pub use docgraph_protocol as protocol;
