//! # docgraph Testkit
//!
//! Test utilities for docgraph.
//!
//! This crate provides:
//! - Record fixtures for pages, blocks, collections and spaces
//! - A builder for canned subtree responses
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docgraph_testkit::prelude::*;
//!
//! let subtree = SubtreeBuilder::new()
//!     .collection("c", &["t1"])
//!     .template("t1", "c")
//!     .build();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
