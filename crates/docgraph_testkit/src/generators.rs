//! Property-based test generators using proptest.
//!
//! Provides strategies for generating ids, candidate lists and operations
//! that maintain the invariants the engine relies on.

use docgraph_protocol::{Operation, Table};
use proptest::prelude::*;
use serde_json::json;

/// Strategy for generating entity ids.
pub fn id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,7}").expect("Invalid regex")
}

/// Strategy for generating lists of distinct ids, in arbitrary order.
pub fn unique_ids_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(id_strategy(), 0..=max).prop_flat_map(|set| {
        let ids: Vec<String> = set.into_iter().collect();
        Just(ids).prop_shuffle()
    })
}

/// Strategy for a candidate list plus a selection list that mixes
/// candidates with ids that are not candidates.
pub fn selection_strategy(max: usize) -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    (
        unique_ids_strategy(max),
        prop::collection::vec(id_strategy(), 0..=max),
    )
        .prop_flat_map(|(candidates, strangers)| {
            let picks = prop::sample::subsequence(candidates.clone(), 0..=candidates.len());
            (Just(candidates), picks, Just(strangers))
        })
        .prop_flat_map(|(candidates, picks, strangers)| {
            let mut selection = picks;
            selection.extend(strangers);
            (Just(candidates), Just(selection).prop_shuffle())
        })
}

/// Strategy for generating block update operations.
pub fn update_operation_strategy() -> impl Strategy<Value = Operation> {
    (id_strategy(), any::<i32>()).prop_map(|(id, value)| {
        Operation::update(Table::Block, id, &[], json!({ "value": value }))
    })
}

/// Strategy for generating operation sequences.
pub fn operation_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Operation>> {
    prop::collection::vec(update_operation_strategy(), 0..=max_len)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
