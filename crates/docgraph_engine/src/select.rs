//! Generic selection over candidate child ids.

use std::collections::HashSet;
use std::fmt;

/// Chooses which candidates a select, update or delete applies to.
///
/// `T` is the materialized form the predicate sees: a cached record for
/// entity children, a schema unit for schema edits, and so on.
pub enum Selector<'a, T> {
    /// Every candidate.
    All,
    /// Candidates whose id is in the list. Ids that are not candidates are
    /// dropped without error.
    Ids(Vec<String>),
    /// Candidates whose materialized value satisfies the predicate. The
    /// second argument is the candidate's index.
    Where(Box<dyn FnMut(&T, usize) -> bool + 'a>),
}

impl<'a, T> Selector<'a, T> {
    /// Selects by explicit ids.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selector::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Selects a single id.
    pub fn id(id: impl Into<String>) -> Self {
        Selector::Ids(vec![id.into()])
    }

    /// Selects by predicate.
    pub fn filter(predicate: impl FnMut(&T, usize) -> bool + 'a) -> Self {
        Selector::Where(Box::new(predicate))
    }

    /// Returns true if candidates must be materialized to be tested.
    pub fn needs_data(&self) -> bool {
        matches!(self, Selector::Where(_))
    }
}

impl<T> Default for Selector<'_, T> {
    fn default() -> Self {
        Selector::All
    }
}

impl<T> fmt::Debug for Selector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str("All"),
            Selector::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
            Selector::Where(_) => f.write_str("Where(..)"),
        }
    }
}

/// Returns the candidates matched by `selector`, in candidate order.
///
/// With `multiple == false` evaluation stops at the first match, so a
/// predicate never runs past it. Candidates that `materialize` cannot
/// produce never satisfy a predicate. No match yields an empty list.
pub fn select<T>(
    candidates: &[String],
    selector: &mut Selector<'_, T>,
    multiple: bool,
    mut materialize: impl FnMut(&str) -> Option<T>,
) -> Vec<String> {
    let limit = if multiple { usize::MAX } else { 1 };
    match selector {
        Selector::All => candidates.iter().take(limit).cloned().collect(),
        Selector::Ids(ids) => {
            let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
            candidates
                .iter()
                .filter(|id| wanted.contains(id.as_str()))
                .take(limit)
                .cloned()
                .collect()
        }
        Selector::Where(predicate) => {
            let mut matched = Vec::new();
            for (index, id) in candidates.iter().enumerate() {
                let Some(data) = materialize(id) else {
                    continue;
                };
                if predicate(&data, index) {
                    matched.push(id.clone());
                    if matched.len() >= limit {
                        break;
                    }
                }
            }
            matched
        }
    }
}
