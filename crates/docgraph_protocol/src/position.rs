//! Placement of a child id inside an ordered id list.

use crate::operation::Operation;
use crate::table::Table;

/// Where a child should land in its parent's ordered child list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Position {
    /// Append after the last child.
    #[default]
    End,
    /// Insert before the first child.
    Start,
    /// Insert at an index; past-the-end indices append.
    Index(usize),
    /// Insert immediately before the given sibling.
    Before(String),
    /// Insert immediately after the given sibling.
    After(String),
}

/// A position resolved against a concrete container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Insert before the anchor, or at the front when there is none.
    Before(Option<String>),
    /// Insert after the anchor, or at the back when there is none.
    After(Option<String>),
}

impl Position {
    /// Resolves this position against the current container contents.
    pub fn placement(&self, container: &[String]) -> Placement {
        match self {
            Position::End => Placement::After(None),
            Position::Start => Placement::Before(None),
            Position::Index(index) => match container.get(*index) {
                Some(anchor) => Placement::Before(Some(anchor.clone())),
                None => Placement::After(None),
            },
            Position::Before(anchor) => Placement::Before(Some(anchor.clone())),
            Position::After(anchor) => Placement::After(Some(anchor.clone())),
        }
    }

    /// Builds the list-insert operation that places `child_id` in the
    /// `path` list of the parent.
    pub fn to_operation(
        &self,
        parent_table: Table,
        parent_id: &str,
        path: &str,
        child_id: &str,
        container: &[String],
    ) -> Operation {
        match self.placement(container) {
            Placement::Before(anchor) => Operation::list_before(
                parent_table,
                parent_id,
                &[path],
                child_id,
                anchor.as_deref(),
            ),
            Placement::After(anchor) => Operation::list_after(
                parent_table,
                parent_id,
                &[path],
                child_id,
                anchor.as_deref(),
            ),
        }
    }
}

impl Placement {
    /// Applies the placement to a local list.
    ///
    /// An existing occurrence of `child_id` is moved rather than
    /// duplicated. A missing anchor appends.
    pub fn apply(&self, list: &mut Vec<String>, child_id: &str) {
        list.retain(|id| id != child_id);
        let anchor_index = |anchor: &str| list.iter().position(|id| id == anchor);
        let index = match self {
            Placement::Before(None) => 0,
            Placement::After(None) => list.len(),
            Placement::Before(Some(anchor)) => anchor_index(anchor).unwrap_or(list.len()),
            Placement::After(Some(anchor)) => {
                anchor_index(anchor).map(|i| i + 1).unwrap_or(list.len())
            }
        };
        list.insert(index, child_id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Command;
    use proptest::prelude::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn index_resolves_to_sibling() {
        let container = ids(&["a", "b", "c"]);
        assert_eq!(
            Position::Index(1).placement(&container),
            Placement::Before(Some("b".into()))
        );
        assert_eq!(
            Position::Index(7).placement(&container),
            Placement::After(None)
        );
    }

    #[test]
    fn apply_inserts_at_expected_slot() {
        let mut list = ids(&["a", "b", "c"]);
        Placement::Before(Some("b".into())).apply(&mut list, "x");
        assert_eq!(list, ids(&["a", "x", "b", "c"]));

        Placement::After(None).apply(&mut list, "y");
        assert_eq!(list, ids(&["a", "x", "b", "c", "y"]));

        Placement::Before(None).apply(&mut list, "z");
        assert_eq!(list, ids(&["z", "a", "x", "b", "c", "y"]));
    }

    #[test]
    fn apply_moves_existing_child() {
        let mut list = ids(&["a", "b", "c"]);
        Placement::After(Some("c".into())).apply(&mut list, "a");
        assert_eq!(list, ids(&["b", "c", "a"]));
    }

    #[test]
    fn to_operation_uses_list_commands() {
        let container = ids(&["a"]);
        let op = Position::Start.to_operation(Table::Block, "p", "content", "n", &container);
        assert_eq!(op.command, Command::ListBefore);
        assert_eq!(op.args["id"], "n");
        assert!(op.args.get("before").is_none());

        let op = Position::After("a".into()).to_operation(
            Table::Block,
            "p",
            "content",
            "n",
            &container,
        );
        assert_eq!(op.command, Command::ListAfter);
        assert_eq!(op.args["after"], "a");
    }

    fn placement_strategy() -> impl Strategy<Value = Placement> {
        let anchor = prop::option::of("[a-e]");
        prop_oneof![
            anchor.clone().prop_map(Placement::Before),
            anchor.prop_map(Placement::After),
        ]
    }

    proptest! {
        #[test]
        fn apply_keeps_single_occurrence(
            list in prop::collection::hash_set("[a-e]", 0..5),
            child in "[a-f]",
            placement in placement_strategy(),
        ) {
            let mut list: Vec<String> = list.into_iter().collect();
            let had_child = list.contains(&child);
            let before = list.len();

            placement.apply(&mut list, &child);

            prop_assert_eq!(list.iter().filter(|id| **id == child).count(), 1);
            prop_assert_eq!(list.len(), if had_child { before } else { before + 1 });
        }
    }
}
