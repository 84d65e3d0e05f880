//! Child relations and their resolution against the cache.

use crate::cache::EntityCache;
use crate::error::{EngineError, EngineResult};
use docgraph_protocol::{Pointer, Record, Table};

/// How template pages are treated by a derived scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFilter {
    /// Templates and regular pages both match.
    #[default]
    Include,
    /// Only non-template pages match.
    Exclude,
    /// Only template pages match.
    Only,
}

impl TemplateFilter {
    fn accepts(&self, is_template: bool) -> bool {
        match self {
            TemplateFilter::Include => true,
            TemplateFilter::Exclude => !is_template,
            TemplateFilter::Only => is_template,
        }
    }
}

/// Secondary conditions of a derived relation, on top of the
/// `parent_id` back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedFilter {
    /// Required `parent_table` of the child.
    pub parent_table: Option<Table>,
    /// Required block subtype of the child.
    pub block_type: Option<&'static str>,
    /// Template handling.
    pub templates: TemplateFilter,
}

impl DerivedFilter {
    /// Returns true if `record` is a child of `parent_id` under this filter.
    pub fn matches(&self, parent_id: &str, record: &Record) -> bool {
        record.parent_id() == Some(parent_id)
            && self
                .parent_table
                .map_or(true, |table| record.parent_table() == Some(table))
            && self
                .block_type
                .map_or(true, |kind| record.block_type() == Some(kind))
            && self.templates.accepts(record.is_template())
    }
}

/// Where the children of a relation come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSource {
    /// An ordered id list stored on the parent.
    Stored {
        /// Field holding the list.
        path: &'static str,
    },
    /// A scan over the child table for back-references to the parent.
    Derived(DerivedFilter),
}

/// Declares which table a parent's children live in and how to find them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRelation {
    /// Table of the children.
    pub child_table: Table,
    /// How child ids are obtained.
    pub source: ChildSource,
}

impl ChildRelation {
    /// A relation backed by an id list on the parent.
    pub fn stored(child_table: Table, path: &'static str) -> Self {
        Self {
            child_table,
            source: ChildSource::Stored { path },
        }
    }

    /// A relation computed by scanning `child_table`.
    pub fn derived(child_table: Table, filter: DerivedFilter) -> Self {
        Self {
            child_table,
            source: ChildSource::Derived(filter),
        }
    }

    /// Returns the stored relation of a parent, judged by its table and
    /// block subtype.
    pub fn detect(table: Table, record: &Record) -> Option<Self> {
        match table {
            Table::Block => match record.block_type() {
                Some("page") => Some(Self::stored(Table::Block, "content")),
                Some("collection_view") | Some("collection_view_page") => {
                    Some(Self::stored(Table::CollectionView, "view_ids"))
                }
                _ => None,
            },
            Table::Space => Some(Self::stored(Table::Block, "pages")),
            Table::UserRoot => Some(Self::stored(Table::SpaceView, "space_views")),
            Table::Collection => Some(Self::templates()),
            Table::SpaceView => Some(Self::stored(Table::Block, "bookmarked_pages")),
            _ => None,
        }
    }

    /// Template pages of a collection.
    pub fn templates() -> Self {
        Self::stored(Table::Block, "template_pages")
    }

    /// Rows of a collection: pages pointing at it that are not templates.
    pub fn rows() -> Self {
        Self::derived(
            Table::Block,
            DerivedFilter {
                parent_table: Some(Table::Collection),
                block_type: Some("page"),
                templates: TemplateFilter::Exclude,
            },
        )
    }

    /// Pages whose parent is a space.
    pub fn root_pages() -> Self {
        Self::derived(
            Table::Block,
            DerivedFilter {
                parent_table: Some(Table::Space),
                block_type: Some("page"),
                templates: TemplateFilter::Include,
            },
        )
    }

    /// Returns the stored list field, if any.
    pub fn path(&self) -> Option<&'static str> {
        match self.source {
            ChildSource::Stored { path } => Some(path),
            ChildSource::Derived(_) => None,
        }
    }

    /// Returns true for derived relations.
    pub fn is_derived(&self) -> bool {
        matches!(self.source, ChildSource::Derived(_))
    }
}

/// Returns the candidate child ids of `parent` under `relation`.
///
/// Stored relations yield the list verbatim, so remote ordering is kept.
/// Derived relations yield matches in cache iteration order. A dead parent
/// still resolves.
pub fn resolve(
    cache: &EntityCache,
    parent: &Pointer,
    relation: &ChildRelation,
) -> EngineResult<Vec<String>> {
    match relation.source {
        ChildSource::Stored { path } => {
            let record = cache
                .peek(parent.table, &parent.id)
                .ok_or_else(|| EngineError::MissingRecord {
                    pointer: parent.clone(),
                })?;
            Ok(record.id_list(path))
        }
        ChildSource::Derived(filter) => Ok(cache
            .iter(relation.child_table)
            .filter(|(_, record)| filter.matches(&parent.id, record))
            .map(|(id, _)| id.to_string())
            .collect()),
    }
}
