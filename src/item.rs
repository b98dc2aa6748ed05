//! The accordion item data model.

use crate::dom::NodeId;

/// What an item reveals when opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemContent {
    /// Externally-owned document nodes, relocated into the item at build
    /// time. The item owns them until teardown hands them back.
    Nodes(Vec<NodeId>),
    /// An inert HTML fragment owned by the item (collection bodies).
    Fragment(String),
}

impl ItemContent {
    pub fn is_empty(&self) -> bool {
        match self {
            ItemContent::Nodes(nodes) => nodes.is_empty(),
            ItemContent::Fragment(html) => html.is_empty(),
        }
    }

    /// Relocated nodes currently held by this item, if any.
    pub fn held_nodes(&self) -> &[NodeId] {
        match self {
            ItemContent::Nodes(nodes) => nodes,
            ItemContent::Fragment(_) => &[],
        }
    }
}

/// One titled, independently expandable unit.
///
/// `id` is assigned once at normalization time and never changes; `order` is
/// the item's position in the rendered list and breaks ties ("first" means
/// `order == 0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub content: ItemContent,
    pub order: usize,
}
