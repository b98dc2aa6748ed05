//! Item normalization from heterogeneous sources.
//!
//! Two mutually-exclusive input modes per instance: an external typed
//! collection (fetched asynchronously and mapped in returned order), or
//! trigger elements found in the instance markup, each paired with its
//! content targets. Neither mode applying means there is nothing to do, not
//! an error.

use crate::dom::{Document, NodeId};
use crate::item::{Item, ItemContent};
use crate::slug::IdRegistry;
use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;

/// One entry of an external collection.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionItem {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub body: String,
}

/// A fetched external collection: ordered items plus a type tag.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    pub items: Vec<CollectionItem>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read collection source '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse collection source '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// External data source contract. The fetch is asynchronous and may fail;
/// callers log the failure and leave the instance unbuilt rather than
/// surfacing it to the host page.
pub trait CollectionSource: Send + Sync {
    fn fetch<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<Collection, SourceError>>;
}

/// Reads a JSON collection file from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsCollectionSource;

impl CollectionSource for FsCollectionSource {
    fn fetch<'a>(&'a self, source: &'a str) -> BoxFuture<'a, Result<Collection, SourceError>> {
        Box::pin(async move {
            let bytes = tokio::fs::read(source).await.map_err(|e| SourceError::Read {
                path: source.to_string(),
                source: e,
            })?;
            serde_json::from_slice(&bytes).map_err(|e| SourceError::Parse {
                path: source.to_string(),
                source: e,
            })
        })
    }
}

/// Map a fetched collection to items in returned order, truncating to
/// `limit` when one is configured.
pub fn items_from_collection(
    collection: Collection,
    limit: Option<usize>,
    registry: &mut IdRegistry,
) -> Vec<Item> {
    let cap = limit.unwrap_or(collection.items.len());
    collection
        .items
        .into_iter()
        .take(cap)
        .enumerate()
        .map(|(order, entry)| Item {
            id: registry.assign(&entry.title),
            title: entry.title,
            subtitle: entry.subtitle,
            content: ItemContent::Fragment(entry.body),
            order,
        })
        .collect()
}

/// Build items from trigger elements found under `root`, in document order.
///
/// A trigger's targets come from its `data-target` attribute: a
/// comma-separated selector list, each selector resolved independently over
/// the whole document, all matches collected in selector-list order then
/// document order. Without a selector the fallback is the trigger's nearest
/// enclosing `section`'s next sibling. A trigger with no resolvable target
/// yields an empty-content item.
pub fn items_from_triggers(
    doc: &Document,
    root: NodeId,
    registry: &mut IdRegistry,
) -> Vec<Item> {
    let triggers = doc.select_within(root, "button");
    triggers
        .into_iter()
        .enumerate()
        .map(|(order, trigger)| {
            let title = doc.text_content(trigger).trim().to_string();
            let targets = resolve_targets(doc, trigger);
            if targets.is_empty() {
                tracing::warn!(title = %title, "trigger has no resolvable content target");
            }
            Item {
                id: registry.assign(&title),
                title,
                subtitle: None,
                content: ItemContent::Nodes(targets),
                order,
            }
        })
        .collect()
}

fn resolve_targets(doc: &Document, trigger: NodeId) -> Vec<NodeId> {
    if let Some(list) = doc.attr(trigger, "data-target") {
        let selectors: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let mut targets = Vec::new();
        for selector in &selectors {
            targets.extend(doc.select_all(selector));
        }
        return targets;
    }

    // Structural fallback: the trigger's nearest enclosing section's next
    // sibling.
    doc.closest(trigger, "section")
        .and_then(|section| doc.next_sibling(section))
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(titles: &[&str]) -> Collection {
        Collection {
            items: titles
                .iter()
                .map(|t| CollectionItem {
                    title: t.to_string(),
                    subtitle: None,
                    body: format!("<p>{}</p>", t),
                })
                .collect(),
            kind: "faq".to_string(),
        }
    }

    #[test]
    fn test_collection_mapping_preserves_order() {
        let mut reg = IdRegistry::new();
        let items = items_from_collection(collection(&["B side", "A side"]), None, &mut reg);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "b-side");
        assert_eq!(items[0].order, 0);
        assert_eq!(items[1].id, "a-side");
        assert_eq!(items[1].order, 1);
    }

    #[test]
    fn test_collection_limit_truncates() {
        let mut reg = IdRegistry::new();
        let items = items_from_collection(collection(&["A", "B", "C"]), Some(2), &mut reg);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_triggers_with_selector_lists() {
        let mut doc = Document::new("body");
        let root = doc.create_element("div");
        doc.append_child(doc.root(), root);
        let trigger = doc.create_element("button");
        doc.set_text(trigger, "Details");
        doc.set_attr(trigger, "data-target", ".detail, #extras");
        doc.append_child(root, trigger);

        let detail_a = doc.create_element("div");
        doc.add_class(detail_a, "detail");
        doc.append_child(doc.root(), detail_a);
        let detail_b = doc.create_element("div");
        doc.add_class(detail_b, "detail");
        doc.append_child(doc.root(), detail_b);
        let extras = doc.create_element("aside");
        doc.set_attr(extras, "id", "extras");
        doc.append_child(doc.root(), extras);

        let mut reg = IdRegistry::new();
        let items = items_from_triggers(&doc, root, &mut reg);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "details");
        // Selector-list order, then document order within each selector.
        assert_eq!(
            items[0].content,
            ItemContent::Nodes(vec![detail_a, detail_b, extras])
        );
    }

    #[test]
    fn test_trigger_fallback_to_section_next_sibling() {
        let mut doc = Document::new("body");
        let section = doc.create_element("section");
        doc.append_child(doc.root(), section);
        let root = doc.create_element("div");
        doc.append_child(section, root);
        let trigger = doc.create_element("button");
        doc.set_text(trigger, "More");
        doc.append_child(root, trigger);
        let next = doc.create_element("section");
        doc.append_child(doc.root(), next);

        let mut reg = IdRegistry::new();
        let items = items_from_triggers(&doc, root, &mut reg);
        assert_eq!(items[0].content, ItemContent::Nodes(vec![next]));
    }

    #[test]
    fn test_unresolvable_target_yields_empty_content() {
        let mut doc = Document::new("body");
        let root = doc.create_element("div");
        doc.append_child(doc.root(), root);
        let trigger = doc.create_element("button");
        doc.set_text(trigger, "Orphan");
        doc.append_child(root, trigger);

        let mut reg = IdRegistry::new();
        let items = items_from_triggers(&doc, root, &mut reg);
        assert_eq!(items.len(), 1);
        assert!(items[0].content.is_empty());
    }

    #[test]
    fn test_no_triggers_means_no_items() {
        let mut doc = Document::new("body");
        let root = doc.create_element("div");
        doc.append_child(doc.root(), root);
        let mut reg = IdRegistry::new();
        assert!(items_from_triggers(&doc, root, &mut reg).is_empty());
    }

    #[test]
    fn test_fs_source_reads_and_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(
            &path,
            r#"{"type": "faq", "items": [{"title": "Shipping", "body": "<p>3 days</p>"}]}"#,
        )
        .unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let collection = rt
            .block_on(FsCollectionSource.fetch(path.to_str().unwrap()))
            .unwrap();
        assert_eq!(collection.kind, "faq");
        assert_eq!(collection.items[0].title, "Shipping");
    }

    #[test]
    fn test_fs_source_missing_file_is_an_error() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt
            .block_on(FsCollectionSource.fetch("/nonexistent/items.json"))
            .unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }
}
