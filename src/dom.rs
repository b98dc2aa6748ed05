//! Lightweight owned document tree.
//!
//! Stands in for the host page: enough structure for trigger discovery,
//! content relocation, and rendering the built accordion to HTML. Nodes live
//! in an arena owned by the [`Document`]; a detached node stays in the arena
//! and can be re-appended later.

use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Handle to a node in a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: Vec<String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            classes: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

/// An owned element tree with a single root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Create a document whose root element has the given tag.
    pub fn new(root_tag: &str) -> Self {
        Self {
            nodes: vec![Node::new(root_tag)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a new detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(tag));
        id
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Append `child` as the last child of `parent`, detaching it from its
    /// current parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Remove a node from its parent. The node (and its subtree) stays in the
    /// arena and can be re-appended elsewhere.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    /// Drop all children of a node (they stay detached in the arena).
    pub fn clear_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.nodes[node.0]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0].attrs.get(name).map(String::as_str)
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        self.nodes[node.0].attrs.remove(name);
    }

    /// All attributes of a node, in name order.
    pub fn attrs(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.nodes[node.0]
            .attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        let classes = &mut self.nodes[node.0].classes;
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes[node.0].classes.iter().any(|c| c == class)
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.nodes[node.0].text = text.to_string();
    }

    /// Own text plus the text of all descendants, in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        out.push_str(&self.nodes[node.0].text);
        for child in &self.nodes[node.0].children {
            self.collect_text(*child, out);
        }
    }

    /// Next sibling in the parent's child list, if any.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let pos = siblings.iter().position(|c| *c == node)?;
        siblings.get(pos + 1).copied()
    }

    /// Nearest ancestor (including the node itself) with the given tag.
    pub fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.nodes[n.0].tag == tag {
                return Some(n);
            }
            current = self.nodes[n.0].parent;
        }
        None
    }

    /// Whether `ancestor` is a strict ancestor of `node`.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes[node.0].parent;
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes[n.0].parent;
        }
        false
    }

    /// Descendants of a node in document (pre-order) order, excluding the
    /// node itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(node, &mut out);
        out
    }

    fn walk(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.nodes[node.0].children {
            out.push(*child);
            self.walk(*child, out);
        }
    }

    /// All document-order matches for a single simple selector: `tag`,
    /// `.class`, or `#id`. Anything else matches nothing and is reported as
    /// a diagnostic.
    pub fn select_all(&self, selector: &str) -> Vec<NodeId> {
        self.select_within(self.root, selector)
    }

    /// Like [`Document::select_all`], scoped to the descendants of `scope`.
    pub fn select_within(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let selector = selector.trim();
        let matcher: Box<dyn Fn(NodeId) -> bool + '_> = if let Some(id) = selector.strip_prefix('#') {
            let id = id.to_string();
            Box::new(move |n| self.attr(n, "id") == Some(id.as_str()))
        } else if let Some(class) = selector.strip_prefix('.') {
            let class = class.to_string();
            Box::new(move |n| self.has_class(n, &class))
        } else if !selector.is_empty() && selector.chars().all(|c| c.is_ascii_alphanumeric()) {
            let tag = selector.to_string();
            Box::new(move |n| self.nodes[n.0].tag == tag)
        } else {
            tracing::warn!(selector, "unsupported selector, matching nothing");
            return Vec::new();
        };

        self.descendants(scope)
            .into_iter()
            .filter(|n| matcher(*n))
            .collect()
    }

    /// Render a subtree as HTML. Attributes are emitted in name order, the
    /// `class` attribute is assembled from the class list, and text is
    /// escaped.
    pub fn render(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.render_into(node, &mut out);
        out
    }

    fn render_into(&self, node: NodeId, out: &mut String) {
        let data = &self.nodes[node.0];
        if data.attrs.get("data-raw").map(String::as_str) == Some("true") {
            out.push_str(&data.text);
            return;
        }
        let _ = write!(out, "<{}", data.tag);
        if !data.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape(&data.classes.join(" ")));
        }
        for (name, value) in &data.attrs {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }
        out.push('>');
        out.push_str(&escape(&data.text));
        for child in &data.children {
            self.render_into(*child, out);
        }
        let _ = write!(out, "</{}>", data.tag);
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Insert a raw, trusted HTML fragment under a node.
///
/// The fragment is wrapped in a carrier element whose contents are emitted
/// verbatim by [`Document::render`]. Only used for collection bodies, which
/// the instance owns outright.
pub fn set_inner_html(doc: &mut Document, node: NodeId, html: &str) {
    doc.clear_children(node);
    let carrier = doc.create_element("raw");
    doc.set_attr(carrier, "data-raw", "true");
    doc.set_text(carrier, html);
    doc.append_child(node, carrier);
}
