//! DOM nodes - identity-compared handles into the host tree.
//!
//! A [`Node`] is a cheap `Rc` handle. Two handles are equal only when they
//! point at the same node; content never participates in equality. This is
//! what the synchronizer and the render cache rely on.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::document::DocumentInner;

// =============================================================================
// Node Kind
// =============================================================================

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with a lowercase tag name.
    Element(String),
    /// Text node.
    Text,
    /// Comment node (used as an empty placeholder).
    Comment,
}

// =============================================================================
// Events
// =============================================================================

/// A dispatched DOM event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name, e.g. `click`.
    pub name: String,
    /// Node the event was dispatched on.
    pub target: Node,
}

/// Event listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Handle returned by [`Node::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// =============================================================================
// Node
// =============================================================================

pub(crate) struct NodeData {
    kind: NodeKind,
    doc: Weak<DocumentInner>,
    parent: RefCell<Weak<NodeData>>,
    children: RefCell<Vec<Node>>,
    attributes: RefCell<IndexMap<String, String>>,
    text: RefCell<String>,
    listeners: RefCell<Vec<(ListenerId, String, Listener)>>,
    next_listener: Cell<u64>,
}

/// Handle to a node in a [`Document`](super::Document).
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl Node {
    pub(crate) fn new_in(doc: Weak<DocumentInner>, kind: NodeKind, text: &str) -> Self {
        Node(Rc::new(NodeData {
            kind,
            doc,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            attributes: RefCell::new(IndexMap::new()),
            text: RefCell::new(text.to_string()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        }))
    }

    fn with_doc(&self, f: impl FnOnce(&DocumentInner)) {
        if let Some(doc) = self.0.doc.upgrade() {
            f(&doc);
        }
    }

    /// Node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    /// Tag name for elements.
    pub fn tag_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element(_))
    }

    /// Stable identity key (address of the shared node).
    pub fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    // =========================================================================
    // Tree
    // =========================================================================

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    /// Snapshot of the live child list.
    pub fn child_nodes(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn child_at(&self, index: usize) -> Option<Node> {
        self.0.children.borrow().get(index).cloned()
    }

    /// Position of `child` in this node's live child list.
    pub fn index_of(&self, child: &Node) -> Option<usize> {
        self.0.children.borrow().iter().position(|c| c == child)
    }

    /// Append `child`, moving it if it is attached elsewhere.
    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference` (or at the end when `None`).
    ///
    /// A child already attached anywhere is detached first, so this is also
    /// the move primitive. Counts as one insertion.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if child == self {
            return;
        }
        child.detach();

        {
            let mut children = self.0.children.borrow_mut();
            let at = reference
                .and_then(|r| children.iter().position(|c| c == r))
                .unwrap_or(children.len());
            children.insert(at, child.clone());
        }
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);

        self.with_doc(|doc| doc.stats.borrow_mut().inserted += 1);
    }

    /// Remove `child` from this node. Returns false if it was not a child.
    pub fn remove_child(&self, child: &Node) -> bool {
        let removed = {
            let mut children = self.0.children.borrow_mut();
            match children.iter().position(|c| c == child) {
                Some(at) => {
                    children.remove(at);
                    true
                }
                None => false,
            }
        };
        if removed {
            *child.0.parent.borrow_mut() = Weak::new();
            self.with_doc(|doc| doc.stats.borrow_mut().removed += 1);
        }
        removed
    }

    /// Remove every child.
    pub fn clear_children(&self) {
        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in &children {
            *child.0.parent.borrow_mut() = Weak::new();
        }
        let count = children.len();
        if count > 0 {
            self.with_doc(|doc| doc.stats.borrow_mut().removed += count);
        }
    }

    // Silent unlink used by insert_before; moves are counted once as inserts.
    fn detach(&self) {
        let Some(parent) = self.parent() else { return };
        parent.0.children.borrow_mut().retain(|c| c != self);
        *self.0.parent.borrow_mut() = Weak::new();
    }

    // =========================================================================
    // Attributes & Text
    // =========================================================================

    pub fn set_attribute(&self, name: &str, value: &str) {
        self.0
            .attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        self.with_doc(|doc| doc.stats.borrow_mut().attribute_writes += 1);
    }

    pub fn remove_attribute(&self, name: &str) {
        let existed = self.0.attributes.borrow_mut().shift_remove(name).is_some();
        if existed {
            self.with_doc(|doc| doc.stats.borrow_mut().attribute_writes += 1);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.attributes.borrow().contains_key(name)
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        self.0
            .attributes
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the data of a text or comment node.
    pub fn set_text(&self, text: &str) {
        *self.0.text.borrow_mut() = text.to_string();
        self.with_doc(|doc| doc.stats.borrow_mut().text_writes += 1);
    }

    /// Data of a text or comment node.
    pub fn text(&self) -> String {
        self.0.text.borrow().clone()
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        match self.0.kind {
            NodeKind::Text => self.text(),
            NodeKind::Comment => String::new(),
            NodeKind::Element(_) => self
                .child_nodes()
                .iter()
                .map(Node::text_content)
                .collect(),
        }
    }

    /// Serialize this node and its subtree.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    /// Serialize only the children of this node.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.child_nodes() {
            child.write_html(&mut out);
        }
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.0.kind {
            NodeKind::Text => out.push_str(&escape(&self.text())),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&self.text());
                out.push_str("-->");
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.0.attributes.borrow().iter() {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape(value));
                        out.push('"');
                    }
                }
                out.push('>');
                for child in self.child_nodes() {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn add_event_listener(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.0.next_listener.get());
        self.0.next_listener.set(id.0 + 1);
        self.0
            .listeners
            .borrow_mut()
            .push((id, event.to_string(), listener));
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) {
        self.0.listeners.borrow_mut().retain(|(lid, _, _)| *lid != id);
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    /// Dispatch `event` on this node, bubbling to ancestors.
    ///
    /// Returns how many listeners ran.
    pub fn dispatch_event(&self, event: &str) -> usize {
        let ev = Event {
            name: event.to_string(),
            target: self.clone(),
        };
        let mut called = 0;
        let mut current = Some(self.clone());
        while let Some(node) = current {
            // Snapshot so listeners may add/remove listeners while running.
            let listeners: Vec<Listener> = node
                .0
                .listeners
                .borrow()
                .iter()
                .filter(|(_, name, _)| name == event)
                .map(|(_, _, l)| l.clone())
                .collect();
            for listener in listeners {
                listener(&ev);
                called += 1;
            }
            current = node.parent();
        }
        called
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Depth-first search of the subtree (including self).
    pub fn find(&self, pred: &dyn Fn(&Node) -> bool) -> Option<Node> {
        if pred(self) {
            return Some(self.clone());
        }
        self.child_nodes().iter().find_map(|c| c.find(pred))
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Element(tag) => write!(f, "<{}@{:x}>", tag, self.key()),
            NodeKind::Text => write!(f, "#text({:?})", self.text()),
            NodeKind::Comment => write!(f, "#comment"),
        }
    }
}

// =============================================================================
// NodeRef - `this` capture slot
// =============================================================================

/// Settable slot that receives an element when it is produced.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<RefCell<Option<Node>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, node: Node) {
        *self.0.borrow_mut() = Some(node);
    }

    pub fn get(&self) -> Option<Node> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &NodeRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.get()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn test_identity_equality() {
        let doc = Document::new();
        let a = doc.create_text("x");
        let b = doc.create_text("x");
        assert_eq!(a, a.clone());
        assert_ne!(a, b, "equal content must not make nodes equal");
    }

    #[test]
    fn test_insert_before_moves_node() {
        let doc = Document::new();
        let ul = doc.create_element("ul");
        let a = doc.create_element("li");
        let b = doc.create_element("li");
        ul.append_child(&a);
        ul.append_child(&b);

        ul.insert_before(&b, Some(&a));
        assert_eq!(ul.child_nodes(), vec![b.clone(), a.clone()]);
        assert_eq!(b.parent(), Some(ul.clone()));

        let other = doc.create_element("div");
        other.append_child(&a);
        assert_eq!(ul.child_nodes(), vec![b]);
        assert_eq!(a.parent(), Some(other));
    }

    #[test]
    fn test_outer_html() {
        let doc = Document::new();
        let div = doc.create_element("div");
        div.set_attribute("class", "a b");
        div.set_attribute("hidden", "");
        div.append_child(&doc.create_text("1 < 2"));
        assert_eq!(div.outer_html(), r#"<div class="a b" hidden>1 &lt; 2</div>"#);
    }

    #[test]
    fn test_dispatch_bubbles() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("button");
        outer.append_child(&inner);

        let hits = Rc::new(Cell::new(0));
        let h1 = hits.clone();
        let h2 = hits.clone();
        outer.add_event_listener("click", Rc::new(move |_| h1.set(h1.get() + 1)));
        let id = inner.add_event_listener("click", Rc::new(move |_| h2.set(h2.get() + 10)));

        assert_eq!(inner.dispatch_event("click"), 2);
        assert_eq!(hits.get(), 11);

        inner.remove_event_listener(id);
        assert_eq!(inner.dispatch_event("click"), 1);
        assert_eq!(hits.get(), 12);
    }

    #[test]
    fn test_node_ref() {
        let doc = Document::new();
        let r = NodeRef::new();
        assert!(r.get().is_none());
        let el = doc.create_element("input");
        r.set(el.clone());
        assert_eq!(r.get(), Some(el));
    }
}
