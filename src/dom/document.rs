//! Document - node factory, readiness and operation accounting.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::node::{Node, NodeKind};

// =============================================================================
// DOM Statistics
// =============================================================================

/// Counters for every mutating DOM operation performed on a document.
///
/// Tests use these to check the minimal-write guarantees of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomStats {
    /// Nodes created through the document.
    pub created: usize,
    /// `insert_before` / `append_child` calls (moves included).
    pub inserted: usize,
    /// `remove_child` calls plus children dropped by `clear_children`.
    pub removed: usize,
    /// Attribute sets and effective removals.
    pub attribute_writes: usize,
    /// Text node data writes.
    pub text_writes: usize,
}

impl DomStats {
    /// Total attribute and text writes.
    pub fn writes(&self) -> usize {
        self.attribute_writes + self.text_writes
    }
}

/// Document loading state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Complete,
}

// =============================================================================
// Document
// =============================================================================

pub(crate) struct DocumentInner {
    pub(crate) stats: RefCell<DomStats>,
    body: Node,
    ready: Cell<ReadyState>,
    on_ready: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// In-memory host document.
#[derive(Clone)]
pub struct Document(Rc<DocumentInner>);

impl Document {
    /// A document that has finished loading.
    pub fn new() -> Self {
        Self::with_state(ReadyState::Complete)
    }

    /// A document still loading; see [`Document::finish_loading`].
    pub fn loading() -> Self {
        Self::with_state(ReadyState::Loading)
    }

    fn with_state(state: ReadyState) -> Self {
        Document(Rc::new_cyclic(|weak| DocumentInner {
            stats: RefCell::new(DomStats::default()),
            body: Node::new_in(weak.clone(), NodeKind::Element("body".into()), ""),
            ready: Cell::new(state),
            on_ready: RefCell::new(Vec::new()),
        }))
    }

    pub fn body(&self) -> Node {
        self.0.body.clone()
    }

    // =========================================================================
    // Node Factory
    // =========================================================================

    pub fn create_element(&self, tag: &str) -> Node {
        self.count_created();
        Node::new_in(
            Rc::downgrade(&self.0),
            NodeKind::Element(tag.to_ascii_lowercase()),
            "",
        )
    }

    pub fn create_text(&self, text: &str) -> Node {
        self.count_created();
        Node::new_in(Rc::downgrade(&self.0), NodeKind::Text, text)
    }

    pub fn create_comment(&self, text: &str) -> Node {
        self.count_created();
        Node::new_in(Rc::downgrade(&self.0), NodeKind::Comment, text)
    }

    fn count_created(&self) {
        self.0.stats.borrow_mut().created += 1;
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    pub fn ready_state(&self) -> ReadyState {
        self.0.ready.get()
    }

    pub fn is_loading(&self) -> bool {
        self.ready_state() == ReadyState::Loading
    }

    /// Run `callback` once the document is ready (immediately if it is).
    pub fn on_ready(&self, callback: impl FnOnce() + 'static) {
        if self.is_loading() {
            self.0.on_ready.borrow_mut().push(Box::new(callback));
        } else {
            callback();
        }
    }

    /// Mark the document complete and run queued ready callbacks in order.
    pub fn finish_loading(&self) {
        self.0.ready.set(ReadyState::Complete);
        let queued = std::mem::take(&mut *self.0.on_ready.borrow_mut());
        for callback in queued {
            callback();
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_element_by_id(&self, id: &str) -> Option<Node> {
        self.body()
            .find(&|n| n.is_element() && n.attribute("id").as_deref() == Some(id))
    }

    /// Resolve a `#id` or tag-name selector against the body subtree.
    pub fn query(&self, selector: &str) -> Option<Node> {
        let selector = selector.trim();
        if let Some(id) = selector.strip_prefix('#') {
            return self.get_element_by_id(id);
        }
        let tag = selector.to_ascii_lowercase();
        self.body().find(&|n| n.tag_name() == Some(tag.as_str()))
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> DomStats {
        *self.0.stats.borrow()
    }

    pub fn reset_stats(&self) {
        *self.0.stats.borrow_mut() = DomStats::default();
    }

    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
