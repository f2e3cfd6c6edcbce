//! Ownership graph - who disposes what.
//!
//! Every render creates an owner. Subscriptions, nested renders, event
//! listeners and mount hooks created while an owner is current register
//! their cleanup with it. Disposing an owner releases its whole subtree,
//! children first, so nothing created under it outlives it.
//!
//! Owners are captured when a closure is created and pushed again when the
//! closure runs later (inside an effect, after a ready callback), so nested
//! work always lands under the owner that created it rather than whatever
//! happens to be current at the time.

use std::collections::HashMap;

use crate::types::{Cleanup, DescriptorId};

/// Owner handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(usize);

struct OwnerNode {
    parent: Option<OwnerId>,
    children: Vec<OwnerId>,
    cleanups: Vec<Cleanup>,
    /// Descriptor whose render created this owner, if any.
    descriptor: Option<DescriptorId>,
}

/// Everything a disposal released. Cleanups are returned instead of run so
/// the caller can drop its borrow of the arena first.
#[derive(Default)]
pub(crate) struct Released {
    pub cleanups: Vec<Cleanup>,
    pub descriptors: Vec<DescriptorId>,
}

#[derive(Default)]
pub(crate) struct OwnerArena {
    next: usize,
    owners: HashMap<OwnerId, OwnerNode>,
    stack: Vec<OwnerId>,
}

impl OwnerArena {
    // =========================================================================
    // Owner Stack
    // =========================================================================

    pub fn current(&self) -> Option<OwnerId> {
        self.stack.last().copied()
    }

    pub fn push(&mut self, owner: OwnerId) {
        self.stack.push(owner);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Create an owner under `parent` (a root when `None` or when the parent
    /// is already gone).
    pub fn allocate(&mut self, parent: Option<OwnerId>, descriptor: Option<DescriptorId>) -> OwnerId {
        let id = OwnerId(self.next);
        self.next += 1;

        let parent = parent.filter(|p| self.owners.contains_key(p));
        if let Some(p) = parent.and_then(|p| self.owners.get_mut(&p)) {
            p.children.push(id);
        }

        self.owners.insert(
            id,
            OwnerNode {
                parent,
                children: Vec::new(),
                cleanups: Vec::new(),
                descriptor,
            },
        );
        id
    }

    pub fn is_alive(&self, owner: OwnerId) -> bool {
        self.owners.contains_key(&owner)
    }

    pub fn parent(&self, owner: OwnerId) -> Option<OwnerId> {
        self.owners.get(&owner).and_then(|n| n.parent)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Register a cleanup. Returns it back when the owner is gone so the
    /// caller can run it immediately.
    pub fn add_cleanup(&mut self, owner: OwnerId, cleanup: Cleanup) -> Option<Cleanup> {
        match self.owners.get_mut(&owner) {
            Some(node) => {
                node.cleanups.push(cleanup);
                None
            }
            None => Some(cleanup),
        }
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Detach `owner` and its subtree. Children are released before their
    /// parent; each owner's own cleanups keep registration order.
    pub fn release(&mut self, owner: OwnerId) -> Released {
        let mut released = Released::default();

        if let Some(parent) = self.parent(owner) {
            if let Some(p) = self.owners.get_mut(&parent) {
                p.children.retain(|c| *c != owner);
            }
        }
        self.release_subtree(owner, &mut released);
        released
    }

    fn release_subtree(&mut self, owner: OwnerId, out: &mut Released) {
        let Some(node) = self.owners.remove(&owner) else {
            return;
        };
        for child in node.children {
            self.release_subtree(child, out);
        }
        out.cleanups.extend(node.cleanups);
        if let Some(d) = node.descriptor {
            out.descriptors.push(d);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn logger(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> Cleanup {
        let log = log.clone();
        Box::new(move || log.borrow_mut().push(tag))
    }

    #[test]
    fn test_release_runs_children_first() {
        let mut arena = OwnerArena::default();
        let log = Rc::new(RefCell::new(Vec::new()));

        let root = arena.allocate(None, None);
        let child = arena.allocate(Some(root), Some(DescriptorId(7)));
        let grandchild = arena.allocate(Some(child), None);
        arena.add_cleanup(root, logger(&log, "root"));
        arena.add_cleanup(child, logger(&log, "child"));
        arena.add_cleanup(grandchild, logger(&log, "grandchild"));

        let released = arena.release(root);
        for c in released.cleanups {
            c();
        }

        assert_eq!(*log.borrow(), vec!["grandchild", "child", "root"]);
        assert_eq!(released.descriptors, vec![DescriptorId(7)]);
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn test_release_subtree_leaves_siblings() {
        let mut arena = OwnerArena::default();
        let root = arena.allocate(None, None);
        let a = arena.allocate(Some(root), None);
        let b = arena.allocate(Some(root), None);

        arena.release(a);

        assert!(!arena.is_alive(a));
        assert!(arena.is_alive(b));
        assert!(arena.is_alive(root));
        assert_eq!(arena.release(root).descriptors.len(), 0);
        assert!(!arena.is_alive(b), "b released with its parent");
    }

    #[test]
    fn test_cleanup_on_dead_owner_is_handed_back() {
        let mut arena = OwnerArena::default();
        let owner = arena.allocate(None, None);
        arena.release(owner);

        let back = arena.add_cleanup(owner, Box::new(|| {}));
        assert!(back.is_some());
    }

    #[test]
    fn test_stack() {
        let mut arena = OwnerArena::default();
        let a = arena.allocate(None, None);
        let b = arena.allocate(Some(a), None);
        assert_eq!(arena.current(), None);
        arena.push(a);
        arena.push(b);
        assert_eq!(arena.current(), Some(b));
        arena.pop();
        assert_eq!(arena.current(), Some(a));
        assert_eq!(arena.parent(b), Some(a));
    }
}
