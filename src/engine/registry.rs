//! Component Registry - instance records for rendered components.
//!
//! Every component render allocates an instance record:
//! - id, name and constructor
//! - the props it was rendered with
//! - parent instance (from the instance context stack) and child set
//! - the top-level elements it produced
//!
//! Records are released with the owner of the render that created them;
//! releasing a record releases its remaining children too.

use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::dom::Node;
use crate::element::{Component, Props};

/// Instance handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(usize);

/// Record of one rendered component.
#[derive(Clone, Debug)]
pub struct ComponentInstance {
    pub id: InstanceId,
    pub name: Rc<str>,
    pub component: Component,
    pub props: Props,
    pub parent: Option<InstanceId>,
    pub children: IndexSet<InstanceId>,
    pub elements: IndexSet<Node>,
}

#[derive(Default)]
pub(crate) struct ComponentRegistry {
    next: usize,
    instances: HashMap<InstanceId, ComponentInstance>,
    /// Instances currently rendering, innermost last.
    stack: Vec<InstanceId>,
}

impl ComponentRegistry {
    // =========================================================================
    // Instance Context Stack
    // =========================================================================

    pub fn current(&self) -> Option<InstanceId> {
        self.stack.last().copied()
    }

    pub fn push(&mut self, id: InstanceId) {
        self.stack.push(id);
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Record a new instance under the current one.
    pub fn allocate(&mut self, component: &Component, props: &Props) -> InstanceId {
        let id = InstanceId(self.next);
        self.next += 1;

        let parent = self.current().filter(|p| self.instances.contains_key(p));
        if let Some(p) = parent.and_then(|p| self.instances.get_mut(&p)) {
            p.children.insert(id);
        }

        self.instances.insert(
            id,
            ComponentInstance {
                id,
                name: component.name_rc(),
                component: component.clone(),
                props: props.clone(),
                parent,
                children: IndexSet::new(),
                elements: IndexSet::new(),
            },
        );
        id
    }

    pub fn set_elements(&mut self, id: InstanceId, nodes: impl IntoIterator<Item = Node>) {
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.elements = nodes.into_iter().collect();
        }
    }

    /// Move `id` under the current instance if it was recorded elsewhere.
    pub fn reparent_to_current(&mut self, id: InstanceId) {
        let parent = self.current().filter(|p| *p != id);
        let Some(instance) = self.instances.get(&id) else {
            return;
        };
        if instance.parent == parent {
            return;
        }

        if let Some(old) = instance.parent.and_then(|p| self.instances.get_mut(&p)) {
            old.children.shift_remove(&id);
        }
        if let Some(new) = parent.and_then(|p| self.instances.get_mut(&p)) {
            new.children.insert(id);
        }
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.parent = parent;
        }
    }

    /// Release a record and, recursively, its children.
    pub fn release(&mut self, id: InstanceId) {
        let Some(instance) = self.instances.remove(&id) else {
            return;
        };
        if let Some(parent) = instance.parent.and_then(|p| self.instances.get_mut(&p)) {
            parent.children.shift_remove(&id);
        }
        for child in instance.children {
            self.release(child);
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, id: InstanceId) -> Option<&ComponentInstance> {
        self.instances.get(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn roots(&self) -> Vec<InstanceId> {
        let mut roots: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|i| i.parent.is_none())
            .map(|i| i.id)
            .collect();
        roots.sort();
        roots
    }

    /// Indented `name` tree, roots in creation order.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        for root in self.roots() {
            self.write_tree(root, 0, &mut out);
        }
        out
    }

    fn write_tree(&self, id: InstanceId, depth: usize, out: &mut String) {
        let Some(instance) = self.instances.get(&id) else {
            return;
        };
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), instance.name);
        for child in &instance.children {
            self.write_tree(*child, depth + 1, out);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
