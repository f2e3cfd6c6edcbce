//! Child pipeline - turns a heterogeneous child list into live DOM nodes.
//!
//! Four stages, each reactive:
//!
//! 1. **Normalize** (derived) - children become descriptors. Text, nodes
//!    and lists are wrapped; dynamic children are re-read on every pass.
//!    A dynamic text child keeps one text descriptor for its lifetime, so
//!    text changes become a single text write instead of a new node.
//! 2. **Condition** (derived) - `if` / `else` / `when` folding, see
//!    [`ConditionFold`]. Each guard is its own derived, so a change
//!    re-evaluates only that guard.
//! 3. **Render** (effect) - surviving descriptors are rendered (cache hits
//!    for anything rendered before) into a signal. A descriptor produced by
//!    a dynamic child is unlinked once it leaves the output; written
//!    children keep their render while hidden.
//! 4. **Flatten** (effect) - rendered results become one [`NodeList`],
//!    readable tracked or peeked.
//!
//! A child list with nothing dynamic and no conditions skips the pipeline
//! and renders once.
//!
//! Errors on the first pass are returned to the caller. Errors on later
//! passes are reported as [`Diagnostic::UpdateFailed`] and the previous
//! output stays.

mod condition;
mod list;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use spark_signals::{derived, signal};

use crate::dom::Node;
use crate::element::{
    dynamic_text_descriptor, fragment, node_descriptor, text_descriptor, Child, Descriptor,
    NodeList, Rendered,
};
use crate::engine::Renderer;
use crate::error::{Diagnostic, RenderError, Result};
use crate::reactive::OwnerId;
use crate::scope::Scope;
use crate::types::DescriptorId;

use condition::ConditionCache;
pub use condition::{fold_conditions, ConditionFold};
pub(crate) use list::render_list;

// =============================================================================
// Normalization
// =============================================================================

enum Slot {
    Fixed(Descriptor),
    Dynamic(DynamicSlot),
}

/// Descriptors a dynamic child produced on its last pass, so the next pass
/// hands back the same descriptor for the same content.
#[derive(Default)]
struct SlotMemo {
    nodes: HashMap<Node, Descriptor>,
    list_texts: HashMap<(usize, Rc<str>), Descriptor>,
    fragments: HashMap<usize, Descriptor>,
}

/// Memo for one dynamic child.
struct DynamicSlot {
    get: Rc<dyn Fn() -> Child>,
    text: RefCell<Option<Descriptor>>,
    memo: RefCell<SlotMemo>,
}

/// One resolve pass: entries are moved from the previous memo into the next
/// one as they are used, so anything left behind is dropped.
struct Pass<'a> {
    slot: &'a DynamicSlot,
    prev: SlotMemo,
    next: SlotMemo,
}

fn each_misplaced() -> RenderError {
    RenderError::dynamic("an item callback is only valid as the single child of `for`")
}

/// Follow dynamic children down to a concrete one.
pub(crate) fn settle(mut child: Child) -> Child {
    while let Child::Dynamic(get) = child {
        child = get();
    }
    child
}

impl DynamicSlot {
    fn new(get: Rc<dyn Fn() -> Child>) -> Self {
        Self {
            get,
            text: RefCell::default(),
            memo: RefCell::default(),
        }
    }

    fn resolve(&self, out: &mut Vec<Descriptor>) -> Result<()> {
        let mut pass = Pass {
            slot: self,
            prev: self.memo.take(),
            next: SlotMemo::default(),
        };
        let result = pass.resolve(settle((self.get)()), out);
        *self.memo.borrow_mut() = pass.next;
        result
    }

    fn text(&self) -> Descriptor {
        let get = self.get.clone();
        self.text
            .borrow_mut()
            .get_or_insert_with(|| dynamic_text_descriptor(get))
            .clone()
    }
}

impl Pass<'_> {
    fn resolve(&mut self, child: Child, out: &mut Vec<Descriptor>) -> Result<()> {
        match child {
            Child::Empty | Child::Dynamic(_) => {}
            Child::Text(_) => out.push(self.slot.text()),
            Child::Node(n) => out.push(self.node(n)),
            Child::Descriptor(d) => out.push(d),
            Child::List(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    self.resolve_item(i, item, out)?;
                }
            }
            Child::Each(_) => return Err(each_misplaced()),
        }
        Ok(())
    }

    fn resolve_item(&mut self, position: usize, child: Child, out: &mut Vec<Descriptor>) -> Result<()> {
        match child {
            Child::Empty => {}
            Child::Text(t) => {
                let key = (position, t.clone());
                let prev = &mut self.prev.list_texts;
                let d = self
                    .next
                    .list_texts
                    .entry(key.clone())
                    .or_insert_with(|| prev.remove(&key).unwrap_or_else(|| text_descriptor(t)))
                    .clone();
                out.push(d);
            }
            Child::Node(n) => out.push(self.node(n)),
            Child::Descriptor(d) => out.push(d),
            Child::List(items) => {
                for item in items {
                    self.resolve_item(position, item, out)?;
                }
            }
            Child::Dynamic(get) => {
                let key = Rc::as_ptr(&get) as *const () as usize;
                let prev = &mut self.prev.fragments;
                let d = self
                    .next
                    .fragments
                    .entry(key)
                    .or_insert_with(|| {
                        prev.remove(&key)
                            .unwrap_or_else(|| fragment(vec![Child::Dynamic(get)]))
                    })
                    .clone();
                out.push(d);
            }
            Child::Each(_) => return Err(each_misplaced()),
        }
        Ok(())
    }

    fn node(&mut self, node: Node) -> Descriptor {
        let prev = &mut self.prev.nodes;
        self.next
            .nodes
            .entry(node.clone())
            .or_insert_with(|| prev.remove(&node).unwrap_or_else(|| node_descriptor(node)))
            .clone()
    }
}

fn collect_slots(child: &Child, out: &mut Vec<Slot>) -> Result<()> {
    match child {
        Child::Empty => {}
        Child::Text(t) => out.push(Slot::Fixed(text_descriptor(t.clone()))),
        Child::Node(n) => out.push(Slot::Fixed(node_descriptor(n.clone()))),
        Child::Descriptor(d) => out.push(Slot::Fixed(d.clone())),
        Child::List(items) => {
            for item in items {
                collect_slots(item, out)?;
            }
        }
        Child::Dynamic(get) => out.push(Slot::Dynamic(DynamicSlot::new(get.clone()))),
        Child::Each(_) => return Err(each_misplaced()),
    }
    Ok(())
}

fn normalize(slots: &[Slot]) -> Result<Vec<Descriptor>> {
    let mut out = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot {
            Slot::Fixed(d) => out.push(d.clone()),
            Slot::Dynamic(s) => s.resolve(&mut out)?,
        }
    }
    Ok(out)
}

/// Convert a single child (a component result, a list item) into one
/// descriptor. Anything that is not already a single descriptor is wrapped
/// in a fragment.
pub(crate) fn child_descriptor(child: Child) -> Result<Option<Descriptor>> {
    match child {
        Child::Empty => Ok(None),
        Child::Text(t) => Ok(Some(text_descriptor(t))),
        Child::Node(n) => Ok(Some(node_descriptor(n))),
        Child::Descriptor(d) => Ok(Some(d)),
        Child::Each(_) => Err(each_misplaced()),
        list_or_dynamic => Ok(Some(fragment(vec![list_or_dynamic]))),
    }
}

// =============================================================================
// Pipeline
// =============================================================================

fn render_all(
    ctx: &Renderer,
    owner: OwnerId,
    descriptors: &[Descriptor],
    scope: &Scope,
) -> Result<Vec<Rendered>> {
    ctx.with_owner(owner, || {
        descriptors
            .iter()
            .map(|d| d.render(ctx, scope))
            .collect::<Result<Vec<_>>>()
    })
}

/// Render `children` under the current owner.
pub fn render_children(ctx: &Renderer, children: &[Child], scope: &Scope) -> Result<Rendered> {
    let mut slots = Vec::new();
    for child in children {
        collect_slots(child, &mut slots)?;
    }

    let fixed: Option<Vec<Descriptor>> = slots
        .iter()
        .map(|slot| match slot {
            Slot::Fixed(d) if !d.meta().is_conditional() && !d.meta().is_else() => Some(d.clone()),
            _ => None,
        })
        .collect();
    if let Some(descriptors) = fixed {
        let rendered = descriptors
            .iter()
            .map(|d| d.render(ctx, scope))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Rendered::List(rendered));
    }

    let owner = ctx.create_owner(ctx.current_owner(), None);

    // Fixed slots keep their render while hidden; everything else that
    // leaves the output is unlinked.
    let kept: HashSet<DescriptorId> = slots
        .iter()
        .filter_map(|slot| match slot {
            Slot::Fixed(d) => Some(d.id()),
            Slot::Dynamic(_) => None,
        })
        .collect();
    let slots = Rc::new(slots);
    let conditions = Rc::new(ConditionCache::default());

    let normalized = derived(move || normalize(&slots));
    let surviving = derived(move || normalized.get().map(|ds| conditions.fold(&ds)));

    let rendered = signal(Vec::<Rendered>::new());
    let init_error: Rc<RefCell<Option<RenderError>>> = Rc::default();

    {
        let (stage_ctx, scope, rendered, init_error) =
            (ctx.clone(), scope.clone(), rendered.clone(), init_error.clone());
        let mut shown: Vec<Descriptor> = Vec::new();
        let mut first = true;
        ctx.effect(owner, move || {
            let ctx = &stage_ctx;
            let outcome = surviving
                .get()
                .and_then(|ds| render_all(ctx, owner, &ds, &scope).map(|items| (ds, items)));
            match outcome {
                Ok((descriptors, items)) => {
                    rendered.set(items);
                    let current: HashSet<DescriptorId> =
                        descriptors.iter().map(Descriptor::id).collect();
                    for gone in std::mem::replace(&mut shown, descriptors) {
                        if !current.contains(&gone.id()) && !kept.contains(&gone.id()) {
                            ctx.unlink(&gone);
                        }
                    }
                }
                Err(err) if first => *init_error.borrow_mut() = Some(err),
                Err(error) => ctx.report(Diagnostic::UpdateFailed { error }),
            }
            first = false;
        });
    }

    if let Some(err) = init_error.borrow_mut().take() {
        ctx.dispose_owner(owner);
        return Err(err);
    }

    Ok(Rendered::Live(NodeList::follow(ctx, owner, rendered)))
}

// =============================================================================
// Tests
// =============================================================================
