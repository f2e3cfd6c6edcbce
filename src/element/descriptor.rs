//! Descriptors - cached, render-once units of UI.
//!
//! A descriptor pairs an identity with a `produce` function. The first
//! [`Descriptor::render`] runs `produce` inside a tracker effect, caches the
//! result on the renderer and returns it; every later render returns the
//! cached value. If anything `produce` read changes afterwards, the tracker
//! fires again, but instead of rebuilding it reports
//! [`Diagnostic::RebuildDetected`] and keeps the cache. Fine-grained updates
//! belong to the effects a descriptor sets up, never to re-producing it.
//!
//! # Render state
//!
//! ```text
//! Unrendered ──render──▶ Rendering ──ok──▶ Rendered ◀──┐
//!                            │                 │        │
//!                           err          deps changed   │
//!                            ▼                 ▼        │
//!                        Unrendered    RebuildAttempted ┘
//! ```
//!
//! [`Renderer::unlink`] disposes everything a render created and returns the
//! descriptor to `Unrendered`.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use spark_signals::{signal, Signal};

use super::component::{Component, Props};
use crate::attrs::Meta;
use crate::dom::Node;
use crate::engine::Renderer;
use crate::error::{Diagnostic, RenderError, Result};
use crate::reactive::OwnerId;
use crate::scope::Scope;
use crate::types::{next_id, AttrValue, DescriptorId};

// =============================================================================
// Rendered Output
// =============================================================================

/// Live, reactive list of nodes. Reading it inside an effect subscribes to
/// changes.
#[derive(Clone)]
pub struct NodeList {
    id: u64,
    nodes: Signal<Vec<Node>>,
    snapshot: Rc<RefCell<Vec<Node>>>,
}

impl NodeList {
    /// Flatten `rendered` into one node list, kept current by an effect
    /// owned by `owner`.
    pub(crate) fn follow(ctx: &Renderer, owner: OwnerId, rendered: Signal<Vec<Rendered>>) -> Self {
        let nodes = signal(Vec::<Node>::new());
        let snapshot: Rc<RefCell<Vec<Node>>> = Rc::default();
        {
            let (nodes, snapshot) = (nodes.clone(), snapshot.clone());
            ctx.effect(owner, move || {
                let flat: Vec<Node> = rendered.get().iter().flat_map(Rendered::nodes).collect();
                *snapshot.borrow_mut() = flat.clone();
                nodes.set(flat);
            });
        }
        Self {
            id: next_id(),
            nodes,
            snapshot,
        }
    }

    /// Current nodes (tracked).
    pub fn get(&self) -> Vec<Node> {
        self.nodes.get()
    }

    /// Current nodes without subscribing.
    pub fn peek(&self) -> Vec<Node> {
        self.snapshot.borrow().clone()
    }
}

impl PartialEq for NodeList {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeList#{}{:?}", self.id, self.snapshot.borrow())
    }
}

/// Result of rendering a descriptor.
#[derive(Clone, Debug, PartialEq)]
pub enum Rendered {
    Node(Node),
    List(Vec<Rendered>),
    Live(NodeList),
}

impl Rendered {
    /// Flattened nodes. Live lists are read tracked.
    pub fn nodes(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect(&mut out, true);
        out
    }

    /// Flattened nodes without subscribing to live lists.
    pub fn peek_nodes(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect(&mut out, false);
        out
    }

    pub fn first_node(&self) -> Option<Node> {
        self.peek_nodes().into_iter().next()
    }

    fn collect(&self, out: &mut Vec<Node>, tracked: bool) {
        match self {
            Rendered::Node(n) => out.push(n.clone()),
            Rendered::List(items) => items.iter().for_each(|r| r.collect(out, tracked)),
            Rendered::Live(list) if tracked => out.extend(list.get()),
            Rendered::Live(list) => out.extend(list.peek()),
        }
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Builds the DOM for a descriptor. Returns `None` when there is nothing to
/// render.
pub type Produce = Rc<dyn Fn(&Renderer, &Scope) -> Result<Option<Rendered>>>;

/// What a descriptor renders.
#[derive(Clone)]
pub enum DescriptorKind {
    Element(String),
    Component { component: Component, props: Props },
    Text,
    Node,
    Fragment,
    For,
    Dynamic,
    Env,
}

struct DescriptorInner {
    id: DescriptorId,
    kind: DescriptorKind,
    meta: Meta,
    produce: Produce,
}

/// Render-once unit of UI. Cheap to clone; clones share identity.
#[derive(Clone)]
pub struct Descriptor(Rc<DescriptorInner>);

impl Descriptor {
    pub fn new(
        kind: DescriptorKind,
        meta: Meta,
        produce: impl Fn(&Renderer, &Scope) -> Result<Option<Rendered>> + 'static,
    ) -> Self {
        Descriptor(Rc::new(DescriptorInner {
            id: DescriptorId(next_id()),
            kind,
            meta,
            produce: Rc::new(produce),
        }))
    }

    pub fn id(&self) -> DescriptorId {
        self.0.id
    }

    pub fn kind(&self) -> &DescriptorKind {
        &self.0.kind
    }

    pub fn meta(&self) -> &Meta {
        &self.0.meta
    }

    /// Tag or component name, for diagnostics.
    pub fn name(&self) -> String {
        match &self.0.kind {
            DescriptorKind::Element(tag) => tag.clone(),
            DescriptorKind::Component { component, .. } => component.name().to_string(),
            DescriptorKind::Text => "#text".into(),
            DescriptorKind::Node => "#node".into(),
            DescriptorKind::Fragment => "fragment".into(),
            DescriptorKind::For => "for".into(),
            DescriptorKind::Dynamic => "dynamic".into(),
            DescriptorKind::Env => "env".into(),
        }
    }

    // =========================================================================
    // Render
    // =========================================================================

    /// Render under `ctx`, or return the cached result.
    pub fn render(&self, ctx: &Renderer, scope: &Scope) -> Result<Rendered> {
        let id = self.id();

        if let Some(hit) = ctx.cached(id) {
            ctx.reparent_instance(id);
            return Ok(hit);
        }
        if ctx.is_producing(id) {
            return Err(RenderError::dynamic(format!(
                "`{}` rendered itself while producing",
                self.name()
            )));
        }

        let owner = ctx.create_owner(ctx.current_owner(), Some(id));
        let instance = match &self.0.kind {
            DescriptorKind::Component { component, props } => {
                ctx.register_instance(component, props)
            }
            _ => None,
        };
        ctx.begin(id, owner, instance);

        let slot: Rc<RefCell<Option<Result<Option<Rendered>>>>> = Rc::default();
        {
            let (tracker_ctx, scope, this, slot) =
                (ctx.clone(), scope.clone(), self.clone(), slot.clone());
            let name = self.name();
            let mut produced = false;
            ctx.effect(owner, move || {
                if produced {
                    tracker_ctx.rebuild_attempted(id, &name);
                    return;
                }
                produced = true;
                let ctx = &tracker_ctx;
                let result = ctx.with_owner(owner, || {
                    ctx.with_instance(instance, || (this.0.produce)(ctx, &scope))
                });
                *slot.borrow_mut() = Some(result);
            });
        }

        let outcome = slot.borrow_mut().take().unwrap_or_else(|| {
            Err(RenderError::dynamic(format!("`{}` did not produce", self.name())))
        });
        let rendered = match outcome {
            Ok(Some(rendered)) => rendered,
            Ok(None) => {
                ctx.dispose_owner(owner);
                return Err(RenderError::dynamic(format!(
                    "`{}` produced no content",
                    self.name()
                )));
            }
            Err(err) => {
                ctx.dispose_owner(owner);
                return Err(err);
            }
        };

        ctx.finish(id, rendered.clone());
        if let Some(instance) = instance {
            ctx.set_instance_elements(instance, rendered.peek_nodes());
        }
        self.capture(ctx, &rendered);
        self.attach_hooks(ctx, owner, &rendered);

        Ok(rendered)
    }

    /// Hand the first produced node to the `this` target.
    fn capture(&self, ctx: &Renderer, rendered: &Rendered) {
        let Some(target) = &self.0.meta.this else {
            return;
        };
        let Some(node) = rendered.first_node() else {
            return;
        };
        match target {
            AttrValue::Ref(r) => r.set(node),
            AttrValue::Dynamic(prop) => {
                if !prop.is_writable() {
                    ctx.report(Diagnostic::MissingSetter { name: self.name() });
                } else {
                    prop.set(AttrValue::Node(node));
                }
            }
            other => tracing::warn!(found = other.type_name(), "`this` target is not capturable"),
        }
    }

    /// Run each mount hook as its own effect against every top-level node.
    fn attach_hooks(&self, ctx: &Renderer, owner: OwnerId, rendered: &Rendered) {
        for hook in &self.0.meta.mount {
            for node in rendered.peek_nodes().into_iter().filter(Node::is_element) {
                let last: Rc<RefCell<Option<crate::types::Cleanup>>> = Rc::default();
                {
                    let (hook_ctx, hook, last) = (ctx.clone(), hook.clone(), last.clone());
                    ctx.effect(owner, move || {
                        if let Some(cleanup) = last.borrow_mut().take() {
                            cleanup();
                        }
                        let next = hook_ctx.with_owner(owner, || hook(&node));
                        *last.borrow_mut() = next;
                    });
                }
                ctx.own(
                    owner,
                    Box::new(move || {
                        if let Some(cleanup) = last.borrow_mut().take() {
                            cleanup();
                        }
                    }),
                );
            }
        }
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Descriptor {}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.name(), self.0.id)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, NodeRef};
    use crate::element::{component, make, Child};
    use crate::engine::RenderState;
    use crate::props;
    use crate::types::Cleanup;
    use spark_signals::signal;
    use std::cell::Cell;

    fn setup() -> Renderer {
        Renderer::new(Document::new())
    }

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn test_render_once_returns_cached_result() {
        let ctx = setup();
        let (calls, calls_in) = counter();
        let card = component("Card", move |_, _| {
            calls_in.set(calls_in.get() + 1);
            Ok(make("div", props! { "class" => "card" }, vec![]).into())
        });
        let d = make(&card, props! {}, vec![]);

        let first = d.render(&ctx, &Scope::new()).unwrap();
        let second = d.render(&ctx, &Scope::new()).unwrap();

        assert_eq!(first, second, "cache hit returns the same nodes");
        assert_eq!(calls.get(), 1, "component evaluated exactly once");
        assert_eq!(ctx.render_state(&d), Some(RenderState::Rendered(first)));
    }

    #[test]
    fn test_rebuild_is_detected_and_suppressed() {
        let ctx = setup();
        let label = signal(String::from("a"));
        let (calls, calls_in) = counter();
        let reader = label.clone();
        let eager = component("Eager", move |_, _| {
            calls_in.set(calls_in.get() + 1);
            Ok(Child::text(reader.get()))
        });
        let d = make(eager, props! {}, vec![]);
        let rendered = d.render(&ctx, &Scope::new()).unwrap();

        label.set("b".into());

        assert_eq!(calls.get(), 1, "produce never runs twice");
        assert_eq!(rendered.first_node().unwrap().text(), "a");
        assert_eq!(
            ctx.render_state(&d),
            Some(RenderState::RebuildAttempted(rendered.clone()))
        );
        assert!(ctx.diagnostics().iter().any(|diag| matches!(
            diag,
            Diagnostic::RebuildDetected { descriptor, name } if *descriptor == d.id() && name == "Eager"
        )));

        let again = d.render(&ctx, &Scope::new()).unwrap();
        assert_eq!(again, rendered);
        assert_eq!(ctx.render_state(&d), Some(RenderState::Rendered(rendered)));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unlink_returns_to_unrendered() {
        let ctx = setup();
        let (calls, calls_in) = counter();
        let item = component("Item", move |_, _| {
            calls_in.set(calls_in.get() + 1);
            Ok(make("li", props! {}, vec!["x".into()]).into())
        });
        let d = make(item, props! {}, vec![]);

        let first = d.render(&ctx, &Scope::new()).unwrap();
        assert!(ctx.is_rendered(&d));
        assert_eq!(ctx.component_count(), 1);

        ctx.unlink(&d);
        assert!(!ctx.is_rendered(&d));
        assert_eq!(ctx.cache_len(), 0, "nested descriptors are dropped too");
        assert_eq!(ctx.owner_count(), 0);
        assert_eq!(ctx.component_count(), 0);

        let second = d.render(&ctx, &Scope::new()).unwrap();
        assert_eq!(calls.get(), 2);
        assert_ne!(first.first_node(), second.first_node(), "fresh DOM after unlink");
        assert_eq!(
            first.first_node().unwrap().outer_html(),
            second.first_node().unwrap().outer_html()
        );
    }

    #[test]
    fn test_empty_component_is_an_error() {
        let ctx = setup();
        let nothing = component("Nothing", |_, _| Ok(Child::Empty));
        let d = make(nothing, props! {}, vec![]);

        let err = d.render(&ctx, &Scope::new()).unwrap_err();

        assert!(matches!(err.root_cause(), RenderError::DynamicRendering(_)));
        assert!(!ctx.is_rendered(&d));
        assert_eq!(ctx.owner_count(), 0, "failed render leaves nothing behind");
    }

    #[test]
    fn test_component_error_is_wrapped() {
        let ctx = setup();
        let broken = component("Broken", |_, _| Err(RenderError::dynamic("boom")));
        let err = make(broken, props! {}, vec![])
            .render(&ctx, &Scope::new())
            .unwrap_err();

        assert_eq!(
            err,
            RenderError::Component {
                name: "Broken".into(),
                source: Box::new(RenderError::dynamic("boom")),
            }
        );
    }

    #[test]
    fn test_this_capture() {
        let ctx = setup();
        let slot = NodeRef::new();
        let d = make("input", props! { "this" => slot.clone() }, vec![]);

        let rendered = d.render(&ctx, &Scope::new()).unwrap();

        assert_eq!(slot.get(), rendered.first_node());
        assert!(!rendered.first_node().unwrap().has_attribute("this"));
    }

    #[test]
    fn test_this_without_setter_is_reported() {
        let ctx = setup();
        let d = make("input", props! { "this" => AttrValue::getter(|| AttrValue::Null) }, vec![]);

        d.render(&ctx, &Scope::new()).unwrap();

        assert_eq!(
            ctx.diagnostics(),
            vec![Diagnostic::MissingSetter { name: "input".into() }]
        );
    }

    #[test]
    fn test_mount_hook_reruns_and_cleans_up() {
        let ctx = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mode = signal(1);

        let (hook_log, hook_mode) = (log.clone(), mode.clone());
        let hook = AttrValue::hook(move |node| {
            let m = hook_mode.get();
            hook_log.borrow_mut().push(format!("run {} {}", node.tag_name().unwrap_or(""), m));
            let cleanup_log = hook_log.clone();
            let cleanup: Cleanup = Box::new(move || cleanup_log.borrow_mut().push(format!("cleanup {}", m)));
            Some(cleanup)
        });
        let d = make("canvas", props! { "use:paint" => hook }, vec![]);

        d.render(&ctx, &Scope::new()).unwrap();
        mode.set(2);
        ctx.unlink(&d);

        assert_eq!(
            *log.borrow(),
            vec!["run canvas 1", "cleanup 1", "run canvas 2", "cleanup 2"]
        );
    }
}
