//! Mount API - attach rendered content to a host element.
//!
//! # Example
//!
//! ```ignore
//! use spark_dom::{latch, make, props, Document, Renderer, Scope};
//!
//! let doc = Document::new();
//! let ctx = Renderer::new(doc.clone());
//!
//! let app = make("p", props! { "class" => "greeting" }, vec!["hello".into()]);
//! let handle = latch(&ctx, "#app", app, &Scope::new())?;
//!
//! // Later
//! handle.unmount();
//! ```
//!
//! A target holds one mount at a time. Latching onto an occupied target
//! reports [`Diagnostic::LatchConflict`] and tears the previous mount down
//! first. While the document is still loading, the mount is deferred until
//! it finishes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::children::child_descriptor;
use crate::dom::{sync_children_bounded, Document, Node};
use crate::element::{Child, Rendered};
use crate::engine::{Latch, Renderer};
use crate::error::{Diagnostic, Result};
use crate::scope::Scope;
use crate::types::Cleanup;

// =============================================================================
// Target
// =============================================================================

/// Where to mount: a `#id` / tag selector or an element.
#[derive(Clone, Debug)]
pub enum Target {
    Selector(String),
    Element(Node),
}

impl Target {
    fn resolve(&self, doc: &Document) -> Option<Node> {
        match self {
            Target::Selector(s) => doc.query(s),
            Target::Element(n) => Some(n.clone()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Target::Selector(s) => s.clone(),
            Target::Element(n) => format!("{:?}", n),
        }
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target::Selector(s.to_string())
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Target::Selector(s)
    }
}

impl From<Node> for Target {
    fn from(n: Node) -> Self {
        Target::Element(n)
    }
}

impl From<&Node> for Target {
    fn from(n: &Node) -> Self {
        Target::Element(n.clone())
    }
}

// =============================================================================
// Mount Handle
// =============================================================================

struct MountState {
    ctx: Renderer,
    id: u64,
    target: RefCell<Option<Node>>,
    teardown: Rc<RefCell<Option<Cleanup>>>,
    cancelled: Cell<bool>,
}

impl MountState {
    fn new(ctx: &Renderer) -> Rc<Self> {
        Rc::new(MountState {
            ctx: ctx.clone(),
            id: ctx.next_mount_id(),
            target: RefCell::new(None),
            teardown: Rc::default(),
            cancelled: Cell::new(false),
        })
    }

    fn teardown(&self) {
        self.cancelled.set(true);
        let teardown = self.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }
}

/// Handle returned by [`latch`].
///
/// Dropping the handle unmounts. Call [`MountHandle::persist`] to keep the
/// mount alive until [`unlatch`] or a conflicting latch.
pub struct MountHandle {
    state: Option<Rc<MountState>>,
}

impl MountHandle {
    /// Tear down: dispose every subscription, listener and hook the mount
    /// created and clear the target's children.
    pub fn unmount(mut self) {
        if let Some(state) = self.state.take() {
            state.teardown();
        }
    }

    /// Content is attached (false while deferred, after teardown, or when
    /// the target was not found).
    pub fn is_mounted(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.teardown.borrow().is_some())
    }

    pub fn target(&self) -> Option<Node> {
        self.state.as_ref().and_then(|s| s.target.borrow().clone())
    }

    /// Give up the handle without unmounting.
    pub fn persist(mut self) {
        self.state.take();
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.teardown();
        }
    }
}

// =============================================================================
// Latch
// =============================================================================

/// Render `content` into `target`.
///
/// Errors from the initial render are returned. A missing target is not an
/// error: it is reported as [`Diagnostic::TargetNotFound`] and the handle is
/// inert.
pub fn latch(
    ctx: &Renderer,
    target: impl Into<Target>,
    content: impl Into<Child>,
    scope: &Scope,
) -> Result<MountHandle> {
    let state = MountState::new(ctx);
    let target = target.into();
    let content = content.into();

    if ctx.document().is_loading() {
        tracing::debug!(selector = %target.describe(), "document loading; mount deferred");
        let (deferred, scope) = (state.clone(), scope.clone());
        ctx.document().on_ready(move || {
            if deferred.cancelled.get() {
                return;
            }
            if let Err(error) = attach(&deferred, &target, content, &scope) {
                deferred.ctx.report(Diagnostic::UpdateFailed { error });
            }
        });
    } else {
        attach(&state, &target, content, scope)?;
    }

    Ok(MountHandle { state: Some(state) })
}

fn attach(state: &MountState, target: &Target, content: Child, scope: &Scope) -> Result<()> {
    let ctx = &state.ctx;
    let Some(node) = target.resolve(ctx.document()) else {
        ctx.report(Diagnostic::TargetNotFound {
            target: target.describe(),
        });
        return Ok(());
    };

    if let Some(previous) = ctx.take_latch(&node) {
        ctx.report(Diagnostic::LatchConflict {
            target: target.describe(),
        });
        let teardown = previous.teardown.borrow_mut().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    let owner = ctx.create_owner(None, None);
    let rendered = ctx.with_owner(owner, || -> Result<Option<Rendered>> {
        match child_descriptor(content)? {
            Some(descriptor) => descriptor.render(ctx, scope).map(Some),
            None => Ok(None),
        }
    });
    let rendered = match rendered {
        Ok(rendered) => rendered,
        Err(err) => {
            ctx.dispose_owner(owner);
            return Err(err);
        }
    };

    {
        let el = node.clone();
        let max_search = ctx.config().max_sync_search;
        ctx.effect(owner, move || {
            let nodes = rendered.as_ref().map(Rendered::nodes).unwrap_or_default();
            sync_children_bounded(&el, &nodes, max_search);
        });
    }

    let (ctx, el, id) = (ctx.clone(), node.clone(), state.id);
    *state.target.borrow_mut() = Some(node.clone());
    *state.teardown.borrow_mut() = Some(Box::new(move || {
        ctx.dispose_owner(owner);
        el.clear_children();
        ctx.release_target(&el, id);
        tracing::debug!(mount = id, "unmounted");
    }));
    state.ctx.latch_target(
        &node,
        Latch {
            id: state.id,
            teardown: state.teardown.clone(),
        },
    );
    tracing::debug!(mount = state.id, selector = %target.describe(), "mounted");
    Ok(())
}

/// Tear down whatever is mounted on `target`. Returns whether anything was.
pub fn unlatch(ctx: &Renderer, target: impl Into<Target>) -> bool {
    let target = target.into();
    let Some(node) = target.resolve(ctx.document()) else {
        return false;
    };
    let Some(latch) = ctx.take_latch(&node) else {
        return false;
    };
    let teardown = latch.teardown.borrow_mut().take();
    if let Some(teardown) = teardown {
        teardown();
    }
    true
}

/// Render `content` into a detached container, return its HTML and dispose
/// everything. Never deferred, so it works on a loading document too.
pub fn render_to_string(ctx: &Renderer, content: impl Into<Child>, scope: &Scope) -> Result<String> {
    let container = ctx.document().create_element("div");
    let state = MountState::new(ctx);
    attach(&state, &Target::Element(container.clone()), content.into(), scope)?;
    let html = container.inner_html();
    state.teardown();
    Ok(html)
}

// =============================================================================
// Tests
// =============================================================================
