//! Renderer - the per-tree render context.
//!
//! Holds everything a render needs that is not part of a descriptor:
//! - the host [`Document`]
//! - the descriptor render cache and its state machine
//! - the ownership graph (owner arena + owner stack)
//! - component instance records
//! - the mount table (one mount per target element)
//! - recorded [`Diagnostic`]s
//!
//! Nothing here is global. Two renderers never share state, so server-side
//! use gets one renderer per request.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::RendererConfig;
use crate::dom::{Document, Node};
use crate::element::{Component, Descriptor, Props, Rendered};
use crate::error::Diagnostic;
use crate::reactive::{detached_effect, OwnerArena, OwnerId};
use crate::types::{Cleanup, DescriptorId};

use super::registry::{ComponentInstance, ComponentRegistry, InstanceId};

// =============================================================================
// Render State
// =============================================================================

/// Where a descriptor is in its lifecycle. `Unrendered` is the absence of a
/// cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    /// `produce` is running.
    Rendering,
    Rendered(Rendered),
    /// Render dependencies changed. Settles back to `Rendered` on the next
    /// render, which still returns the cached result.
    RebuildAttempted(Rendered),
}

struct CacheEntry {
    state: RenderState,
    owner: OwnerId,
    instance: Option<InstanceId>,
}

/// A latched mount: its id and the teardown to run on conflict or unlatch.
pub(crate) struct Latch {
    pub id: u64,
    pub teardown: Rc<RefCell<Option<Cleanup>>>,
}

// =============================================================================
// Renderer
// =============================================================================

struct RendererInner {
    document: Document,
    config: RendererConfig,
    cache: RefCell<HashMap<DescriptorId, CacheEntry>>,
    owners: RefCell<OwnerArena>,
    components: RefCell<ComponentRegistry>,
    latched: RefCell<HashMap<Node, Latch>>,
    diagnostics: RefCell<Vec<Diagnostic>>,
    next_mount: Cell<u64>,
}

/// Render context. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Renderer(Rc<RendererInner>);

impl Renderer {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, RendererConfig::default())
    }

    pub fn with_config(document: Document, config: RendererConfig) -> Self {
        Renderer(Rc::new(RendererInner {
            document,
            config,
            cache: RefCell::default(),
            owners: RefCell::default(),
            components: RefCell::default(),
            latched: RefCell::default(),
            diagnostics: RefCell::default(),
            next_mount: Cell::new(0),
        }))
    }

    pub fn document(&self) -> &Document {
        &self.0.document
    }

    pub fn config(&self) -> &RendererConfig {
        &self.0.config
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Log a diagnostic and, if configured, record it.
    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        let quiet = matches!(diagnostic, Diagnostic::RebuildDetected { .. })
            && !self.0.config.warn_on_rebuild;
        if !quiet {
            diagnostic.log();
        }
        if self.0.config.record_diagnostics {
            self.0.diagnostics.borrow_mut().push(diagnostic);
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.0.diagnostics.borrow().clone()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.0.diagnostics.borrow_mut())
    }

    // =========================================================================
    // Ownership
    // =========================================================================

    pub(crate) fn current_owner(&self) -> Option<OwnerId> {
        self.0.owners.borrow().current()
    }

    pub(crate) fn create_owner(&self, parent: Option<OwnerId>, descriptor: Option<DescriptorId>) -> OwnerId {
        self.0.owners.borrow_mut().allocate(parent, descriptor)
    }

    /// Run `f` with `owner` current.
    pub(crate) fn with_owner<R>(&self, owner: OwnerId, f: impl FnOnce() -> R) -> R {
        self.0.owners.borrow_mut().push(owner);
        let result = f();
        self.0.owners.borrow_mut().pop();
        result
    }

    /// Register `cleanup` with `owner`; runs it now if the owner is gone.
    pub(crate) fn own(&self, owner: OwnerId, cleanup: Cleanup) {
        let orphan = self.0.owners.borrow_mut().add_cleanup(owner, cleanup);
        if let Some(cleanup) = orphan {
            cleanup();
        }
    }

    /// Start `f` as an effect owned by `owner`. It runs once before this
    /// returns and stops only when `owner` is disposed.
    pub(crate) fn effect(&self, owner: OwnerId, f: impl FnMut() + 'static) {
        self.own(owner, detached_effect(f));
    }

    /// Register `cleanup` with the current owner.
    ///
    /// Returns `false` when nothing is rendering; the cleanup is dropped
    /// without running.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) -> bool {
        match self.current_owner() {
            Some(owner) => {
                self.own(owner, Box::new(cleanup));
                true
            }
            None => {
                tracing::debug!("cleanup registered outside any render; dropped");
                false
            }
        }
    }

    /// Dispose `owner`'s subtree: run cleanups and forget every descriptor
    /// rendered under it.
    pub(crate) fn dispose_owner(&self, owner: OwnerId) {
        let released = self.0.owners.borrow_mut().release(owner);
        for cleanup in released.cleanups {
            cleanup();
        }

        let instances: Vec<InstanceId> = {
            let mut cache = self.0.cache.borrow_mut();
            released
                .descriptors
                .iter()
                .filter_map(|d| cache.remove(d))
                .filter_map(|entry| entry.instance)
                .collect()
        };
        let mut components = self.0.components.borrow_mut();
        for instance in instances {
            components.release(instance);
        }
    }

    pub fn owner_count(&self) -> usize {
        self.0.owners.borrow().len()
    }

    // =========================================================================
    // Render Cache
    // =========================================================================

    /// Cached result for `id`. A pending rebuild attempt settles back to
    /// `Rendered` here.
    pub(crate) fn cached(&self, id: DescriptorId) -> Option<Rendered> {
        let mut cache = self.0.cache.borrow_mut();
        let entry = cache.get_mut(&id)?;
        match &entry.state {
            RenderState::Rendered(r) => Some(r.clone()),
            RenderState::RebuildAttempted(r) => {
                let r = r.clone();
                entry.state = RenderState::Rendered(r.clone());
                Some(r)
            }
            RenderState::Rendering => None,
        }
    }

    pub(crate) fn is_producing(&self, id: DescriptorId) -> bool {
        matches!(
            self.0.cache.borrow().get(&id).map(|e| &e.state),
            Some(RenderState::Rendering)
        )
    }

    pub(crate) fn begin(&self, id: DescriptorId, owner: OwnerId, instance: Option<InstanceId>) {
        self.0.cache.borrow_mut().insert(
            id,
            CacheEntry {
                state: RenderState::Rendering,
                owner,
                instance,
            },
        );
    }

    pub(crate) fn finish(&self, id: DescriptorId, rendered: Rendered) {
        if let Some(entry) = self.0.cache.borrow_mut().get_mut(&id) {
            entry.state = RenderState::Rendered(rendered);
        }
    }

    /// Tracker re-fired for a rendered descriptor: record it, keep the cache.
    pub(crate) fn rebuild_attempted(&self, id: DescriptorId, name: &str) {
        {
            let mut cache = self.0.cache.borrow_mut();
            let Some(entry) = cache.get_mut(&id) else {
                return;
            };
            let (RenderState::Rendered(rendered) | RenderState::RebuildAttempted(rendered)) =
                &entry.state
            else {
                return;
            };
            entry.state = RenderState::RebuildAttempted(rendered.clone());
        }
        self.report(Diagnostic::RebuildDetected {
            descriptor: id,
            name: name.to_string(),
        });
    }

    pub fn render_state(&self, descriptor: &Descriptor) -> Option<RenderState> {
        self.0
            .cache
            .borrow()
            .get(&descriptor.id())
            .map(|e| e.state.clone())
    }

    pub fn is_rendered(&self, descriptor: &Descriptor) -> bool {
        matches!(
            self.render_state(descriptor),
            Some(RenderState::Rendered(_) | RenderState::RebuildAttempted(_))
        )
    }

    pub fn cache_len(&self) -> usize {
        self.0.cache.borrow().len()
    }

    /// Dispose everything `descriptor`'s render created and return it to
    /// the unrendered state. The next render produces fresh DOM.
    pub fn unlink(&self, descriptor: &Descriptor) {
        let owner = self.0.cache.borrow().get(&descriptor.id()).map(|e| e.owner);
        if let Some(owner) = owner {
            tracing::trace!(descriptor = %descriptor.id(), "unlink");
            self.dispose_owner(owner);
        }
    }

    // =========================================================================
    // Component Instances
    // =========================================================================

    pub(crate) fn register_instance(&self, component: &Component, props: &Props) -> Option<InstanceId> {
        if !self.0.config.track_components {
            return None;
        }
        Some(self.0.components.borrow_mut().allocate(component, props))
    }

    /// Run `f` with `instance` as the current component.
    pub(crate) fn with_instance<R>(&self, instance: Option<InstanceId>, f: impl FnOnce() -> R) -> R {
        let Some(instance) = instance else {
            return f();
        };
        self.0.components.borrow_mut().push(instance);
        let result = f();
        self.0.components.borrow_mut().pop();
        result
    }

    pub(crate) fn set_instance_elements(&self, instance: InstanceId, nodes: Vec<Node>) {
        self.0.components.borrow_mut().set_elements(instance, nodes);
    }

    /// A cache hit for a component under a different parent moves its record.
    pub(crate) fn reparent_instance(&self, id: DescriptorId) {
        let instance = self.0.cache.borrow().get(&id).and_then(|e| e.instance);
        if let Some(instance) = instance {
            self.0.components.borrow_mut().reparent_to_current(instance);
        }
    }

    pub fn instance_of(&self, descriptor: &Descriptor) -> Option<ComponentInstance> {
        let instance = self.0.cache.borrow().get(&descriptor.id()).and_then(|e| e.instance)?;
        self.0.components.borrow().get(instance).cloned()
    }

    pub fn instance(&self, id: InstanceId) -> Option<ComponentInstance> {
        self.0.components.borrow().get(id).cloned()
    }

    pub fn component_count(&self) -> usize {
        self.0.components.borrow().len()
    }

    /// Indented component tree.
    pub fn component_tree(&self) -> String {
        self.0.components.borrow().tree()
    }

    // =========================================================================
    // Mount Table
    // =========================================================================

    pub(crate) fn next_mount_id(&self) -> u64 {
        let id = self.0.next_mount.get();
        self.0.next_mount.set(id + 1);
        id
    }

    /// Record a mount on `target`, returning the previous one.
    pub(crate) fn latch_target(&self, target: &Node, latch: Latch) -> Option<Latch> {
        self.0.latched.borrow_mut().insert(target.clone(), latch)
    }

    /// Remove `target`'s mount if it is still `id`.
    pub(crate) fn release_target(&self, target: &Node, id: u64) {
        let mut latched = self.0.latched.borrow_mut();
        if latched.get(target).is_some_and(|l| l.id == id) {
            latched.remove(target);
        }
    }

    pub(crate) fn take_latch(&self, target: &Node) -> Option<Latch> {
        self.0.latched.borrow_mut().remove(target)
    }

    pub fn is_latched(&self, target: &Node) -> bool {
        self.0.latched.borrow().contains_key(target)
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("cached", &self.cache_len())
            .field("owners", &self.owner_count())
            .field("components", &self.component_count())
            .finish()
    }
}
