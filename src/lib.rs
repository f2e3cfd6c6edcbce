//! # spark-dom
//!
//! Fine-grained reactive DOM rendering for Rust.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! reactivity. There is no virtual DOM and no re-render of a subtree: each
//! piece of UI is built once, and individual effects keep individual
//! attributes, text nodes and child lists in sync with the signals they read.
//!
//! ## Architecture
//!
//! ```text
//! make(tag, attrs, children) ─▶ Descriptor ─render─▶ Rendered (cached per Renderer)
//!                                   │
//!          attrs: layered set ──────┤  keyset + writer effects → attributes
//!          children: pipeline ──────┘  normalize → condition → render → flatten
//!                                                                    │
//!                                          sync_children ◀───────────┘
//! ```
//!
//! - A [`Descriptor`] renders at most once per [`Renderer`]. Changes to what
//!   its render read are reported as [`Diagnostic::RebuildDetected`], never
//!   acted on.
//! - Everything a render creates is owned by it and disposed with it
//!   ([`Renderer::unlink`], [`MountHandle::unmount`]).
//! - [`latch`] attaches content to a host element.
//!
//! ## Modules
//!
//! - [`dom`] - in-memory host document and the child synchronizer
//! - [`attrs`] - layered attribute sets, class/style merging, metadata
//! - [`element`] - descriptors, components, the `make` factory
//! - [`children`] - the child pipeline and keyed lists
//! - [`engine`] - the render context and component records
//! - [`pipeline`] - mounting

pub mod attrs;
pub mod children;
pub mod config;
pub mod dom;
pub mod element;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod reactive;
pub mod scope;
pub mod types;

pub use types::*;

pub use attrs::{Attrs, Layer, Meta, MetaFlags, StyleMap};
pub use children::{fold_conditions, render_children, ConditionFold};
pub use config::RendererConfig;
pub use dom::{
    sync_children, sync_children_bounded, Document, DomStats, Event, Node, NodeKind, NodeRef,
    ReadyState, SyncReport,
};
pub use element::{
    component, fragment, make, text, Child, Component, Descriptor, DescriptorKind, NodeList,
    Props, Rendered, Tag,
};
pub use engine::{ComponentInstance, InstanceId, RenderState, Renderer};
pub use error::{Diagnostic, RenderError};
pub use pipeline::{latch, render_to_string, unlatch, MountHandle, Target};
pub use reactive::{collapse, OwnerId, Prop, Value};
pub use scope::Scope;

/// Build an [`AttrMap`] from `key => value` pairs.
///
/// ```ignore
/// let attrs = props! {
///     "id" => "main",
///     "class:active" => is_active,
///     "on:click" => AttrValue::handler(|_| println!("clicked")),
/// };
/// ```
#[macro_export]
macro_rules! props {
    () => {
        $crate::AttrMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::AttrMap::new();
        $(
            map.insert(::std::string::String::from($key), $crate::AttrValue::from($value));
        )+
        map
    }};
}
