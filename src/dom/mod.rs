//! Host DOM - the tree the engine renders into.
//!
//! A small in-memory document exposing only the operations the engine
//! needs:
//! - [`Document`] - node factory, readiness queue, selector lookup, [`DomStats`]
//! - [`Node`] - identity-compared handle with tree, attribute, text and event APIs
//! - [`sync_children`] - minimal-move child list reconciliation

mod document;
mod node;
mod sync;

pub use document::{Document, DomStats, ReadyState};
pub use node::{Event, Listener, ListenerId, Node, NodeKind, NodeRef};
pub use sync::{sync_children, sync_children_bounded, SyncReport};
