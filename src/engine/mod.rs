//! Engine - render context and component records.
//!
//! - [`Renderer`]: document, render cache, ownership graph, mount table,
//!   diagnostics
//! - Registry: component instance records with a parent context stack
//!
//! # Architecture
//!
//! Descriptors are immutable and shareable. All mutable render state lives
//! in the renderer, keyed by descriptor id:
//!
//! ```text
//! Descriptor d1 ──▶ Rendered(<div>)    owner o1 ─┬─ o2 (d2, <span>)
//! Descriptor d2 ──▶ Rendered(<span>)             └─ o3 (pipeline)
//! ```
//!
//! Disposing an owner drops the cache entries of every descriptor rendered
//! beneath it.

mod registry;
mod renderer;

pub use registry::{ComponentInstance, InstanceId};
pub use renderer::{RenderState, Renderer};
pub(crate) use renderer::Latch;
