//! Reactive plumbing on top of `spark-signals`.
//!
//! - [`Value`] / [`Prop`] - static-or-reactive values with optional write-back
//! - [`OwnerId`] - handles into the renderer's ownership graph
//! - `detached_effect` - effects whose lifetime belongs to an owner

mod effect;
mod owner;
mod value;

pub(crate) use effect::detached_effect;
pub(crate) use owner::OwnerArena;
pub use owner::OwnerId;
pub use value::{collapse, Prop, Value};
