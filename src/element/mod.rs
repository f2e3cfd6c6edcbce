//! Elements - descriptors and how they are built.
//!
//! - [`make`] builds descriptors from a tag, attributes and children
//! - [`Descriptor`] renders once per renderer and caches the result
//! - [`Component`] / [`Props`] for user-defined components
//! - [`Child`] is everything accepted as a child

mod child;
mod component;
mod descriptor;
mod factory;
mod intrinsic;
mod structural;

pub use child::{Child, EachFn};
pub use component::{component, Component, ComponentFn, Props};
pub use descriptor::{Descriptor, DescriptorKind, NodeList, Produce, Rendered};
pub use factory::{fragment, make, text, Tag};
pub(crate) use factory::{dynamic_text_descriptor, node_descriptor, text_descriptor};
