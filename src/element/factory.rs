//! Descriptor factory.
//!
//! [`make`] is the single entry point for building UI: a tag (element name,
//! structural tag or [`Component`]), an attribute set and children.
//!
//! | tag                 | renders                                          |
//! |---------------------|--------------------------------------------------|
//! | `"div"`, `"p"`, ... | an element with reactive attributes and children |
//! | `"for"`             | a keyed list over `each`                         |
//! | `"dynamic"`         | the element or component named by `component`    |
//! | `"fragment"`        | its children, no wrapper                         |
//! | `"env"` / `"scope"` | its children with attributes added to the scope  |
//! | a [`Component`]     | whatever the component returns                   |

use std::rc::Rc;

use super::component::{Component, Props};
use super::descriptor::{Descriptor, DescriptorKind, Rendered};
use super::{intrinsic, structural, Child};
use crate::attrs::{Attrs, Meta};
use crate::children::{child_descriptor, render_children, settle};
use crate::dom::Node;
use crate::engine::Renderer;
use crate::error::{RenderError, Result};
use crate::scope::Scope;

/// What [`make`] builds.
#[derive(Clone, Debug)]
pub enum Tag {
    Name(String),
    Component(Component),
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::Name(name.to_string())
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::Name(name)
    }
}

impl From<Component> for Tag {
    fn from(c: Component) -> Self {
        Tag::Component(c)
    }
}

impl From<&Component> for Tag {
    fn from(c: &Component) -> Self {
        Tag::Component(c.clone())
    }
}

/// Build a descriptor. Nothing renders until the descriptor is rendered or
/// latched.
pub fn make(tag: impl Into<Tag>, attrs: impl Into<Attrs>, children: Vec<Child>) -> Descriptor {
    let attrs = attrs.into();
    let meta = attrs.extract_meta();
    let children = Rc::new(children);

    match tag.into() {
        Tag::Component(component) => {
            let props = Props::new(attrs, (*children).clone());
            let kind = DescriptorKind::Component {
                component: component.clone(),
                props: props.clone(),
            };
            build(kind, meta, component_produce(component, props))
        }
        Tag::Name(name) => match name.as_str() {
            "for" => {
                let each = attrs.get_single("each", true);
                let meta = meta.and_then(|m| each.map(|each| (m, each)));
                match meta {
                    Ok((meta, each)) => build(
                        DescriptorKind::For,
                        Ok(meta),
                        structural::for_each(each, children),
                    ),
                    Err(err) => build(DescriptorKind::For, Err(err), |_, _| Ok(None)),
                }
            }
            "dynamic" => {
                let source = attrs.get_single("component", true);
                let meta = meta.and_then(|m| source.map(|s| (m, s)));
                match meta {
                    Ok((meta, source)) => build(
                        DescriptorKind::Dynamic,
                        Ok(meta),
                        structural::dynamic(source, attrs, children),
                    ),
                    Err(err) => build(DescriptorKind::Dynamic, Err(err), |_, _| Ok(None)),
                }
            }
            "fragment" => build(DescriptorKind::Fragment, meta, move |ctx, scope| {
                render_children(ctx, &children, scope).map(Some)
            }),
            "env" | "scope" => build(DescriptorKind::Env, meta, structural::env(attrs, children)),
            _ => {
                let produce = intrinsic::element(name.clone(), attrs, children);
                build(DescriptorKind::Element(name.to_ascii_lowercase()), meta, produce)
            }
        },
    }
}

/// Attach the produce function, or one that fails with the attribute
/// resolution error.
fn build<P>(kind: DescriptorKind, meta: Result<Meta>, produce: P) -> Descriptor
where
    P: Fn(&Renderer, &Scope) -> Result<Option<Rendered>> + 'static,
{
    match meta {
        Ok(meta) => Descriptor::new(kind, meta, produce),
        Err(err) => Descriptor::new(kind, Meta::default(), move |_, _| Err(err.clone())),
    }
}

fn component_produce(
    component: Component,
    props: Props,
) -> impl Fn(&Renderer, &Scope) -> Result<Option<Rendered>> {
    move |ctx, scope| {
        let wrap = |err: RenderError| RenderError::Component {
            name: component.name().to_string(),
            source: Box::new(err),
        };
        let child = component.call(&props, scope).map_err(wrap)?;
        let Some(descriptor) = child_descriptor(child).map_err(wrap)? else {
            return Ok(None);
        };
        descriptor.render(ctx, scope).map(Some).map_err(wrap)
    }
}

// =============================================================================
// Leaf Descriptors
// =============================================================================

/// Children rendered with no wrapper element.
pub fn fragment(children: Vec<Child>) -> Descriptor {
    make("fragment", Attrs::new(), children)
}

/// Static text.
pub fn text(text: impl Into<String>) -> Descriptor {
    text_descriptor(Rc::from(text.into()))
}

pub(crate) fn text_descriptor(text: Rc<str>) -> Descriptor {
    Descriptor::new(DescriptorKind::Text, Meta::default(), move |ctx, _| {
        Ok(Some(Rendered::Node(ctx.document().create_text(&text))))
    })
}

/// Text node that follows a dynamic child. One node for the slot's
/// lifetime; changes are text writes.
pub(crate) fn dynamic_text_descriptor(get: Rc<dyn Fn() -> Child>) -> Descriptor {
    Descriptor::new(DescriptorKind::Text, Meta::default(), move |ctx, _| {
        let Some(owner) = ctx.current_owner() else {
            return Err(RenderError::dynamic("dynamic text rendered outside an owner"));
        };
        let node = ctx.document().create_text("");
        let target = node.clone();
        let get = get.clone();
        let mut last: Option<Rc<str>> = None;
        ctx.effect(owner, move || {
            if let Child::Text(text) = settle(get()) {
                if last.as_ref() != Some(&text) {
                    target.set_text(&text);
                    last = Some(text);
                }
            }
        });
        Ok(Some(Rendered::Node(node)))
    })
}

/// An existing host node, used as-is.
pub(crate) fn node_descriptor(node: Node) -> Descriptor {
    Descriptor::new(DescriptorKind::Node, Meta::default(), move |_, _| {
        Ok(Some(Rendered::Node(node.clone())))
    })
}
