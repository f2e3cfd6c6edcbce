//! Structural tags: `for`, `dynamic`, `env`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::signal;

use super::descriptor::{Descriptor, NodeList, Rendered};
use super::factory::{make, Tag};
use super::Child;
use crate::attrs::{Attrs, STRUCTURAL_KEYS};
use crate::children::{render_children, render_list};
use crate::engine::Renderer;
use crate::error::{Diagnostic, RenderError, Result};
use crate::scope::Scope;
use crate::types::AttrValue;

type ProduceResult = Result<Option<Rendered>>;

// =============================================================================
// for
// =============================================================================

/// `for` needs an `each` list and exactly one item callback child.
pub(crate) fn for_each(
    each: Option<AttrValue>,
    children: Rc<Vec<Child>>,
) -> impl Fn(&Renderer, &Scope) -> ProduceResult {
    move |ctx, scope| {
        let each = each
            .clone()
            .ok_or_else(|| RenderError::dynamic("`for` requires an `each` attribute"))?;
        let callback = match children.as_slice() {
            [Child::Each(callback)] => callback.clone(),
            _ => {
                return Err(RenderError::dynamic(
                    "`for` expects exactly one item callback child",
                ))
            }
        };
        render_list(ctx, each, callback, scope).map(Some)
    }
}

// =============================================================================
// dynamic
// =============================================================================

/// Cache key and tag for what `component` currently names.
fn resolve_target(value: AttrValue) -> Result<Option<(String, Tag)>> {
    match value {
        AttrValue::Null => Ok(None),
        AttrValue::Str(name) if name.is_empty() => Ok(None),
        AttrValue::Str(name) => Ok(Some((format!("tag:{}", name), Tag::Name(name.to_string())))),
        AttrValue::Component(c) => Ok(Some((format!("component:{:x}", c.key()), Tag::from(c)))),
        other => Err(RenderError::dynamic(format!(
            "`dynamic` expects `component` to be a tag name or component, found {}",
            other.type_name()
        ))),
    }
}

/// Render whatever `component` names, switching when it changes. Each
/// distinct target keeps its descriptor, so switching back reuses its DOM.
pub(crate) fn dynamic(
    source: Option<AttrValue>,
    attrs: Attrs,
    children: Rc<Vec<Child>>,
) -> impl Fn(&Renderer, &Scope) -> ProduceResult {
    let mut masked: Vec<&str> = STRUCTURAL_KEYS.to_vec();
    masked.push("component");
    let inner_attrs = attrs.without(&masked);

    move |ctx, scope| {
        let Some(owner) = ctx.current_owner() else {
            return Err(RenderError::dynamic("`dynamic` rendered outside an owner"));
        };
        let source = source.clone().unwrap_or_default();
        let cache: Rc<RefCell<HashMap<String, Descriptor>>> = Rc::default();
        let rendered = signal(Vec::<Rendered>::new());
        let init_error: Rc<RefCell<Option<RenderError>>> = Rc::default();

        {
            let (stage_ctx, scope, attrs, children) =
                (ctx.clone(), scope.clone(), inner_attrs.clone(), children.clone());
            let (rendered, init_error) = (rendered.clone(), init_error.clone());
            let mut first = true;
            ctx.effect(owner, move || {
                let ctx = &stage_ctx;
                let outcome = resolve_target(source.collapse()).and_then(|target| {
                    let Some((key, tag)) = target else {
                        return Ok(Vec::new());
                    };
                    let descriptor = cache
                        .borrow_mut()
                        .entry(key)
                        .or_insert_with(|| make(tag, attrs.clone(), (*children).clone()))
                        .clone();
                    ctx.with_owner(owner, || descriptor.render(ctx, &scope))
                        .map(|r| vec![r])
                });
                match outcome {
                    Ok(items) => {
                        rendered.set(items);
                    }
                    Err(err) if first => *init_error.borrow_mut() = Some(err),
                    Err(error) => ctx.report(Diagnostic::UpdateFailed { error }),
                }
                first = false;
            });
        }

        if let Some(err) = init_error.take() {
            return Err(err);
        }

        Ok(Some(Rendered::Live(NodeList::follow(ctx, owner, rendered))))
    }
}

// =============================================================================
// env
// =============================================================================

/// Children rendered with the plain attributes layered onto the scope.
pub(crate) fn env(attrs: Attrs, children: Rc<Vec<Child>>) -> impl Fn(&Renderer, &Scope) -> ProduceResult {
    move |ctx, scope| {
        let mut entries = Vec::new();
        for key in attrs.plain_keys() {
            if let Some(value) = attrs.get(&key)? {
                entries.push((key, value));
            }
        }
        let scope = scope.extend(entries);
        render_children(ctx, &children, &scope).map(Some)
    }
}

// =============================================================================
// Tests
// =============================================================================
