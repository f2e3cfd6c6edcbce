//! Intrinsic elements - host elements with reactive attributes.
//!
//! Produce creates the element once and wires effects that keep it in sync:
//!
//! - **keyset**: tracks which plain keys exist and runs one writer per key.
//!   A writer re-resolves its key and writes only when the string form
//!   changed. Keys that disappear stop their writer and drop the attribute.
//! - **class** / **style**: merged across layers, written on change.
//! - **events**: `on:<event>` handlers, re-registered when they change,
//!   removed with the element's owner.
//! - **children**: the child pipeline's node list, reconciled with
//!   [`sync_children_bounded`].
//!
//! Every effect is owned by the element's render owner.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use super::descriptor::Rendered;
use super::Child;
use crate::attrs::Attrs;
use crate::children::render_children;
use crate::dom::{sync_children_bounded, ListenerId, Node};
use crate::engine::Renderer;
use crate::error::{Diagnostic, RenderError, Result};
use crate::reactive::{detached_effect, OwnerId};
use crate::scope::Scope;
use crate::types::{AttrValue, Cleanup};

pub(crate) fn element(
    tag: String,
    attrs: Attrs,
    children: Rc<Vec<Child>>,
) -> impl Fn(&Renderer, &Scope) -> Result<Option<Rendered>> {
    move |ctx, scope| {
        let Some(owner) = ctx.current_owner() else {
            return Err(RenderError::dynamic(format!("`{}` rendered outside an owner", tag)));
        };
        let el = ctx.document().create_element(&tag);

        bind_attributes(ctx, owner, &el, &attrs)?;
        bind_classes(ctx, owner, &el, &attrs);
        bind_styles(ctx, owner, &el, &attrs);
        bind_events(ctx, owner, &el, &attrs);

        if !children.is_empty() {
            let content = render_children(ctx, &children, scope)?;
            bind_children(ctx, owner, &el, content);
        }

        Ok(Some(Rendered::Node(el)))
    }
}

// =============================================================================
// Attributes
// =============================================================================

fn bind_attributes(ctx: &Renderer, owner: OwnerId, el: &Node, attrs: &Attrs) -> Result<()> {
    let writers: Rc<RefCell<IndexMap<String, Cleanup>>> = Rc::default();
    let init_error: Rc<RefCell<Option<RenderError>>> = Rc::default();
    let initial = Rc::new(Cell::new(true));

    {
        let (keyset_ctx, el, attrs) = (ctx.clone(), el.clone(), attrs.clone());
        let (writers, init_error, initial) = (writers.clone(), init_error.clone(), initial.clone());
        ctx.effect(owner, move || {
            let keys = attrs.plain_keys();

            let gone: Vec<(String, Cleanup)> = {
                let mut current = writers.borrow_mut();
                let stale: Vec<String> = current
                    .keys()
                    .filter(|k| !keys.contains(k))
                    .cloned()
                    .collect();
                stale
                    .into_iter()
                    .filter_map(|k| current.shift_remove(&k).map(|stop| (k, stop)))
                    .collect()
            };
            for (key, stop) in gone {
                stop();
                el.remove_attribute(&key);
            }

            for key in keys {
                if writers.borrow().contains_key(&key) {
                    continue;
                }
                let stop = spawn_writer(&keyset_ctx, &el, &attrs, &key, &init_error, &initial);
                writers.borrow_mut().insert(key, stop);
            }
        });
    }
    ctx.own(
        owner,
        Box::new(move || {
            for (_, stop) in writers.take() {
                stop();
            }
        }),
    );

    initial.set(false);
    match init_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// One key's writer. Its stop is held by the keyset, not the owner, so a
/// key that disappears can be stopped on its own.
fn spawn_writer(
    ctx: &Renderer,
    el: &Node,
    attrs: &Attrs,
    key: &str,
    init_error: &Rc<RefCell<Option<RenderError>>>,
    initial: &Rc<Cell<bool>>,
) -> Cleanup {
    let (ctx, el, attrs, key) = (ctx.clone(), el.clone(), attrs.clone(), key.to_string());
    let (init_error, initial) = (init_error.clone(), initial.clone());
    let mut last: Option<String> = None;

    detached_effect(move || match attrs.get(&key) {
        Ok(value) => {
            let next = value.and_then(|v| v.to_attr_string());
            if next != last {
                match &next {
                    Some(v) => el.set_attribute(&key, v),
                    None => el.remove_attribute(&key),
                }
                last = next;
            }
        }
        Err(err) if initial.get() => {
            init_error.borrow_mut().get_or_insert(err);
        }
        Err(error) => ctx.report(Diagnostic::UpdateFailed { error }),
    })
}

// =============================================================================
// Class & Style
// =============================================================================

fn bind_merged(
    ctx: &Renderer,
    owner: OwnerId,
    el: &Node,
    name: &'static str,
    merge: impl Fn() -> String + 'static,
) {
    let el = el.clone();
    let mut last = String::new();
    ctx.effect(owner, move || {
        let next = merge();
        if next != last {
            if next.is_empty() {
                el.remove_attribute(name);
            } else {
                el.set_attribute(name, &next);
            }
            last = next;
        }
    });
}

fn bind_classes(ctx: &Renderer, owner: OwnerId, el: &Node, attrs: &Attrs) {
    let attrs = attrs.clone();
    bind_merged(ctx, owner, el, "class", move || attrs.merge_classes());
}

fn bind_styles(ctx: &Renderer, owner: OwnerId, el: &Node, attrs: &Attrs) {
    let attrs = attrs.clone();
    bind_merged(ctx, owner, el, "style", move || attrs.style_text());
}

// =============================================================================
// Events
// =============================================================================

fn bind_events(ctx: &Renderer, owner: OwnerId, el: &Node, attrs: &Attrs) {
    let registered: Rc<RefCell<Vec<ListenerId>>> = Rc::default();

    {
        let (el, attrs, registered) = (el.clone(), attrs.clone(), registered.clone());
        ctx.effect(owner, move || {
            let handlers = attrs.get_category("on");
            for id in registered.take() {
                el.remove_event_listener(id);
            }
            let mut ids = Vec::with_capacity(handlers.len());
            for (event, handler) in handlers {
                match handler.collapse() {
                    AttrValue::Handler(listener) => ids.push(el.add_event_listener(&event, listener)),
                    AttrValue::Null => {}
                    other => tracing::warn!(event = %event, found = other.type_name(), "ignoring non-handler `on:` entry"),
                }
            }
            *registered.borrow_mut() = ids;
        });
    }

    let el = el.clone();
    ctx.own(
        owner,
        Box::new(move || {
            for id in registered.take() {
                el.remove_event_listener(id);
            }
        }),
    );
}

// =============================================================================
// Children
// =============================================================================

fn bind_children(ctx: &Renderer, owner: OwnerId, el: &Node, content: Rendered) {
    let el = el.clone();
    let max_search = ctx.config().max_sync_search;
    ctx.effect(owner, move || {
        let nodes = content.nodes();
        sync_children_bounded(&el, &nodes, max_search);
    });
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::attrs::Attrs;
    use crate::dom::{Document, DomStats, Node};
    use crate::element::make;
    use crate::engine::Renderer;
    use crate::error::RenderError;
    use crate::props;
    use crate::scope::Scope;
    use crate::types::AttrValue;
    use spark_signals::signal;
    use std::cell::Cell;
    use std::rc::Rc;

    fn render(ctx: &Renderer, attrs: impl Into<Attrs>) -> Node {
        make("div", attrs, vec![])
            .render(ctx, &Scope::new())
            .unwrap()
            .first_node()
            .unwrap()
    }

    #[test]
    fn test_attribute_written_only_on_change() {
        let ctx = Renderer::new(Document::new());
        let n = signal(1);
        let reader = n.clone();
        let sign = AttrValue::getter(move || AttrValue::from(if reader.get() > 0 { "pos" } else { "neg" }));
        let el = render(&ctx, props! { "title" => sign });
        assert_eq!(el.attribute("title").as_deref(), Some("pos"));
        ctx.document().reset_stats();

        n.set(2);
        assert_eq!(ctx.document().stats(), DomStats::default(), "same text, no write");

        n.set(-1);
        assert_eq!(el.attribute("title").as_deref(), Some("neg"));
        assert_eq!(ctx.document().stats().attribute_writes, 1);
    }

    #[test]
    fn test_boolean_and_null_attributes() {
        let ctx = Renderer::new(Document::new());
        let disabled = signal(false);
        let el = render(&ctx, props! { "disabled" => disabled.clone(), "id" => AttrValue::Null });

        assert!(!el.has_attribute("disabled"));
        assert!(!el.has_attribute("id"));

        disabled.set(true);
        assert_eq!(el.attribute("disabled").as_deref(), Some(""));
    }

    #[test]
    fn test_reactive_layer_adds_and_drops_keys() {
        let ctx = Renderer::new(Document::new());
        let flag = signal(false);
        let reader = flag.clone();
        let attrs = Attrs::from(props! { "id" => "box" }).reactive_layer(move || {
            if reader.get() {
                props! { "data-open" => "yes" }
            } else {
                props! {}
            }
        });
        let el = render(&ctx, attrs);
        assert!(!el.has_attribute("data-open"));

        flag.set(true);
        assert_eq!(el.attribute("data-open").as_deref(), Some("yes"));

        flag.set(false);
        assert!(!el.has_attribute("data-open"));
        assert_eq!(el.attribute("id").as_deref(), Some("box"));
    }

    #[test]
    fn test_class_and_style_merge() {
        let ctx = Renderer::new(Document::new());
        let active = signal(false);
        let el = render(
            &ctx,
            props! {
                "class" => "btn",
                "class:active" => active.clone(),
                "style" => "color: red",
                "style:width" => "10px",
            },
        );
        assert_eq!(el.attribute("class").as_deref(), Some("btn"));
        assert_eq!(el.attribute("style").as_deref(), Some("color: red; width: 10px"));

        active.set(true);
        assert_eq!(el.attribute("class").as_deref(), Some("btn active"));
    }

    #[test]
    fn test_event_handlers_bound_and_released() {
        let ctx = Renderer::new(Document::new());
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let button = make(
            "button",
            props! { "on:click" => AttrValue::handler(move |_| counter.set(counter.get() + 1)) },
            vec!["go".into()],
        );
        let el = button.render(&ctx, &Scope::new()).unwrap().first_node().unwrap();

        assert!(!el.has_attribute("on:click"));
        assert_eq!(el.dispatch_event("click"), 1);
        assert_eq!(clicks.get(), 1);

        ctx.unlink(&button);
        assert_eq!(el.listener_count(), 0);
        assert_eq!(el.dispatch_event("click"), 0);
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn test_children_follow_the_pipeline() {
        let ctx = Renderer::new(Document::new());
        let show = signal(true);
        let list = make(
            "ul",
            props! {},
            vec![
                make("li", props! { "if" => show.clone() }, vec!["a".into()]).into(),
                make("li", props! {}, vec!["b".into()]).into(),
            ],
        );
        let ul = list.render(&ctx, &Scope::new()).unwrap().first_node().unwrap();
        assert_eq!(ul.inner_html(), "<li>a</li><li>b</li>");

        show.set(false);
        assert_eq!(ul.inner_html(), "<li>b</li>");
    }

    #[test]
    fn test_category_conflict_fails_render() {
        let ctx = Renderer::new(Document::new());
        let d = make("div", props! { "data" => "x", "data:y" => "1" }, vec![]);

        let err = d.render(&ctx, &Scope::new()).unwrap_err();

        assert_eq!(
            err,
            RenderError::InvalidAttributeType { key: "data".into(), found: "string" }
        );
        assert!(!ctx.is_rendered(&d));
    }
}
