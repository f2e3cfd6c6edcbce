//! Keyed list projection for `for`.
//!
//! Items are keyed by identity ([`ItemKey`]) plus an occurrence counter, so
//! repeated primitive values each keep their own entry. On every change of
//! the source list:
//! - new keys: the item callback runs once and its descriptor renders
//! - kept keys: only the index signal is updated
//! - dropped keys: the descriptor is unlinked (subscriptions, listeners and
//!   hooks disposed)
//!
//! The output is a live node list in source order.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use spark_signals::{signal, Signal};

use super::child_descriptor;
use crate::element::{fragment, Descriptor, EachFn, NodeList, Rendered};
use crate::engine::Renderer;
use crate::error::{Diagnostic, RenderError, Result};
use crate::reactive::{Prop, Value};
use crate::scope::Scope;
use crate::types::{AttrValue, ItemKey};

struct ListEntry {
    descriptor: Descriptor,
    index: Signal<usize>,
}

type Entries = IndexMap<(ItemKey, usize), ListEntry>;

fn items_of(each: &AttrValue) -> Result<Rc<Vec<AttrValue>>> {
    match each.collapse() {
        AttrValue::List(items) => Ok(items),
        AttrValue::Null => Ok(Rc::default()),
        other => Err(RenderError::dynamic(format!(
            "`for` expects `each` to be a list, found {}",
            other.type_name()
        ))),
    }
}

/// One reconciliation pass: reuse, create and drop entries, then render in
/// order.
fn reconcile(
    ctx: &Renderer,
    scope: &Scope,
    callback: &EachFn,
    items: &[AttrValue],
    entries: &RefCell<Entries>,
) -> Result<Vec<Rendered>> {
    let mut prev = std::mem::take(&mut *entries.borrow_mut());
    let mut next = Entries::with_capacity(items.len());
    let mut seen: HashMap<ItemKey, usize> = HashMap::new();
    let mut failure = None;

    for (i, item) in items.iter().enumerate() {
        let key = item.key();
        let occurrence = seen.entry(key.clone()).or_insert(0);
        let slot = (key, *occurrence);
        *occurrence += 1;

        if let Some(entry) = prev.shift_remove(&slot) {
            entry.index.set(i);
            next.insert(slot, entry);
            continue;
        }

        if slot.1 > 0 {
            ctx.report(Diagnostic::DuplicateKey {
                key: format!("{:?}", item),
            });
        }
        let index = signal(i);
        let reader = index.clone();
        let child = callback(item.clone(), Value::Dynamic(Prop::getter(move || reader.get())));
        match child_descriptor(child) {
            Ok(descriptor) => {
                let descriptor = descriptor.unwrap_or_else(|| fragment(Vec::new()));
                next.insert(slot, ListEntry { descriptor, index });
            }
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    for (_, stale) in prev {
        ctx.unlink(&stale.descriptor);
    }

    let rendered = match failure {
        Some(err) => Err(err),
        None => next
            .values()
            .map(|e| e.descriptor.render(ctx, scope))
            .collect::<Result<Vec<_>>>(),
    };
    *entries.borrow_mut() = next;
    rendered
}

/// Project `each` through `callback` under the current owner.
pub(crate) fn render_list(
    ctx: &Renderer,
    each: AttrValue,
    callback: EachFn,
    scope: &Scope,
) -> Result<Rendered> {
    let owner = ctx.create_owner(ctx.current_owner(), None);
    let entries: Rc<RefCell<Entries>> = Rc::default();
    let rendered = signal(Vec::<Rendered>::new());
    let init_error: Rc<RefCell<Option<RenderError>>> = Rc::default();

    {
        let (stage_ctx, scope, entries, rendered, init_error) = (
            ctx.clone(),
            scope.clone(),
            entries.clone(),
            rendered.clone(),
            init_error.clone(),
        );
        let mut first = true;
        ctx.effect(owner, move || {
            let ctx = &stage_ctx;
            let outcome = items_of(&each).and_then(|items| {
                ctx.with_owner(owner, || reconcile(ctx, &scope, &callback, &items, &entries))
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
    ctx.own(owner, Box::new(move || entries.borrow_mut().clear()));

    if let Some(err) = init_error.borrow_mut().take() {
        ctx.dispose_owner(owner);
        return Err(err);
    }

    Ok(Rendered::Live(NodeList::follow(ctx, owner, rendered)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::dom::{Document, Node};
    use crate::element::{make, Child};
    use crate::engine::Renderer;
    use crate::error::Diagnostic;
    use crate::props;
    use crate::scope::Scope;
    use crate::types::{AttrValue, Cleanup};
    use spark_signals::signal;
    use std::cell::Cell;
    use std::rc::Rc;

    fn texts(nodes: &[Node]) -> Vec<String> {
        nodes.iter().map(Node::text_content).collect()
    }

    #[test]
    fn test_removing_middle_item_disposes_only_it() {
        let ctx = Renderer::new(Document::new());
        let items = signal(vec!["a", "b", "c"]);
        let mark = signal("");
        let created = Rc::new(Cell::new(0));
        let disposed = Rc::new(Cell::new(0));

        let (created_in, disposed_in, mark_in) = (created.clone(), disposed.clone(), mark.clone());
        let list = make(
            "for",
            props! { "each" => items.clone() },
            vec![Child::each(move |item, _| {
                created_in.set(created_in.get() + 1);
                let disposed = disposed_in.clone();
                let hook = AttrValue::hook(move |_| {
                    let disposed = disposed.clone();
                    let cleanup: Cleanup = Box::new(move || disposed.set(disposed.get() + 1));
                    Some(cleanup)
                });
                let (label, mark) = (item.to_text(), mark_in.clone());
                let text = Child::dynamic(move || format!("{}{}", label, mark.get()).into());
                make("li", props! { "use" => hook }, vec![text]).into()
            })],
        );

        let rendered = list.render(&ctx, &Scope::new()).unwrap();
        let before = rendered.peek_nodes();
        assert_eq!(texts(&before), vec!["a", "b", "c"]);

        items.set(vec!["a", "c"]);

        let after = rendered.peek_nodes();
        assert_eq!(after, vec![before[0].clone(), before[2].clone()]);
        assert_eq!(disposed.get(), 1, "only the removed item is disposed");
        assert_eq!(created.get(), 3, "kept items are not re-created");

        mark.set("!");
        assert_eq!(texts(&after), vec!["a!", "c!"], "kept items still update");
        assert_eq!(before[1].text_content(), "b", "the removed item stopped updating");
    }

    #[test]
    fn test_append_keeps_existing_nodes() {
        let ctx = Renderer::new(Document::new());
        let items = signal(vec![1, 2, 3]);
        let mark = signal("");
        let mark_in = mark.clone();
        let list = make(
            "for",
            props! { "each" => items.clone() },
            vec![Child::each(move |item, _| {
                let (label, mark) = (item.to_text(), mark_in.clone());
                let text = Child::dynamic(move || format!("{}{}", label, mark.get()).into());
                make("li", props! {}, vec![text]).into()
            })],
        );

        let rendered = list.render(&ctx, &Scope::new()).unwrap();
        let before = rendered.peek_nodes();

        items.set(vec![1, 2, 3, 4]);

        let after = rendered.peek_nodes();
        assert_eq!(&after[..3], &before[..]);
        assert_eq!(texts(&after), vec!["1", "2", "3", "4"]);

        mark.set("*");
        assert_eq!(
            texts(&rendered.peek_nodes()),
            vec!["1*", "2*", "3*", "4*"],
            "items kept across the append still update"
        );
    }

    #[test]
    fn test_index_follows_reorder() {
        let ctx = Renderer::new(Document::new());
        let items = signal(vec!["x", "y"]);
        let list = make(
            "for",
            props! { "each" => items.clone() },
            vec![Child::each(|item, index| {
                let label = item.to_text();
                make(
                    "li",
                    props! {},
                    vec![Child::dynamic(move || format!("{}:{}", label, index.collapse()).into())],
                )
                .into()
            })],
        );

        let rendered = list.render(&ctx, &Scope::new()).unwrap();
        let before = rendered.peek_nodes();
        assert_eq!(texts(&before), vec!["x:0", "y:1"]);

        items.set(vec!["y", "x"]);

        let after = rendered.peek_nodes();
        assert_eq!(after, vec![before[1].clone(), before[0].clone()]);
        assert_eq!(texts(&after), vec!["y:0", "x:1"]);
    }

    #[test]
    fn test_duplicate_values_get_their_own_entries() {
        let ctx = Renderer::new(Document::new());
        let list = make(
            "for",
            props! { "each" => vec!["a", "a"] },
            vec![Child::each(|item, _| make("li", props! {}, vec![item.into()]).into())],
        );

        let rendered = list.render(&ctx, &Scope::new()).unwrap();

        let nodes = rendered.peek_nodes();
        assert_eq!(texts(&nodes), vec!["a", "a"]);
        assert_ne!(nodes[0], nodes[1]);
        assert!(matches!(
            ctx.diagnostics().as_slice(),
            [Diagnostic::DuplicateKey { .. }]
        ));
    }

    #[test]
    fn test_non_list_each_is_an_error() {
        let ctx = Renderer::new(Document::new());
        let list = make(
            "for",
            props! { "each" => 3 },
            vec![Child::each(|item, _| item.into())],
        );

        assert!(list.render(&ctx, &Scope::new()).is_err());
        assert_eq!(ctx.owner_count(), 0);
    }
}
