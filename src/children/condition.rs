//! Condition folding for `if` / `else` sibling chains.
//!
//! Siblings are folded left to right with a small accumulator:
//!
//! | descriptor        | chain satisfied | result                         |
//! |-------------------|-----------------|--------------------------------|
//! | plain             | any             | rendered; chain resets         |
//! | `if` / `when`     | any             | rendered when its guard holds  |
//! | `else` (+ guard)  | yes             | skipped; guard not evaluated   |
//! | `else` (+ guard)  | no              | rendered when its guard holds  |
//!
//! An `else` closes the chain once something in it rendered, so
//! `if a / else if b / else` renders exactly one branch.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::{derived, Derived};

use crate::element::Descriptor;
use crate::types::DescriptorId;

/// Accumulator threaded through a sibling list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionFold {
    /// Some branch of the current chain rendered.
    pub if_occurred: bool,
    /// The descriptor to render at this position, if any.
    pub value: Option<Descriptor>,
}

impl ConditionFold {
    /// Fold one more sibling.
    pub fn step(&self, descriptor: &Descriptor) -> ConditionFold {
        self.step_by(descriptor, || descriptor.meta().passes())
    }

    /// Fold one more sibling, asking `passes` for its guard only when the
    /// guard matters.
    fn step_by(&self, descriptor: &Descriptor, passes: impl FnOnce() -> bool) -> ConditionFold {
        let meta = descriptor.meta();

        if meta.is_else() {
            if self.if_occurred {
                return ConditionFold {
                    if_occurred: true,
                    value: None,
                };
            }
            let pass = passes();
            return ConditionFold {
                if_occurred: pass,
                value: pass.then(|| descriptor.clone()),
            };
        }

        if meta.is_conditional() {
            let pass = passes();
            return ConditionFold {
                if_occurred: pass,
                value: pass.then(|| descriptor.clone()),
            };
        }

        ConditionFold {
            if_occurred: false,
            value: Some(descriptor.clone()),
        }
    }
}

/// Descriptors that survive their conditions, in order.
pub fn fold_conditions(descriptors: &[Descriptor]) -> Vec<Descriptor> {
    let mut acc = ConditionFold::default();
    let mut out = Vec::with_capacity(descriptors.len());
    for d in descriptors {
        acc = acc.step(d);
        if let Some(v) = &acc.value {
            out.push(v.clone());
        }
    }
    out
}

// =============================================================================
// Memoized Fold
// =============================================================================

/// Descriptor, guard outcome, and (for `else` only) the previous
/// accumulator's address.
type StepKey = (DescriptorId, Option<bool>, Option<usize>);

/// Fold state kept between passes over the same sibling list.
///
/// Every guard lives in its own derived, so a pass re-evaluates only the
/// guards whose inputs changed. Steps are memoized on what they read: a
/// plain or `if` sibling on its own guard, an `else` also on the
/// accumulator before it. A sibling whose inputs did not change gets back
/// the same accumulator object. Entries not reached by the latest pass are
/// dropped.
#[derive(Default)]
pub(crate) struct ConditionCache {
    root: Rc<ConditionFold>,
    guards: RefCell<HashMap<DescriptorId, Derived<bool>>>,
    steps: RefCell<HashMap<StepKey, Rc<ConditionFold>>>,
}

impl ConditionCache {
    /// Accumulator after each sibling.
    pub fn steps(&self, descriptors: &[Descriptor]) -> Vec<Rc<ConditionFold>> {
        let mut guards = self.guards.take();
        let mut steps = self.steps.take();
        let mut next_guards = HashMap::with_capacity(guards.len());
        let mut next_steps = HashMap::with_capacity(steps.len());

        let mut acc = self.root.clone();
        let mut out = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            let (id, meta) = (d.id(), d.meta());
            let guarded = meta.is_conditional() || meta.is_else();

            let guard = guarded.then(|| {
                next_guards
                    .entry(id)
                    .or_insert_with(|| guards.remove(&id).unwrap_or_else(|| guard_of(d)))
                    .clone()
            });
            let skipped = meta.is_else() && acc.if_occurred;
            let pass = match guard {
                Some(guard) if !skipped => Some(guard.get()),
                _ => None,
            };

            let key = (id, pass, meta.is_else().then(|| Rc::as_ptr(&acc) as usize));
            let step = match steps.remove(&key).or_else(|| next_steps.get(&key).cloned()) {
                Some(step) => step,
                None => Rc::new(acc.step_by(d, || pass.unwrap_or(true))),
            };
            next_steps.insert(key, step.clone());
            out.push(step.clone());
            acc = step;
        }

        *self.guards.borrow_mut() = next_guards;
        *self.steps.borrow_mut() = next_steps;
        out
    }

    /// Descriptors that survive their conditions, in order.
    pub fn fold(&self, descriptors: &[Descriptor]) -> Vec<Descriptor> {
        self.steps(descriptors)
            .iter()
            .filter_map(|step| step.value.clone())
            .collect()
    }
}

fn guard_of(descriptor: &Descriptor) -> Derived<bool> {
    let descriptor = descriptor.clone();
    derived(move || descriptor.meta().passes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::make;
    use crate::props;
    use crate::types::AttrValue;
    use rstest::rstest;
    use spark_signals::{signal, Signal};
    use std::cell::Cell;

    fn node(attrs: crate::AttrMap) -> Descriptor {
        make("p", attrs, vec![])
    }

    #[rstest]
    #[case(true, false, 0)]
    #[case(false, true, 1)]
    #[case(false, false, 2)]
    #[case(true, true, 0)]
    fn test_if_else_if_else(#[case] a: bool, #[case] b: bool, #[case] expected: usize) {
        let chain = vec![
            node(props! { "if" => a }),
            node(props! { "else" => true, "if" => b }),
            node(props! { "else" => true }),
        ];

        let out = fold_conditions(&chain);

        assert_eq!(out, vec![chain[expected].clone()]);
        assert_eq!(ConditionCache::default().fold(&chain), out);
    }

    #[test]
    fn test_plain_sibling_resets_chain() {
        let chain = vec![
            node(props! { "if" => true }),
            node(props! {}),
            node(props! { "else" => true }),
        ];
        assert_eq!(fold_conditions(&chain).len(), 3);
    }

    #[test]
    fn test_else_guard_not_evaluated_when_chain_satisfied() {
        let reads = Rc::new(Cell::new(0));
        let r = reads.clone();
        let chain = vec![
            node(props! { "if" => true }),
            node(props! {
                "else" => true,
                "if" => AttrValue::getter(move || {
                    r.set(r.get() + 1);
                    true.into()
                }),
            }),
        ];

        assert_eq!(fold_conditions(&chain), vec![chain[0].clone()]);
        assert_eq!(reads.get(), 0);
    }

    #[test]
    fn test_when_guards() {
        let chain = vec![
            node(props! { "when:a" => true, "when:b" => false }),
            node(props! { "when:a" => true }),
        ];
        assert_eq!(fold_conditions(&chain), vec![chain[1].clone()]);
    }

    fn counted_guard(flag: &Signal<bool>, reads: &Rc<Cell<usize>>) -> AttrValue {
        let (flag, reads) = (flag.clone(), reads.clone());
        AttrValue::getter(move || {
            reads.set(reads.get() + 1);
            flag.get().into()
        })
    }

    #[test]
    fn test_cached_fold_reevaluates_only_the_changed_guard() {
        let (a, b) = (signal(true), signal(true));
        let (a_reads, b_reads) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let chain = vec![
            node(props! { "if" => counted_guard(&a, &a_reads) }),
            node(props! { "if" => counted_guard(&b, &b_reads) }),
            node(props! {}),
        ];
        let cache = ConditionCache::default();

        let before = cache.steps(&chain);
        let (a_base, b_base) = (a_reads.get(), b_reads.get());

        a.set(false);
        let after = cache.steps(&chain);

        assert_eq!(a_reads.get(), a_base + 1);
        assert_eq!(b_reads.get(), b_base, "unrelated guard is not re-run");
        assert!(!Rc::ptr_eq(&before[0], &after[0]));
        assert!(Rc::ptr_eq(&before[1], &after[1]), "unchanged sibling keeps its accumulator");
        assert!(Rc::ptr_eq(&before[2], &after[2]));
        assert_eq!(cache.fold(&chain), vec![chain[1].clone(), chain[2].clone()]);
    }

    #[test]
    fn test_cached_else_follows_the_chain() {
        let a = signal(true);
        let reads = Rc::new(Cell::new(0));
        let chain = vec![
            node(props! { "if" => counted_guard(&a, &reads) }),
            node(props! { "else" => true }),
        ];
        let cache = ConditionCache::default();
        assert_eq!(cache.fold(&chain), vec![chain[0].clone()]);

        a.set(false);
        assert_eq!(cache.fold(&chain), vec![chain[1].clone()]);

        a.set(true);
        assert_eq!(cache.fold(&chain), vec![chain[0].clone()]);
    }
}
