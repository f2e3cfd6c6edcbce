//! Owned effects.
//!
//! `spark-signals` parents an effect to whichever effect is running when it
//! is created, destroys those children every time the parent re-runs, and
//! queues plain effects created during a flush. Neither fits a renderer: a
//! list re-render must not kill the subscriptions of the items it keeps, and
//! a render must see its first evaluation (and its errors) before it returns.
//!
//! [`detached_effect`] wraps an `effect_sync` in its own `effect_root`. The
//! root is preserved across re-runs of whatever effect created it, and the
//! inner effect runs before the call returns. Its lifetime belongs to the
//! returned stop alone, which the renderer registers with an owner.

use spark_signals::{effect_root, effect_sync};

use crate::types::Cleanup;

/// Start `f` as an effect that only its returned stop ends.
pub(crate) fn detached_effect<F>(f: F) -> Cleanup
where
    F: FnMut() + 'static,
{
    Box::new(effect_root(move || {
        let _ = effect_sync(f);
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark_signals::{effect, signal};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_survives_a_rerun_of_the_creating_effect() {
        let outer = signal(0);
        let inner = signal(0);
        let runs = Rc::new(Cell::new(0));
        let stops: Rc<RefCell<Vec<Cleanup>>> = Rc::default();

        let (outer_in, inner_in, runs_in, stops_in) =
            (outer.clone(), inner.clone(), runs.clone(), stops.clone());
        let _parent = effect(move || {
            if outer_in.get() == 0 {
                let (inner, runs) = (inner_in.clone(), runs_in.clone());
                stops_in.borrow_mut().push(detached_effect(move || {
                    let _ = inner.get();
                    runs.set(runs.get() + 1);
                }));
            }
        });
        assert_eq!(runs.get(), 1);

        outer.set(1);
        inner.set(1);
        assert_eq!(runs.get(), 2, "still subscribed after the parent re-ran");

        for stop in stops.take() {
            stop();
        }
        inner.set(2);
        assert_eq!(runs.get(), 2, "stop ends it");
    }

    #[test]
    fn test_first_run_happens_inside_a_running_effect() {
        let trigger = signal(0);
        let seen: Rc<RefCell<Vec<i32>>> = Rc::default();
        let stops: Rc<RefCell<Vec<Cleanup>>> = Rc::default();

        let (trigger_in, seen_in, stops_in) = (trigger.clone(), seen.clone(), stops.clone());
        let _parent = effect(move || {
            let n = trigger_in.get();
            let ran = Rc::new(Cell::new(false));
            let flag = ran.clone();
            stops_in.borrow_mut().push(detached_effect(move || flag.set(true)));
            seen_in.borrow_mut().push(if ran.get() { n } else { -1 });
        });

        trigger.set(1);

        assert_eq!(*seen.borrow(), vec![0, 1]);
    }
}
