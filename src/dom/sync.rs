//! Child synchronizer - brings a live child list in line with a target list.
//!
//! # Algorithm
//!
//! 1. Walk target index `i` from 0
//! 2. If the live child at `i` is already the target node: advance
//! 3. Otherwise search forward in the *live* list for the target node:
//!    - found: move it into position with `insert_before`
//!    - not found: insert it fresh at `i`
//! 4. Remove trailing live children past the target length
//!
//! This is not an LCS minimal-move diff. It favors nodes already adjacent to
//! their slot and is O(n·m) in the worst case (full reversal). Descriptor
//! caching keeps most passes down to a handful of real moves.

use super::node::Node;

/// What a synchronization pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Existing children moved into position.
    pub moved: usize,
    /// Nodes that were not children of `parent` before the pass.
    pub inserted: usize,
    /// Trailing children removed.
    pub removed: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.moved == 0 && self.inserted == 0 && self.removed == 0
    }
}

/// Synchronize `parent`'s children with `target`.
pub fn sync_children(parent: &Node, target: &[Node]) -> SyncReport {
    sync_children_bounded(parent, target, None)
}

/// Like [`sync_children`] but limits the forward search to `max_search`
/// live siblings. A node outside the window is moved as if it were new.
pub fn sync_children_bounded(
    parent: &Node,
    target: &[Node],
    max_search: Option<usize>,
) -> SyncReport {
    let mut report = SyncReport::default();

    for (i, node) in target.iter().enumerate() {
        let live = parent.child_at(i);
        if live.as_ref() == Some(node) {
            continue;
        }

        let window_end = match max_search {
            Some(limit) => (i + 1 + limit).min(parent.child_count()),
            None => parent.child_count(),
        };
        let found = (i + 1..window_end).any(|j| parent.child_at(j).as_ref() == Some(node));

        parent.insert_before(node, live.as_ref());
        if found {
            report.moved += 1;
        } else {
            report.inserted += 1;
        }
    }

    while parent.child_count() > target.len() {
        let Some(last) = parent.child_at(parent.child_count() - 1) else {
            break;
        };
        parent.remove_child(&last);
        report.removed += 1;
    }

    if !report.is_noop() {
        tracing::trace!(
            moved = report.moved,
            inserted = report.inserted,
            removed = report.removed,
            "synchronized children"
        );
    }

    report
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, DomStats};
    use rstest::rstest;

    fn setup(n: usize) -> (Document, Node, Vec<Node>) {
        let doc = Document::new();
        let parent = doc.create_element("ul");
        let nodes: Vec<Node> = (0..n).map(|_| doc.create_element("li")).collect();
        for node in &nodes {
            parent.append_child(node);
        }
        doc.reset_stats();
        (doc, parent, nodes)
    }

    fn pick(nodes: &[Node], order: &[usize]) -> Vec<Node> {
        order.iter().map(|&i| nodes[i].clone()).collect()
    }

    #[test]
    fn test_swap_is_single_move() {
        let (doc, parent, nodes) = setup(3);
        let target = pick(&nodes, &[0, 2, 1]);

        let report = sync_children(&parent, &target);

        assert_eq!(parent.child_nodes(), target);
        assert_eq!(report, SyncReport { moved: 1, inserted: 0, removed: 0 });
        assert_eq!(
            doc.stats(),
            DomStats { inserted: 1, ..Default::default() },
            "exactly one insert_before, no removals, no creations"
        );
    }

    #[rstest]
    #[case(&[0, 1, 2], 0, 0)]
    #[case(&[1, 2], 2, 1)]
    #[case(&[0, 2], 1, 1)]
    #[case(&[2, 1, 0], 2, 0)]
    #[case(&[], 0, 3)]
    fn test_reorders(#[case] order: &[usize], #[case] moved: usize, #[case] removed: usize) {
        let (_doc, parent, nodes) = setup(3);
        let target = pick(&nodes, order);

        let report = sync_children(&parent, &target);

        assert_eq!(parent.child_nodes(), target);
        assert_eq!(report.moved, moved);
        assert_eq!(report.removed, removed);
        assert_eq!(report.inserted, 0);
    }

    #[test]
    fn test_fresh_nodes_inserted_in_place() {
        let (doc, parent, nodes) = setup(2);
        let fresh = doc.create_element("li");
        let target = vec![nodes[0].clone(), fresh.clone(), nodes[1].clone()];

        let report = sync_children(&parent, &target);

        assert_eq!(parent.child_nodes(), target);
        assert_eq!(report, SyncReport { moved: 0, inserted: 1, removed: 0 });
    }

    #[test]
    fn test_node_from_other_parent_is_adopted() {
        let (doc, parent, nodes) = setup(1);
        let elsewhere = doc.create_element("div");
        let stray = doc.create_element("li");
        elsewhere.append_child(&stray);

        sync_children(&parent, &[stray.clone(), nodes[0].clone()]);

        assert_eq!(parent.child_nodes(), vec![stray.clone(), nodes[0].clone()]);
        assert_eq!(elsewhere.child_count(), 0);
        assert_eq!(stray.parent(), Some(parent));
    }

    #[test]
    fn test_second_pass_is_noop() {
        let (doc, parent, nodes) = setup(4);
        let target = pick(&nodes, &[3, 0, 2, 1]);
        sync_children(&parent, &target);
        doc.reset_stats();

        let report = sync_children(&parent, &target);

        assert!(report.is_noop());
        assert_eq!(doc.stats(), DomStats::default());
    }

    #[test]
    fn test_bounded_search_still_converges() {
        let (_doc, parent, nodes) = setup(5);
        let target = pick(&nodes, &[4, 3, 2, 1, 0]);

        let report = sync_children_bounded(&parent, &target, Some(1));

        assert_eq!(parent.child_nodes(), target);
        assert_eq!(report.removed, 0);
        assert!(report.inserted > 0, "far nodes are treated as fresh inserts");
    }
}
