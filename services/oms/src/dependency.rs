//! Order dependency graph (§3 "Order Dependency", §4.4 "Dependencies").
//!
//! Each child order has at most one parent. Triggering is driven by the
//! parent's lifecycle transitions into a terminal state.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::OrderState;

/// What kind of relationship links a parent to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    /// One-cancels-other: siblings are cancelled together.
    Oco,
    /// Bracket take-profit/stop-loss: child submitted only once parent fills.
    BracketTpSl,
    /// Sequential: child submitted only after parent completes.
    Sequential,
}

/// An action the dependency graph wants the caller (the order registry) to
/// take in response to a parent's terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyAction {
    /// Submit this child order now.
    Submit(Uuid),
    /// Cancel this child order now.
    Cancel(Uuid),
}

#[derive(Debug, Clone)]
struct Dependency {
    child_id: Uuid,
    kind: DependencyKind,
}

/// Tracks parent/child links and resolves them into actions when a parent
/// reaches a terminal lifecycle state.
#[derive(Default)]
pub struct DependencyGraph {
    by_parent: DashMap<Uuid, Vec<Dependency>>,
    parent_of: DashMap<Uuid, Uuid>,
}

impl DependencyGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link `child_id` to `parent_id` under `kind`. Each child may have at
    /// most one parent; re-linking replaces any prior parent.
    pub fn link(&self, parent_id: Uuid, child_id: Uuid, kind: DependencyKind) {
        self.by_parent.entry(parent_id).or_default().push(Dependency { child_id, kind });
        self.parent_of.insert(child_id, parent_id);
    }

    /// The parent of `child_id`, if any.
    #[must_use]
    pub fn parent_of(&self, child_id: Uuid) -> Option<Uuid> {
        self.parent_of.get(&child_id).map(|e| *e)
    }

    /// Given that `parent_id` just transitioned to terminal state
    /// `parent_state`, and given which of its children (if any) have
    /// already been submitted, compute the actions to apply.
    ///
    /// `child_submitted(child_id)` must report whether that child order has
    /// already left `Created`/`Validated` (i.e. entered the pipeline).
    pub fn resolve<F>(&self, parent_id: Uuid, parent_state: OrderState, child_submitted: F) -> Vec<DependencyAction>
    where
        F: Fn(Uuid) -> bool,
    {
        if !parent_state.is_terminal() {
            return vec![];
        }
        let Some(deps) = self.by_parent.get(&parent_id) else {
            return vec![];
        };

        deps.iter()
            .filter_map(|dep| match dep.kind {
                DependencyKind::Oco => match parent_state {
                    OrderState::Completed | OrderState::Cancelled => Some(DependencyAction::Cancel(dep.child_id)),
                    _ => None,
                },
                DependencyKind::BracketTpSl => match parent_state {
                    OrderState::Completed => Some(DependencyAction::Submit(dep.child_id)),
                    OrderState::Cancelled | OrderState::Rejected | OrderState::Failed => {
                        if child_submitted(dep.child_id) {
                            None
                        } else {
                            Some(DependencyAction::Cancel(dep.child_id))
                        }
                    }
                    _ => None,
                },
                DependencyKind::Sequential => match parent_state {
                    OrderState::Completed => Some(DependencyAction::Submit(dep.child_id)),
                    _ => Some(DependencyAction::Cancel(dep.child_id)),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oco_cancels_sibling_on_parent_completion() {
        let graph = DependencyGraph::new();
        let parent = Uuid::new_v4();
        let sibling = Uuid::new_v4();
        graph.link(parent, sibling, DependencyKind::Oco);

        let actions = graph.resolve(parent, OrderState::Completed, |_| false);
        assert_eq!(actions, vec![DependencyAction::Cancel(sibling)]);
    }

    #[test]
    fn bracket_submits_child_on_completion_and_cancels_on_rejection_if_unsubmitted() {
        let graph = DependencyGraph::new();
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        graph.link(parent, child, DependencyKind::BracketTpSl);

        let actions = graph.resolve(parent, OrderState::Completed, |_| false);
        assert_eq!(actions, vec![DependencyAction::Submit(child)]);

        let actions = graph.resolve(parent, OrderState::Rejected, |_| false);
        assert_eq!(actions, vec![DependencyAction::Cancel(child)]);

        let actions = graph.resolve(parent, OrderState::Rejected, |_| true);
        assert!(actions.is_empty());
    }

    #[test]
    fn sequential_submits_on_completion_cancels_on_other_terminal_states() {
        let graph = DependencyGraph::new();
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        graph.link(parent, child, DependencyKind::Sequential);

        assert_eq!(
            graph.resolve(parent, OrderState::Completed, |_| false),
            vec![DependencyAction::Submit(child)]
        );
        assert_eq!(
            graph.resolve(parent, OrderState::Cancelled, |_| false),
            vec![DependencyAction::Cancel(child)]
        );
        assert_eq!(
            graph.resolve(parent, OrderState::Expired, |_| false),
            vec![DependencyAction::Cancel(child)]
        );
    }

    #[test]
    fn non_terminal_parent_state_resolves_to_no_actions() {
        let graph = DependencyGraph::new();
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        graph.link(parent, child, DependencyKind::Oco);
        assert!(graph.resolve(parent, OrderState::PartiallyFilled, |_| false).is_empty());
    }
}
