//! Stage 3: which actions can ever fire. Roots are event-wired actions and
//! actions with an explicit lifecycle, state-change or internal trigger;
//! the walk then follows state mutations to their `StateChange` listeners.

use crate::types::{Action, Mutation, Snapshot, Trigger};
use crate::view::DocumentView;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reachability {
    /// Reachable action ids of the mutation's action set.
    pub reachable: BTreeSet<String>,
    /// Unreachable action ids, in document order.
    pub orphans: Vec<String>,
}

impl Reachability {
    pub fn is_reachable(&self, id: &str) -> bool {
        self.reachable.contains(id)
    }

    pub fn is_closed(&self) -> bool {
        self.orphans.is_empty()
    }
}

fn is_root_trigger(t: &Trigger, components: &BTreeSet<&str>) -> bool {
    match t {
        Trigger::Lifecycle { .. } | Trigger::StateChange { .. } | Trigger::Internal { .. } => true,
        Trigger::ComponentEvent { component_id, .. } => components.contains(component_id.as_str()),
        Trigger::Unknown(_) => false,
    }
}

/// Index of `StateChange` listeners by the key they watch.
pub(crate) fn listeners<'a>(actions: &[&'a Action]) -> BTreeMap<&'a str, Vec<&'a str>> {
    let mut out: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for &a in actions {
        for key in a.triggered_by.iter().filter_map(Trigger::state_key) {
            out.entry(key).or_default().push(&a.id);
        }
    }
    out
}

pub fn analyze(mutation: &Mutation, prior: Option<&Snapshot>) -> Reachability {
    let view = DocumentView::new(mutation, prior);
    let actions = view.actions();
    let by_id: BTreeMap<&str, &Action> = actions.iter().map(|&a| (a.id.as_str(), a)).collect();
    let components: BTreeSet<&str> = view.components().iter().map(|&c| c.id.as_str()).collect();
    let listeners = listeners(&actions);

    let roots = view.event_action_refs().into_iter().chain(
        actions
            .iter()
            .filter(|a| a.triggered_by.iter().any(|t| is_root_trigger(t, &components)))
            .map(|&a| a.id.as_str()),
    );
    let mut frontier: VecDeque<&str> = VecDeque::new();
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    for id in roots {
        if by_id.contains_key(id) && visited.insert(id) {
            frontier.push_back(id);
        }
    }

    while let Some(id) = frontier.pop_front() {
        let Some(action) = by_id.get(id) else {
            continue;
        };
        for key in action.mutated_keys() {
            for &listener in listeners.get(key.as_str()).into_iter().flatten() {
                if visited.insert(listener) {
                    frontier.push_back(listener);
                }
            }
        }
    }

    let mut result = Reachability::default();
    for a in mutation.actions() {
        if visited.contains(a.id.as_str()) {
            result.reachable.insert(a.id.clone());
        } else if !result.orphans.contains(&a.id) {
            result.orphans.push(a.id.clone());
        }
    }
    tracing::debug!(
        reachable = result.reachable.len(),
        orphans = result.orphans.len(),
        "reachability analyzed"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mutation(v: serde_json::Value) -> Mutation {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn untriggered_action_is_orphan() {
        let m = mutation(json!({"actionsAdded": [
            {"id": "lonely", "kind": "internal", "config": {"stateKey": "x"}}
        ]}));
        let r = analyze(&m, None);
        assert_eq!(r.orphans, vec!["lonely"]);
        assert!(r.reachable.is_empty());
    }

    #[test]
    fn reachability_is_transitive_through_state_changes() {
        let m = mutation(json!({
            "componentsAdded": [{"id": "btn", "kind": "button",
                "events": [{"kind": "onClick", "actionId": "a"}]}],
            "actionsAdded": [
                {"id": "a", "kind": "internal", "config": {"stateKey": "x"}},
                {"id": "b", "kind": "internal", "config": {"stateKey": "y"},
                    "triggeredBy": {"type": "state_change", "stateKey": "x"}},
                {"id": "c", "kind": "internal", "config": {"stateKey": "z"},
                    "triggeredBy": {"type": "state_change", "stateKey": "y"}},
                {"id": "d", "kind": "internal", "triggeredBy": {"type": "component_event", "componentId": "ghost", "event": "onClick"}}
            ]
        }));
        let r = analyze(&m, None);
        for id in ["a", "b", "c"] {
            assert!(r.is_reachable(id), "{id}");
        }
        assert_eq!(r.orphans, vec!["d"]);
    }

    #[test]
    fn integration_companion_keys_wake_listeners() {
        let m = mutation(json!({
            "pagesAdded": [{"id": "home", "events": [{"kind": "onPageLoad", "actionId": "fetch"}]}],
            "actionsAdded": [
                {"id": "fetch", "kind": "integration_call", "config": {"assignTo": "orders"}},
                {"id": "on_fail", "kind": "workflow", "config": {"stateKey": "toast"},
                    "triggeredBy": [{"type": "state_change", "stateKey": "ordersError"}]}
            ]
        }));
        assert!(analyze(&m, None).is_closed());
    }

    #[test]
    fn prior_wiring_counts_but_only_mutation_actions_are_reported() {
        let m = mutation(json!({"actionsUpdated": [{"id": "fetch", "kind": "integration_call"}]}));
        let prior: Snapshot = serde_json::from_value(json!({
            "pages": [{"id": "home", "events": [{"kind": "onPageLoad", "actionId": "fetch"}]}],
            "actions": [{"id": "unrelated", "kind": "internal"}]
        }))
        .unwrap();
        let r = analyze(&m, Some(&prior));
        assert!(r.is_closed());
        assert_eq!(r.reachable.len(), 1);
    }

    #[test]
    fn component_event_trigger_on_known_component_is_a_root() {
        let m = mutation(json!({
            "componentsAdded": [{"id": "btn", "kind": "button"}],
            "actionsAdded": [{"id": "a", "kind": "internal",
                "triggeredBy": {"type": "component_event", "componentId": "btn", "event": "onClick"}}]
        }));
        assert!(analyze(&m, None).is_closed());
    }
}
