//! Read-only merged view of a mutation over its prior snapshot. Entries in
//! the mutation shadow prior entries with the same id.

use crate::keys;
use crate::types::{Action, ActionKind, Component, Mutation, Page, Snapshot};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Copy)]
pub struct DocumentView<'a> {
    mutation: &'a Mutation,
    prior: Option<&'a Snapshot>,
}

fn shadowed<'a, T>(
    current: impl Iterator<Item = &'a T>,
    prior: impl Iterator<Item = &'a T>,
    id: fn(&T) -> &str,
) -> Vec<&'a T>
where
    T: 'a,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in current.chain(prior) {
        if seen.insert(id(item).to_string()) {
            out.push(item);
        }
    }
    out
}

impl<'a> DocumentView<'a> {
    pub fn new(mutation: &'a Mutation, prior: Option<&'a Snapshot>) -> Self {
        Self { mutation, prior }
    }

    pub fn mutation(&self) -> &'a Mutation {
        self.mutation
    }

    pub fn prior(&self) -> Option<&'a Snapshot> {
        self.prior
    }

    pub fn actions(&self) -> Vec<&'a Action> {
        let prior = self.prior.map(|p| p.actions.as_slice()).unwrap_or(&[]);
        shadowed(self.mutation.actions(), prior.iter(), |a| a.id.as_str())
    }

    pub fn components(&self) -> Vec<&'a Component> {
        let prior = self.prior.map(|p| p.components.as_slice()).unwrap_or(&[]);
        shadowed(self.mutation.components(), prior.iter(), |c| c.id.as_str())
    }

    pub fn pages(&self) -> Vec<&'a Page> {
        let prior = self.prior.map(|p| p.pages.as_slice()).unwrap_or(&[]);
        shadowed(self.mutation.pages(), prior.iter(), |p| p.id.as_str())
    }

    pub fn action(&self, id: &str) -> Option<&'a Action> {
        self.actions().into_iter().find(|a| a.id == id)
    }

    pub fn component(&self, id: &str) -> Option<&'a Component> {
        self.components().into_iter().find(|c| c.id == id)
    }

    pub fn page(&self, id: &str) -> Option<&'a Page> {
        self.pages().into_iter().find(|p| p.id == id)
    }

    /// Initial state, later layers overriding earlier ones.
    pub fn state(&self) -> BTreeMap<&'a str, &'a Value> {
        let mut state = BTreeMap::new();
        if let Some(prior) = self.prior {
            state.extend(prior.state.iter().map(|(k, v)| (k.as_str(), v)));
        }
        state.extend(self.mutation.state_added.iter().map(|(k, v)| (k.as_str(), v)));
        state.extend(self.mutation.state_updated.iter().map(|(k, v)| (k.as_str(), v)));
        state
    }

    // -----------------------------------------------------------------------
    // Derived indexes
    // -----------------------------------------------------------------------

    /// Action ids referenced from component and page events.
    pub fn event_action_refs(&self) -> BTreeSet<&'a str> {
        let mut refs: BTreeSet<&'a str> = self
            .components()
            .into_iter()
            .flat_map(|c| c.action_refs())
            .collect();
        for page in self.pages() {
            refs.extend(page.events.iter().map(|e| e.action_id.as_str()));
        }
        refs
    }

    pub fn component_read_keys(&self) -> BTreeSet<String> {
        self.components()
            .into_iter()
            .flat_map(|c| c.read_keys())
            .collect()
    }

    /// True when a component renders `key` or an action other than
    /// `except` depends on it.
    pub fn is_consumed(&self, key: &str, except: &str) -> bool {
        if self.components().iter().any(|c| c.read_keys().contains(key)) {
            return true;
        }
        self.actions()
            .iter()
            .filter(|a| a.id != except)
            .any(|a| a.read_keys().contains(key))
    }

    /// Keys owned by `integration_call` actions: their data keys.
    pub fn integration_outputs(&self) -> BTreeSet<String> {
        self.actions()
            .into_iter()
            .filter(|a| a.kind == ActionKind::IntegrationCall)
            .filter_map(|a| a.assigned_key().map(str::to_string))
            .collect()
    }

    /// Status/error companions the executor manages on behalf of
    /// `integration_call` actions.
    pub fn executor_managed_keys(&self) -> BTreeSet<String> {
        self.integration_outputs()
            .iter()
            .flat_map(|k| [keys::status_key(k), keys::error_key(k)])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mutation() -> Mutation {
        serde_json::from_value(json!({
            "componentsAdded": [
                {"id": "tbl", "kind": "table", "dataSource": {"type": "state", "key": "orders"}}
            ],
            "actionsAdded": [
                {"id": "fetch_orders", "kind": "integration_call", "config": {"assignTo": "orders"}},
                {"id": "count", "kind": "internal", "config": {"stateKey": "n"}, "inputs": ["customers"]}
            ],
            "stateAdded": {"orders": [], "n": 0}
        }))
        .unwrap()
    }

    fn prior() -> Snapshot {
        serde_json::from_value(json!({
            "actions": [
                {"id": "count", "kind": "internal"},
                {"id": "fetch_customers", "kind": "integration_call", "config": {"assignTo": "customers"}}
            ],
            "pages": [{"id": "home", "events": [{"kind": "onPageLoad", "actionId": "fetch_customers"}]}],
            "state": {"n": 5, "tags": ["a"]}
        }))
        .unwrap()
    }

    #[test]
    fn mutation_shadows_prior() {
        let m = mutation();
        let p = prior();
        let view = DocumentView::new(&m, Some(&p));
        let ids: Vec<_> = view.actions().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["fetch_orders", "count", "fetch_customers"]);
        assert_eq!(view.action("count").unwrap().config.len(), 1);
        assert_eq!(view.state()["n"], &json!(0));
    }

    #[test]
    fn consumption_and_outputs() {
        let m = mutation();
        let p = prior();
        let view = DocumentView::new(&m, Some(&p));
        assert!(view.is_consumed("orders", "fetch_orders"));
        assert!(view.is_consumed("customers", "fetch_customers"));
        assert!(!view.is_consumed("n", "count"));
        let outputs: Vec<_> = view.integration_outputs().into_iter().collect();
        assert_eq!(outputs, vec!["customers", "orders"]);
        assert!(view.executor_managed_keys().contains("ordersStatus"));
        assert!(view.event_action_refs().contains("fetch_customers"));
    }
}
