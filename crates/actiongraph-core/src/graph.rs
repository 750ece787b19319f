//! Stage 5: execution graph. One node per action plus the synthetic
//! `__init__` root; edges come only from `StateChange` triggers.

use crate::audit::{Diagnostic, Stage};
use crate::catalog::CapabilityCatalog;
use crate::error::{CompileError, Result};
use crate::types::{
    is_lifecycle_event, Action, ActionKind, ConfigMap, Edge, ExecutionGraph, ExecutionNode,
    Mutation, NodeType, Snapshot, Trigger, INIT_NODE_ID,
};
use crate::view::DocumentView;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphBuild {
    pub graph: ExecutionGraph,
    pub diagnostics: Vec<Diagnostic>,
}

// ---------------------------------------------------------------------------
// Node classification
// ---------------------------------------------------------------------------

fn degrade(
    action: &Action,
    params: &mut ConfigMap,
    reason: String,
    diagnostics: &mut Vec<Diagnostic>,
) -> NodeType {
    params.insert(
        "degradedFrom".to_string(),
        Value::String(action.kind.as_str().to_string()),
    );
    tracing::warn!(action = %action.id, "{reason}; emitting an event instead");
    diagnostics.push(
        Diagnostic::new(Stage::Graph, "degraded_integration", reason).for_action(&action.id),
    );
    NodeType::EmitEvent
}

fn classify(
    action: &Action,
    catalog: &dyn CapabilityCatalog,
    diagnostics: &mut Vec<Diagnostic>,
) -> ExecutionNode {
    let mut params = action.config.clone();
    params.insert(
        "actionKind".to_string(),
        Value::String(action.kind.as_str().to_string()),
    );

    let node_type = match &action.kind {
        ActionKind::IntegrationCall => match action.capability() {
            None => degrade(
                action,
                &mut params,
                format!("integration_call '{}' names no capability", action.id),
                diagnostics,
            ),
            Some(_) if action.is_ephemeral() => degrade(
                action,
                &mut params,
                format!("integration_call '{}' is marked ephemeral", action.id),
                diagnostics,
            ),
            Some(cap) => match catalog.resolve(cap) {
                Some(resolved) if !resolved.ephemeral => {
                    if let Some(provider) = resolved.provider {
                        params.insert("provider".to_string(), Value::String(provider));
                    }
                    NodeType::IntegrationCall
                }
                Some(_) => degrade(
                    action,
                    &mut params,
                    format!("capability '{cap}' is ephemeral"),
                    diagnostics,
                ),
                None => degrade(
                    action,
                    &mut params,
                    format!("capability '{cap}' does not resolve"),
                    diagnostics,
                ),
            },
        },
        ActionKind::Internal | ActionKind::Workflow => NodeType::Transform,
        ActionKind::Navigation | ActionKind::Unknown(_) => NodeType::EmitEvent,
    };

    ExecutionNode {
        id: action.id.clone(),
        node_type,
        params,
    }
}

/// Started by the runtime rather than by a user: lifecycle, internal
/// (synthetic) triggers, or page lifecycle wiring.
fn starts_at_init(action: &Action, page_wired: &BTreeSet<&str>) -> bool {
    page_wired.contains(action.id.as_str())
        || action
            .triggered_by
            .iter()
            .any(|t| matches!(t, Trigger::Lifecycle { .. } | Trigger::Internal { .. }))
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

pub fn build(
    mutation: &Mutation,
    prior: Option<&Snapshot>,
    catalog: &dyn CapabilityCatalog,
) -> Result<GraphBuild> {
    let actions: Vec<&Action> = mutation.actions().collect();
    let mut out = GraphBuild::default();
    if actions.is_empty() {
        return Ok(out);
    }

    let view = DocumentView::new(mutation, prior);
    let page_wired: BTreeSet<&str> = view
        .pages()
        .into_iter()
        .flat_map(|p| p.events.iter())
        .filter(|e| is_lifecycle_event(&e.kind))
        .map(|e| e.action_id.as_str())
        .collect();

    // State-change edges, mutator -> listener, deduplicated.
    let mut dag: DiGraph<usize, ()> = DiGraph::new();
    let idx: Vec<NodeIndex> = (0..actions.len()).map(|i| dag.add_node(i)).collect();
    let mut seen = BTreeSet::new();
    let mut state_edges = Vec::new();
    for (to, listener) in actions.iter().enumerate() {
        for key in listener.triggered_by.iter().filter_map(Trigger::state_key) {
            for (from, mutator) in actions.iter().enumerate() {
                if mutator.mutated_keys().contains(key) && seen.insert((from, to)) {
                    dag.add_edge(idx[from], idx[to], ());
                    state_edges.push((from, to));
                }
            }
        }
    }

    let order: Vec<usize> = match toposort(&dag, None) {
        Ok(sorted) => sorted.into_iter().map(|n| dag[n]).collect(),
        Err(cycle) => {
            let id = &actions[dag[cycle.node_id()]].id;
            tracing::warn!(action = %id, "state-change edges form a cycle");
            out.diagnostics.push(
                Diagnostic::new(
                    Stage::Graph,
                    "trigger_cycle",
                    format!("state-change triggers through '{id}' form a cycle; nodes kept in document order"),
                )
                .for_action(id),
            );
            (0..actions.len()).collect()
        }
    };

    let mut init_params = ConfigMap::new();
    init_params.insert("synthetic".to_string(), Value::Bool(true));
    out.graph.nodes.push(ExecutionNode {
        id: INIT_NODE_ID.to_string(),
        node_type: NodeType::EmitEvent,
        params: init_params,
    });
    for &i in &order {
        out.graph
            .nodes
            .push(classify(actions[i], catalog, &mut out.diagnostics));
    }

    for &i in &order {
        if starts_at_init(actions[i], &page_wired) {
            out.graph.edges.push(Edge {
                from: INIT_NODE_ID.to_string(),
                to: actions[i].id.clone(),
            });
        }
    }
    out.graph
        .edges
        .extend(state_edges.into_iter().map(|(from, to)| Edge {
            from: actions[from].id.clone(),
            to: actions[to].id.clone(),
        }));

    if out.graph.nodes.len() < actions.len() + 1 {
        return Err(CompileError::invalid(format!(
            "{} actions produced {} graph nodes",
            actions.len(),
            out.graph.nodes.len()
        )));
    }
    tracing::debug!(
        nodes = out.graph.nodes.len(),
        edges = out.graph.edges.len(),
        "execution graph built"
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Capability, StaticCatalog};
    use serde_json::json;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new([
            Capability {
                id: "orders.list".to_string(),
                provider: Some("shop".to_string()),
                ephemeral: false,
            },
            Capability {
                id: "ui.toast".to_string(),
                provider: None,
                ephemeral: true,
            },
        ])
    }

    fn mutation(v: serde_json::Value) -> Mutation {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn empty_action_set_builds_empty_graph() {
        let out = build(&Mutation::default(), None, &catalog()).unwrap();
        assert!(out.graph.nodes.is_empty());
        assert!(out.graph.edges.is_empty());
    }

    #[test]
    fn one_node_per_action_plus_init() {
        let m = mutation(json!({
            "pagesAdded": [{"id": "home", "events": [{"kind": "onPageLoad", "actionId": "fetch"}]}],
            "actionsAdded": [
                {"id": "shape", "kind": "internal", "config": {"stateKey": "rows"},
                    "triggeredBy": {"type": "state_change", "stateKey": "orders"}},
                {"id": "fetch", "kind": "integration_call",
                    "config": {"assignTo": "orders", "capability": "orders.list"}},
                {"id": "go", "kind": "navigation",
                    "triggeredBy": {"type": "component_event", "componentId": "btn", "event": "onClick"}},
                {"id": "reset", "kind": "workflow", "config": {"stateKey": "n"},
                    "triggeredBy": {"type": "internal", "reason": "system_safety_net"}}
            ]
        }));
        let out = build(&m, None, &catalog()).unwrap();
        let g = &out.graph;
        assert_eq!(g.nodes.len(), 5);
        assert_eq!(g.nodes[0].id, INIT_NODE_ID);

        let pos = |id: &str| g.nodes.iter().position(|n| n.id == id).unwrap();
        assert!(pos("fetch") < pos("shape"));

        assert_eq!(g.node("fetch").unwrap().node_type, NodeType::IntegrationCall);
        assert_eq!(g.node("fetch").unwrap().params["provider"], json!("shop"));
        assert_eq!(g.node("shape").unwrap().node_type, NodeType::Transform);
        assert_eq!(g.node("go").unwrap().node_type, NodeType::EmitEvent);

        assert!(g.has_edge("fetch", "shape"));
        assert!(g.has_edge(INIT_NODE_ID, "fetch"));
        assert!(g.has_edge(INIT_NODE_ID, "reset"));
        assert!(!g.has_edge(INIT_NODE_ID, "go"));
        assert!(!g.has_edge(INIT_NODE_ID, "shape"));
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn unresolved_or_ephemeral_capabilities_degrade() {
        let m = mutation(json!({"actionsAdded": [
            {"id": "a", "kind": "integration_call", "config": {"capability": "nope"}},
            {"id": "b", "kind": "integration_call", "config": {"capability": "ui.toast"}},
            {"id": "c", "kind": "integration_call"},
            {"id": "d", "kind": "integration_call", "config": {"capability": "orders.list", "ephemeral": true}}
        ]}));
        let out = build(&m, None, &catalog()).unwrap();
        for id in ["a", "b", "c", "d"] {
            let node = out.graph.node(id).unwrap();
            assert_eq!(node.node_type, NodeType::EmitEvent, "{id}");
            assert_eq!(node.params["degradedFrom"], json!("integration_call"));
        }
        assert_eq!(out.diagnostics.len(), 4);
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let m = mutation(json!({"actionsAdded": [
            {"id": "w", "kind": "internal", "config": {"updates": {"a": 1, "b": 2}},
                "triggeredBy": {"type": "internal", "reason": "boot"}},
            {"id": "r", "kind": "internal", "config": {"stateKey": "c"},
                "triggeredBy": [
                    {"type": "state_change", "stateKey": "a"},
                    {"type": "state_change", "stateKey": "b"}
                ]}
        ]}));
        let out = build(&m, None, &catalog()).unwrap();
        let count = out
            .graph
            .edges
            .iter()
            .filter(|e| e.from == "w" && e.to == "r")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn cycles_keep_document_order_with_diagnostic() {
        let m = mutation(json!({"actionsAdded": [
            {"id": "ping", "kind": "internal", "config": {"stateKey": "a"},
                "triggeredBy": {"type": "state_change", "stateKey": "b"}},
            {"id": "pong", "kind": "internal", "config": {"stateKey": "b"},
                "triggeredBy": {"type": "state_change", "stateKey": "a"}}
        ]}));
        let out = build(&m, None, &catalog()).unwrap();
        let ids: Vec<_> = out.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![INIT_NODE_ID, "ping", "pong"]);
        assert!(out.diagnostics.iter().any(|d| d.code == "trigger_cycle"));
    }
}
