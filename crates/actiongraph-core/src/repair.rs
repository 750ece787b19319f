//! Stage 4: auto-repair. Binds every orphan to a trigger, synthesizes
//! pass-through normalizers for unconsumed integration outputs and status
//! mirrors across naming gaps, and drops redundant synthetic status setters.
//!
//! Repair only adds triggers, page wiring and synthetic actions; authored
//! actions are never deleted and reachable actions are never touched. Running
//! it on its own output is a no-op.

use crate::audit::{RepairLog, RuleApplied, Stage};
use crate::config::CompilerConfig;
use crate::keys::{self, ERROR_SUFFIX, STATUS_SUFFIX};
use crate::normalize::canonical_id;
use crate::reachability::Reachability;
use crate::tree::ComponentTree;
use crate::types::{
    Action, ActionKind, Mutation, PageEvent, Snapshot, Step, Trigger, CONFIG_PAGE_ID,
    CONFIG_SEMANTIC, CONFIG_SYNTHETIC, ON_PAGE_LOAD, SYNTHETIC_REPAIR,
};
use crate::view::DocumentView;
use serde_json::Value;
use std::collections::BTreeSet;

pub const SEMANTIC_NORMALIZER: &str = "normalizer";
pub const SEMANTIC_STATUS_MIRROR: &str = "status_mirror";

pub fn repair(
    mut mutation: Mutation,
    prior: Option<&Snapshot>,
    reach: &Reachability,
    config: &CompilerConfig,
    log: &mut RepairLog,
) -> Mutation {
    let removed = remove_redundant_status_setters(&mut mutation, prior, reach, log);
    bind_orphans(&mut mutation, prior, reach, &removed, config, log);
    if config.repair.synthesize_normalizers {
        synthesize_normalizers(&mut mutation, prior, config, log);
    }
    if config.repair.synthesize_status_mirrors {
        synthesize_status_mirrors(&mut mutation, prior, log);
    }
    mutation
}

fn synthetic(id: &str, kind: ActionKind, semantic: &str) -> Action {
    let mut action = Action::new(id, kind);
    action
        .config
        .insert(CONFIG_SEMANTIC.to_string(), Value::String(semantic.to_string()));
    action.config.insert(
        CONFIG_SYNTHETIC.to_string(),
        Value::String(SYNTHETIC_REPAIR.to_string()),
    );
    action
}

/// Canonical id derived from `base`, suffixed `_2`, `_3`... on collision.
fn unique_id(m: &Mutation, prior: Option<&Snapshot>, base: &str) -> String {
    let base = canonical_id(base);
    let view = DocumentView::new(m, prior);
    let taken: BTreeSet<&str> = view.actions().iter().map(|a| a.id.as_str()).collect();
    if !taken.contains(base.as_str()) {
        return base;
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or(base)
}

// ---------------------------------------------------------------------------
// Redundant synthetic status setters
// ---------------------------------------------------------------------------

fn remove_redundant_status_setters(
    m: &mut Mutation,
    prior: Option<&Snapshot>,
    reach: &Reachability,
    log: &mut RepairLog,
) -> BTreeSet<String> {
    let managed = DocumentView::new(m, prior).executor_managed_keys();
    let redundant: BTreeSet<String> = m
        .actions()
        .filter(|a| a.is_synthetic() && !reach.is_reachable(&a.id))
        .filter(|a| {
            let written = a.mutated_keys();
            !written.is_empty() && written.is_subset(&managed)
        })
        .map(|a| a.id.clone())
        .collect();
    if redundant.is_empty() {
        return redundant;
    }

    m.actions_added.retain(|a| !redundant.contains(&a.id));
    m.actions_updated.retain(|a| !redundant.contains(&a.id));
    for c in m.components_mut() {
        c.events
            .retain(|e| !e.action_id.as_ref().is_some_and(|id| redundant.contains(id)));
    }
    for p in m.pages_mut() {
        p.events.retain(|e| !redundant.contains(&e.action_id));
    }
    for id in &redundant {
        log.push(
            Stage::Repair,
            Some(id),
            RuleApplied::RemoveRedundantStatusSetter,
            "synthetic action only wrote executor-managed status/error keys",
        );
    }
    redundant
}

// ---------------------------------------------------------------------------
// Orphan binding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    StateChange(String),
    PageLoad(String),
    SafetyNet,
}

/// Page an orphaned `integration_call` should hydrate on: its explicit
/// `pageId`, else the page rendering its output, else the first page known.
fn target_page(action: &Action, view: &DocumentView<'_>, tree: &ComponentTree<'_>) -> Option<String> {
    if let Some(id) = action.config.get(CONFIG_PAGE_ID).and_then(Value::as_str) {
        if view.page(id).is_some() {
            return Some(id.to_string());
        }
    }
    if let Some(key) = action.assigned_key() {
        let rendered_on = view
            .components()
            .into_iter()
            .filter(|c| c.read_keys().contains(key))
            .filter_map(|c| tree.page_of(&c.id))
            .find(|page| view.page(page).is_some());
        if let Some(page) = rendered_on {
            return Some(page.to_string());
        }
    }
    view.pages().first().map(|p| p.id.clone())
}

fn choose_binding(action: &Action, view: &DocumentView<'_>, tree: &ComponentTree<'_>) -> Binding {
    if let Some(key) = action.templated_keys().into_iter().next() {
        return Binding::StateChange(key);
    }
    if action.kind == ActionKind::IntegrationCall {
        if let Some(page) = target_page(action, view, tree) {
            return Binding::PageLoad(page);
        }
    }
    Binding::SafetyNet
}

fn wire_page_load(m: &mut Mutation, prior: Option<&Snapshot>, page_id: &str, action_id: &str) {
    let event = PageEvent {
        kind: ON_PAGE_LOAD.to_string(),
        action_id: action_id.to_string(),
    };
    if let Some(page) = m.pages_mut().find(|p| p.id == page_id) {
        if !page.wires(ON_PAGE_LOAD, action_id) {
            page.events.push(event);
        }
        return;
    }
    if let Some(page) = prior.and_then(|p| p.pages.iter().find(|p| p.id == page_id)) {
        let mut page = page.clone();
        if !page.wires(ON_PAGE_LOAD, action_id) {
            page.events.push(event);
        }
        m.pages_updated.push(page);
    }
}

fn bind_orphans(
    m: &mut Mutation,
    prior: Option<&Snapshot>,
    reach: &Reachability,
    removed: &BTreeSet<String>,
    config: &CompilerConfig,
    log: &mut RepairLog,
) {
    let plans: Vec<(String, Binding)> = {
        let view = DocumentView::new(m, prior);
        let tree = ComponentTree::build(&view);
        reach
            .orphans
            .iter()
            .filter(|id| !removed.contains(*id))
            .filter_map(|id| m.action(id))
            .map(|a| (a.id.clone(), choose_binding(a, &view, &tree)))
            .collect()
    };

    for (id, binding) in plans {
        let (trigger, rule, detail) = match &binding {
            Binding::StateChange(key) => (
                Trigger::state_change(key),
                RuleApplied::BindStateChange,
                format!("bound to state change of '{key}'"),
            ),
            Binding::PageLoad(page) => (
                Trigger::page_load(),
                RuleApplied::BindPageLoad,
                format!("bound to {ON_PAGE_LOAD} of page '{page}'"),
            ),
            Binding::SafetyNet => (
                Trigger::internal(&config.repair.safety_net_reason),
                RuleApplied::BindSafetyNet,
                format!("bound to internal trigger '{}'", config.repair.safety_net_reason),
            ),
        };
        if let Some(action) = m.action_mut(&id) {
            if !action.triggered_by.contains(&trigger) {
                action.triggered_by.push(trigger);
            }
        }
        if let Binding::PageLoad(page) = &binding {
            wire_page_load(m, prior, page, &id);
        }
        log.push(Stage::Repair, Some(&id), rule, detail);
    }
}

// ---------------------------------------------------------------------------
// Normalizers
// ---------------------------------------------------------------------------

fn synthesize_normalizers(
    m: &mut Mutation,
    prior: Option<&Snapshot>,
    config: &CompilerConfig,
    log: &mut RepairLog,
) {
    let unconsumed: Vec<(String, String)> = {
        let view = DocumentView::new(m, prior);
        let mut seen = BTreeSet::new();
        m.actions()
            .filter(|a| a.kind == ActionKind::IntegrationCall)
            .filter(|a| !a.looks_effect_only(&config.effect_only_prefixes))
            .filter_map(|a| {
                let key = a.assigned_key()?;
                let wanted = !view.is_consumed(key, &a.id) && seen.insert(key);
                wanted.then(|| (a.id.clone(), key.to_string()))
            })
            .collect()
    };

    for (source_id, key) in unconsumed {
        let id = unique_id(m, prior, &format!("normalize_{}", key.replace('.', "_")));
        let derived = keys::derived_key(&key);
        let mut action = synthetic(&id, ActionKind::Internal, SEMANTIC_NORMALIZER);
        action.steps.push(Step::copy(&derived, &key));
        action.triggered_by.push(Trigger::state_change(&key));
        action.inputs = Some(vec![key.clone()]);
        log.push(
            Stage::Repair,
            Some(&id),
            RuleApplied::SynthesizeNormalizer,
            format!("'{key}' from '{source_id}' had no consumer; normalized into '{derived}'"),
        );
        m.actions_added.push(action);
    }
}

// ---------------------------------------------------------------------------
// Status mirrors
// ---------------------------------------------------------------------------

struct MirrorPlan {
    data_key: String,
    status: String,
    error: String,
    ui_status: String,
    ui_error: String,
}

fn synthesize_status_mirrors(m: &mut Mutation, prior: Option<&Snapshot>, log: &mut RepairLog) {
    let plans: Vec<MirrorPlan> = {
        let view = DocumentView::new(m, prior);
        let ui_keys = view.component_read_keys();
        let managed = view.executor_managed_keys();
        let written: BTreeSet<String> = view
            .actions()
            .iter()
            .flat_map(|a| a.mutated_keys())
            .collect();
        let ui_written: BTreeSet<&str> = view
            .components()
            .into_iter()
            .flat_map(|c| {
                c.bind_key().into_iter().chain(
                    c.events
                        .iter()
                        .filter_map(|e| e.state_update.as_deref())
                        .filter(|k| !k.is_empty()),
                )
            })
            .collect();
        let mut plans = Vec::new();
        for a in m.actions().filter(|a| a.kind == ActionKind::IntegrationCall) {
            let Some(key) = a.assigned_key() else {
                continue;
            };
            let status = keys::status_key(key);
            let error = keys::error_key(key);
            if view.is_consumed(&status, &a.id) || view.is_consumed(&error, &a.id) {
                continue;
            }
            let data_stem = keys::stem(key);
            let mirrorable = |k: &str| {
                ui_keys.contains(k)
                    && !managed.contains(k)
                    && !written.contains(k)
                    && !ui_written.contains(k)
            };
            let ui_status = ui_keys.iter().find(|s| {
                s.ends_with(STATUS_SUFFIX)
                    && **s != status
                    && keys::stem(s) == data_stem
                    && mirrorable(s.as_str())
                    && mirrorable(
                        format!(
                            "{}{ERROR_SUFFIX}",
                            s.strip_suffix(STATUS_SUFFIX).unwrap_or(s.as_str())
                        )
                        .as_str(),
                    )
            });
            let Some(ui_status) = ui_status else {
                continue;
            };
            let base = ui_status.strip_suffix(STATUS_SUFFIX).unwrap_or(ui_status);
            plans.push(MirrorPlan {
                data_key: key.to_string(),
                ui_error: format!("{base}{ERROR_SUFFIX}"),
                ui_status: ui_status.clone(),
                status,
                error,
            });
        }
        plans
    };

    for plan in plans {
        let id = unique_id(
            m,
            prior,
            &format!("mirror_{}_status", plan.data_key.replace('.', "_")),
        );
        let mut action = synthetic(&id, ActionKind::Workflow, SEMANTIC_STATUS_MIRROR);
        action.triggered_by = vec![
            Trigger::state_change(&plan.status),
            Trigger::state_change(&plan.error),
        ];
        action.steps = vec![
            Step::copy(&plan.ui_status, &plan.status),
            Step::copy(&plan.ui_error, &plan.error),
        ];
        action.inputs = Some(vec![plan.status.clone(), plan.error.clone()]);
        log.push(
            Stage::Repair,
            Some(&id),
            RuleApplied::SynthesizeStatusMirror,
            format!(
                "'{}'/'{}' mirrored into '{}'/'{}'",
                plan.status, plan.error, plan.ui_status, plan.ui_error
            ),
        );
        m.actions_added.push(action);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reachability::analyze;
    use serde_json::json;

    fn mutation(v: serde_json::Value) -> Mutation {
        serde_json::from_value(v).unwrap()
    }

    fn run(m: Mutation, prior: Option<&Snapshot>) -> (Mutation, RepairLog) {
        let mut log = RepairLog::new();
        let reach = analyze(&m, prior);
        let out = repair(m, prior, &reach, &CompilerConfig::default(), &mut log);
        (out, log)
    }

    #[test]
    fn templated_orphan_binds_to_state_change() {
        let m = mutation(json!({
            "componentsAdded": [{"id": "q", "kind": "input", "properties": {"bindKey": "query"}}],
            "actionsAdded": [{"id": "search", "kind": "workflow",
                "config": {"stateKey": "hits", "term": "{{state.query}}"}}]
        }));
        let (out, log) = run(m, None);
        assert_eq!(
            out.action("search").unwrap().triggered_by,
            vec![Trigger::state_change("query")]
        );
        assert!(log.fired_for(RuleApplied::BindStateChange, "search"));
    }

    #[test]
    fn orphan_integration_call_hydrates_on_page_load() {
        let m = mutation(json!({
            "pagesAdded": [
                {"id": "home", "components": ["hero"]},
                {"id": "orders_page", "components": ["tbl"]}
            ],
            "componentsAdded": [
                {"id": "hero", "kind": "heading"},
                {"id": "tbl", "kind": "table", "dataSource": {"type": "state", "key": "orders"}}
            ],
            "actionsAdded": [{"id": "fetch_orders", "kind": "integration_call",
                "config": {"assignTo": "orders"}}]
        }));
        let (out, log) = run(m, None);
        assert_eq!(
            out.action("fetch_orders").unwrap().triggered_by,
            vec![Trigger::page_load()]
        );
        assert!(out.pages_added[1].wires(ON_PAGE_LOAD, "fetch_orders"));
        assert!(out.pages_added[0].events.is_empty());
        assert!(log.fired_for(RuleApplied::BindPageLoad, "fetch_orders"));
    }

    #[test]
    fn prior_only_page_is_carried_into_pages_updated() {
        let m = mutation(json!({
            "componentsAdded": [{"id": "tbl", "kind": "table", "pageId": "home",
                "dataSource": {"type": "state", "key": "orders"}}],
            "actionsAdded": [{"id": "fetch_orders", "kind": "integration_call",
                "config": {"assignTo": "orders"}}]
        }));
        let prior: Snapshot =
            serde_json::from_value(json!({"pages": [{"id": "home", "route": "/"}]})).unwrap();
        let (out, _) = run(m, Some(&prior));
        assert_eq!(out.pages_updated.len(), 1);
        assert_eq!(out.pages_updated[0].route.as_deref(), Some("/"));
        assert!(out.pages_updated[0].wires(ON_PAGE_LOAD, "fetch_orders"));
    }

    #[test]
    fn last_resort_is_the_safety_net() {
        let m = mutation(json!({"actionsAdded": [
            {"id": "reset", "kind": "internal", "config": {"stateKey": "counter"}}
        ]}));
        let (out, log) = run(m, None);
        assert_eq!(
            out.action("reset").unwrap().triggered_by,
            vec![Trigger::internal("system_safety_net")]
        );
        assert!(log.fired_for(RuleApplied::BindSafetyNet, "reset"));
    }

    #[test]
    fn unconsumed_integration_output_gets_a_normalizer() {
        let m = mutation(json!({
            "pagesAdded": [{"id": "home", "events": [
                {"kind": "onPageLoad", "actionId": "fetch_orders"},
                {"kind": "onPageLoad", "actionId": "send_ping"}
            ]}],
            "actionsAdded": [
                {"id": "fetch_orders", "kind": "integration_call", "config": {"assignTo": "rawOrders"}},
                {"id": "send_ping", "kind": "integration_call", "config": {"assignTo": "ping"}}
            ]
        }));
        let (out, log) = run(m, None);
        let normalizer = out.action("normalize_raworders").unwrap();
        assert_eq!(normalizer.kind, ActionKind::Internal);
        assert!(normalizer.is_synthetic());
        assert_eq!(normalizer.steps, vec![Step::copy("orders", "rawOrders")]);
        assert_eq!(normalizer.triggered_by, vec![Trigger::state_change("rawOrders")]);
        assert_eq!(normalizer.inputs, Some(vec!["rawOrders".to_string()]));
        assert!(out.action("normalize_ping").is_none());
        assert!(log.fired(RuleApplied::SynthesizeNormalizer));
    }

    #[test]
    fn normalizer_ids_do_not_collide() {
        let m = mutation(json!({
            "pagesAdded": [{"id": "home", "events": [{"kind": "onPageLoad", "actionId": "fetch"}]}],
            "actionsAdded": [
                {"id": "fetch", "kind": "integration_call", "config": {"assignTo": "orders"}},
                {"id": "normalize_orders", "kind": "internal", "config": {"stateKey": "unrelated"},
                    "triggeredBy": {"type": "internal", "reason": "boot"}}
            ]
        }));
        let (out, _) = run(m, None);
        assert!(out.action("normalize_orders_2").is_some());
    }

    #[test]
    fn status_mirror_bridges_naming_gap() {
        let m = mutation(json!({
            "pagesAdded": [{"id": "home", "components": ["tbl", "spinner"],
                "events": [{"kind": "onPageLoad", "actionId": "fetch_orders"}]}],
            "componentsAdded": [
                {"id": "tbl", "kind": "table", "dataSource": {"type": "state", "key": "rawOrders"}},
                {"id": "spinner", "kind": "badge",
                    "properties": {"statusKey": "ordersStatus", "errorKey": "ordersError"}}
            ],
            "actionsAdded": [{"id": "fetch_orders", "kind": "integration_call",
                "config": {"assignTo": "rawOrders"}}]
        }));
        let (out, log) = run(m, None);
        let mirror = out.action("mirror_raworders_status").unwrap();
        assert_eq!(mirror.kind, ActionKind::Workflow);
        assert_eq!(
            mirror.triggered_by,
            vec![
                Trigger::state_change("rawOrdersStatus"),
                Trigger::state_change("rawOrdersError")
            ]
        );
        assert_eq!(
            mirror.steps,
            vec![
                Step::copy("ordersStatus", "rawOrdersStatus"),
                Step::copy("ordersError", "rawOrdersError")
            ]
        );
        assert!(log.fired(RuleApplied::SynthesizeStatusMirror));
    }

    #[test]
    fn status_mirror_needs_a_ui_pair_and_leaves_user_state_alone() {
        let status_only = mutation(json!({
            "pagesAdded": [{"id": "home", "components": ["tbl", "spinner"],
                "events": [{"kind": "onPageLoad", "actionId": "fetch_orders"}]}],
            "componentsAdded": [
                {"id": "tbl", "kind": "table", "dataSource": {"type": "state", "key": "rawOrders"}},
                {"id": "spinner", "kind": "badge", "properties": {"statusKey": "ordersStatus"}}
            ],
            "actionsAdded": [{"id": "fetch_orders", "kind": "integration_call",
                "config": {"assignTo": "rawOrders"}}]
        }));
        let (_, log) = run(status_only, None);
        assert!(!log.fired(RuleApplied::SynthesizeStatusMirror));

        let user_bound = mutation(json!({
            "pagesAdded": [{"id": "home", "components": ["pick", "err", "tbl"],
                "events": [{"kind": "onPageLoad", "actionId": "fetch_order"}]}],
            "componentsAdded": [
                {"id": "pick", "kind": "select",
                    "properties": {"bindKey": "orderStatus", "optionValueKey": "id"}},
                {"id": "err", "kind": "text", "properties": {"errorKey": "orderError"}},
                {"id": "tbl", "kind": "table", "dataSource": {"type": "state", "key": "orderData"}}
            ],
            "actionsAdded": [{"id": "fetch_order", "kind": "integration_call",
                "config": {"assignTo": "orderData"}}]
        }));
        let (out, log) = run(user_bound, None);
        assert!(!log.fired(RuleApplied::SynthesizeStatusMirror));
        assert!(out.actions().all(|a| !a.mutated_keys().contains("orderStatus")));
    }

    #[test]
    fn redundant_synthetic_status_setter_is_removed() {
        let m = mutation(json!({
            "pagesAdded": [{"id": "home", "events": [{"kind": "onPageLoad", "actionId": "fetch_orders"}]}],
            "componentsAdded": [{"id": "tbl", "kind": "table", "dataSource": {"type": "state", "key": "orders"}}],
            "actionsAdded": [
                {"id": "fetch_orders", "kind": "integration_call", "config": {"assignTo": "orders"}},
                {"id": "set_orders_status", "kind": "internal",
                    "config": {"stateKey": "ordersStatus", "synthetic": "repair"}}
            ]
        }));
        let (out, log) = run(m, None);
        assert!(out.action("set_orders_status").is_none());
        assert!(log.fired_for(RuleApplied::RemoveRedundantStatusSetter, "set_orders_status"));
    }

    #[test]
    fn repair_reaches_a_fixed_point() {
        let m = mutation(json!({
            "pagesAdded": [{"id": "home", "components": ["spinner", "q"]}],
            "componentsAdded": [
                {"id": "spinner", "kind": "badge", "properties": {"statusKey": "ordersStatus"}},
                {"id": "q", "kind": "input", "properties": {"bindKey": "query"}}
            ],
            "actionsAdded": [
                {"id": "fetch_orders", "kind": "integration_call", "config": {"assignTo": "rawOrders"}},
                {"id": "search", "kind": "internal", "config": {"stateKey": "hits", "q": "{{state.query}}"}},
                {"id": "reset", "kind": "internal", "config": {"stateKey": "counter"}}
            ]
        }));
        let (once, _) = run(m, None);
        assert!(analyze(&once, None).is_closed());

        let (twice, log) = run(once.clone(), None);
        assert!(log.is_empty(), "{:?}", log.records());
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
    }
}
