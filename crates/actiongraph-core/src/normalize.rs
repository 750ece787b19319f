//! Stage 1: pure rewriting. Canonical action ids, legacy kind migration,
//! legacy `source`/`target` lowering, and filter-key namespacing. Never fails.

use crate::audit::{RepairLog, RuleApplied, Stage};
use crate::config::NormalizeConfig;
use crate::keys;
use crate::types::{
    Action, ActionKind, Component, ConfigMap, DataSource, IntentDocument, Mutation, Page,
    Snapshot, Step, Trigger, BINDING_PROPERTIES, CONFIG_ASSIGN_TO, CONFIG_LEGACY_KIND, CONFIG_SEMANTIC,
    CONFIG_STATE_KEY, CONFIG_UPDATES,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Canonical identifier spelling: lower-case, trimmed, whitespace and
/// hyphens become `_`, anything outside `[a-z0-9_]` is dropped.
///
/// Idempotent: `canonical_id(&canonical_id(x)) == canonical_id(x)`.
pub fn canonical_id(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() || c == '-' => Some('_'),
            'a'..='z' | '0'..='9' | '_' => Some(c),
            _ => None,
        })
        .collect()
}

pub fn normalize(
    mut doc: IntentDocument,
    config: &NormalizeConfig,
    log: &mut RepairLog,
) -> IntentDocument {
    canonicalize_ids(&mut doc, log);
    migrate_legacy_kinds(&mut doc, config, log);
    lower_source_target(&mut doc, log);
    canonicalize_filter_keys(&mut doc, log);
    apply_filter_sentinels(&mut doc, config, log);
    apply_option_sentinels(&mut doc, config, log);
    doc
}

// ---------------------------------------------------------------------------
// Document traversal helpers
// ---------------------------------------------------------------------------

struct Parts<'a> {
    actions: Vec<&'a mut Action>,
    components: Vec<&'a mut Component>,
    pages: Vec<&'a mut Page>,
    states: Vec<&'a mut ConfigMap>,
}

fn mutation_parts(m: &mut Mutation) -> Parts<'_> {
    Parts {
        actions: m
            .actions_added
            .iter_mut()
            .chain(m.actions_updated.iter_mut())
            .collect(),
        components: m
            .components_added
            .iter_mut()
            .chain(m.components_updated.iter_mut())
            .collect(),
        pages: m
            .pages_added
            .iter_mut()
            .chain(m.pages_updated.iter_mut())
            .collect(),
        states: vec![&mut m.state_added, &mut m.state_updated],
    }
}

fn snapshot_parts(s: &mut Snapshot) -> Parts<'_> {
    Parts {
        actions: s.actions.iter_mut().collect(),
        components: s.components.iter_mut().collect(),
        pages: s.pages.iter_mut().collect(),
        states: vec![&mut s.state],
    }
}

/// Apply `f` to the mutation (flagged `true`) and the prior snapshot.
fn for_each_part(doc: &mut IntentDocument, mut f: impl FnMut(Parts<'_>, bool)) {
    f(mutation_parts(&mut doc.mutation), true);
    if let Some(prior) = doc.prior.as_mut() {
        f(snapshot_parts(prior), false);
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

fn canonicalize_ids(doc: &mut IntentDocument, log: &mut RepairLog) {
    for_each_part(doc, |parts, is_mutation| {
        for action in parts.actions {
            let canonical = canonical_id(&action.id);
            if canonical != action.id {
                if is_mutation {
                    log.push(
                        Stage::Normalize,
                        Some(&canonical),
                        RuleApplied::CanonicalizeId,
                        format!("'{}' -> '{}'", action.id, canonical),
                    );
                }
                action.id = canonical;
            }
        }
        for component in parts.components {
            for event in &mut component.events {
                if let Some(id) = event.action_id.as_mut() {
                    *id = canonical_id(id);
                }
            }
        }
        for page in parts.pages {
            for event in &mut page.events {
                event.action_id = canonical_id(&event.action_id);
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Legacy kinds
// ---------------------------------------------------------------------------

fn migrate_legacy_kinds(doc: &mut IntentDocument, config: &NormalizeConfig, log: &mut RepairLog) {
    for_each_part(doc, |parts, is_mutation| {
        for action in parts.actions {
            let ActionKind::Unknown(raw) = &action.kind else {
                continue;
            };
            if !config.is_legacy_kind(raw) {
                continue;
            }
            let raw = raw.clone();
            if is_mutation {
                log.push(
                    Stage::Normalize,
                    Some(&action.id),
                    RuleApplied::MigrateLegacyKind,
                    format!("kind '{raw}' -> 'internal'"),
                );
            }
            action.kind = ActionKind::Internal;
            let slot = if action.config.contains_key(CONFIG_SEMANTIC) {
                CONFIG_LEGACY_KIND
            } else {
                CONFIG_SEMANTIC
            };
            action.config.insert(slot.to_string(), Value::String(raw));
        }
    });
}

fn lower_source_target(doc: &mut IntentDocument, log: &mut RepairLog) {
    for_each_part(doc, |parts, is_mutation| {
        for action in parts.actions {
            let (Some(Value::String(source)), Some(Value::String(target))) =
                (action.config.get("source"), action.config.get("target"))
            else {
                continue;
            };
            if source.is_empty() || target.is_empty() {
                continue;
            }
            let step = Step::copy(target.clone(), source.clone());
            if is_mutation {
                log.push(
                    Stage::Normalize,
                    Some(&action.id),
                    RuleApplied::LowerSourceTarget,
                    format!("'{source}' -> '{target}' lowered to a state_mutation step"),
                );
            }
            action.config.remove("source");
            action.config.remove("target");
            action.steps.push(step);
        }
    });
}

// ---------------------------------------------------------------------------
// Filter keys
// ---------------------------------------------------------------------------

fn mentioned_keys(parts: &Parts<'_>, out: &mut BTreeSet<String>) {
    for state in &parts.states {
        out.extend(state.keys().cloned());
    }
    for c in &parts.components {
        out.extend(c.read_keys());
        out.extend(c.events.iter().filter_map(|e| e.state_update.clone()));
    }
    for a in &parts.actions {
        out.extend(a.mutated_keys());
        out.extend(a.read_keys());
    }
}

fn canonicalize_filter_keys(doc: &mut IntentDocument, log: &mut RepairLog) {
    let mut mentioned = BTreeSet::new();
    for_each_part(doc, |parts, _| mentioned_keys(&parts, &mut mentioned));

    let renames: BTreeMap<String, String> = mentioned
        .into_iter()
        .filter_map(|k| keys::filter_alias(&k).map(|canonical| (k, canonical)))
        .collect();

    for (from, to) in &renames {
        log.push(
            Stage::Normalize,
            None,
            RuleApplied::CanonicalizeFilterKey,
            format!("state key '{from}' -> '{to}'"),
        );
        for_each_part(doc, |parts, _| rename_state_key(parts, from, to));
    }
}

fn rename_str(s: &mut String, from: &str, to: &str) {
    if s == from {
        *s = to.to_string();
    }
}

fn rename_map_key(map: &mut ConfigMap, from: &str, to: &str) {
    if let Some(v) = map.remove(from) {
        map.entry(to.to_string()).or_insert(v);
    }
}

fn rename_state_key(parts: Parts<'_>, from: &str, to: &str) {
    for state in parts.states {
        rename_map_key(state, from, to);
    }

    for c in parts.components {
        for (prop, value) in c.properties.iter_mut() {
            if BINDING_PROPERTIES.contains(&prop.as_str()) {
                if let Value::String(s) = value {
                    rename_str(s, from, to);
                }
            }
            keys::rename_in_value(value, from, to);
        }
        match c.data_source.as_mut() {
            Some(DataSource::State { key }) => rename_str(key, from, to),
            Some(DataSource::Derived { from: src, .. }) => rename_str(src, from, to),
            Some(DataSource::Static { .. }) | Some(DataSource::Unknown(_)) | None => {}
        }
        for event in &mut c.events {
            if let Some(k) = event.state_update.as_mut() {
                rename_str(k, from, to);
            }
            for v in event.args.values_mut() {
                keys::rename_in_value(v, from, to);
            }
        }
    }

    for a in parts.actions {
        for key in [CONFIG_ASSIGN_TO, CONFIG_STATE_KEY, "from", "source", "target"] {
            if let Some(Value::String(s)) = a.config.get_mut(key) {
                rename_str(s, from, to);
            }
        }
        if let Some(Value::Object(updates)) = a.config.get_mut(CONFIG_UPDATES) {
            rename_map_key(updates, from, to);
        }
        for v in a.config.values_mut() {
            keys::rename_in_value(v, from, to);
        }
        for step in &mut a.steps {
            match step {
                Step::StateMutation { key, value, from: src } => {
                    rename_str(key, from, to);
                    if let Some(src) = src.as_mut() {
                        rename_str(src, from, to);
                    }
                    if let Some(v) = value.as_mut() {
                        keys::rename_in_value(v, from, to);
                    }
                }
                Step::IntegrationCall { params, .. } => {
                    params
                        .values_mut()
                        .for_each(|v| keys::rename_in_value(v, from, to));
                }
                Step::Navigate { .. } | Step::Emit { .. } | Step::Unknown(_) => {}
            }
        }
        for trigger in &mut a.triggered_by {
            if let Trigger::StateChange { state_key } = trigger {
                rename_str(state_key, from, to);
            }
        }
        if let Some(inputs) = a.inputs.as_mut() {
            inputs.iter_mut().for_each(|k| rename_str(k, from, to));
        }
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn apply_filter_sentinels(doc: &mut IntentDocument, config: &NormalizeConfig, log: &mut RepairLog) {
    for_each_part(doc, |parts, is_mutation| {
        for state in parts.states {
            for (key, value) in state.iter_mut() {
                if keys::is_filter_key(key) && is_empty_value(value) {
                    *value = Value::String(config.filter_sentinel.clone());
                    if is_mutation {
                        log.push(
                            Stage::Normalize,
                            None,
                            RuleApplied::FilterSentinel,
                            format!("'{key}' defaults to '{}'", config.filter_sentinel),
                        );
                    }
                }
            }
        }
    });
}

fn sentinel_options(options: &mut [Value], value_key: &str, sentinel: &str) -> usize {
    let mut replaced = 0;
    for opt in options.iter_mut() {
        let slot = match opt {
            Value::Object(map) => map.get_mut(value_key),
            other => Some(other),
        };
        if let Some(v) = slot {
            if v.as_str() == Some("") {
                *v = Value::String(sentinel.to_string());
                replaced += 1;
            }
        }
    }
    replaced
}

fn apply_option_sentinels(doc: &mut IntentDocument, config: &NormalizeConfig, log: &mut RepairLog) {
    for_each_part(doc, |parts, is_mutation| {
        for c in parts.components {
            if !c.kind.is_select_like() {
                continue;
            }
            let value_key = c.option_value_key().to_string();
            let mut replaced = 0;
            if let Some(Value::Array(opts)) = c.properties.get_mut("options") {
                replaced += sentinel_options(opts, &value_key, &config.filter_sentinel);
            }
            if let Some(DataSource::Static {
                value: Value::Array(opts),
            }) = c.data_source.as_mut()
            {
                replaced += sentinel_options(opts, &value_key, &config.filter_sentinel);
            }
            if replaced > 0 && is_mutation {
                log.push(
                    Stage::Normalize,
                    None,
                    RuleApplied::OptionSentinel,
                    format!(
                        "component '{}': {replaced} empty option value(s) -> '{}'",
                        c.id, config.filter_sentinel
                    ),
                );
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(doc: serde_json::Value) -> (IntentDocument, RepairLog) {
        let doc: IntentDocument = serde_json::from_value(doc).unwrap();
        let mut log = RepairLog::new();
        let out = normalize(doc, &NormalizeConfig::default(), &mut log);
        (out, log)
    }

    #[test]
    fn canonical_id_examples() {
        assert_eq!(canonical_id("Fetch-Data 1"), "fetch_data_1");
        assert_eq!(canonical_id("  Load Orders! "), "load_orders");
        assert_eq!(canonical_id("already_ok_42"), "already_ok_42");
        assert_eq!(canonical_id("Ünïcode·Name"), "ncodename");
    }

    #[test]
    fn canonical_id_is_idempotent() {
        for raw in [
            "Fetch-Data 1",
            "  x  y  ",
            "A--B",
            "émoji 🚀 id",
            "",
            "MiXeD_Case-id.v2",
            "\ttabbed\nid",
        ] {
            let once = canonical_id(raw);
            assert_eq!(canonical_id(&once), once, "{raw:?}");
        }
    }

    #[test]
    fn ids_and_event_references_are_rewritten_together() {
        let (doc, log) = run(json!({
            "intent_type": "create",
            "mutation": {
                "pagesAdded": [{"id": "home", "events": [{"kind": "onPageLoad", "actionId": "Fetch Orders"}]}],
                "componentsAdded": [{"id": "btn", "kind": "button",
                    "events": [{"kind": "onClick", "actionId": "Refresh-Orders"}]}],
                "actionsAdded": [
                    {"id": "Fetch Orders", "kind": "integration_call"},
                    {"id": "Refresh-Orders", "kind": "internal"}
                ]
            }
        }));
        let m = &doc.mutation;
        assert_eq!(m.actions_added[0].id, "fetch_orders");
        assert_eq!(m.actions_added[1].id, "refresh_orders");
        assert_eq!(m.pages_added[0].events[0].action_id, "fetch_orders");
        assert_eq!(
            m.components_added[0].events[0].action_id.as_deref(),
            Some("refresh_orders")
        );
        assert!(log.fired_for(RuleApplied::CanonicalizeId, "fetch_orders"));
    }

    #[test]
    fn legacy_kinds_migrate_with_semantic_tag() {
        let (doc, log) = run(json!({
            "intent_type": "modify",
            "mutation": {"actionsAdded": [
                {"id": "f", "kind": "Filter", "config": {"source": "orders", "target": "visibleOrders"}},
                {"id": "d", "kind": "derive_state"},
                {"id": "x", "kind": "teleport"}
            ]}
        }));
        let f = &doc.mutation.actions_added[0];
        assert_eq!(f.kind, ActionKind::Internal);
        assert_eq!(f.semantic(), Some("Filter"));
        assert!(!f.config.contains_key("source"));
        assert_eq!(f.steps, vec![Step::copy("visibleOrders", "orders")]);

        assert_eq!(doc.mutation.actions_added[1].semantic(), Some("derive_state"));
        assert_eq!(
            doc.mutation.actions_added[2].kind,
            ActionKind::Unknown("teleport".to_string())
        );
        assert!(log.fired_for(RuleApplied::MigrateLegacyKind, "f"));
        assert!(log.fired_for(RuleApplied::LowerSourceTarget, "f"));
    }

    #[test]
    fn filter_keys_are_namespaced_everywhere() {
        let (doc, log) = run(json!({
            "intent_type": "create",
            "mutation": {
                "componentsAdded": [
                    {"id": "sel", "kind": "select", "properties": {"bindKey": "statusFilter", "optionValueKey": "id"}},
                    {"id": "lbl", "kind": "text", "properties": {"content": "Showing {{state.statusFilter}}"}}
                ],
                "actionsAdded": [{
                    "id": "fetch", "kind": "integration_call",
                    "config": {"assignTo": "orders", "params": {"status": "{{state.statusFilter}}"}},
                    "triggeredBy": {"type": "state_change", "stateKey": "statusFilter"}
                }],
                "stateAdded": {"statusFilter": null, "filter_region": ""}
            }
        }));
        let m = &doc.mutation;
        assert_eq!(m.state_added["filters.status"], json!("all"));
        assert_eq!(m.state_added["filters.region"], json!("all"));
        assert!(!m.state_added.contains_key("statusFilter"));
        assert_eq!(m.components_added[0].bind_key(), Some("filters.status"));
        assert_eq!(
            m.components_added[1].property_str("content"),
            Some("Showing {{state.filters.status}}")
        );
        let fetch = &m.actions_added[0];
        assert_eq!(fetch.triggered_by, vec![Trigger::state_change("filters.status")]);
        assert_eq!(fetch.config["params"]["status"], json!("{{state.filters.status}}"));
        assert!(log.fired(RuleApplied::CanonicalizeFilterKey));
        assert!(log.fired(RuleApplied::FilterSentinel));
    }

    #[test]
    fn empty_select_options_get_the_sentinel() {
        let (doc, log) = run(json!({
            "intent_type": "create",
            "mutation": {"componentsAdded": [{
                "id": "sel", "kind": "dropdown",
                "properties": {"options": [{"label": "Any", "value": ""}, {"label": "Open", "value": "open"}, ""]}
            }]}
        }));
        let opts = &doc.mutation.components_added[0].properties["options"];
        assert_eq!(opts[0]["value"], json!("all"));
        assert_eq!(opts[1]["value"], json!("open"));
        assert_eq!(opts[2], json!("all"));
        assert!(log.fired(RuleApplied::OptionSentinel));
    }

    #[test]
    fn legacy_kind_does_not_overwrite_authored_semantic() {
        let (doc, _) = run(json!({
            "intent_type": "modify",
            "mutation": {"actionsAdded": [
                {"id": "m", "kind": "Map", "config": {"semantic": "price_rollup"}}
            ]}
        }));
        let m = &doc.mutation.actions_added[0];
        assert_eq!(m.kind, ActionKind::Internal);
        assert_eq!(m.semantic(), Some("price_rollup"));
        assert_eq!(m.config[CONFIG_LEGACY_KIND], json!("Map"));
    }

    #[test]
    fn option_sentinel_follows_option_value_key() {
        let (doc, log) = run(json!({
            "intent_type": "create",
            "mutation": {"componentsAdded": [{
                "id": "sel", "kind": "select",
                "properties": {
                    "bindKey": "region",
                    "optionValueKey": "id",
                    "options": [{"id": "", "label": "Any"}, {"id": "eu", "label": "Europe"}]
                }
            }]}
        }));
        let opts = &doc.mutation.components_added[0].properties["options"];
        assert_eq!(opts[0], json!({"id": "all", "label": "Any"}));
        assert_eq!(opts[1]["id"], json!("eu"));
        assert!(log.fired(RuleApplied::OptionSentinel));
    }

    #[test]
    fn prior_snapshot_is_normalized_without_logging() {
        let (doc, log) = run(json!({
            "intent_type": "modify",
            "mutation": {},
            "prior": {"actions": [{"id": "Old Action", "kind": "assign"}]}
        }));
        let prior = doc.prior.unwrap();
        assert_eq!(prior.actions[0].id, "old_action");
        assert_eq!(prior.actions[0].kind, ActionKind::Internal);
        assert!(log.is_empty());
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = json!({
            "intent_type": "create",
            "mutation": {
                "componentsAdded": [{"id": "sel", "kind": "select",
                    "properties": {"bindKey": "region_filter", "options": [""]}}],
                "actionsAdded": [{"id": "Apply Filter", "kind": "map",
                    "config": {"source": "rawRows", "target": "rows"}}],
                "stateAdded": {"region_filter": ""}
            }
        });
        let (once, _) = run(raw);
        let mut log = RepairLog::new();
        let twice = normalize(once.clone(), &NormalizeConfig::default(), &mut log);
        assert_eq!(once, twice);
        assert!(log.is_empty());
    }
}
