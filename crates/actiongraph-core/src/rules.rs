use crate::types::{
    raw_type, Action, ActionKind, Component, ComponentKind, DataSource, Step, Trigger,
    CONFIG_UPDATES,
};
use crate::validate::{Rule, Scope, Severity, ValidationContext, Violation};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Helper macros for concise rule definitions
// ---------------------------------------------------------------------------

macro_rules! rule {
    (
        id: $id:expr,
        severity: $sev:expr,
        check: $check:expr
        $(, scope: $scope:expr)?
    ) => {
        Rule {
            id: $id,
            severity: $sev,
            check: $check,
            scope: {
                #[allow(unused_assignments, unused_mut)]
                let mut v = Scope::Structural;
                $(v = $scope;)?
                v
            },
        }
    };
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static PLAIN_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn plain_key_re() -> &'static Regex {
    PLAIN_KEY_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*$").unwrap())
}

fn components<'a>(ctx: &ValidationContext<'a>) -> impl Iterator<Item = &'a Component> {
    ctx.view.mutation().components()
}

fn actions<'a>(ctx: &ValidationContext<'a>) -> impl Iterator<Item = &'a Action> {
    ctx.view.mutation().actions()
}

fn lists<'a>(ctx: &ValidationContext<'a>) -> impl Iterator<Item = &'a Component> {
    components(ctx).filter(|c| c.kind == ComponentKind::List)
}

fn present<'a>(c: &'a Component, prop: &str) -> Option<&'a Value> {
    c.properties.get(prop).filter(|v| !v.is_null())
}

fn is_empty_option(v: &Value, value_key: &str) -> bool {
    match v {
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.get(value_key).and_then(Value::as_str) == Some(""),
        _ => false,
    }
}

fn has_click(events: &Value) -> bool {
    events.as_array().is_some_and(|evs| {
        evs.iter()
            .any(|e| e.get("kind").and_then(Value::as_str) == Some("onClick"))
    })
}

// ---------------------------------------------------------------------------
// Component checks
// ---------------------------------------------------------------------------

fn component_kind_allowed(ctx: &ValidationContext) -> Vec<Violation> {
    components(ctx)
        .filter(|c| matches!(c.kind, ComponentKind::Unknown(_)))
        .map(|c| {
            Violation::new(format!(
                "component '{}' has kind '{}', which is not in the allow-list",
                c.id, c.kind
            ))
            .with_allowed(ComponentKind::allowed_names())
        })
        .collect()
}

fn list_children_are_ids(ctx: &ValidationContext) -> Vec<Violation> {
    lists(ctx)
        .filter(|c| c.children.iter().any(|ch| ch.as_id().is_none()))
        .map(|c| Violation::new(format!("list '{}' declares inline children; use component ids", c.id)))
        .collect()
}

fn list_single_render_model(ctx: &ValidationContext) -> Vec<Violation> {
    lists(ctx)
        .filter_map(|c| {
            let models: Vec<&str> = [
                present(c, "itemProps").map(|_| "itemProps"),
                present(c, "itemComponent").map(|_| "itemComponent"),
                (!c.children.is_empty()).then_some("children"),
            ]
            .into_iter()
            .flatten()
            .collect();
            (models.len() > 1).then(|| {
                Violation::new(format!(
                    "list '{}' mixes rendering models: {}",
                    c.id,
                    models.join(", ")
                ))
            })
        })
        .collect()
}

fn no_click_on_item_template(ctx: &ValidationContext) -> Vec<Violation> {
    let mut out = Vec::new();
    for c in lists(ctx) {
        let item_click = match present(c, "itemComponent") {
            Some(Value::Object(inline)) => inline.get("events").is_some_and(has_click),
            Some(Value::String(id)) => ctx
                .view
                .component(id)
                .is_some_and(|item| item.events.iter().any(|e| e.kind == "onClick")),
            _ => false,
        };
        let props_click = matches!(
            present(c, "itemProps"),
            Some(Value::Object(p)) if p.contains_key("onClick")
        );
        if item_click || props_click {
            out.push(Violation::new(format!(
                "list '{}' attaches onClick to its item template; handle onSelect on the list instead",
                c.id
            )));
        }
    }
    out
}

fn disabled_key_is_plain(ctx: &ValidationContext) -> Vec<Violation> {
    components(ctx)
        .filter_map(|c| {
            let v = present(c, "disabledKey")?;
            let plain = v.as_str().is_some_and(|s| plain_key_re().is_match(s));
            (!plain).then(|| {
                Violation::new(format!(
                    "component '{}' has disabledKey {v}; it must name a state key, not an expression",
                    c.id
                ))
            })
        })
        .collect()
}

fn select_binding_contract(ctx: &ValidationContext) -> Vec<Violation> {
    let mut out = Vec::new();
    for c in components(ctx).filter(|c| c.kind.is_select_like()) {
        let value_key = c.property_str("optionValueKey").unwrap_or("").trim();
        if value_key.is_empty() {
            out.push(Violation::new(format!(
                "{} '{}' must declare a non-empty optionValueKey",
                c.kind, c.id
            )));
        }
        let bound = c.bind_key().is_some();
        let updates = c.events.iter().any(|e| e.is_state_update());
        match (bound, updates) {
            (true, true) => out.push(Violation::new(format!(
                "{} '{}' declares both bindKey and a stateUpdate event",
                c.kind, c.id
            ))),
            (false, false) => out.push(Violation::new(format!(
                "{} '{}' declares neither bindKey nor a stateUpdate event",
                c.kind, c.id
            ))),
            _ => {}
        }
    }
    out
}

fn static_options_not_empty(ctx: &ValidationContext) -> Vec<Violation> {
    components(ctx)
        .filter(|c| c.kind.is_select_like())
        .filter(|c| {
            let value_key = c.option_value_key();
            c.static_options()
                .is_some_and(|opts| opts.iter().any(|o| is_empty_option(o, value_key)))
        })
        .map(|c| Violation::new(format!("{} '{}' has an empty-string option value", c.kind, c.id)))
        .collect()
}

fn component_ownership(ctx: &ValidationContext) -> Vec<Violation> {
    ctx.tree
        .issues()
        .iter()
        .map(|issue| Violation::new(issue.message()))
        .collect()
}

// ---------------------------------------------------------------------------
// Action checks
// ---------------------------------------------------------------------------

fn action_kind_allowed(ctx: &ValidationContext) -> Vec<Violation> {
    actions(ctx)
        .filter(|a| matches!(a.kind, ActionKind::Unknown(_)))
        .map(|a| {
            Violation::new(format!("action kind '{}' is not allowed", a.kind))
                .for_action(&a.id)
                .with_allowed(ActionKind::allowed_names())
        })
        .collect()
}

/// Triggers, steps and data sources whose `type` tag was not recognized.
fn payload_types_known(ctx: &ValidationContext) -> Vec<Violation> {
    let mut out = Vec::new();
    for a in actions(ctx) {
        let triggers = a.triggered_by.iter().filter_map(|t| match t {
            Trigger::Unknown(raw) => Some(("trigger", raw)),
            _ => None,
        });
        let steps = a.steps.iter().filter_map(|s| match s {
            Step::Unknown(raw) => Some(("step", raw)),
            _ => None,
        });
        for (what, raw) in triggers.chain(steps) {
            out.push(
                Violation::new(format!(
                    "action '{}' has a {what} of unknown or malformed type {}",
                    a.id,
                    raw_type(raw)
                ))
                .for_action(&a.id),
            );
        }
    }
    for c in components(ctx) {
        if let Some(DataSource::Unknown(raw)) = &c.data_source {
            out.push(Violation::new(format!(
                "component '{}' has a dataSource of unknown or malformed type {}",
                c.id,
                raw_type(raw)
            )));
        }
    }
    out
}

fn unique_action_ids(ctx: &ValidationContext) -> Vec<Violation> {
    let mut seen = BTreeSet::new();
    actions(ctx)
        .filter(|a| !seen.insert(a.id.as_str()))
        .map(|a| Violation::new(format!("duplicate action id '{}'", a.id)).for_action(&a.id))
        .collect()
}

fn array_literal_writes(a: &Action) -> BTreeSet<&str> {
    let is_list = |v: &Value| v.as_array().is_some_and(|items| !items.is_empty());
    let mut keys = BTreeSet::new();
    if let Some(Value::Object(updates)) = a.config.get(CONFIG_UPDATES) {
        keys.extend(updates.iter().filter(|(_, v)| is_list(v)).map(|(k, _)| k.as_str()));
    }
    for step in &a.steps {
        if let Step::StateMutation {
            key,
            value: Some(v),
            from: None,
        } = step
        {
            if is_list(v) {
                keys.insert(key.as_str());
            }
        }
    }
    keys
}

/// List data enters state only through `integration_call`.
fn data_authority(ctx: &ValidationContext) -> Vec<Violation> {
    let outputs = ctx.view.integration_outputs();
    let mut out = Vec::new();
    for a in actions(ctx).filter(|a| a.kind == ActionKind::Internal) {
        let literal = a.literal_writes();
        let hits: BTreeSet<&str> = literal
            .iter()
            .map(String::as_str)
            .filter(|k| outputs.contains(*k))
            .chain(array_literal_writes(a))
            .collect();
        let first = hits.into_iter().next();
        if let Some(key) = first {
            out.push(
                Violation::new(format!(
                    "internal action '{}' assigns list data to '{key}'; list data must come from an integration_call",
                    a.id
                ))
                .for_action(&a.id),
            );
        }
    }
    out
}

fn page_events_are_lifecycle(ctx: &ValidationContext) -> Vec<Violation> {
    ctx.view
        .mutation()
        .pages()
        .flat_map(|p| p.events.iter().map(move |e| (p, e)))
        .filter(|(_, e)| !crate::types::is_lifecycle_event(&e.kind))
        .map(|(p, e)| {
            Violation::new(format!(
                "page '{}' wires non-lifecycle event '{}'",
                p.id, e.kind
            ))
            .for_action(&e.action_id)
        })
        .collect()
}

fn event_targets_exist(ctx: &ValidationContext) -> Vec<Violation> {
    let known: BTreeSet<&str> = ctx.view.actions().iter().map(|a| a.id.as_str()).collect();
    let mut out = Vec::new();
    for c in components(ctx) {
        for id in c.action_refs().filter(|id| !known.contains(id)) {
            out.push(
                Violation::new(format!("component '{}' references unknown action '{id}'", c.id))
                    .for_action(id),
            );
        }
    }
    for p in ctx.view.mutation().pages() {
        for e in p.events.iter().filter(|e| !known.contains(e.action_id.as_str())) {
            out.push(
                Violation::new(format!(
                    "page '{}' references unknown action '{}'",
                    p.id, e.action_id
                ))
                .for_action(&e.action_id),
            );
        }
    }
    out
}

/// Every non-effect-only `integration_call` output must have a reader.
fn integration_output_consumed(ctx: &ValidationContext) -> Vec<Violation> {
    let prefixes = &ctx.config.effect_only_prefixes;
    actions(ctx)
        .filter(|a| a.kind == ActionKind::IntegrationCall && !a.looks_effect_only(prefixes))
        .filter_map(|a| {
            let key = a.assigned_key()?;
            (!ctx.view.is_consumed(key, &a.id)).then(|| {
                Violation::new(format!(
                    "integration_call '{}' assigns '{key}' but nothing consumes it",
                    a.id
                ))
                .for_action(&a.id)
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Advisories
// ---------------------------------------------------------------------------

fn unread_mutation(ctx: &ValidationContext) -> Vec<Violation> {
    let mut skip = ctx.view.integration_outputs();
    skip.extend(ctx.view.executor_managed_keys());
    let mut out = Vec::new();
    for a in actions(ctx).filter(|a| !a.is_synthetic()) {
        for key in a.mutated_keys().difference(&skip) {
            if !ctx.view.is_consumed(key, &a.id) {
                out.push(
                    Violation::new(format!("action '{}' writes '{key}', which nothing reads", a.id))
                        .for_action(&a.id),
                );
            }
        }
    }
    out
}

fn duplicate_binding(ctx: &ValidationContext) -> Vec<Violation> {
    let mut bound: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
    for c in ctx.view.components() {
        if let (Some(key), Some(page)) = (c.bind_key(), ctx.tree.page_of(&c.id)) {
            bound.entry((page, key)).or_default().push(&c.id);
        }
    }
    bound
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((page, key), ids)| {
            Violation::new(format!(
                "page '{page}' binds '{key}' from several components: {}",
                ids.join(", ")
            ))
        })
        .collect()
}

fn inline_children(ctx: &ValidationContext) -> Vec<Violation> {
    components(ctx)
        .filter(|c| c.kind != ComponentKind::List)
        .filter(|c| c.children.iter().any(|ch| ch.as_id().is_none()))
        .map(|c| Violation::new(format!("component '{}' declares inline children", c.id)))
        .collect()
}

// ---------------------------------------------------------------------------
// Default rules (priority-ordered)
// ---------------------------------------------------------------------------

pub fn default_rules() -> Vec<Rule> {
    vec![
        // 1. Vocabulary
        rule! {
            id: "component_kind_allowed",
            severity: Severity::Fatal,
            check: component_kind_allowed
        },
        rule! {
            id: "action_kind_allowed",
            severity: Severity::Fatal,
            check: action_kind_allowed
        },
        rule! {
            id: "payload_types_known",
            severity: Severity::Fatal,
            check: payload_types_known
        },
        rule! {
            id: "unique_action_ids",
            severity: Severity::Fatal,
            check: unique_action_ids
        },
        // 2. Wiring
        rule! {
            id: "page_events_are_lifecycle",
            severity: Severity::Fatal,
            check: page_events_are_lifecycle
        },
        rule! {
            id: "event_targets_exist",
            severity: Severity::Fatal,
            check: event_targets_exist
        },
        rule! {
            id: "component_ownership",
            severity: Severity::Fatal,
            check: component_ownership
        },
        // 3. Rendering contracts
        rule! {
            id: "list_children_are_ids",
            severity: Severity::Fatal,
            check: list_children_are_ids
        },
        rule! {
            id: "list_single_render_model",
            severity: Severity::Fatal,
            check: list_single_render_model
        },
        rule! {
            id: "no_click_on_item_template",
            severity: Severity::Fatal,
            check: no_click_on_item_template
        },
        rule! {
            id: "disabled_key_is_plain",
            severity: Severity::Fatal,
            check: disabled_key_is_plain
        },
        rule! {
            id: "select_binding_contract",
            severity: Severity::Fatal,
            check: select_binding_contract
        },
        rule! {
            id: "static_options_not_empty",
            severity: Severity::Fatal,
            check: static_options_not_empty
        },
        // 4. Data flow
        rule! {
            id: "data_authority",
            severity: Severity::Fatal,
            check: data_authority
        },
        rule! {
            id: "integration_output_consumed",
            severity: Severity::Fatal,
            check: integration_output_consumed,
            scope: Scope::Contract
        },
        // 5. Advisories
        rule! {
            id: "unread_mutation",
            severity: Severity::Advisory,
            check: unread_mutation
        },
        rule! {
            id: "duplicate_binding",
            severity: Severity::Advisory,
            check: duplicate_binding
        },
        rule! {
            id: "inline_children",
            severity: Severity::Advisory,
            check: inline_children
        },
    ]
}
