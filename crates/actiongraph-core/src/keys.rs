//! State-key helpers shared by every stage: companion status/error keys,
//! `{{state.X}}` template scanning, and filter-alias detection.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const STATUS_SUFFIX: &str = "Status";
pub const ERROR_SUFFIX: &str = "Error";
pub const FILTER_NAMESPACE: &str = "filters";

/// Companion key holding the idle/loading/success/error lifecycle of `key`.
pub fn status_key(key: &str) -> String {
    format!("{key}{STATUS_SUFFIX}")
}

pub fn error_key(key: &str) -> String {
    format!("{key}{ERROR_SUFFIX}")
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

static TEMPLATE_RE: OnceLock<Regex> = OnceLock::new();

fn template_re() -> &'static Regex {
    TEMPLATE_RE.get_or_init(|| {
        Regex::new(r"\{\{\s*state\.([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}").unwrap()
    })
}

/// Keys referenced as `{{state.X}}` anywhere inside `s`.
pub fn templated_keys_in_str(s: &str, out: &mut BTreeSet<String>) {
    for cap in template_re().captures_iter(s) {
        out.insert(cap[1].to_string());
    }
}

/// Recursively collect templated keys from every string inside `value`.
pub fn templated_keys(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => templated_keys_in_str(s, out),
        Value::Array(items) => items.iter().for_each(|v| templated_keys(v, out)),
        Value::Object(map) => map.values().for_each(|v| templated_keys(v, out)),
        _ => {}
    }
}

/// Rewrite `{{state.from}}` references to `{{state.to}}`, leaving other
/// templates (including longer keys sharing the prefix) untouched.
pub fn rename_in_template(s: &str, from: &str, to: &str) -> String {
    template_re()
        .replace_all(s, |cap: &regex::Captures<'_>| {
            if &cap[1] == from {
                format!("{{{{state.{to}}}}}")
            } else {
                cap[0].to_string()
            }
        })
        .into_owned()
}

/// Apply [`rename_in_template`] to every string inside `value`.
pub fn rename_in_value(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::String(s) => {
            if s.contains("{{") {
                *s = rename_in_template(s, from, to);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| rename_in_value(v, from, to)),
        Value::Object(map) => map.values_mut().for_each(|v| rename_in_value(v, from, to)),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Filter aliases
// ---------------------------------------------------------------------------

static FILTER_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
static FILTER_SUFFIX_RE: OnceLock<Regex> = OnceLock::new();

fn filter_prefix_re() -> &'static Regex {
    FILTER_PREFIX_RE.get_or_init(|| {
        Regex::new(r"^(?:[Ff]ilter[_-]([A-Za-z][A-Za-z0-9]*)|filter([A-Z][A-Za-z0-9]*))$").unwrap()
    })
}

fn filter_suffix_re() -> &'static Regex {
    FILTER_SUFFIX_RE.get_or_init(|| {
        Regex::new(r"^([a-z][A-Za-z0-9]*?)(?:[_-][Ff]ilter|Filter)$").unwrap()
    })
}

/// Canonical `filters.<name>` spelling for an ad-hoc filter key, or `None`
/// when `key` is not a filter alias (already-namespaced keys included).
pub fn filter_alias(key: &str) -> Option<String> {
    if key.contains('.') {
        return None;
    }
    let name = if let Some(cap) = filter_prefix_re().captures(key) {
        cap.get(1).or_else(|| cap.get(2))?.as_str().to_string()
    } else if let Some(cap) = filter_suffix_re().captures(key) {
        cap[1].to_string()
    } else {
        return None;
    };
    Some(format!("{FILTER_NAMESPACE}.{}", lower_first(&name)))
}

pub fn is_filter_key(key: &str) -> bool {
    key.strip_prefix(FILTER_NAMESPACE)
        .is_some_and(|rest| rest.starts_with('.') && rest.len() > 1)
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Naming heuristics
// ---------------------------------------------------------------------------

const STEM_SUFFIXES: &[&str] = &[
    "Status",
    "Normalized",
    "Results",
    "Result",
    "Response",
    "Items",
    "List",
    "Data",
    "Raw",
];
const STEM_PREFIXES: &[&str] = &["raw", "fetch", "load"];

/// Naming stem used to pair a data key with a differently-spelled
/// status binding: `rawOrders`, `ordersData` and `ordersStatus` all share
/// the stem `orders`.
pub fn stem(key: &str) -> String {
    let last = key.rsplit('.').next().unwrap_or(key);
    let mut s = last;
    for suffix in STEM_SUFFIXES {
        if let Some(rest) = s.strip_suffix(suffix) {
            if !rest.is_empty() {
                s = rest;
                break;
            }
        }
    }
    for prefix in STEM_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                s = rest;
                break;
            }
        }
    }
    s.trim_matches('_').to_lowercase()
}

/// Key a synthesized pass-through normalizer writes for raw data key `key`.
pub fn derived_key(key: &str) -> String {
    if let Some(rest) = key.strip_suffix("Raw") {
        if !rest.is_empty() && !rest.ends_with('.') {
            return rest.to_string();
        }
    }
    let (ns, last) = match key.rsplit_once('.') {
        Some((ns, last)) => (Some(ns), last),
        None => (None, key),
    };
    if let Some(rest) = last.strip_prefix("raw") {
        if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
            let name = lower_first(rest);
            return match ns {
                Some(ns) => format!("{ns}.{name}"),
                None => name,
            };
        }
    }
    format!("{key}Normalized")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn companion_keys() {
        assert_eq!(status_key("orders"), "ordersStatus");
        assert_eq!(error_key("orders"), "ordersError");
    }

    #[test]
    fn templates_are_collected_recursively() {
        let mut out = BTreeSet::new();
        templated_keys(
            &json!({"q": "{{state.query}}", "nested": ["{{ state.filters.region }}", 3]}),
            &mut out,
        );
        assert_eq!(
            out.into_iter().collect::<Vec<_>>(),
            vec!["filters.region".to_string(), "query".to_string()]
        );
    }

    #[test]
    fn template_rename_is_exact() {
        let s = "{{state.status}} and {{state.statusText}}";
        assert_eq!(
            rename_in_template(s, "status", "filters.status"),
            "{{state.filters.status}} and {{state.statusText}}"
        );
    }

    #[test]
    fn filter_aliases() {
        for (raw, want) in [
            ("statusFilter", "filters.status"),
            ("status_filter", "filters.status"),
            ("filter_region", "filters.region"),
            ("filterRegion", "filters.region"),
            ("selectedCategoryFilter", "filters.selectedCategory"),
        ] {
            assert_eq!(filter_alias(raw).as_deref(), Some(want), "{raw}");
        }
        for raw in ["filteredOrders", "filters.region", "filter", "orders", "Filter"] {
            assert_eq!(filter_alias(raw), None, "{raw}");
        }
    }

    #[test]
    fn filter_key_detection() {
        assert!(is_filter_key("filters.region"));
        assert!(!is_filter_key("filters."));
        assert!(!is_filter_key("filtersRegion"));
    }

    #[test]
    fn stems_pair_data_and_status_names() {
        assert_eq!(stem("rawOrders"), "orders");
        assert_eq!(stem("ordersStatus"), "orders");
        assert_eq!(stem("salesData"), "sales");
        assert_eq!(stem("dashboard.salesData"), "sales");
        assert_ne!(stem("orders"), stem("customers"));
    }

    #[test]
    fn derived_key_names() {
        assert_eq!(derived_key("rawOrders"), "orders");
        assert_eq!(derived_key("ordersRaw"), "orders");
        assert_eq!(derived_key("data.rawOrders"), "data.orders");
        assert_eq!(derived_key("orders"), "ordersNormalized");
        assert_eq!(derived_key("raw"), "rawNormalized");
    }
}
