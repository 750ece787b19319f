//! Structured audit trail: which rewrite or repair fired for which action,
//! plus non-fatal diagnostics from graph building and simulation.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage / RuleApplied
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Validate,
    Repair,
    Graph,
    Simulate,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Validate => "validate",
            Stage::Repair => "repair",
            Stage::Graph => "graph",
            Stage::Simulate => "simulate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleApplied {
    CanonicalizeId,
    MigrateLegacyKind,
    LowerSourceTarget,
    CanonicalizeFilterKey,
    FilterSentinel,
    OptionSentinel,
    RemoveRedundantStatusSetter,
    BindStateChange,
    BindPageLoad,
    BindSafetyNet,
    SynthesizeNormalizer,
    SynthesizeStatusMirror,
}

impl RuleApplied {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleApplied::CanonicalizeId => "canonicalize_id",
            RuleApplied::MigrateLegacyKind => "migrate_legacy_kind",
            RuleApplied::LowerSourceTarget => "lower_source_target",
            RuleApplied::CanonicalizeFilterKey => "canonicalize_filter_key",
            RuleApplied::FilterSentinel => "filter_sentinel",
            RuleApplied::OptionSentinel => "option_sentinel",
            RuleApplied::RemoveRedundantStatusSetter => "remove_redundant_status_setter",
            RuleApplied::BindStateChange => "bind_state_change",
            RuleApplied::BindPageLoad => "bind_page_load",
            RuleApplied::BindSafetyNet => "bind_safety_net",
            RuleApplied::SynthesizeNormalizer => "synthesize_normalizer",
            RuleApplied::SynthesizeStatusMirror => "synthesize_status_mirror",
        }
    }
}

impl fmt::Display for RuleApplied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RepairLog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRecord {
    pub stage: Stage,
    /// Action the rule touched; state-key rewrites carry `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(rename = "ruleApplied")]
    pub rule: RuleApplied,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepairLog {
    records: Vec<RepairRecord>,
}

impl RepairLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        stage: Stage,
        action_id: Option<&str>,
        rule: RuleApplied,
        detail: impl Into<String>,
    ) {
        let record = RepairRecord {
            stage,
            action_id: action_id.map(str::to_string),
            rule,
            detail: detail.into(),
        };
        tracing::debug!(
            stage = %record.stage,
            action = record.action_id.as_deref().unwrap_or("-"),
            rule = %record.rule,
            "{}",
            record.detail
        );
        self.records.push(record);
    }

    pub fn records(&self) -> &[RepairRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn fired(&self, rule: RuleApplied) -> bool {
        self.records.iter().any(|r| r.rule == rule)
    }

    pub fn fired_for(&self, rule: RuleApplied, action_id: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.rule == rule && r.action_id.as_deref() == Some(action_id))
    }

    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &RepairRecord> {
        self.records.iter().filter(move |r| r.stage == stage)
    }

    pub fn extend(&mut self, other: RepairLog) {
        self.records.extend(other.records);
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A problem surfaced to the caller without rejecting the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub stage: Stage,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: Stage, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            code: code.into(),
            action_id: None,
            message: message.into(),
        }
    }

    pub fn for_action(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }
}
