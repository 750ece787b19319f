//! Stage 2: structural validation. Rules live in a priority-ordered table of
//! fn pointers (see `rules.rs`); the first fatal finding rejects the document,
//! advisories are logged and handed back to the caller.

use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::rules::default_rules;
use crate::tree::ComponentTree;
use crate::view::DocumentView;
use serde::Serialize;

// ---------------------------------------------------------------------------
// ValidationContext
// ---------------------------------------------------------------------------

pub struct ValidationContext<'a> {
    pub view: DocumentView<'a>,
    pub tree: ComponentTree<'a>,
    pub config: &'a CompilerConfig,
}

impl<'a> ValidationContext<'a> {
    pub fn new(view: DocumentView<'a>, config: &'a CompilerConfig) -> Self {
        Self {
            tree: ComponentTree::build(&view),
            view,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fatal,
    Advisory,
}

/// `Contract` rules only run in [`ValidationMode::Full`]: they describe
/// conditions the repair stage is expected to heal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Structural,
    Contract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Structural,
    Full,
}

impl ValidationMode {
    fn includes(self, scope: Scope) -> bool {
        match self {
            ValidationMode::Full => true,
            ValidationMode::Structural => scope == Scope::Structural,
        }
    }
}

/// What a check reports; the validator stamps rule id and severity.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub message: String,
    pub action_id: Option<String>,
    pub allowed_kinds: Option<Vec<String>>,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            action_id: None,
            allowed_kinds: None,
        }
    }

    pub fn for_action(mut self, id: impl Into<String>) -> Self {
        self.action_id = Some(id.into());
        self
    }

    pub fn with_allowed(mut self, kinds: Vec<String>) -> Self {
        self.allowed_kinds = Some(kinds);
        self
    }
}

pub struct Rule {
    pub id: &'static str,
    pub severity: Severity,
    pub scope: Scope,
    pub check: fn(&ValidationContext) -> Vec<Violation>,
}

// ---------------------------------------------------------------------------
// ValidationReport (output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_kinds: Option<Vec<String>>,
}

impl Finding {
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn into_error(self) -> CompileError {
        CompileError::InvalidIntentGraph {
            reason: format!("{}: {}", self.rule, self.message),
            action_id: self.action_id,
            allowed_kinds: self.allowed_kinds,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.fatal().is_none()
    }

    /// First fatal finding in rule-priority order.
    pub fn fatal(&self) -> Option<&Finding> {
        self.findings.iter().find(|f| f.is_fatal())
    }

    pub fn advisories(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_fatal())
    }

    /// Reject on the first fatal finding, otherwise hand back the advisories.
    pub fn into_result(self) -> Result<Vec<Finding>> {
        let (fatal, advisories): (Vec<_>, Vec<_>) =
            self.findings.into_iter().partition(Finding::is_fatal);
        match fatal.into_iter().next() {
            Some(f) => Err(f.into_error()),
            None => Ok(advisories),
        }
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

pub struct Validator {
    rules: Vec<Rule>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Validator {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn validate(&self, ctx: &ValidationContext, mode: ValidationMode) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in self.rules.iter().filter(|r| mode.includes(r.scope)) {
            for v in (rule.check)(ctx) {
                match rule.severity {
                    Severity::Fatal => {
                        tracing::debug!(rule = rule.id, action = ?v.action_id, "{}", v.message)
                    }
                    Severity::Advisory => {
                        tracing::warn!(rule = rule.id, action = ?v.action_id, "{}", v.message)
                    }
                }
                report.findings.push(Finding {
                    rule: rule.id,
                    severity: rule.severity,
                    message: v.message,
                    action_id: v.action_id,
                    allowed_kinds: v.allowed_kinds,
                });
            }
        }
        report
    }
}

/// Run the default rule table over `view`.
pub fn validate(
    view: DocumentView<'_>,
    config: &CompilerConfig,
    mode: ValidationMode,
) -> ValidationReport {
    let ctx = ValidationContext::new(view, config);
    Validator::default().validate(&ctx, mode)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
