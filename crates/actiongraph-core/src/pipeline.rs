//! The compiler pipeline: normalize, validate, analyze, repair, re-validate,
//! build the execution graph and dry-run it.

use crate::audit::{Diagnostic, RepairLog};
use crate::catalog::CapabilityCatalog;
use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::graph;
use crate::normalize::normalize;
use crate::reachability::{analyze, Reachability};
use crate::repair::repair;
use crate::simulate::{simulate, SimulationReport};
use crate::types::IntentDocument;
use crate::validate::{Finding, ValidationContext, ValidationMode, ValidationReport, Validator};
use crate::view::DocumentView;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compilation {
    pub document: IntentDocument,
    pub repair_log: RepairLog,
    pub advisories: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub reachability_before: Reachability,
    pub reachability_after: Reachability,
    pub simulation: SimulationReport,
    pub compiled_at: DateTime<Utc>,
}

pub struct Compiler<'a> {
    config: &'a CompilerConfig,
    catalog: &'a dyn CapabilityCatalog,
    validator: Validator,
}

impl<'a> Compiler<'a> {
    pub fn new(config: &'a CompilerConfig, catalog: &'a dyn CapabilityCatalog) -> Self {
        Self {
            config,
            catalog,
            validator: Validator::default(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        self.config
    }

    /// Stage 1 on its own.
    pub fn normalize(&self, doc: IntentDocument) -> (IntentDocument, RepairLog) {
        let mut log = RepairLog::new();
        let doc = normalize(doc, &self.config.normalize, &mut log);
        (doc, log)
    }

    pub fn validate(&self, doc: &IntentDocument, mode: ValidationMode) -> ValidationReport {
        let view = DocumentView::new(&doc.mutation, doc.prior.as_ref());
        let ctx = ValidationContext::new(view, self.config);
        self.validator.validate(&ctx, mode)
    }

    pub fn compile(&self, doc: IntentDocument) -> Result<Compilation> {
        let (mut doc, mut log) = self.normalize(doc);

        self.validate(&doc, ValidationMode::Structural).into_result()?;

        let before = analyze(&doc.mutation, doc.prior.as_ref());
        if self.config.repair.enabled {
            let mutation = std::mem::take(&mut doc.mutation);
            doc.mutation = repair(mutation, doc.prior.as_ref(), &before, self.config, &mut log);
        } else {
            tracing::debug!("repair disabled");
        }

        let advisories = self.validate(&doc, ValidationMode::Full).into_result()?;

        let after = analyze(&doc.mutation, doc.prior.as_ref());
        if let Some(orphan) = after.orphans.first() {
            return Err(CompileError::invalid_action(
                format!("action '{orphan}' is unreachable from any trigger"),
                orphan,
            ));
        }

        let built = graph::build(&doc.mutation, doc.prior.as_ref(), self.catalog)?;
        let mut diagnostics = built.diagnostics;
        doc.execution_graph = Some(built.graph);

        let simulation = simulate(
            &doc.mutation,
            doc.prior.as_ref(),
            self.config.simulation.step_budget,
        );
        diagnostics.extend(simulation.diagnostic());

        tracing::info!(
            intent = %doc.intent_type,
            actions = doc.mutation.action_count(),
            repairs = log.len(),
            advisories = advisories.len(),
            diagnostics = diagnostics.len(),
            "compiled intent document"
        );

        Ok(Compilation {
            document: doc,
            repair_log: log,
            advisories,
            diagnostics,
            reachability_before: before,
            reachability_after: after,
            simulation,
            compiled_at: Utc::now(),
        })
    }
}
