use super::load_document;
use crate::output::{or_dash, print_json, print_table};
use crate::root::load_config;
use actiongraph_core::validate::{Severity, ValidationMode};
use actiongraph_core::Compiler;
use std::path::Path;

pub fn run(config: Option<&Path>, file: &Path, full: bool, json: bool) -> anyhow::Result<()> {
    let cfg = load_config(config)?;
    let catalog = cfg.catalog();
    let compiler = Compiler::new(&cfg, &catalog);

    let (doc, _) = compiler.normalize(load_document(file)?);
    let mode = if full {
        ValidationMode::Full
    } else {
        ValidationMode::Structural
    };
    let report = compiler.validate(&doc, mode);

    if json {
        print_json(&serde_json::json!({
            "valid": report.is_ok(),
            "findings": report.findings,
            "rejection": report.fatal().cloned().and_then(|f| f.into_error().rejection()),
        }))?;
    } else if report.findings.is_empty() {
        println!("{} is valid. No findings.", file.display());
    } else {
        let rows = report
            .findings
            .iter()
            .map(|f| {
                let level = match f.severity {
                    Severity::Fatal => "fatal",
                    Severity::Advisory => "advisory",
                };
                vec![
                    level.to_string(),
                    f.rule.to_string(),
                    or_dash(f.action_id.as_deref()),
                    f.message.clone(),
                ]
            })
            .collect();
        print_table(&["LEVEL", "RULE", "ACTION", "MESSAGE"], rows);
    }

    if let Some(fatal) = report.fatal() {
        anyhow::bail!("document rejected: {}: {}", fatal.rule, fatal.message);
    }
    Ok(())
}
