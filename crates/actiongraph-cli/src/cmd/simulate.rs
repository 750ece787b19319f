use super::load_document;
use crate::output::print_json;
use crate::root::load_config;
use actiongraph_core::audit::RepairLog;
use actiongraph_core::reachability::analyze;
use actiongraph_core::repair::repair;
use actiongraph_core::simulate::simulate;
use actiongraph_core::Compiler;
use std::path::Path;

pub fn run(
    config: Option<&Path>,
    file: &Path,
    budget: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let cfg = load_config(config)?;
    let catalog = cfg.catalog();
    let (mut doc, mut log) = Compiler::new(&cfg, &catalog).normalize(load_document(file)?);

    if cfg.repair.enabled {
        let before = analyze(&doc.mutation, doc.prior.as_ref());
        let mutation = std::mem::take(&mut doc.mutation);
        doc.mutation = repair(mutation, doc.prior.as_ref(), &before, &cfg, &mut log);
    }

    let budget = budget.unwrap_or(cfg.simulation.step_budget);
    let report = simulate(&doc.mutation, doc.prior.as_ref(), budget);

    if json {
        return print_json(&serde_json::json!({
            "simulation": report,
            "diagnostic": report.diagnostic(),
            "repairs": log.len(),
        }));
    }

    if report.visited.is_empty() {
        println!("Nothing is wired to onPageLoad.");
    } else {
        println!("Visited: {}", report.visited.join(" -> "));
    }
    println!("Steps:   {}/{}", report.steps, report.budget);
    if !report.keys_set.is_empty() {
        let keys: Vec<&str> = report.keys_set.iter().map(String::as_str).collect();
        println!("Keys:    {}", keys.join(", "));
    }
    if let Some(d) = report.diagnostic() {
        println!("[{}] {}", d.code, d.message);
    }
    Ok(())
}
