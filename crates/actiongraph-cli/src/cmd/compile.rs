use super::{load_document, reject};
use crate::output::{or_dash, print_json, print_table};
use crate::root::load_config;
use actiongraph_core::Compiler;
use anyhow::Context;
use std::path::Path;

pub fn run(
    config: Option<&Path>,
    file: &Path,
    out: Option<&Path>,
    no_repair: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut cfg = load_config(config)?;
    if no_repair {
        cfg.repair.enabled = false;
    }
    let catalog = cfg.catalog();
    let doc = load_document(file)?;

    let compilation = Compiler::new(&cfg, &catalog)
        .compile(doc)
        .map_err(|e| reject(e, json))?;

    if let Some(path) = out {
        compilation
            .document
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if json {
        return print_json(&compilation);
    }

    if out.is_none() {
        println!("{}", compilation.document.to_json_pretty()?);
        return Ok(());
    }

    let graph = compilation.document.execution_graph.as_ref();
    println!(
        "Compiled {} -> {} ({} nodes, {} edges)",
        file.display(),
        out.map(|p| p.display().to_string()).unwrap_or_default(),
        graph.map_or(0, |g| g.nodes.len()),
        graph.map_or(0, |g| g.edges.len()),
    );

    if !compilation.repair_log.is_empty() {
        println!("\nRepairs:");
        let rows = compilation
            .repair_log
            .records()
            .iter()
            .map(|r| {
                vec![
                    r.stage.to_string(),
                    or_dash(r.action_id.as_deref()),
                    r.rule.to_string(),
                    r.detail.clone(),
                ]
            })
            .collect();
        print_table(&["STAGE", "ACTION", "RULE", "DETAIL"], rows);
    }

    if !compilation.advisories.is_empty() {
        println!("\nAdvisories:");
        for f in &compilation.advisories {
            println!("[{}] {}", f.rule, f.message);
        }
    }

    for d in &compilation.diagnostics {
        println!("[{}] {}", d.code, d.message);
    }
    Ok(())
}
