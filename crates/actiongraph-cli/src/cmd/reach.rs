use super::load_document;
use crate::output::{print_json, print_table};
use crate::root::load_config;
use actiongraph_core::reachability::analyze;
use actiongraph_core::Compiler;
use std::path::Path;

pub fn run(config: Option<&Path>, file: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = load_config(config)?;
    let catalog = cfg.catalog();
    let (doc, _) = Compiler::new(&cfg, &catalog).normalize(load_document(file)?);
    let reach = analyze(&doc.mutation, doc.prior.as_ref());

    if json {
        return print_json(&reach);
    }

    let rows: Vec<Vec<String>> = doc
        .mutation
        .actions()
        .map(|a| {
            let status = if reach.is_reachable(&a.id) {
                "reachable"
            } else {
                "orphan"
            };
            vec![a.id.clone(), a.kind.as_str().to_string(), status.to_string()]
        })
        .collect();
    if rows.is_empty() {
        println!("No actions in the mutation.");
        return Ok(());
    }
    print_table(&["ACTION", "KIND", "STATUS"], rows);
    if !reach.is_closed() {
        println!("\n{} orphaned action(s); `compile` will try to bind them.", reach.orphans.len());
    }
    Ok(())
}
