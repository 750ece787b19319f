use crate::output::{print_json, print_table};
use actiongraph_core::normalize::canonical_id;

pub fn run(ids: &[String], json: bool) -> anyhow::Result<()> {
    let pairs: Vec<(String, String)> = ids
        .iter()
        .map(|raw| (raw.clone(), canonical_id(raw)))
        .collect();

    if json {
        let value: Vec<serde_json::Value> = pairs
            .iter()
            .map(|(raw, id)| serde_json::json!({"input": raw, "canonical": id}))
            .collect();
        return print_json(&value);
    }

    if let [(_, id)] = pairs.as_slice() {
        println!("{id}");
        return Ok(());
    }
    print_table(
        &["INPUT", "CANONICAL"],
        pairs.into_iter().map(|(raw, id)| vec![raw, id]).collect(),
    );
    Ok(())
}
