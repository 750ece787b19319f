pub mod canon;
pub mod compile;
pub mod config;
pub mod reach;
pub mod simulate;
pub mod validate;

use crate::output::print_json;
use actiongraph_core::types::IntentDocument;
use actiongraph_core::CompileError;
use anyhow::Context;
use std::path::Path;

pub(crate) fn load_document(path: &Path) -> anyhow::Result<IntentDocument> {
    IntentDocument::load(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Turn a pipeline failure into the command's error. Rejections are
/// printed in their wire shape first when `--json` is set.
pub(crate) fn reject(err: CompileError, json: bool) -> anyhow::Error {
    if let Some(rejection) = err.rejection() {
        if json {
            if let Err(e) = print_json(&rejection) {
                return e;
            }
        }
        return anyhow::anyhow!("document rejected: {}", rejection.reason);
    }
    anyhow::Error::new(err)
}
