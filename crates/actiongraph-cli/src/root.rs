use actiongraph_core::config::{CompilerConfig, CONFIG_FILE};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Locate the compiler config.
///
/// Priority:
/// 1. `--config` flag / `ACTIONGRAPH_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `actiongraph.yaml`
/// 3. None: the caller uses built-in defaults
pub fn resolve_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut dir = cwd;
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}

/// Load the resolved config. An explicit path that does not exist is an
/// error; finding nothing by walking up is not.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<CompilerConfig> {
    match resolve_config(explicit) {
        Some(path) => CompilerConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            tracing::debug!("no {CONFIG_FILE} found; using defaults");
            Ok(CompilerConfig::default())
        }
    }
}

/// Where `config init` writes: the explicit path, else `./actiongraph.yaml`.
pub fn config_target(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}
