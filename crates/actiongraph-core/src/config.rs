use crate::catalog::{Capability, StaticCatalog};
use crate::error::{CompileError, Result};
use crate::normalize::canonical_id;
use crate::types::ActionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const CONFIG_FILE: &str = "actiongraph.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// NormalizeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Deprecated action kinds migrated to `internal`.
    #[serde(default = "default_legacy_kinds")]
    pub legacy_kinds: Vec<String>,
    /// Value substituted for empty filter state and empty select options.
    #[serde(default = "default_sentinel")]
    pub filter_sentinel: String,
}

fn default_legacy_kinds() -> Vec<String> {
    [
        "assign",
        "filter",
        "map",
        "derive_state",
        "state_update",
        "state_assign",
        "transform",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sentinel() -> String {
    "all".to_string()
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            legacy_kinds: default_legacy_kinds(),
            filter_sentinel: default_sentinel(),
        }
    }
}

impl NormalizeConfig {
    pub fn is_legacy_kind(&self, raw: &str) -> bool {
        let wanted = canonical_id(raw);
        self.legacy_kinds.iter().any(|k| canonical_id(k) == wanted)
    }
}

// ---------------------------------------------------------------------------
// RepairConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub synthesize_normalizers: bool,
    #[serde(default = "default_true")]
    pub synthesize_status_mirrors: bool,
    #[serde(default = "default_safety_net")]
    pub safety_net_reason: String,
}

fn default_true() -> bool {
    true
}

fn default_safety_net() -> String {
    "system_safety_net".to_string()
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            synthesize_normalizers: true,
            synthesize_status_mirrors: true,
            safety_net_reason: default_safety_net(),
        }
    }
}

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_step_budget")]
    pub step_budget: usize,
}

fn default_step_budget() -> usize {
    100
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_budget: default_step_budget(),
        }
    }
}

// ---------------------------------------------------------------------------
// CompilerConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub normalize: NormalizeConfig,
    #[serde(default)]
    pub repair: RepairConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
    /// Action-id prefixes treated as fire-and-forget.
    #[serde(default = "default_effect_only_prefixes")]
    pub effect_only_prefixes: Vec<String>,
}

fn default_version() -> u32 {
    1
}

fn default_effect_only_prefixes() -> Vec<String> {
    [
        "open_", "navigate", "send_", "notify_", "track_", "log_", "submit_", "delete_",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            normalize: NormalizeConfig::default(),
            repair: RepairConfig::default(),
            simulation: SimulationConfig::default(),
            capabilities: Vec::new(),
            effect_only_prefixes: default_effect_only_prefixes(),
        }
    }
}

impl CompilerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CompileError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: CompilerConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn catalog(&self) -> StaticCatalog {
        StaticCatalog::new(self.capabilities.iter().cloned())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // 1. The simulator needs at least one step to do anything
        if self.simulation.step_budget == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "simulation.step_budget must be greater than 0".to_string(),
            });
        } else if self.simulation.step_budget > 10_000 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "simulation.step_budget={} (>10000 is unusual)",
                    self.simulation.step_budget
                ),
            });
        }

        // 2. A legacy kind must never shadow a canonical kind
        for kind in &self.normalize.legacy_kinds {
            if !matches!(ActionKind::from(kind.clone()), ActionKind::Unknown(_)) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "legacy kind '{kind}' shadows a canonical action kind"
                    ),
                });
            }
        }

        if self.normalize.filter_sentinel.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "normalize.filter_sentinel must not be empty".to_string(),
            });
        }

        if self.repair.safety_net_reason.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "repair.safety_net_reason must not be empty".to_string(),
            });
        }

        // 3. Capabilities: ids must be present and unique
        let mut seen = HashSet::new();
        for cap in &self.capabilities {
            if cap.id.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "capability with an empty id".to_string(),
                });
            } else if !seen.insert(cap.id.as_str()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("capability '{}' is declared more than once", cap.id),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = CompilerConfig::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: CompilerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.simulation.step_budget, 100);
        assert!(parsed.repair.enabled);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: CompilerConfig = serde_yaml::from_str(
            "simulation:\n  step_budget: 25\ncapabilities:\n  - id: sheets.read\n    provider: google\n",
        )
        .unwrap();
        assert_eq!(cfg.simulation.step_budget, 25);
        assert_eq!(cfg.normalize.filter_sentinel, "all");
        assert!(cfg.normalize.is_legacy_kind("Derive-State"));
        assert_eq!(cfg.catalog().len(), 1);
    }

    #[test]
    fn load_missing_file_is_config_not_found() {
        let dir = TempDir::new().unwrap();
        let err = CompilerConfig::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, CompileError::ConfigNotFound(_)));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut cfg = CompilerConfig::default();
        cfg.repair.enabled = false;
        cfg.save(&path).unwrap();
        let loaded = CompilerConfig::load(&path).unwrap();
        assert!(!loaded.repair.enabled);
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(CompilerConfig::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = CompilerConfig::default();
        cfg.simulation.step_budget = 0;
        cfg.normalize.legacy_kinds.push("workflow".to_string());
        cfg.capabilities = vec![Capability::new("a"), Capability::new("a")];
        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 2);
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("'a'")));
    }
}
