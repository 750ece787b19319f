//! Loading and saving intent documents.

use crate::error::Result;
use crate::io::{self, Format};
use crate::types::IntentDocument;
use std::path::Path;

impl IntentDocument {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Read a document, choosing JSON or YAML by file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        match io::format_for(path) {
            Format::Json => Self::from_json(&data),
            Format::Yaml => Self::from_yaml(&data),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = match io::format_for(path) {
            Format::Json => self.to_json_pretty()?,
            Format::Yaml => serde_yaml::to_string(self)?,
        };
        io::atomic_write(path, data.as_bytes())
    }
}
