use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An external data capability an `integration_call` can be routed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Ephemeral capabilities never hit a provider; the executor emits an
    /// event instead.
    #[serde(default)]
    pub ephemeral: bool,
}

impl Capability {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: None,
            ephemeral: false,
        }
    }
}

/// Read-only capability lookup used while building the execution graph.
pub trait CapabilityCatalog {
    fn resolve(&self, capability_id: &str) -> Option<Capability>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    by_id: BTreeMap<String, Capability>,
}

impl StaticCatalog {
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            by_id: capabilities
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl CapabilityCatalog for StaticCatalog {
    fn resolve(&self, capability_id: &str) -> Option<Capability> {
        self.by_id.get(capability_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_ids_only() {
        let catalog = StaticCatalog::new([Capability::new("sheets.read")]);
        assert_eq!(catalog.len(), 1);
        assert!(catalog.resolve("sheets.read").is_some());
        assert!(catalog.resolve("sheets.write").is_none());
    }

    #[test]
    fn later_duplicates_win() {
        let mut second = Capability::new("crm.contacts");
        second.provider = Some("hubspot".to_string());
        let catalog = StaticCatalog::new([Capability::new("crm.contacts"), second]);
        assert_eq!(
            catalog.resolve("crm.contacts").unwrap().provider.as_deref(),
            Some("hubspot")
        );
    }
}
