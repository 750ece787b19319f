use crate::keys;
use crate::normalize::canonical_id;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

pub type ConfigMap = Map<String, Value>;

pub const ON_PAGE_LOAD: &str = "onPageLoad";
pub const ON_PAGE_UNLOAD: &str = "onPageUnload";
pub const ON_APP_START: &str = "onAppStart";
pub const LIFECYCLE_EVENTS: &[&str] = &[ON_PAGE_LOAD, ON_PAGE_UNLOAD, ON_APP_START];

pub fn is_lifecycle_event(event: &str) -> bool {
    LIFECYCLE_EVENTS.contains(&event)
}

fn is_false(b: &bool) -> bool {
    !*b
}

// ---------------------------------------------------------------------------
// IntentType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    Create,
    Modify,
    Chat,
    Analyze,
}

impl IntentType {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentType::Create => "create",
            IntentType::Modify => "modify",
            IntentType::Chat => "chat",
            IntentType::Analyze => "analyze",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// Closed action-kind set. Anything else is kept verbatim in `Unknown` so the
/// normalizer can migrate legacy spellings and the validator can reject the
/// rest with the offending spelling in hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    IntegrationCall,
    Internal,
    Navigation,
    Workflow,
    Unknown(String),
}

impl ActionKind {
    pub fn allowed() -> &'static [ActionKind] {
        &[
            ActionKind::IntegrationCall,
            ActionKind::Internal,
            ActionKind::Navigation,
            ActionKind::Workflow,
        ]
    }

    pub fn allowed_names() -> Vec<String> {
        Self::allowed().iter().map(|k| k.as_str().to_string()).collect()
    }

    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::IntegrationCall => "integration_call",
            ActionKind::Internal => "internal",
            ActionKind::Navigation => "navigation",
            ActionKind::Workflow => "workflow",
            ActionKind::Unknown(raw) => raw,
        }
    }

    /// Kinds whose execution writes state.
    pub fn is_mutating(&self) -> bool {
        match self {
            ActionKind::IntegrationCall | ActionKind::Internal | ActionKind::Workflow => true,
            ActionKind::Navigation | ActionKind::Unknown(_) => false,
        }
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        match canonical_id(&raw).as_str() {
            "integration_call" => ActionKind::IntegrationCall,
            "internal" => ActionKind::Internal,
            "navigation" => ActionKind::Navigation,
            "workflow" => ActionKind::Workflow,
            _ => ActionKind::Unknown(raw),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// Unrecognized or malformed trigger objects land in `Unknown` with their
/// raw payload so validation can reject them against the owning action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Lifecycle {
        event: String,
    },
    #[serde(alias = "stateChange")]
    StateChange {
        #[serde(rename = "stateKey", alias = "state_key")]
        state_key: String,
    },
    #[serde(alias = "componentEvent")]
    ComponentEvent {
        #[serde(rename = "componentId", alias = "component_id")]
        component_id: String,
        event: String,
    },
    Internal {
        reason: String,
    },
    #[serde(untagged)]
    Unknown(Value),
}

impl Trigger {
    pub fn page_load() -> Self {
        Trigger::Lifecycle {
            event: ON_PAGE_LOAD.to_string(),
        }
    }

    pub fn state_change(key: impl Into<String>) -> Self {
        Trigger::StateChange {
            state_key: key.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Trigger::Internal {
            reason: reason.into(),
        }
    }

    pub fn state_key(&self) -> Option<&str> {
        match self {
            Trigger::StateChange { state_key } => Some(state_key),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Trigger::Unknown(_))
    }
}

/// The `type` tag of an unrecognized payload, for error messages.
pub fn raw_type(raw: &Value) -> String {
    match raw.get("type") {
        Some(Value::String(t)) => format!("'{t}'"),
        Some(_) | None => "an untyped entry".to_string(),
    }
}

/// Accepts a single trigger object, a list, or null.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Trigger>, D::Error>
where
    D: Deserializer<'de>,
{
    // `Many` first: a lone `Trigger` would also swallow an array as `Unknown`.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Trigger>),
        One(Trigger),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(t)) => vec![t],
        Some(OneOrMany::Many(ts)) => ts,
    })
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    #[serde(alias = "stateMutation")]
    StateMutation {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    #[serde(alias = "integrationCall")]
    IntegrationCall {
        capability: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        params: ConfigMap,
    },
    Navigate {
        page: String,
    },
    Emit {
        event: String,
    },
    #[serde(untagged)]
    Unknown(Value),
}

impl Step {
    pub fn copy(key: impl Into<String>, from: impl Into<String>) -> Self {
        Step::StateMutation {
            key: key.into(),
            value: None,
            from: Some(from.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

pub const CONFIG_ASSIGN_TO: &str = "assignTo";
pub const CONFIG_STATE_KEY: &str = "stateKey";
pub const CONFIG_UPDATES: &str = "updates";
pub const CONFIG_CAPABILITY: &str = "capability";
pub const CONFIG_EPHEMERAL: &str = "ephemeral";
pub const CONFIG_PAGE_ID: &str = "pageId";
pub const CONFIG_SEMANTIC: &str = "semantic";
/// Original legacy kind when `semantic` was already authored.
pub const CONFIG_LEGACY_KIND: &str = "legacyKind";
pub const CONFIG_SYNTHETIC: &str = "synthetic";
pub const SYNTHETIC_REPAIR: &str = "repair";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: ConfigMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub triggered_by: Vec<Trigger>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub effect_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,
}

impl Action {
    pub fn new(id: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            kind,
            config: ConfigMap::new(),
            steps: Vec::new(),
            triggered_by: Vec::new(),
            effect_only: false,
            inputs: None,
        }
    }

    fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// The data key an action assigns (`config.assignTo`).
    pub fn assigned_key(&self) -> Option<&str> {
        self.config_str(CONFIG_ASSIGN_TO)
    }

    pub fn capability(&self) -> Option<&str> {
        self.config_str(CONFIG_CAPABILITY)
    }

    pub fn semantic(&self) -> Option<&str> {
        self.config_str(CONFIG_SEMANTIC)
    }

    pub fn is_ephemeral(&self) -> bool {
        self.config.get(CONFIG_EPHEMERAL).and_then(Value::as_bool) == Some(true)
    }

    pub fn is_synthetic(&self) -> bool {
        self.config_str(CONFIG_SYNTHETIC) == Some(SYNTHETIC_REPAIR)
    }

    pub fn has_trigger(&self) -> bool {
        !self.triggered_by.is_empty()
    }

    pub fn has_lifecycle_trigger(&self, event: &str) -> bool {
        self.triggered_by
            .iter()
            .any(|t| matches!(t, Trigger::Lifecycle { event: e } if e == event))
    }

    /// Every key this action writes. `integration_call` actions also own the
    /// executor-managed status/error companions of their assigned key.
    pub fn mutated_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        if !self.kind.is_mutating() {
            return keys;
        }
        if let Some(k) = self.assigned_key() {
            keys.insert(k.to_string());
            if self.kind == ActionKind::IntegrationCall {
                keys.insert(keys::status_key(k));
                keys.insert(keys::error_key(k));
            }
        }
        if let Some(k) = self.config_str(CONFIG_STATE_KEY) {
            keys.insert(k.to_string());
        }
        if let Some(Value::Object(updates)) = self.config.get(CONFIG_UPDATES) {
            keys.extend(updates.keys().cloned());
        }
        for step in &self.steps {
            if let Step::StateMutation { key, .. } = step {
                keys.insert(key.clone());
            }
        }
        keys
    }

    /// Keys this action writes from a literal rather than from another key.
    pub fn literal_writes(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        let derived = self.config.contains_key("from") || self.config.contains_key("source");
        if let Some(k) = self.assigned_key() {
            if !derived {
                keys.insert(k.to_string());
            }
        }
        if let Some(k) = self.config_str(CONFIG_STATE_KEY) {
            keys.insert(k.to_string());
        }
        if let Some(Value::Object(updates)) = self.config.get(CONFIG_UPDATES) {
            keys.extend(updates.keys().cloned());
        }
        for step in &self.steps {
            if let Step::StateMutation {
                key, from: None, ..
            } = step
            {
                keys.insert(key.clone());
            }
        }
        keys
    }

    /// Keys referenced as `{{state.X}}` in config or step payloads.
    pub fn templated_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        for v in self.config.values() {
            keys::templated_keys(v, &mut keys);
        }
        for step in &self.steps {
            match step {
                Step::StateMutation {
                    value: Some(v), ..
                } => keys::templated_keys(v, &mut keys),
                Step::IntegrationCall { params, .. } => {
                    params.values().for_each(|v| keys::templated_keys(v, &mut keys))
                }
                _ => {}
            }
        }
        keys
    }

    /// Every key this action depends on: explicit inputs, copy sources,
    /// templates and state-change triggers.
    pub fn read_keys(&self) -> BTreeSet<String> {
        let mut keys = self.templated_keys();
        if let Some(inputs) = &self.inputs {
            keys.extend(inputs.iter().cloned());
        }
        for key in ["from", "source"] {
            if let Some(k) = self.config_str(key) {
                keys.insert(k.to_string());
            }
        }
        for step in &self.steps {
            if let Step::StateMutation { from: Some(f), .. } = step {
                keys.insert(f.clone());
            }
        }
        keys.extend(
            self.triggered_by
                .iter()
                .filter_map(Trigger::state_key)
                .map(str::to_string),
        );
        keys
    }

    /// Best-effort "fire and forget" classification. The explicit
    /// `effectOnly` flag always wins; the id heuristics are intentionally
    /// fuzzy.
    pub fn looks_effect_only(&self, prefixes: &[String]) -> bool {
        if self.effect_only || self.kind == ActionKind::Navigation {
            return true;
        }
        prefixes.iter().any(|p| self.id.starts_with(p.as_str())) || self.id.contains("navigate")
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentKind {
    Container,
    Text,
    Heading,
    Button,
    Input,
    Textarea,
    Checkbox,
    Select,
    Dropdown,
    List,
    Table,
    Card,
    Chart,
    Heatmap,
    Image,
    Badge,
    Form,
    Modal,
    Tabs,
    Divider,
    Unknown(String),
}

impl ComponentKind {
    pub fn allowed() -> &'static [ComponentKind] {
        &[
            ComponentKind::Container,
            ComponentKind::Text,
            ComponentKind::Heading,
            ComponentKind::Button,
            ComponentKind::Input,
            ComponentKind::Textarea,
            ComponentKind::Checkbox,
            ComponentKind::Select,
            ComponentKind::Dropdown,
            ComponentKind::List,
            ComponentKind::Table,
            ComponentKind::Card,
            ComponentKind::Chart,
            ComponentKind::Heatmap,
            ComponentKind::Image,
            ComponentKind::Badge,
            ComponentKind::Form,
            ComponentKind::Modal,
            ComponentKind::Tabs,
            ComponentKind::Divider,
        ]
    }

    pub fn allowed_names() -> Vec<String> {
        Self::allowed().iter().map(|k| k.as_str().to_string()).collect()
    }

    pub fn as_str(&self) -> &str {
        match self {
            ComponentKind::Container => "container",
            ComponentKind::Text => "text",
            ComponentKind::Heading => "heading",
            ComponentKind::Button => "button",
            ComponentKind::Input => "input",
            ComponentKind::Textarea => "textarea",
            ComponentKind::Checkbox => "checkbox",
            ComponentKind::Select => "select",
            ComponentKind::Dropdown => "dropdown",
            ComponentKind::List => "list",
            ComponentKind::Table => "table",
            ComponentKind::Card => "card",
            ComponentKind::Chart => "chart",
            ComponentKind::Heatmap => "heatmap",
            ComponentKind::Image => "image",
            ComponentKind::Badge => "badge",
            ComponentKind::Form => "form",
            ComponentKind::Modal => "modal",
            ComponentKind::Tabs => "tabs",
            ComponentKind::Divider => "divider",
            ComponentKind::Unknown(raw) => raw,
        }
    }

    pub fn is_select_like(&self) -> bool {
        matches!(self, ComponentKind::Select | ComponentKind::Dropdown)
    }
}

impl From<String> for ComponentKind {
    fn from(raw: String) -> Self {
        let wanted = raw.trim().to_lowercase();
        let known = ComponentKind::allowed().iter().find(|k| k.as_str() == wanted);
        match known {
            Some(k) => k.clone(),
            None => ComponentKind::Unknown(raw),
        }
    }
}

impl From<ComponentKind> for String {
    fn from(kind: ComponentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSource {
    Static {
        #[serde(default)]
        value: Value,
    },
    State {
        key: String,
    },
    Derived {
        from: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expr: Option<String>,
    },
    #[serde(untagged)]
    Unknown(Value),
}

/// A child slot: an id into the component arena, or an inline definition
/// (accepted on input only so it can be reported).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildRef {
    Id(String),
    Inline(Value),
}

impl ChildRef {
    pub fn as_id(&self) -> Option<&str> {
        match self {
            ChildRef::Id(id) => Some(id),
            ChildRef::Inline(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentEvent {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    /// State key the event writes directly (uncontrolled inputs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_update: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: ConfigMap,
}

impl ComponentEvent {
    pub fn is_state_update(&self) -> bool {
        self.state_update.as_deref().is_some_and(|k| !k.is_empty()) || self.kind == "stateUpdate"
    }
}

/// Properties that bind a component to a state key.
pub const BINDING_PROPERTIES: &[&str] = &[
    "bindKey",
    "dataKey",
    "optionsKey",
    "disabledKey",
    "visibleKey",
    "loadingKey",
    "statusKey",
    "errorKey",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub kind: ComponentKind,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: ConfigMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ComponentEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
}

impl Component {
    pub fn new(id: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            properties: ConfigMap::new(),
            data_source: None,
            events: Vec::new(),
            children: Vec::new(),
            page_id: None,
        }
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Field of an option object holding its value: `optionValueKey`,
    /// else `value`.
    pub fn option_value_key(&self) -> &str {
        self.property_str("optionValueKey")
            .filter(|k| !k.is_empty())
            .unwrap_or("value")
    }

    pub fn bind_key(&self) -> Option<&str> {
        self.property_str("bindKey").filter(|k| !k.is_empty())
    }

    /// Every state key this component renders or binds to.
    pub fn read_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        for prop in BINDING_PROPERTIES {
            if let Some(k) = self.property_str(prop).filter(|k| !k.is_empty()) {
                keys.insert(k.to_string());
            }
        }
        for v in self.properties.values() {
            keys::templated_keys(v, &mut keys);
        }
        match &self.data_source {
            Some(DataSource::State { key }) => {
                keys.insert(key.clone());
            }
            Some(DataSource::Derived { from, .. }) => {
                keys.insert(from.clone());
            }
            Some(DataSource::Static { .. }) | Some(DataSource::Unknown(_)) | None => {}
        }
        keys
    }

    /// Action ids this component's events dispatch to.
    pub fn action_refs(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| e.action_id.as_deref())
    }

    /// Statically declared select options, from `properties.options` or a
    /// static data source.
    pub fn static_options(&self) -> Option<&Vec<Value>> {
        if let Some(Value::Array(opts)) = self.properties.get("options") {
            return Some(opts);
        }
        match &self.data_source {
            Some(DataSource::Static {
                value: Value::Array(opts),
            }) => Some(opts),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEvent {
    pub kind: String,
    pub action_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<PageEvent>,
}

impl Page {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            route: None,
            components: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn wires(&self, event: &str, action_id: &str) -> bool {
        self.events
            .iter()
            .any(|e| e.kind == event && e.action_id == action_id)
    }
}

// ---------------------------------------------------------------------------
// Mutation / Snapshot
// ---------------------------------------------------------------------------

/// A changeset against a prior document. The compiler's action set is
/// `actionsAdded ++ actionsUpdated`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages_added: Vec<Page>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components_added: Vec<Component>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions_added: Vec<Action>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state_added: ConfigMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages_updated: Vec<Page>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components_updated: Vec<Component>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions_updated: Vec<Action>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state_updated: ConfigMap,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub container_props_updated: ConfigMap,
}

impl Mutation {
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.actions_added.iter().chain(self.actions_updated.iter())
    }

    pub fn actions_mut(&mut self) -> impl Iterator<Item = &mut Action> {
        self.actions_added
            .iter_mut()
            .chain(self.actions_updated.iter_mut())
    }

    pub fn action_count(&self) -> usize {
        self.actions_added.len() + self.actions_updated.len()
    }

    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions().find(|a| a.id == id)
    }

    pub fn action_mut(&mut self, id: &str) -> Option<&mut Action> {
        self.actions_mut().find(|a| a.id == id)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components_added
            .iter()
            .chain(self.components_updated.iter())
    }

    pub fn components_mut(&mut self) -> impl Iterator<Item = &mut Component> {
        self.components_added
            .iter_mut()
            .chain(self.components_updated.iter_mut())
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages_added.iter().chain(self.pages_updated.iter())
    }

    pub fn pages_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.pages_added.iter_mut().chain(self.pages_updated.iter_mut())
    }

    pub fn state(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.state_added.iter().chain(self.state_updated.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.pages_added.is_empty()
            && self.components_added.is_empty()
            && self.actions_added.is_empty()
            && self.state_added.is_empty()
            && self.pages_updated.is_empty()
            && self.components_updated.is_empty()
            && self.actions_updated.is_empty()
            && self.state_updated.is_empty()
            && self.container_props_updated.is_empty()
    }
}

/// The previously accepted document a mutation applies to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<Page>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state: ConfigMap,
}

// ---------------------------------------------------------------------------
// ExecutionGraph
// ---------------------------------------------------------------------------

pub const INIT_NODE_ID: &str = "__init__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    IntegrationCall,
    Transform,
    Condition,
    EmitEvent,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::IntegrationCall => "integration_call",
            NodeType::Transform => "transform",
            NodeType::Condition => "condition",
            NodeType::EmitEvent => "emit_event",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: ConfigMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Nodes are listed `__init__` first, then in topological order when the
/// state-change edges are acyclic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraph {
    pub nodes: Vec<ExecutionNode>,
    pub edges: Vec<Edge>,
}

impl ExecutionGraph {
    pub fn node(&self, id: &str) -> Option<&ExecutionNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == id)
            .map(|e| e.to.as_str())
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }
}

// ---------------------------------------------------------------------------
// IntentDocument
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDocument {
    pub intent_type: IntentType,
    #[serde(default)]
    pub mutation: Mutation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<Snapshot>,
    #[serde(
        rename = "executionGraph",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_graph: Option<ExecutionGraph>,
}

impl IntentDocument {
    pub fn new(intent_type: IntentType, mutation: Mutation) -> Self {
        Self {
            intent_type,
            mutation,
            prior: None,
            execution_graph: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
