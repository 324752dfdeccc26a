//! Data types for a parsed plan
//!
//! A [`PlanModel`] is built once by the parser and is read-only afterwards.
//! Resource changes are keyed by their exact address.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// A single action the tool proposes for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    NoOp,
    Create,
    Read,
    Update,
    Delete,
    Forget,
}

impl Action {
    /// Spelling used in the plan JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::NoOp => "no-op",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Forget => "forget",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-op" | "noop" => Ok(Action::NoOp),
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "forget" => Ok(Action::Forget),
            other => Err(other.to_string()),
        }
    }
}

/// How the actions of one change combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Replace,
    Delete,
    Read,
    Forget,
    NoOp,
}

impl ChangeKind {
    /// Get the symbol used to represent this change kind
    pub fn symbol(&self) -> &'static str {
        match self {
            ChangeKind::Create => "+",
            ChangeKind::Update => "~",
            ChangeKind::Replace => "±",
            ChangeKind::Delete => "-",
            ChangeKind::Read => "≤",
            ChangeKind::Forget => "/",
            ChangeKind::NoOp => " ",
        }
    }

    /// Get the label for this change kind
    pub fn label(&self) -> &'static str {
        match self {
            ChangeKind::Create => "will be created",
            ChangeKind::Update => "will be updated",
            ChangeKind::Replace => "must be replaced",
            ChangeKind::Delete => "will be destroyed",
            ChangeKind::Read => "will be read",
            ChangeKind::Forget => "will be forgotten",
            ChangeKind::NoOp => "no changes",
        }
    }

    /// Get RGB color tuple for this change kind
    pub fn color(&self) -> (u8, u8, u8) {
        match self {
            ChangeKind::Create => (152, 225, 152),  // Pastel mint green
            ChangeKind::Update => (255, 230, 160),  // Pastel cream/yellow
            ChangeKind::Replace => (181, 174, 254), // Pastel lavender
            ChangeKind::Delete => (255, 160, 160),  // Pastel coral
            ChangeKind::Read => (160, 200, 255),    // Pastel sky blue
            ChangeKind::Forget => (120, 180, 195),  // Softer pastel teal
            ChangeKind::NoOp => (160, 160, 160),    // Grey
        }
    }
}

/// The ordered list of actions reported for one change.
///
/// Replacement shows up as two actions: `["delete", "create"]`, or
/// `["create", "delete"]` under `create_before_destroy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet(Vec<Action>);

impl ActionSet {
    pub fn new(actions: Vec<Action>) -> Self {
        Self(actions)
    }

    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0.contains(&action)
    }

    pub fn is_replace(&self) -> bool {
        self.0.len() == 2 && self.contains(Action::Delete) && self.contains(Action::Create)
    }

    pub fn is_create_before_destroy(&self) -> bool {
        self.0 == [Action::Create, Action::Delete]
    }

    pub fn is_no_op(&self) -> bool {
        self.0 == [Action::NoOp]
    }

    pub fn kind(&self) -> ChangeKind {
        if self.is_replace() {
            return ChangeKind::Replace;
        }
        match self.0.first() {
            Some(Action::Create) => ChangeKind::Create,
            Some(Action::Update) => ChangeKind::Update,
            Some(Action::Delete) => ChangeKind::Delete,
            Some(Action::Read) => ChangeKind::Read,
            Some(Action::Forget) => ChangeKind::Forget,
            Some(Action::NoOp) | None => ChangeKind::NoOp,
        }
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Action::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Whether the object is a managed resource or a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    #[default]
    Managed,
    Data,
}

/// Components of a resource address such as
/// `module.db.module.replica.aws_db_instance.main["eu"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAddress {
    /// Module path if applicable (e.g., "module.db.module.replica")
    pub module_path: Option<String>,
    pub mode: ResourceMode,
    pub resource_type: String,
    pub name: String,
    /// Raw index key without brackets (e.g., `0` or `"eu"`)
    pub index: Option<String>,
}

lazy_static! {
    // module.a.module.b["k"].data.aws_subnet.this[0]
    static ref ADDRESS_PATTERN: Regex = Regex::new(
        r#"^(?P<module>(?:module\.[A-Za-z0-9_-]+(?:\[[^\]]+\])?\.)*)(?P<data>data\.)?(?P<type>[A-Za-z0-9_-]+)\.(?P<name>[A-Za-z0-9_-]+)(?:\[(?P<index>[^\]]+)\])?$"#,
    )
    .expect("Invalid resource address regex");
}

impl ResourceAddress {
    /// Split an address into its components. Returns `None` for strings that
    /// are not resource addresses.
    pub fn parse(address: &str) -> Option<Self> {
        let captures = ADDRESS_PATTERN.captures(address)?;

        let module = captures.name("module").map(|m| m.as_str()).unwrap_or("");
        let module_path = if module.is_empty() {
            None
        } else {
            Some(module.trim_end_matches('.').to_string())
        };

        Some(Self {
            module_path,
            mode: if captures.name("data").is_some() {
                ResourceMode::Data
            } else {
                ResourceMode::Managed
            },
            resource_type: captures["type"].to_string(),
            name: captures["name"].to_string(),
            index: captures.name("index").map(|m| m.as_str().to_string()),
        })
    }
}

/// One entry of the plan's `resource_changes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Full resource address exactly as reported; the lookup key
    pub address: String,
    pub module_address: Option<String>,
    pub mode: ResourceMode,
    pub resource_type: Option<String>,
    pub name: Option<String>,
    pub index: Option<Value>,
    pub provider_name: Option<String>,
    /// Key of a deposed object; `None` for the current object at `address`
    pub deposed: Option<String>,
    pub actions: ActionSet,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub after_unknown: Option<Value>,
    pub action_reason: Option<String>,
    pub replace_paths: Vec<Value>,
}

impl ResourceChange {
    pub fn new(address: &str, actions: ActionSet) -> Self {
        Self {
            address: address.to_string(),
            module_address: None,
            mode: ResourceMode::Managed,
            resource_type: None,
            name: None,
            index: None,
            provider_name: None,
            deposed: None,
            actions,
            before: None,
            after: None,
            after_unknown: None,
            action_reason: None,
            replace_paths: Vec::new(),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.actions.kind()
    }

    pub fn is_deposed(&self) -> bool {
        self.deposed.is_some()
    }

    /// Planned value of a top-level attribute
    pub fn after_attribute(&self, name: &str) -> Option<&Value> {
        self.after.as_ref()?.get(name)
    }

    /// Prior value of a top-level attribute
    pub fn before_attribute(&self, name: &str) -> Option<&Value> {
        self.before.as_ref()?.get(name)
    }

    /// Whether the attribute's value is only known after apply
    pub fn is_after_unknown(&self, name: &str) -> bool {
        self.after_unknown
            .as_ref()
            .and_then(|unknown| unknown.get(name))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn components(&self) -> Option<ResourceAddress> {
        ResourceAddress::parse(&self.address)
    }
}

/// One entry of the plan's `output_changes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputChange {
    pub actions: ActionSet,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub after_unknown: bool,
    pub sensitive: bool,
}

/// Summary statistics for the plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub to_add: usize,
    pub to_change: usize,
    pub to_destroy: usize,
    pub to_replace: usize,
    pub to_read: usize,
    pub to_forget: usize,
    pub unchanged: usize,
}

impl PlanSummary {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    /// Get total number of changes
    pub fn total_changes(&self) -> usize {
        self.to_add + self.to_change + self.to_destroy + self.to_replace + self.to_forget
    }
}

/// The fully parsed plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanModel {
    pub format_version: String,
    pub terraform_version: Option<String>,
    pub variables: BTreeMap<String, Value>,
    pub errored: bool,
    pub applyable: Option<bool>,
    pub complete: Option<bool>,
    resource_changes: Vec<ResourceChange>,
    index: HashMap<String, usize>,
    output_changes: BTreeMap<String, OutputChange>,
    planned_values: BTreeMap<String, Value>,
}

impl PlanModel {
    pub(crate) fn new(format_version: String) -> Self {
        Self {
            format_version,
            terraform_version: None,
            variables: BTreeMap::new(),
            errored: false,
            applyable: None,
            complete: None,
            resource_changes: Vec::new(),
            index: HashMap::new(),
            output_changes: BTreeMap::new(),
            planned_values: BTreeMap::new(),
        }
    }

    /// Add a resource change. Returns `false` if the address already has a
    /// current (non-deposed) object.
    ///
    /// Deposed objects share the address of the current object. The index
    /// points at the current object; a deposed one is only reachable by
    /// address while no current object has been seen.
    pub(crate) fn insert_resource_change(&mut self, change: ResourceChange) -> bool {
        let position = self.resource_changes.len();
        match self.index.get(&change.address) {
            None => {
                self.index.insert(change.address.clone(), position);
            }
            Some(_) if change.is_deposed() => {}
            Some(&existing) if self.resource_changes[existing].is_deposed() => {
                self.index.insert(change.address.clone(), position);
            }
            Some(_) => return false,
        }
        self.resource_changes.push(change);
        true
    }

    /// Deposed objects planned at `address`
    pub fn deposed_changes<'a>(
        &'a self,
        address: &'a str,
    ) -> impl Iterator<Item = &'a ResourceChange> + 'a {
        self.resource_changes
            .iter()
            .filter(move |c| c.is_deposed() && c.address == address)
    }

    pub(crate) fn insert_output_change(&mut self, name: String, change: OutputChange) {
        self.output_changes.insert(name, change);
    }

    pub(crate) fn insert_planned_value(&mut self, address: String, values: Value) {
        self.planned_values.insert(address, values);
    }

    /// Resource changes in the order the tool reported them
    pub fn resource_changes(&self) -> &[ResourceChange] {
        &self.resource_changes
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.resource_changes.iter().map(|c| c.address.as_str())
    }

    pub(crate) fn lookup(&self, address: &str) -> Option<&ResourceChange> {
        self.index.get(address).map(|&i| &self.resource_changes[i])
    }

    pub fn output_changes(&self) -> &BTreeMap<String, OutputChange> {
        &self.output_changes
    }

    /// Planned resource values keyed by address
    pub fn planned_values(&self) -> &BTreeMap<String, Value> {
        &self.planned_values
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for change in &self.resource_changes {
            match change.kind() {
                ChangeKind::Create => summary.to_add += 1,
                ChangeKind::Update => summary.to_change += 1,
                ChangeKind::Delete => summary.to_destroy += 1,
                ChangeKind::Replace => summary.to_replace += 1,
                ChangeKind::Read => summary.to_read += 1,
                ChangeKind::Forget => summary.to_forget += 1,
                ChangeKind::NoOp => summary.unchanged += 1,
            }
        }
        summary
    }
}
