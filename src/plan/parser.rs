//! Parser for the JSON plan representation
//!
//! This module reads the document printed by `terraform show -json <planfile>`
//! (or `tofu show -json`) and validates it into a [`PlanModel`]. Unknown fields
//! are ignored; the fields the query API relies on are required.

use semver::{Version, VersionReq};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use super::types::{Action, ActionSet, OutputChange, PlanModel, ResourceChange, ResourceMode};
use crate::error::ParseError;

/// Plan JSON format versions this parser understands
pub const SUPPORTED_FORMAT_VERSIONS: &str = "^1";

#[derive(Debug, Deserialize)]
struct RawPlan {
    format_version: Option<String>,
    terraform_version: Option<String>,
    #[serde(default)]
    variables: BTreeMap<String, RawVariable>,
    planned_values: Option<RawValues>,
    #[serde(default)]
    resource_changes: Vec<RawResourceChange>,
    #[serde(default)]
    output_changes: BTreeMap<String, RawChange>,
    #[serde(default)]
    errored: bool,
    applyable: Option<bool>,
    complete: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawVariable {
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawValues {
    root_module: Option<RawModule>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    #[serde(default)]
    resources: Vec<RawPlannedResource>,
    #[serde(default)]
    child_modules: Vec<RawModule>,
}

#[derive(Debug, Deserialize)]
struct RawPlannedResource {
    address: Option<String>,
    values: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawResourceChange {
    address: Option<String>,
    module_address: Option<String>,
    mode: Option<ResourceMode>,
    #[serde(rename = "type")]
    resource_type: Option<String>,
    name: Option<String>,
    index: Option<Value>,
    provider_name: Option<String>,
    deposed: Option<String>,
    change: Option<RawChange>,
    action_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChange {
    actions: Option<Vec<String>>,
    before: Option<Value>,
    after: Option<Value>,
    after_unknown: Option<Value>,
    after_sensitive: Option<Value>,
    #[serde(default)]
    replace_paths: Vec<Value>,
}

/// Parser for OpenTofu/Terraform plan JSON
pub struct PlanParser {
    supported: VersionReq,
}

impl Default for PlanParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanParser {
    pub fn new() -> Self {
        Self {
            supported: VersionReq::parse(SUPPORTED_FORMAT_VERSIONS)
                .expect("Invalid supported format version requirement"),
        }
    }

    /// Parse a plan JSON document held in memory
    pub fn parse_str(&self, content: &str) -> Result<PlanModel, ParseError> {
        self.parse_slice(content.as_bytes())
    }

    pub fn parse_slice(&self, content: &[u8]) -> Result<PlanModel, ParseError> {
        let raw: RawPlan = serde_json::from_slice(content)?;
        self.build(raw)
    }

    /// Parse a plan JSON document saved on disk
    pub fn parse_file(&self, path: &Path) -> Result<PlanModel, ParseError> {
        let content = fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_slice(&content)
    }

    fn build(&self, raw: RawPlan) -> Result<PlanModel, ParseError> {
        let format_version = raw.format_version.ok_or_else(|| ParseError::MissingField {
            field: "format_version".to_string(),
            context: "plan".to_string(),
        })?;
        self.check_format_version(&format_version)?;

        let mut model = PlanModel::new(format_version);
        model.terraform_version = raw.terraform_version;
        model.errored = raw.errored;
        model.applyable = raw.applyable;
        model.complete = raw.complete;
        model.variables = raw
            .variables
            .into_iter()
            .map(|(name, variable)| (name, variable.value.unwrap_or(Value::Null)))
            .collect();

        for (position, raw_change) in raw.resource_changes.into_iter().enumerate() {
            let change = build_resource_change(position, raw_change)?;
            let address = change.address.clone();
            if !model.insert_resource_change(change) {
                return Err(ParseError::DuplicateAddress(address));
            }
        }

        for (name, raw_change) in raw.output_changes {
            let context = format!("output_changes.{}", name);
            let actions = parse_actions(&context, raw_change.actions)?;
            model.insert_output_change(
                name,
                OutputChange {
                    actions,
                    before: raw_change.before,
                    after: raw_change.after,
                    after_unknown: raw_change
                        .after_unknown
                        .as_ref()
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    sensitive: raw_change
                        .after_sensitive
                        .as_ref()
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                },
            );
        }

        if let Some(root) = raw.planned_values.and_then(|values| values.root_module) {
            collect_planned_values(&mut model, root);
        }

        debug!(
            format_version = %model.format_version,
            resource_changes = model.resource_changes().len(),
            output_changes = model.output_changes().len(),
            "parsed plan"
        );

        Ok(model)
    }

    fn check_format_version(&self, found: &str) -> Result<(), ParseError> {
        let unsupported = || ParseError::UnsupportedFormatVersion {
            found: found.to_string(),
            supported: SUPPORTED_FORMAT_VERSIONS.to_string(),
        };

        let version = normalize_version(found).ok_or_else(unsupported)?;
        if self.supported.matches(&version) {
            Ok(())
        } else {
            Err(unsupported())
        }
    }
}

/// Plan format versions are "major.minor"; semver wants three components.
fn normalize_version(version: &str) -> Option<Version> {
    let parts = version.trim().split('.').count();
    let padded = match parts {
        1 => format!("{}.0.0", version.trim()),
        2 => format!("{}.0", version.trim()),
        _ => version.trim().to_string(),
    };
    Version::parse(&padded).ok()
}

fn build_resource_change(
    position: usize,
    raw: RawResourceChange,
) -> Result<ResourceChange, ParseError> {
    let address = raw
        .address
        .filter(|address| !address.is_empty())
        .ok_or_else(|| ParseError::MissingField {
            field: "address".to_string(),
            context: format!("resource_changes[{}]", position),
        })?;

    let change = raw.change.ok_or_else(|| ParseError::MissingField {
        field: "change".to_string(),
        context: address.clone(),
    })?;
    let actions = parse_actions(&address, change.actions)?;

    Ok(ResourceChange {
        address,
        module_address: raw.module_address,
        mode: raw.mode.unwrap_or_default(),
        resource_type: raw.resource_type,
        name: raw.name,
        index: raw.index,
        provider_name: raw.provider_name,
        deposed: raw.deposed,
        actions,
        before: change.before,
        after: change.after,
        after_unknown: change.after_unknown,
        action_reason: raw.action_reason,
        replace_paths: change.replace_paths,
    })
}

fn parse_actions(context: &str, actions: Option<Vec<String>>) -> Result<ActionSet, ParseError> {
    let actions = actions
        .filter(|actions| !actions.is_empty())
        .ok_or_else(|| ParseError::MissingField {
            field: "change.actions".to_string(),
            context: context.to_string(),
        })?;

    actions
        .iter()
        .map(|action| {
            action
                .parse::<Action>()
                .map_err(|action| ParseError::InvalidAction {
                    address: context.to_string(),
                    action,
                })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(ActionSet::new)
}

fn collect_planned_values(model: &mut PlanModel, module: RawModule) {
    for resource in module.resources {
        if let Some(address) = resource.address {
            model.insert_planned_value(address, resource.values.unwrap_or(Value::Null));
        }
    }
    for child in module.child_modules {
        collect_planned_values(model, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ChangeKind;

    const POSTGRES_PLAN: &str = r#"{
        "format_version": "1.2",
        "terraform_version": "1.6.6",
        "variables": {
            "location": { "value": "westeurope" }
        },
        "planned_values": {
            "root_module": {
                "child_modules": [{
                    "address": "module.postgresql",
                    "resources": [{
                        "address": "module.postgresql.azurerm_postgresql_server.main",
                        "mode": "managed",
                        "type": "azurerm_postgresql_server",
                        "name": "main",
                        "values": { "sku_name": "GP_Gen5_2" }
                    }]
                }]
            }
        },
        "resource_changes": [{
            "address": "module.postgresql.azurerm_postgresql_server.main",
            "module_address": "module.postgresql",
            "mode": "managed",
            "type": "azurerm_postgresql_server",
            "name": "main",
            "provider_name": "registry.terraform.io/hashicorp/azurerm",
            "change": {
                "actions": ["create"],
                "before": null,
                "after": { "sku_name": "GP_Gen5_2", "version": "11" },
                "after_unknown": { "id": true, "fqdn": true },
                "before_sensitive": false,
                "after_sensitive": {}
            }
        }],
        "output_changes": {
            "server_fqdn": {
                "actions": ["create"],
                "before": null,
                "after_unknown": true,
                "after_sensitive": false
            }
        },
        "prior_state": {},
        "configuration": {},
        "timestamp": "2024-01-01T00:00:00Z",
        "errored": false
    }"#;

    #[test]
    fn test_parse_create_plan() {
        let model = PlanParser::new().parse_str(POSTGRES_PLAN).unwrap();

        assert_eq!(model.format_version, "1.2");
        assert_eq!(model.terraform_version.as_deref(), Some("1.6.6"));
        assert_eq!(model.variables.get("location"), Some(&Value::from("westeurope")));
        assert_eq!(model.resource_changes().len(), 1);

        let change = &model.resource_changes()[0];
        assert_eq!(change.address, "module.postgresql.azurerm_postgresql_server.main");
        assert_eq!(change.module_address.as_deref(), Some("module.postgresql"));
        assert_eq!(change.kind(), ChangeKind::Create);
        assert!(change.before.is_none());
        assert!(change.is_after_unknown("fqdn"));
        assert_eq!(change.after_attribute("version"), Some(&Value::from("11")));
    }

    #[test]
    fn test_parse_output_changes_and_planned_values() {
        let model = PlanParser::new().parse_str(POSTGRES_PLAN).unwrap();

        let output = model.output_changes().get("server_fqdn").unwrap();
        assert_eq!(output.actions.actions(), &[Action::Create]);
        assert!(output.after_unknown);
        assert!(!output.sensitive);

        assert!(
            model
                .planned_values()
                .contains_key("module.postgresql.azurerm_postgresql_server.main")
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = PlanParser::new();
        let first = parser.parse_str(POSTGRES_PLAN).unwrap();
        let second = parser.parse_str(POSTGRES_PLAN).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_tolerates_absent_optional_fields() {
        let model = PlanParser::new()
            .parse_str(
                r#"{
                    "format_version": "1.0",
                    "resource_changes": [
                        { "address": "null_resource.x", "change": { "actions": ["no-op"] } }
                    ]
                }"#,
            )
            .unwrap();

        let change = &model.resource_changes()[0];
        assert!(change.actions.is_no_op());
        assert!(change.provider_name.is_none());
        assert!(model.output_changes().is_empty());
        assert!(model.planned_values().is_empty());
    }

    #[test]
    fn test_parse_plan_without_changes() {
        let model = PlanParser::new()
            .parse_str(r#"{ "format_version": "1.1", "terraform_version": "1.5.0" }"#)
            .unwrap();
        assert!(model.resource_changes().is_empty());
        assert!(!model.summary().has_changes());
    }

    #[test]
    fn test_parse_replace_actions() {
        let model = PlanParser::new()
            .parse_str(
                r#"{
                    "format_version": "1.2",
                    "resource_changes": [{
                        "address": "aws_instance.web",
                        "change": { "actions": ["delete", "create"], "replace_paths": [["ami"]] },
                        "action_reason": "replace_because_cannot_update"
                    }]
                }"#,
            )
            .unwrap();

        let change = &model.resource_changes()[0];
        assert!(change.actions.is_replace());
        assert_eq!(change.replace_paths.len(), 1);
        assert_eq!(change.action_reason.as_deref(), Some("replace_because_cannot_update"));
    }

    #[test]
    fn test_unsupported_format_version() {
        let result = PlanParser::new().parse_str(r#"{ "format_version": "2.0" }"#);
        match result {
            Err(ParseError::UnsupportedFormatVersion { found, .. }) => assert_eq!(found, "2.0"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_format_version() {
        let result = PlanParser::new().parse_str(r#"{ "format_version": "latest" }"#);
        assert!(matches!(result, Err(ParseError::UnsupportedFormatVersion { .. })));
    }

    #[test]
    fn test_missing_format_version() {
        let result = PlanParser::new().parse_str(r#"{ "resource_changes": [] }"#);
        assert!(matches!(result, Err(ParseError::MissingField { .. })));
    }

    #[test]
    fn test_invalid_json() {
        let result = PlanParser::new().parse_str("Error: No configuration files");
        assert!(matches!(result, Err(ParseError::InvalidJson(_))));
    }

    #[test]
    fn test_missing_address() {
        let result = PlanParser::new().parse_str(
            r#"{ "format_version": "1.2", "resource_changes": [{ "change": { "actions": ["create"] } }] }"#,
        );
        match result {
            Err(ParseError::MissingField { field, context }) => {
                assert_eq!(field, "address");
                assert_eq!(context, "resource_changes[0]");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_actions_rejected() {
        let result = PlanParser::new().parse_str(
            r#"{ "format_version": "1.2", "resource_changes": [{ "address": "a.b", "change": { "actions": [] } }] }"#,
        );
        assert!(matches!(result, Err(ParseError::MissingField { .. })));
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = PlanParser::new().parse_str(
            r#"{ "format_version": "1.2", "resource_changes": [{ "address": "a.b", "change": { "actions": ["explode"] } }] }"#,
        );
        match result {
            Err(ParseError::InvalidAction { address, action }) => {
                assert_eq!(address, "a.b");
                assert_eq!(action, "explode");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let result = PlanParser::new().parse_str(
            r#"{
                "format_version": "1.2",
                "resource_changes": [
                    { "address": "a.b", "change": { "actions": ["create"] } },
                    { "address": "a.b", "change": { "actions": ["delete"] } }
                ]
            }"#,
        );
        assert!(matches!(result, Err(ParseError::DuplicateAddress(a)) if a == "a.b"));
    }

    #[test]
    fn test_deposed_object_shares_address() {
        let model = PlanParser::new()
            .parse_str(
                r#"{
                "format_version": "1.2",
                "resource_changes": [
                    { "address": "aws_instance.web", "change": { "actions": ["create"] } },
                    {
                        "address": "aws_instance.web",
                        "deposed": "00000001",
                        "change": { "actions": ["delete"] }
                    }
                ]
            }"#,
            )
            .unwrap();

        assert_eq!(model.resource_changes().len(), 2);
        let current = crate::plan::get_resource_change(&model, "aws_instance.web").unwrap();
        assert!(!current.is_deposed());
        assert!(current.actions.contains(Action::Create));

        let deposed: Vec<_> = model.deposed_changes("aws_instance.web").collect();
        assert_eq!(deposed.len(), 1);
        assert_eq!(deposed[0].deposed.as_deref(), Some("00000001"));
        assert!(deposed[0].actions.contains(Action::Delete));
    }

    #[test]
    fn test_current_object_wins_over_earlier_deposed() {
        let model = PlanParser::new()
            .parse_str(
                r#"{
                "format_version": "1.2",
                "resource_changes": [
                    {
                        "address": "aws_instance.web",
                        "deposed": "00000001",
                        "change": { "actions": ["delete"] }
                    },
                    { "address": "aws_instance.web", "change": { "actions": ["update"] } }
                ]
            }"#,
            )
            .unwrap();

        let current = crate::plan::get_resource_change(&model, "aws_instance.web").unwrap();
        assert!(current.actions.contains(Action::Update));
    }

    #[test]
    fn test_parse_file_missing() {
        let result = PlanParser::new().parse_file(Path::new("/no/such/plan.json"));
        assert!(matches!(result, Err(ParseError::Io { .. })));
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        fs::write(&path, POSTGRES_PLAN).unwrap();

        let model = PlanParser::new().parse_file(&path).unwrap();
        assert_eq!(model.resource_changes().len(), 1);
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(normalize_version("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(normalize_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(normalize_version("x.y"), None);
    }
}
