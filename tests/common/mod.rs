//! Shared fixtures: a throwaway configuration directory and a fake
//! `terraform` shell script standing in for the real tool.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Plan for the postgresql module creating one server and one database
pub const POSTGRES_PLAN: &str = r#"{
  "format_version": "1.2",
  "terraform_version": "1.9.5",
  "variables": { "location": { "value": "westeurope" } },
  "planned_values": {
    "root_module": {
      "child_modules": [{
        "address": "module.postgresql",
        "resources": [
          { "address": "module.postgresql.azurerm_postgresql_server.main", "values": { "name": "psql-test" } },
          { "address": "module.postgresql.azurerm_postgresql_database.db", "values": { "name": "app" } }
        ]
      }]
    }
  },
  "resource_changes": [
    {
      "address": "module.postgresql.azurerm_postgresql_server.main",
      "module_address": "module.postgresql",
      "mode": "managed",
      "type": "azurerm_postgresql_server",
      "name": "main",
      "provider_name": "registry.terraform.io/hashicorp/azurerm",
      "change": { "actions": ["create"], "before": null, "after": { "name": "psql-test" } }
    },
    {
      "address": "module.postgresql.azurerm_postgresql_database.db",
      "module_address": "module.postgresql",
      "mode": "managed",
      "type": "azurerm_postgresql_database",
      "name": "db",
      "provider_name": "registry.terraform.io/hashicorp/azurerm",
      "change": { "actions": ["create"], "before": null, "after": { "name": "app" } }
    }
  ]
}"#;

/// Same shape, but a format this harness does not understand
pub const FUTURE_FORMAT_PLAN: &str = r#"{
  "format_version": "2.0",
  "resource_changes": []
}"#;

/// Behaviour is steered by environment variables so one script serves every test:
/// - `FAKE_TF_PLAN_JSON`  file printed by `show`
/// - `FAKE_TF_PLAN_FAIL`  make `plan` exit 1 with an error on stderr
/// - `FAKE_TF_PLAN_SLEEP` seconds `plan` hangs for
/// - `FAKE_TF_LOG`        file every invocation is appended to
const SCRIPT: &str = r#"#!/bin/sh
if [ -n "$FAKE_TF_LOG" ]; then
  echo "$(pwd) $*" >> "$FAKE_TF_LOG"
fi
case "$1" in
  version)
    echo "Terraform v1.9.5"
    ;;
  init)
    echo "Terraform has been successfully initialized!"
    ;;
  plan)
    if [ -n "$FAKE_TF_PLAN_FAIL" ]; then
      echo "Error: Invalid provider configuration" >&2
      exit 1
    fi
    if [ -n "$FAKE_TF_PLAN_SLEEP" ]; then
      exec sleep "$FAKE_TF_PLAN_SLEEP"
    fi
    for arg in "$@"; do
      case "$arg" in
        -out=*) echo "binary plan" > "${arg#-out=}" ;;
      esac
    done
    echo "Plan: 2 to add, 0 to change, 0 to destroy."
    ;;
  show)
    cat "$FAKE_TF_PLAN_JSON"
    ;;
  *)
    echo "unknown command $1" >&2
    exit 1
    ;;
esac
"#;

pub struct Fixture {
    pub root: tempfile::TempDir,
}

impl Fixture {
    /// Create the fake tool, a configuration dir and a plan JSON file
    pub fn new(plan_json: &str) -> Self {
        let root = tempfile::tempdir().unwrap();

        let config_dir = root.path().join("postgresql-test");
        fs::create_dir(&config_dir).unwrap();
        fs::write(
            config_dir.join("main.tf"),
            "module \"postgresql\" {\n  source = \"../../modules/postgresql\"\n}\n",
        )
        .unwrap();

        fs::write(root.path().join("plan.json"), plan_json).unwrap();

        let script = root.path().join("terraform");
        fs::write(&script, SCRIPT).unwrap();
        make_executable(&script);

        Self { root }
    }

    pub fn terraform(&self) -> PathBuf {
        self.root.path().join("terraform")
    }

    pub fn working_dir(&self) -> PathBuf {
        self.root.path().join("postgresql-test")
    }

    pub fn plan_json(&self) -> PathBuf {
        self.root.path().join("plan.json")
    }

    pub fn log(&self) -> PathBuf {
        self.root.path().join("calls.log")
    }

    /// Logged invocations, one line per call
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
