//! Check-suite configuration
//!
//! A suite file lists the configurations to plan and the resource changes each
//! plan must (or must not) contain:
//!
//! ```yaml
//! executor: terraform
//! timeout: 10m
//! checks:
//!   - name: postgresql
//!     working_dir: examples/postgresql-test
//!     plan_file: plan.out
//!     expect:
//!       - address: module.postgresql.azurerm_postgresql_server.main
//!         actions: [create]
//! ```

mod duration;

pub use duration::parse_duration;

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::executor::{DefaultExecutorRegistry, Executor, ExecutorRegistry};
use crate::harness::PlanOptions;
use crate::plan::Action;

/// Default suite file name looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "plancheck.yaml";

fn default_executor() -> String {
    "terraform".to_string()
}

fn default_parallel() -> usize {
    1
}

/// Top-level suite file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
    #[serde(default = "default_executor")]
    pub executor: String,
    /// Override for the executor binary
    pub binary: Option<String>,
    /// Default per-command timeout, e.g. "10m"
    pub timeout: Option<String>,
    /// Maximum number of checks planned at once
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    pub checks: Vec<CheckConfig>,
    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// One configuration to plan and its expectations
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    pub name: String,
    pub working_dir: PathBuf,
    pub plan_file: Option<PathBuf>,
    pub json_output: Option<PathBuf>,
    /// Values may be any YAML scalar or collection; non-strings are passed as JSON
    #[serde(default)]
    pub vars: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub var_files: Vec<PathBuf>,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub backend: Option<bool>,
    pub upgrade: Option<bool>,
    pub refresh: Option<bool>,
    pub detailed_exit_code: Option<bool>,
    pub timeout: Option<String>,
    #[serde(default)]
    pub expect: Vec<Expectation>,
}

/// An assertion about one resource address
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    pub address: String,
    /// Exact set of proposed actions; empty means any change record will do
    #[serde(default)]
    pub actions: Vec<Action>,
    /// The plan must NOT contain this address
    #[serde(default)]
    pub absent: bool,
}

impl Expectation {
    pub fn present(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            actions: Vec::new(),
            absent: false,
        }
    }
}

impl SuiteConfig {
    /// Load and validate a suite file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading check suite from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self::parse_yaml(&content, base_dir)
    }

    /// Parse and validate suite YAML, resolving relative paths against `base_dir`
    pub fn parse_yaml(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config: SuiteConfig = serde_yaml::from_str(content)?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.checks.is_empty() {
            return Err(ConfigError::Invalid("at least one check is required".to_string()));
        }

        if self.parallel == 0 {
            return Err(ConfigError::Invalid("parallel must be at least 1".to_string()));
        }

        if let Some(timeout) = &self.timeout {
            parse_duration(timeout)?;
        }

        let mut names = HashSet::new();
        for check in &self.checks {
            if !names.insert(check.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate check name '{}'",
                    check.name
                )));
            }

            if let Some(timeout) = &check.timeout {
                parse_duration(timeout)?;
            }

            for expectation in &check.expect {
                if expectation.address.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "check '{}' has an expectation without an address",
                        check.name
                    )));
                }
                if expectation.absent && !expectation.actions.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "check '{}': '{}' cannot be both absent and have actions",
                        check.name, expectation.address
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up the configured executor, honoring a binary override
    pub fn resolve_executor(
        &self,
        registry: &DefaultExecutorRegistry,
    ) -> Result<Arc<dyn Executor>, ConfigError> {
        match &self.binary {
            Some(binary) => registry.with_binary(&self.executor, binary),
            None => registry.get(&self.executor),
        }
    }

    /// Effective timeout for a check
    pub fn timeout_for(&self, check: &CheckConfig) -> Result<Option<Duration>, ConfigError> {
        check
            .timeout
            .as_ref()
            .or(self.timeout.as_ref())
            .map(|timeout| parse_duration(timeout))
            .transpose()
    }

    /// Translate a check into harness options
    pub fn plan_options(&self, check: &CheckConfig) -> Result<PlanOptions, ConfigError> {
        let working_dir = if check.working_dir.is_absolute() {
            check.working_dir.clone()
        } else {
            self.base_dir.join(&check.working_dir)
        };

        let mut options = PlanOptions::new(working_dir).with_timeout(self.timeout_for(check)?);

        if let Some(plan_file) = &check.plan_file {
            options = options.with_plan_file(plan_file);
        }
        if let Some(json_output) = &check.json_output {
            options = options.with_json_output(json_output);
        }
        for (key, value) in &check.vars {
            options = options.with_var(key, render_var(value)?);
        }
        for var_file in &check.var_files {
            options = options.with_var_file(var_file);
        }
        for target in &check.targets {
            options = options.with_target(target);
        }
        for (key, value) in &check.env {
            options = options.with_env(key, value);
        }
        if let Some(backend) = check.backend {
            options = options.with_backend(backend);
        }
        if let Some(upgrade) = check.upgrade {
            options = options.with_upgrade(upgrade);
        }
        if let Some(refresh) = check.refresh {
            options = options.with_refresh(refresh);
        }
        if let Some(detailed) = check.detailed_exit_code {
            options = options.with_detailed_exit_code(detailed);
        }

        Ok(options)
    }
}

/// Strings pass through untouched; everything else is rendered as JSON, which
/// the tools accept as an HCL literal.
fn render_var(value: &serde_yaml::Value) -> Result<String, ConfigError> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string(other)
            .map_err(|e| ConfigError::Invalid(format!("unsupported variable value: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITE: &str = r#"
executor: opentofu
timeout: 10m
parallel: 2
checks:
  - name: postgresql
    working_dir: examples/postgresql-test
    plan_file: plan.out
    vars:
      location: westeurope
      replicas: 2
      tags: { team: data }
    expect:
      - address: module.postgresql.azurerm_postgresql_server.main
        actions: [create]
      - address: module.postgresql.azurerm_postgresql_server.old
        absent: true
  - name: network
    working_dir: /abs/network
    timeout: 30s
    detailed_exit_code: true
"#;

    #[test]
    fn test_parse_suite() {
        let config = SuiteConfig::parse_yaml(SUITE, "/repo").unwrap();

        assert_eq!(config.executor, "opentofu");
        assert_eq!(config.parallel, 2);
        assert_eq!(config.checks.len(), 2);

        let check = &config.checks[0];
        assert_eq!(check.expect.len(), 2);
        assert_eq!(check.expect[0].actions, vec![Action::Create]);
        assert!(check.expect[1].absent);
    }

    #[test]
    fn test_plan_options_resolve_paths_and_vars() {
        let config = SuiteConfig::parse_yaml(SUITE, "/repo").unwrap();
        let options = config.plan_options(&config.checks[0]).unwrap();

        assert_eq!(
            options.working_dir,
            PathBuf::from("/repo/examples/postgresql-test")
        );
        assert_eq!(options.timeout, Some(Duration::from_secs(600)));
        assert_eq!(
            options.vars,
            vec![
                ("location".to_string(), "westeurope".to_string()),
                ("replicas".to_string(), "2".to_string()),
                ("tags".to_string(), r#"{"team":"data"}"#.to_string()),
            ]
        );

        let network = config.plan_options(&config.checks[1]).unwrap();
        assert_eq!(network.working_dir, PathBuf::from("/abs/network"));
        assert_eq!(network.timeout, Some(Duration::from_secs(30)));
        assert!(network.detailed_exit_code);
    }

    #[test]
    fn test_defaults() {
        let config = SuiteConfig::parse_yaml(
            "checks:\n  - name: a\n    working_dir: a\n",
            ".",
        )
        .unwrap();
        assert_eq!(config.executor, "terraform");
        assert_eq!(config.parallel, 1);
        assert!(config.timeout_for(&config.checks[0]).unwrap().is_none());
    }

    #[test]
    fn test_resolve_executor() {
        let registry = DefaultExecutorRegistry::with_defaults();

        let config = SuiteConfig::parse_yaml(SUITE, "/repo").unwrap();
        assert_eq!(config.resolve_executor(&registry).unwrap().binary(), "tofu");

        let config = SuiteConfig::parse_yaml(
            "executor: terraform\nbinary: /opt/tf\nchecks:\n  - name: a\n    working_dir: a\n",
            ".",
        )
        .unwrap();
        assert_eq!(config.resolve_executor(&registry).unwrap().binary(), "/opt/tf");

        let config = SuiteConfig::parse_yaml(
            "executor: pulumi\nchecks:\n  - name: a\n    working_dir: a\n",
            ".",
        )
        .unwrap();
        assert!(matches!(
            config.resolve_executor(&registry),
            Err(ConfigError::UnknownExecutor(name)) if name == "pulumi"
        ));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let result = SuiteConfig::parse_yaml(
            "checks:\n  - name: a\n    working_dir: a\n    expct: []\n",
            ".",
        );
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = SuiteConfig::parse_yaml(
            "checks:\n  - name: a\n    working_dir: a\n  - name: a\n    working_dir: b\n",
            ".",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_rejects_absent_with_actions() {
        let result = SuiteConfig::parse_yaml(
            "checks:\n  - name: a\n    working_dir: a\n    expect:\n      - address: x.y\n        absent: true\n        actions: [create]\n",
            ".",
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_timeout_and_empty_suite() {
        assert!(SuiteConfig::parse_yaml(
            "timeout: soon\nchecks:\n  - name: a\n    working_dir: a\n",
            "."
        )
        .is_err());
        assert!(SuiteConfig::parse_yaml("checks: []\n", ".").is_err());
        assert!(SuiteConfig::parse_yaml(
            "parallel: 0\nchecks:\n  - name: a\n    working_dir: a\n",
            "."
        )
        .is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = SuiteConfig::load(Path::new("/no/such/plancheck.yaml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_resolves_against_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "checks:\n  - name: a\n    working_dir: stack\n").unwrap();

        let config = SuiteConfig::load(&path).unwrap();
        let options = config.plan_options(&config.checks[0]).unwrap();
        assert_eq!(options.working_dir, dir.path().join("stack"));
    }
}
