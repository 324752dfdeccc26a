use crate::error::UsageError;
use crate::traits::CancelToken;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Inputs for one init/plan/show cycle
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Directory holding the configuration; every command runs here
    pub working_dir: PathBuf,
    /// Where the binary plan is saved. Relative paths resolve against `working_dir`;
    /// `None` picks a unique file in the system temp directory.
    pub plan_file: Option<PathBuf>,
    /// Optional copy of the rendered plan JSON
    pub json_output: Option<PathBuf>,
    /// `-var` pairs, in order
    pub vars: Vec<(String, String)>,
    pub var_files: Vec<PathBuf>,
    pub targets: Vec<String>,
    /// Extra environment for every command
    pub env: BTreeMap<String, String>,
    pub backend: bool,
    pub backend_config: Vec<(String, String)>,
    pub no_color: bool,
    pub lock: bool,
    pub upgrade: bool,
    pub refresh: bool,
    /// Pass `-detailed-exitcode` so exit code 2 reports pending changes
    pub detailed_exit_code: bool,
    /// Per-command timeout
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl PlanOptions {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            plan_file: None,
            json_output: None,
            vars: Vec::new(),
            var_files: Vec::new(),
            targets: Vec::new(),
            env: BTreeMap::new(),
            backend: true,
            backend_config: Vec::new(),
            no_color: true,
            lock: false,
            upgrade: false,
            refresh: true,
            detailed_exit_code: false,
            timeout: None,
            cancel: None,
        }
    }

    pub fn with_plan_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.plan_file = Some(path.into());
        self
    }

    pub fn with_json_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_output = Some(path.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((key.into(), value.into()));
        self
    }

    pub fn with_var_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.var_files.push(path.into());
        self
    }

    pub fn with_target(mut self, address: impl Into<String>) -> Self {
        self.targets.push(address.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_backend(mut self, enabled: bool) -> Self {
        self.backend = enabled;
        self
    }

    pub fn with_backend_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_config.push((key.into(), value.into()));
        self
    }

    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }

    pub fn with_upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_detailed_exit_code(mut self, enabled: bool) -> Self {
        self.detailed_exit_code = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Absolute plan file location for this run.
    ///
    /// Without an explicit path every call yields a fresh unique file so
    /// concurrent runs never share one.
    pub fn resolve_plan_file(&self) -> PathBuf {
        match &self.plan_file {
            Some(path) => self.resolve(path),
            None => std::env::temp_dir().join(format!("plancheck-{}.tfplan", uuid::Uuid::new_v4())),
        }
    }

    pub fn resolve_json_output(&self) -> Option<PathBuf> {
        self.json_output.as_ref().map(|path| self.resolve(path))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Check the working directory and output paths before any tool runs
    pub fn validate(&self, plan_file: &Path) -> Result<(), UsageError> {
        if !self.working_dir.is_dir() {
            return Err(UsageError::MissingWorkingDir(self.working_dir.clone()));
        }

        if !has_configuration(&self.working_dir) {
            return Err(UsageError::NoConfiguration(self.working_dir.clone()));
        }

        if plan_file.is_dir() {
            return Err(UsageError::InvalidOutputPath {
                path: plan_file.to_path_buf(),
                reason: "plan file path is a directory".to_string(),
            });
        }

        if let Some(json_output) = self.resolve_json_output() {
            if json_output == plan_file {
                return Err(UsageError::InvalidOutputPath {
                    path: json_output,
                    reason: "JSON output would overwrite the plan file".to_string(),
                });
            }
            if json_output.is_dir() {
                return Err(UsageError::InvalidOutputPath {
                    path: json_output,
                    reason: "JSON output path is a directory".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Whether `dir` directly contains `*.tf` or `*.tf.json` files
pub fn has_configuration(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.ends_with(".tf") || name.ends_with(".tf.json")
        })
}
