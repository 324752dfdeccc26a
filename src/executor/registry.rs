use super::{Executor, OpenTofuExecutor, TerraformExecutor};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Trait for executor registry that manages available executors
pub trait ExecutorRegistry: Send + Sync {
    /// Register an executor with the given name
    fn register(&mut self, name: String, executor: Box<dyn Executor>);

    /// Get an executor by name
    fn get(&self, name: &str) -> Result<Arc<dyn Executor>, ConfigError>;

    /// Check if an executor is registered
    fn has(&self, name: &str) -> bool;

    /// List all registered executor names
    fn list(&self) -> Vec<String>;
}

/// Default implementation of executor registry using a HashMap
pub struct DefaultExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl DefaultExecutorRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new registry with default executors (Terraform, OpenTofu)
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("terraform".to_string(), Box::new(TerraformExecutor::new()));
        registry.register("opentofu".to_string(), Box::new(OpenTofuExecutor::new()));
        registry
    }

    /// Build a registered executor kind around a specific binary path
    pub fn with_binary(&self, name: &str, binary: &str) -> Result<Arc<dyn Executor>, ConfigError> {
        match self.get(name)?.get_name() {
            "terraform" => Ok(Arc::new(TerraformExecutor::with_binary(binary))),
            "opentofu" => Ok(Arc::new(OpenTofuExecutor::with_binary(binary))),
            other => Err(ConfigError::Invalid(format!(
                "executor '{}' does not support a binary override",
                other
            ))),
        }
    }
}

impl ExecutorRegistry for DefaultExecutorRegistry {
    fn register(&mut self, name: String, executor: Box<dyn Executor>) {
        let mut executors = self.executors.write().unwrap_or_else(PoisonError::into_inner);
        executors.insert(name, Arc::from(executor));
    }

    fn get(&self, name: &str) -> Result<Arc<dyn Executor>, ConfigError> {
        let executors = self.executors.read().unwrap_or_else(PoisonError::into_inner);
        executors
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownExecutor(name.to_string()))
    }

    fn has(&self, name: &str) -> bool {
        let executors = self.executors.read().unwrap_or_else(PoisonError::into_inner);
        executors.contains_key(name)
    }

    fn list(&self) -> Vec<String> {
        let executors = self.executors.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = executors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for DefaultExecutorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
