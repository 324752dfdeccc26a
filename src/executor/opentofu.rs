use super::executor::Executor;

/// OpenTofu executor implementation
pub struct OpenTofuExecutor {
    binary: String,
}

impl OpenTofuExecutor {
    pub fn new() -> Self {
        Self {
            binary: "tofu".to_string(),
        }
    }

    /// Use a specific `tofu` binary instead of the one on PATH
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Executor for OpenTofuExecutor {
    fn get_name(&self) -> &str {
        "opentofu"
    }

    fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for OpenTofuExecutor {
    fn default() -> Self {
        Self::new()
    }
}
