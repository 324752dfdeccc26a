use super::executor::Executor;

/// Terraform executor implementation
pub struct TerraformExecutor {
    binary: String,
}

impl TerraformExecutor {
    pub fn new() -> Self {
        Self {
            binary: "terraform".to_string(),
        }
    }

    /// Use a specific `terraform` binary instead of the one on PATH
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Executor for TerraformExecutor {
    fn get_name(&self) -> &str {
        "terraform"
    }

    fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for TerraformExecutor {
    fn default() -> Self {
        Self::new()
    }
}
