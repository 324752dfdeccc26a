use crate::executor::DefaultExecutorRegistry;
#[cfg(test)]
use crate::traits::{MockCommandExecutor, MockOutput};
use crate::traits::{CancelToken, CommandExecutor, Output, RealCommandExecutor, TerminalOutput};
use std::sync::Arc;

/// Application context that holds all dependencies for dependency injection
pub struct Context {
    pub output: Arc<dyn Output>,
    pub command: Arc<dyn CommandExecutor>,
    pub executor_registry: Arc<DefaultExecutorRegistry>,
    /// Shared by every tool invocation; cancelled on Ctrl-C
    pub cancel: CancelToken,
}

impl Context {
    /// Create a new context with real implementations (for production use)
    pub fn new() -> Self {
        Self {
            output: Arc::new(TerminalOutput),
            command: Arc::new(RealCommandExecutor::new()),
            executor_registry: Arc::new(DefaultExecutorRegistry::with_defaults()),
            cancel: CancelToken::new(),
        }
    }

    /// Create a new context with mock implementations (for testing)
    #[cfg(test)]
    pub fn test() -> Self {
        Self::test_with(
            Arc::new(MockOutput::new()),
            Arc::new(MockCommandExecutor::new()),
        )
    }

    /// Create a test context with specific mock implementations
    #[cfg(test)]
    pub fn test_with(output: Arc<dyn Output>, command: Arc<dyn CommandExecutor>) -> Self {
        Self {
            output,
            command,
            executor_registry: Arc::new(DefaultExecutorRegistry::with_defaults()),
            cancel: CancelToken::new(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            output: Arc::clone(&self.output),
            command: Arc::clone(&self.command),
            executor_registry: Arc::clone(&self.executor_registry),
            cancel: self.cancel.clone(),
        }
    }
}
