pub mod command;
pub mod output;

pub use command::{CancelToken, CommandExecutor, CommandOutput, Invocation, RealCommandExecutor};
pub use output::{Output, TerminalOutput};

#[cfg(test)]
pub use command::MockCommandExecutor;
#[cfg(test)]
pub use output::MockOutput;
