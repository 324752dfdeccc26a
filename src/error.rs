//! Error types for plan computation, parsing and querying.
//!
//! Each failure class has its own enum so callers can tell "the tool failed to
//! run" apart from "the tool's output format changed" apart from "the resource
//! is not in the plan".

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::harness::Phase;
use crate::plan::{Action, ActionSet};

/// Umbrella error returned by the harness entry points.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A tool invocation failed during one of the plan phases.
    #[error("{phase} failed: {source}")]
    Execution {
        /// Phase that was running when the failure occurred.
        phase: Phase,
        /// Underlying process failure, with captured output.
        #[source]
        source: ExecutionError,
    },

    /// The rendered plan could not be understood.
    #[error("Plan parse error: {0}")]
    Parse(#[from] ParseError),

    /// A queried address has no entry in the parsed plan.
    #[error("Resource change not found: {address}{}", format_suggestions(.suggestions))]
    NotFound {
        /// The exact address that was queried.
        address: String,
        /// Known addresses sharing the longest prefix with the query, for diagnosis only.
        suggestions: Vec<String>,
    },

    /// The resource exists but its proposed actions differ from the expectation.
    #[error("Resource {address} is planned to {actual}, expected {expected}")]
    ActionMismatch {
        /// Address of the resource.
        address: String,
        /// Expected action.
        expected: Action,
        /// Actions actually proposed.
        actual: ActionSet,
    },

    /// The harness was driven incorrectly.
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    /// The check-suite configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (closest planned addresses: {})", suggestions.join(", "))
    }
}

/// Failures of a single tool invocation.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The tool binary could not be located.
    #[error("Executable '{binary}' not found")]
    BinaryNotFound {
        /// Binary name or path.
        binary: String,
    },

    /// The working directory is missing or not a directory.
    #[error("Invalid working directory {}: {reason}", .path.display())]
    InvalidWorkingDir {
        /// Offending path.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// The process could not be started for another OS reason.
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited with a status the caller does not accept.
    #[error("'{command}' exited with {}{}", format_exit_code(.exit_code), format_stderr(.stderr))]
    NonZeroExit {
        /// Rendered command line.
        command: String,
        /// Exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The process outlived its timeout and was killed.
    #[error("'{command}' timed out after {}s and was killed", .timeout.as_secs())]
    TimedOut {
        /// Rendered command line.
        command: String,
        /// Timeout that elapsed.
        timeout: Duration,
        /// Output captured before the kill.
        stdout: String,
        /// Error output captured before the kill.
        stderr: String,
    },

    /// The run was cancelled and the process was killed.
    #[error("'{command}' was cancelled")]
    Cancelled {
        /// Rendered command line.
        command: String,
    },

    /// I/O failure while supervising the process.
    #[error("I/O error while running '{command}': {source}")]
    Io {
        /// Rendered command line.
        command: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

fn format_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (killed by signal)".to_string(),
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl ExecutionError {
    /// Captured standard output, when the process got far enough to produce any.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ExecutionError::NonZeroExit { stdout, .. } | ExecutionError::TimedOut { stdout, .. } => {
                Some(stdout)
            }
            _ => None,
        }
    }

    /// Captured standard error, when the process got far enough to produce any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecutionError::NonZeroExit { stderr, .. } | ExecutionError::TimedOut { stderr, .. } => {
                Some(stderr)
            }
            _ => None,
        }
    }
}

/// The tool's rendered plan is not valid or not a supported structure.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not JSON.
    #[error("Invalid plan JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The document has a `format_version` this parser does not understand.
    #[error("Unsupported plan format version '{found}' (supported: {supported})")]
    UnsupportedFormatVersion {
        /// Version reported by the document.
        found: String,
        /// Supported version requirement.
        supported: String,
    },

    /// A required field is absent or empty.
    #[error("Missing required field '{field}' in {context}")]
    MissingField {
        /// Field name.
        field: String,
        /// Where it was expected.
        context: String,
    },

    /// A change action string is not one the tool is known to emit.
    #[error("Unknown change action '{action}' for {address}")]
    InvalidAction {
        /// Address of the offending record.
        address: String,
        /// The unrecognised value.
        action: String,
    },

    /// Two records share one address.
    #[error("Duplicate resource change address: {0}")]
    DuplicateAddress(String),

    /// The plan JSON file could not be read.
    #[error("Failed to read plan file {}: {source}", .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Caller mistakes in driving the harness.
#[derive(Debug, Error)]
pub enum UsageError {
    /// A query ran before a plan was successfully parsed.
    #[error("No parsed plan available (run state: {state})")]
    PlanNotParsed {
        /// State the run was in.
        state: String,
    },

    /// A phase was invoked out of order.
    #[error("Cannot run {requested} while the run is {state}")]
    OutOfOrder {
        /// Phase requested.
        requested: Phase,
        /// State the run was in.
        state: String,
    },

    /// The working directory holds no configuration files.
    #[error("No *.tf or *.tf.json files in {}", .0.display())]
    NoConfiguration(PathBuf),

    /// The working directory does not exist.
    #[error("Working directory does not exist: {}", .0.display())]
    MissingWorkingDir(PathBuf),

    /// The plan file / JSON output settings conflict.
    #[error("Invalid output path {}: {reason}", .path.display())]
    InvalidOutputPath {
        /// Offending path.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// An empty address was queried.
    #[error("Resource address must not be empty")]
    EmptyAddress,
}

/// Check-suite configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The configuration file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The YAML is malformed.
    #[error("Failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value failed validation.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The executor name is not registered.
    #[error("Unknown executor: {0}")]
    UnknownExecutor(String),
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
