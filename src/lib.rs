//! plancheck: verify infrastructure plans before they are applied.
//!
//! The library drives `init`, `plan -out` and `show -json` through an injected
//! [`CommandExecutor`], parses the rendered plan into a [`PlanModel`], and
//! answers exact-address questions about proposed resource changes.
//!
//! ```ignore
//! use std::sync::Arc;
//! use plancheck::{PlanComputer, RealCommandExecutor, TerraformExecutor};
//!
//! let computer = PlanComputer::new(
//!     Arc::new(RealCommandExecutor),
//!     Arc::new(TerraformExecutor::new()),
//! );
//! let model = computer.init_and_plan("examples/postgresql-test", "plan.out")?;
//! plancheck::plan::require_resource_change(
//!     &model,
//!     "module.postgresql.azurerm_postgresql_server.main",
//! )?;
//! ```

pub mod checks;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod harness;
pub mod output;
pub mod plan;
pub mod traits;

pub use error::{ConfigError, ExecutionError, HarnessError, ParseError, Result, UsageError};
pub use executor::{DefaultExecutorRegistry, Executor, ExecutorRegistry, OpenTofuExecutor, TerraformExecutor};
pub use harness::{Phase, PlanComputer, PlanOptions, PlanRun, RunState};
pub use plan::{Action, ActionSet, PlanModel, PlanParser, ResourceChange};
pub use traits::{CancelToken, CommandExecutor, CommandOutput, Invocation, RealCommandExecutor};
