//! Plan computation
//!
//! Runs the `init`, `plan -out` and `show -json` sequence through an injected
//! [`CommandExecutor`](crate::traits::CommandExecutor) and hands the rendered
//! JSON to the plan parser. Nothing here ever applies a plan.

mod options;
mod run;

pub use options::{PlanOptions, has_configuration};
pub use run::{Phase, PlanComputer, PlanRun, RunState};
