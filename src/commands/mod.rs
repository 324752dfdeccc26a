mod check;
mod inspect;
mod plan;

pub use check::CheckCommand;
pub use inspect::InspectCommand;
pub use plan::{PlanArgs, PlanCommand};

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::config::parse_duration;
use crate::context::Context;
use crate::executor::{Executor, ExecutorRegistry};
use crate::plan::{PlanModel, PlanSummary};
use crate::traits::Output;

/// Executor name used when neither the command line nor a suite names one
pub const DEFAULT_EXECUTOR: &str = "terraform";

/// Tool selection flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct ToolOverrides {
    pub executor: Option<String>,
    pub binary: Option<String>,
    pub timeout: Option<String>,
}

impl ToolOverrides {
    pub fn timeout(&self) -> Result<Option<Duration>> {
        Ok(self.timeout.as_deref().map(parse_duration).transpose()?)
    }

    fn resolve_executor(&self, ctx: &Context) -> Result<Arc<dyn Executor>> {
        let name = self.executor.as_deref().unwrap_or(DEFAULT_EXECUTOR);
        let executor = match &self.binary {
            Some(binary) => ctx.executor_registry.with_binary(name, binary)?,
            None => ctx.executor_registry.get(name)?,
        };
        Ok(executor)
    }
}

/// "2 to add, 1 to change, 0 to replace, 0 to destroy"
fn format_summary(summary: &PlanSummary) -> String {
    let mut text = format!(
        "{} to add, {} to change, {} to replace, {} to destroy",
        summary.to_add, summary.to_change, summary.to_replace, summary.to_destroy
    );
    if summary.to_read > 0 {
        text.push_str(&format!(", {} to read", summary.to_read));
    }
    if summary.to_forget > 0 {
        text.push_str(&format!(", {} to forget", summary.to_forget));
    }
    text
}

/// Print every proposed change except no-ops, then the summary line
fn print_changes(output: &dyn Output, model: &PlanModel) {
    let summary = model.summary();

    if summary.total_changes() == 0 && summary.to_read == 0 {
        output.info("No changes. Infrastructure matches the configuration.");
        return;
    }

    for change in model.resource_changes() {
        if !change.actions.is_no_op() {
            output.resource_change(change);
        }
    }

    output.blank();
    output.key_value("Plan", &format_summary(&summary));
}
