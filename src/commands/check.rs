use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;

use super::{ToolOverrides, format_summary};
use crate::checks::{CheckOutcome, run_suite};
use crate::config::{SuiteConfig, parse_duration};
use crate::context::Context;
use crate::harness::PlanComputer;

/// Handles the 'check' command - runs every check in a suite file
pub struct CheckCommand;

impl CheckCommand {
    /// Execute the check command
    pub fn execute(ctx: &Context, config_path: &Path, tools: &ToolOverrides) -> Result<()> {
        let mut suite = SuiteConfig::load(config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;

        // Command-line flags win over the suite file
        if let Some(executor) = &tools.executor {
            suite.executor = executor.clone();
        }
        if let Some(binary) = &tools.binary {
            suite.binary = Some(binary.clone());
        }
        if let Some(timeout) = &tools.timeout {
            parse_duration(timeout)?;
            suite.timeout = Some(timeout.clone());
        }

        let executor = suite.resolve_executor(&ctx.executor_registry)?;

        ctx.output.section("Plan checks");
        ctx.output.key_value("Suite", &config_path.display().to_string());
        ctx.output.key_value("Executor", executor.get_name());
        ctx.output.key_value("Checks", &suite.checks.len().to_string());
        ctx.output.blank();

        let computer = Arc::new(PlanComputer::new(ctx.command.clone(), executor));
        let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
        let outcomes = runtime.block_on(run_suite(
            computer,
            Arc::new(suite),
            Some(ctx.cancel.clone()),
        ));

        for outcome in &outcomes {
            Self::report(ctx, outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.passed()).count();
        ctx.output.blank();
        if failed > 0 {
            anyhow::bail!("{} of {} checks failed", failed, outcomes.len());
        }

        ctx.output
            .success(&format!("All {} checks passed", outcomes.len()));
        Ok(())
    }

    fn report(ctx: &Context, outcome: &CheckOutcome) {
        let summary = outcome
            .summary
            .as_ref()
            .map(format_summary)
            .unwrap_or_default();

        if outcome.passed() {
            ctx.output
                .success(&format!("{} ({})", outcome.name, summary));
            return;
        }

        match &outcome.error {
            Some(error) => ctx.output.error(&format!("{}: {}", outcome.name, error)),
            None => ctx.output.error(&format!("{} ({})", outcome.name, summary)),
        }
        for failure in &outcome.failures {
            ctx.output.dimmed(&format!("    {}", failure));
        }
    }
}
