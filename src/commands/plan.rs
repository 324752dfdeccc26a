use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::{ToolOverrides, print_changes};
use crate::checks::evaluate_expectations;
use crate::config::Expectation;
use crate::context::Context;
use crate::harness::{PlanComputer, PlanOptions};

/// Arguments of the 'plan' command
#[derive(Debug, Clone, Default)]
pub struct PlanArgs {
    pub dir: PathBuf,
    /// Relative to `dir`
    pub plan_file: Option<PathBuf>,
    pub vars: Vec<(String, String)>,
    pub var_files: Vec<PathBuf>,
    pub targets: Vec<String>,
    /// Addresses that must have a change record
    pub expect: Vec<String>,
    /// Relative to `dir`
    pub json_out: Option<PathBuf>,
    pub detailed_exit_code: bool,
}

/// Handles the 'plan' command - computes one plan and checks addresses against it
pub struct PlanCommand;

impl PlanCommand {
    /// Execute the plan command
    pub fn execute(ctx: &Context, args: &PlanArgs, tools: &ToolOverrides) -> Result<()> {
        let executor = tools.resolve_executor(ctx)?;

        let mut options = PlanOptions::new(&args.dir)
            .with_timeout(tools.timeout()?)
            .with_cancel_token(ctx.cancel.clone())
            .with_detailed_exit_code(args.detailed_exit_code);
        if let Some(plan_file) = &args.plan_file {
            options = options.with_plan_file(plan_file);
        }
        if let Some(json_out) = &args.json_out {
            options = options.with_json_output(json_out);
        }
        for (key, value) in &args.vars {
            options = options.with_var(key, value);
        }
        for var_file in &args.var_files {
            options = options.with_var_file(var_file);
        }
        for target in &args.targets {
            options = options.with_target(target);
        }

        ctx.output.section("Plan");
        ctx.output.key_value("Directory", &args.dir.display().to_string());
        ctx.output.key_value("Executor", executor.get_name());

        if !executor.check_installed(ctx.command.as_ref(), Path::new(".")) {
            anyhow::bail!(
                "{} is not installed or not available as '{}'",
                executor.get_name(),
                executor.binary()
            );
        }

        let computer = PlanComputer::new(ctx.command.clone(), executor);
        let run = computer
            .run(options)
            .with_context(|| format!("Failed to plan {}", args.dir.display()))?;
        let model = run.plan_model()?;

        ctx.output.key_value("Plan file", &run.plan_file().display().to_string());
        if let Some(duration) = run.duration() {
            ctx.output
                .dimmed(&format!("  Planned in {:.1}s", duration.num_milliseconds() as f64 / 1000.0));
        }
        ctx.output.blank();
        print_changes(ctx.output.as_ref(), model);

        if args.expect.is_empty() {
            return Ok(());
        }

        let expectations: Vec<Expectation> =
            args.expect.iter().map(Expectation::present).collect();
        let failures = evaluate_expectations(model, &expectations);

        ctx.output.blank();
        if failures.is_empty() {
            ctx.output.success(&format!(
                "All {} expected resource changes are planned",
                expectations.len()
            ));
            return Ok(());
        }

        for failure in &failures {
            ctx.output.error(failure);
        }
        anyhow::bail!(
            "{} of {} expectations not met",
            failures.len(),
            expectations.len()
        )
    }
}
