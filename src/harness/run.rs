//! One init → plan → show cycle.
//!
//! A [`PlanRun`] moves strictly forward through
//! `NotInitialized -> Initialized -> Planned -> Parsed`. A failing step leaves
//! the run where it was, keeps the captured output for diagnosis, and returns
//! the error; nothing is retried.

use chrono::{DateTime, Utc};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::options::PlanOptions;
use crate::error::{ExecutionError, HarnessError, Result, UsageError};
use crate::executor::Executor;
use crate::plan::{self, PlanModel, PlanParser, ResourceChange};
use crate::traits::{CommandExecutor, CommandOutput, Invocation};

/// The tool invocations making up a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Plan,
    Show,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "init"),
            Phase::Plan => write!(f, "plan"),
            Phase::Show => write!(f, "show"),
        }
    }
}

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotInitialized,
    Initialized,
    Planned,
    Parsed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotInitialized => write!(f, "not initialized"),
            RunState::Initialized => write!(f, "initialized"),
            RunState::Planned => write!(f, "planned"),
            RunState::Parsed => write!(f, "parsed"),
        }
    }
}

/// Exit code `plan -detailed-exitcode` uses for "succeeded, changes pending"
const EXIT_CODE_CHANGES_PRESENT: i32 = 2;

/// State and captured results of one plan cycle. Owned by a single caller.
#[derive(Debug)]
pub struct PlanRun {
    options: PlanOptions,
    plan_file: PathBuf,
    state: RunState,
    init_output: Option<CommandOutput>,
    plan_output: Option<CommandOutput>,
    show_output: Option<CommandOutput>,
    model: Option<PlanModel>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl PlanRun {
    /// Validate the options and fix the plan file location for this run
    pub fn new(mut options: PlanOptions) -> std::result::Result<Self, UsageError> {
        // The tool runs inside the working dir, so every path handed to it must
        // already be absolute or it would resolve a second time from there
        if options.working_dir.is_relative() {
            options.working_dir = std::path::absolute(&options.working_dir)
                .map_err(|_| UsageError::MissingWorkingDir(options.working_dir.clone()))?;
        }

        let plan_file = options.resolve_plan_file();
        options.validate(&plan_file)?;

        Ok(Self {
            options,
            plan_file,
            state: RunState::NotInitialized,
            init_output: None,
            plan_output: None,
            show_output: None,
            model: None,
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    pub fn working_dir(&self) -> &Path {
        &self.options.working_dir
    }

    pub fn plan_file(&self) -> &Path {
        &self.plan_file
    }

    pub fn init_output(&self) -> Option<&CommandOutput> {
        self.init_output.as_ref()
    }

    pub fn plan_output(&self) -> Option<&CommandOutput> {
        self.plan_output.as_ref()
    }

    pub fn show_output(&self) -> Option<&CommandOutput> {
        self.show_output.as_ref()
    }

    /// Exit code of the plan step, once it has run
    pub fn plan_exit_code(&self) -> Option<i32> {
        self.plan_output.as_ref().and_then(|output| output.exit_code)
    }

    /// Whether the plan proposes changes.
    ///
    /// Uses the detailed exit code when enabled, otherwise the parsed model.
    pub fn has_changes(&self) -> Option<bool> {
        if self.options.detailed_exit_code {
            if let Some(code) = self.plan_exit_code() {
                return Some(code == EXIT_CODE_CHANGES_PRESENT);
            }
        }
        self.model
            .as_ref()
            .map(|model| model.summary().has_changes())
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall time from creation until the model was parsed
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at
            .map(|finished| finished.signed_duration_since(self.started_at))
    }

    /// The parsed plan; a usage error until the show step has succeeded
    pub fn plan_model(&self) -> std::result::Result<&PlanModel, UsageError> {
        self.model.as_ref().ok_or_else(|| UsageError::PlanNotParsed {
            state: self.state.to_string(),
        })
    }

    pub fn into_model(self) -> std::result::Result<PlanModel, UsageError> {
        let state = self.state;
        self.model.ok_or_else(|| UsageError::PlanNotParsed {
            state: state.to_string(),
        })
    }

    pub fn resource_change_exists(&self, address: &str) -> Result<bool> {
        Ok(plan::resource_change_exists(self.plan_model()?, address))
    }

    pub fn get_resource_change(&self, address: &str) -> Result<Option<&ResourceChange>> {
        Ok(plan::get_resource_change(self.plan_model()?, address))
    }

    pub fn require_resource_change(&self, address: &str) -> Result<&ResourceChange> {
        plan::require_resource_change(self.plan_model()?, address)
    }

    fn expect_state(&self, expected: RunState, requested: Phase) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(UsageError::OutOfOrder {
                requested,
                state: self.state.to_string(),
            }
            .into())
        }
    }

    fn invocation(&self, executor: &dyn Executor, args: Vec<String>) -> Invocation {
        Invocation::new(executor.binary(), &self.options.working_dir)
            .args(args)
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
            .envs(&self.options.env)
            .timeout(self.options.timeout)
            .cancel_token(self.options.cancel.clone())
    }
}

fn execution_error(phase: Phase, source: ExecutionError) -> HarnessError {
    warn!(%phase, error = %source, "phase failed");
    HarnessError::Execution { phase, source }
}

/// Drives [`PlanRun`]s with an injected process runner and tool.
pub struct PlanComputer {
    runner: Arc<dyn CommandExecutor>,
    executor: Arc<dyn Executor>,
    parser: PlanParser,
}

impl PlanComputer {
    pub fn new(runner: Arc<dyn CommandExecutor>, executor: Arc<dyn Executor>) -> Self {
        Self {
            runner,
            executor,
            parser: PlanParser::new(),
        }
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// Init, plan into `plan_file`, render and parse, with default options
    pub fn init_and_plan(
        &self,
        working_dir: impl Into<PathBuf>,
        plan_file: impl Into<PathBuf>,
    ) -> Result<PlanModel> {
        self.init_and_plan_and_show(PlanOptions::new(working_dir).with_plan_file(plan_file))
    }

    pub fn init_and_plan_and_show(&self, options: PlanOptions) -> Result<PlanModel> {
        Ok(self.run(options)?.into_model()?)
    }

    /// Run the whole cycle, stopping at the first failure
    pub fn run(&self, options: PlanOptions) -> Result<PlanRun> {
        let mut run = PlanRun::new(options)?;
        self.init(&mut run)?;
        self.plan(&mut run)?;
        self.show(&mut run)?;
        Ok(run)
    }

    pub fn init(&self, run: &mut PlanRun) -> Result<()> {
        run.expect_state(RunState::NotInitialized, Phase::Init)?;
        info!(
            executor = self.executor.get_name(),
            working_dir = %run.working_dir().display(),
            "initializing"
        );

        let invocation = run.invocation(self.executor.as_ref(), self.executor.init_args(&run.options));
        let output = self
            .runner
            .execute(&invocation)
            .map_err(|e| execution_error(Phase::Init, e))?;
        run.init_output = Some(output.clone());
        output
            .ensure_success()
            .map_err(|e| execution_error(Phase::Init, e))?;

        run.state = RunState::Initialized;
        Ok(())
    }

    pub fn plan(&self, run: &mut PlanRun) -> Result<()> {
        run.expect_state(RunState::Initialized, Phase::Plan)?;
        info!(plan_file = %run.plan_file().display(), "planning");

        let args = self.executor.plan_args(&run.options, &run.plan_file);
        let invocation = run.invocation(self.executor.as_ref(), args);
        let output = self
            .runner
            .execute(&invocation)
            .map_err(|e| execution_error(Phase::Plan, e))?;
        run.plan_output = Some(output.clone());

        let accepted: &[i32] = if run.options.detailed_exit_code {
            &[0, EXIT_CODE_CHANGES_PRESENT]
        } else {
            &[0]
        };
        output
            .ensure_exit_code(accepted)
            .map_err(|e| execution_error(Phase::Plan, e))?;

        run.state = RunState::Planned;
        Ok(())
    }

    pub fn show(&self, run: &mut PlanRun) -> Result<()> {
        run.expect_state(RunState::Planned, Phase::Show)?;
        info!(plan_file = %run.plan_file().display(), "rendering plan");

        let invocation = run.invocation(
            self.executor.as_ref(),
            self.executor.show_args(&run.plan_file),
        );
        let output = self
            .runner
            .execute(&invocation)
            .map_err(|e| execution_error(Phase::Show, e))?;
        run.show_output = Some(output.clone());
        let output = output
            .ensure_success()
            .map_err(|e| execution_error(Phase::Show, e))?;

        let model = self.parser.parse_str(&output.stdout)?;

        if let Some(path) = run.options.resolve_json_output() {
            fs::write(&path, &output.stdout).map_err(|e| UsageError::InvalidOutputPath {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        }

        info!(
            resource_changes = model.resource_changes().len(),
            "plan parsed"
        );
        run.model = Some(model);
        run.finished_at = Some(Utc::now());
        run.state = RunState::Parsed;
        Ok(())
    }
}
