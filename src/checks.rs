//! Running a suite of plan checks.
//!
//! Each check is one full init/plan/show cycle followed by its expectations.
//! Checks run on a bounded pool of blocking tasks, since the tools themselves
//! are blocking processes.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::{CheckConfig, Expectation, SuiteConfig};
use crate::harness::PlanComputer;
use crate::plan::{self, Action, PlanModel, PlanSummary};
use crate::traits::CancelToken;

/// Result of a single check
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,
    /// Plan summary, when the plan was computed
    pub summary: Option<PlanSummary>,
    /// One message per unmet expectation
    pub failures: Vec<String>,
    /// Set when the plan could not be computed at all
    pub error: Option<String>,
    pub duration: Option<chrono::Duration>,
}

impl CheckOutcome {
    fn errored(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: None,
            failures: Vec::new(),
            error: Some(error.into()),
            duration: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none() && self.failures.is_empty()
    }
}

/// Check every expectation against a parsed plan, returning one message per failure
pub fn evaluate_expectations(model: &PlanModel, expectations: &[Expectation]) -> Vec<String> {
    let mut failures = Vec::new();

    for expectation in expectations {
        if expectation.absent {
            if let Some(change) = plan::get_resource_change(model, &expectation.address) {
                failures.push(format!(
                    "{} is planned to {} but was expected to be absent",
                    change.address, change.actions
                ));
            }
            continue;
        }

        match plan::require_resource_change(model, &expectation.address) {
            Ok(change) => {
                if !expectation.actions.is_empty()
                    && !same_actions(change.actions.actions(), &expectation.actions)
                {
                    failures.push(format!(
                        "{} is planned to {}, expected {}",
                        change.address,
                        change.actions,
                        plan::ActionSet::new(expectation.actions.clone())
                    ));
                }
            }
            Err(e) => failures.push(e.to_string()),
        }
    }

    failures
}

/// Order-insensitive comparison, so either replace ordering matches `[delete, create]`
fn same_actions(actual: &[Action], expected: &[Action]) -> bool {
    actual.len() == expected.len()
        && actual.iter().all(|a| expected.contains(a))
        && expected.iter().all(|e| actual.contains(e))
}

/// Run one check to completion
pub fn run_check(
    computer: &PlanComputer,
    suite: &SuiteConfig,
    check: &CheckConfig,
    cancel: Option<CancelToken>,
) -> CheckOutcome {
    info!(check = %check.name, "running check");

    let options = match suite.plan_options(check) {
        Ok(options) => options,
        Err(e) => return CheckOutcome::errored(&check.name, e.to_string()),
    };
    let options = match cancel {
        Some(token) => options.with_cancel_token(token),
        None => options,
    };

    let run = match computer.run(options) {
        Ok(run) => run,
        Err(e) => {
            warn!(check = %check.name, error = %e, "check could not be planned");
            return CheckOutcome::errored(&check.name, e.to_string());
        }
    };

    let model = match run.plan_model() {
        Ok(model) => model,
        Err(e) => return CheckOutcome::errored(&check.name, e.to_string()),
    };

    let failures = evaluate_expectations(model, &check.expect);
    if !failures.is_empty() {
        warn!(check = %check.name, failures = failures.len(), "expectations not met");
    }

    CheckOutcome {
        name: check.name.clone(),
        summary: Some(model.summary()),
        failures,
        error: None,
        duration: run.duration(),
    }
}

/// Run every check in the suite, at most `suite.parallel` at a time.
///
/// Outcomes are returned in suite order.
pub async fn run_suite(
    computer: Arc<PlanComputer>,
    suite: Arc<SuiteConfig>,
    cancel: Option<CancelToken>,
) -> Vec<CheckOutcome> {
    let semaphore = Arc::new(Semaphore::new(suite.parallel.max(1)));
    let mut handles = Vec::new();

    for index in 0..suite.checks.len() {
        let semaphore = semaphore.clone();
        let computer = computer.clone();
        let suite = suite.clone();
        let cancel = cancel.clone();
        let name = suite.checks[index].name.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();

            if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return CheckOutcome::errored(name, "cancelled before start");
            }

            // The tools are blocking processes
            tokio::task::spawn_blocking(move || {
                run_check(&computer, &suite, &suite.checks[index], cancel)
            })
            .await
            .unwrap_or_else(|e| CheckOutcome::errored(name, format!("Task panicked: {}", e)))
        });

        handles.push(handle);
    }

    let mut outcomes = Vec::new();
    for (index, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap_or_else(|e| {
            CheckOutcome::errored(&suite.checks[index].name, format!("Task panicked: {}", e))
        });
        outcomes.push(outcome);
    }

    outcomes
}
