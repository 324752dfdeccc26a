//! End-to-end tests of the plan harness against a fake tool binary.

#![cfg(unix)]

mod common;

use common::{FUTURE_FORMAT_PLAN, Fixture, POSTGRES_PLAN};
use plancheck::plan::{
    get_planned_values, get_resource_change, planned_value_exists, require_resource_change,
    resource_change_exists,
};
use plancheck::{
    CancelToken, ExecutionError, HarnessError, ParseError, Phase, PlanComputer, PlanOptions,
    RealCommandExecutor, RunState, TerraformExecutor,
};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SERVER: &str = "module.postgresql.azurerm_postgresql_server.main";

fn computer(fixture: &Fixture) -> PlanComputer {
    PlanComputer::new(
        Arc::new(RealCommandExecutor::new()),
        Arc::new(TerraformExecutor::with_binary(
            fixture.terraform().to_string_lossy(),
        )),
    )
}

fn options(fixture: &Fixture) -> PlanOptions {
    PlanOptions::new(fixture.working_dir())
        .with_plan_file("plan.out")
        .with_env("FAKE_TF_PLAN_JSON", fixture.plan_json().to_string_lossy())
        .with_env("FAKE_TF_LOG", fixture.log().to_string_lossy())
}

#[test]
fn test_resource_in_plan_is_found() {
    let fixture = Fixture::new(POSTGRES_PLAN);

    let run = computer(&fixture).run(options(&fixture)).unwrap();

    assert_eq!(run.state(), RunState::Parsed);
    let model = run.plan_model().unwrap();
    assert!(resource_change_exists(model, SERVER));
    assert!(require_resource_change(model, SERVER).is_ok());
    assert!(planned_value_exists(model, SERVER));
    assert_eq!(
        get_planned_values(model, SERVER).and_then(|v| v.get("name")),
        Some(&serde_json::json!("psql-test"))
    );
    assert_eq!(model.variables.get("location"), Some(&serde_json::json!("westeurope")));

    // The plan was written where requested
    assert!(fixture.working_dir().join("plan.out").is_file());
}

/// Spell an absolute path relative to the process cwd, e.g. `../../tmp/.tmpX/postgresql-test`
fn relative_to_cwd(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let mut relative = PathBuf::new();
    for _ in cwd.components().filter(|c| matches!(c, Component::Normal(_))) {
        relative.push("..");
    }
    relative.join(path.strip_prefix("/").unwrap())
}

#[test]
fn test_relative_working_dir_and_plan_file() {
    let fixture = Fixture::new(POSTGRES_PLAN);
    let working_dir = relative_to_cwd(&fixture.working_dir());
    assert!(working_dir.is_relative());

    let run = computer(&fixture)
        .run(
            PlanOptions::new(&working_dir)
                .with_plan_file("plan.out")
                .with_json_output("plan.json")
                .with_env("FAKE_TF_PLAN_JSON", fixture.plan_json().to_string_lossy())
                .with_env("FAKE_TF_LOG", fixture.log().to_string_lossy()),
        )
        .unwrap();

    assert!(run.plan_file().is_absolute());
    assert!(fixture.working_dir().join("plan.out").is_file());
    assert!(fixture.working_dir().join("plan.json").is_file());
    assert!(resource_change_exists(run.plan_model().unwrap(), SERVER));

    let calls = fixture.calls();
    let expected = format!("-out={}", run.plan_file().display());
    assert!(calls[1].contains(&expected), "plan call: {}", calls[1]);
}

#[test]
fn test_commands_run_in_order_in_the_working_dir() {
    let fixture = Fixture::new(POSTGRES_PLAN);

    computer(&fixture).run(options(&fixture)).unwrap();

    let calls = fixture.calls();
    assert_eq!(calls.len(), 3);
    let working_dir = fixture.working_dir().canonicalize().unwrap();
    for call in &calls {
        assert!(call.starts_with(&working_dir.display().to_string()));
    }
    assert!(calls[0].contains(" init "));
    assert!(calls[1].contains(" plan "));
    assert!(calls[2].contains(" show -json "));
    assert!(calls[2].ends_with("plan.out"));
}

#[test]
fn test_init_and_plan_convenience() {
    let fixture = Fixture::new(POSTGRES_PLAN);
    let model = computer(&fixture)
        .init_and_plan_and_show(options(&fixture))
        .unwrap();

    assert_eq!(model.resource_changes().len(), 2);
    assert_eq!(model.summary().to_add, 2);
}

#[test]
fn test_plan_failure_yields_execution_error_and_no_model() {
    let fixture = Fixture::new(POSTGRES_PLAN);
    let computer = computer(&fixture);
    let mut run = plancheck::PlanRun::new(options(&fixture).with_env("FAKE_TF_PLAN_FAIL", "1"))
        .unwrap();

    computer.init(&mut run).unwrap();
    let err = computer.plan(&mut run).unwrap_err();

    match err {
        HarnessError::Execution {
            phase: Phase::Plan,
            source: ExecutionError::NonZeroExit {
                exit_code, stderr, ..
            },
        } => {
            assert_eq!(exit_code, Some(1));
            assert!(stderr.contains("Invalid provider configuration"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(run.state(), RunState::Initialized);
    assert!(run.plan_output().is_some());
    assert!(matches!(
        run.resource_change_exists(SERVER),
        Err(HarnessError::Usage(_))
    ));
}

#[test]
fn test_typo_is_absent_not_an_error() {
    let fixture = Fixture::new(POSTGRES_PLAN);
    let model = computer(&fixture)
        .init_and_plan_and_show(options(&fixture))
        .unwrap();

    let typo = "module.postgresql.azurerm_postgresql_server.mian";
    assert!(!resource_change_exists(&model, typo));
    assert!(get_resource_change(&model, typo).is_none());
    assert!(matches!(
        require_resource_change(&model, typo),
        Err(HarnessError::NotFound { .. })
    ));
}

#[test]
fn test_unsupported_format_is_parse_error() {
    let fixture = Fixture::new(FUTURE_FORMAT_PLAN);

    let err = computer(&fixture).run(options(&fixture)).unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Parse(ParseError::UnsupportedFormatVersion { .. })
    ));
}

#[test]
fn test_missing_binary() {
    let fixture = Fixture::new(POSTGRES_PLAN);
    let computer = PlanComputer::new(
        Arc::new(RealCommandExecutor::new()),
        Arc::new(TerraformExecutor::with_binary("/nonexistent/terraform")),
    );

    let err = computer.run(options(&fixture)).unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Execution {
            phase: Phase::Init,
            source: ExecutionError::BinaryNotFound { .. },
        }
    ));
}

#[test]
fn test_timeout_kills_hanging_plan() {
    let fixture = Fixture::new(POSTGRES_PLAN);
    let started = Instant::now();

    let err = computer(&fixture)
        .run(
            options(&fixture)
                .with_env("FAKE_TF_PLAN_SLEEP", "30")
                .with_timeout(Some(Duration::from_secs(1))),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Execution {
            phase: Phase::Plan,
            source: ExecutionError::TimedOut { .. },
        }
    ));
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[test]
fn test_cancel_kills_hanging_plan() {
    let fixture = Fixture::new(POSTGRES_PLAN);
    let token = CancelToken::new();

    let canceller = {
        let token = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(500));
            token.cancel();
        })
    };

    let err = computer(&fixture)
        .run(
            options(&fixture)
                .with_env("FAKE_TF_PLAN_SLEEP", "30")
                .with_cancel_token(token),
        )
        .unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(
        err,
        HarnessError::Execution {
            source: ExecutionError::Cancelled { .. },
            ..
        }
    ));
}
