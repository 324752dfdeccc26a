use crate::harness::PlanOptions;
use crate::traits::{CommandExecutor, Invocation};
use std::path::Path;

/// Trait for Infrastructure as Code executors (OpenTofu, Terraform, etc.)
///
/// An executor only knows how to spell the commands; running them is the
/// job of the [`CommandExecutor`] it is paired with.
pub trait Executor: Send + Sync {
    /// Get the name of this executor (e.g., "opentofu", "terraform")
    fn get_name(&self) -> &str;

    /// Binary to invoke (name on PATH or absolute path)
    fn binary(&self) -> &str;

    /// Check if the executor is installed and available
    /// Runs the version command and treats any failure as "not installed"
    fn check_installed(&self, runner: &dyn CommandExecutor, working_dir: &Path) -> bool {
        let invocation = Invocation::new(self.binary(), working_dir).arg("version");
        matches!(runner.execute(&invocation), Ok(output) if output.success())
    }

    /// Arguments for the dependency/backend initialisation step
    fn init_args(&self, options: &PlanOptions) -> Vec<String> {
        let mut args = vec!["init".to_string(), "-input=false".to_string()];

        args.push(format!("-upgrade={}", options.upgrade));

        if !options.backend {
            args.push("-backend=false".to_string());
        }

        for (key, value) in &options.backend_config {
            args.push(format!("-backend-config={}={}", key, value));
        }

        if options.no_color {
            args.push("-no-color".to_string());
        }

        args
    }

    /// Arguments for computing the plan and saving it to `plan_file`
    fn plan_args(&self, options: &PlanOptions, plan_file: &Path) -> Vec<String> {
        let mut args = vec![
            "plan".to_string(),
            format!("-out={}", plan_file.display()),
            "-input=false".to_string(),
            format!("-lock={}", options.lock),
        ];

        if !options.refresh {
            args.push("-refresh=false".to_string());
        }

        if options.detailed_exit_code {
            args.push("-detailed-exitcode".to_string());
        }

        for (key, value) in &options.vars {
            args.push("-var".to_string());
            args.push(format!("{}={}", key, value));
        }

        for var_file in &options.var_files {
            args.push(format!("-var-file={}", var_file.display()));
        }

        for target in &options.targets {
            args.push(format!("-target={}", target));
        }

        if options.no_color {
            args.push("-no-color".to_string());
        }

        args
    }

    /// Arguments for rendering a saved plan as JSON
    fn show_args(&self, plan_file: &Path) -> Vec<String> {
        vec![
            "show".to_string(),
            "-json".to_string(),
            "-no-color".to_string(),
            plan_file.display().to_string(),
        ]
    }
}
