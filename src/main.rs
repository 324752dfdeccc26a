use anyhow::Result;
use clap::{Parser, Subcommand};
use plancheck::commands::{CheckCommand, InspectCommand, PlanArgs, PlanCommand, ToolOverrides};
use plancheck::config::DEFAULT_CONFIG_FILE;
use plancheck::context::Context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plancheck")]
#[command(about = "Verify infrastructure plans before they are applied", long_about = None)]
#[command(version)]
struct Cli {
    /// IaC tool to run (terraform, opentofu)
    #[arg(long, global = true, env = "PLANCHECK_EXECUTOR")]
    executor: Option<String>,

    /// Path to the tool binary
    #[arg(long, global = true, env = "PLANCHECK_BINARY")]
    binary: Option<String>,

    /// Timeout for each tool command (e.g. 30s, 10m, 1h30m)
    #[arg(long, global = true)]
    timeout: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check in a suite file
    Check {
        /// Suite file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },

    /// Init and plan a configuration, then list its proposed changes
    Plan {
        /// Directory holding the configuration
        #[arg(short, long)]
        dir: PathBuf,

        /// Where to save the binary plan, relative to --dir
        #[arg(long)]
        plan_file: Option<PathBuf>,

        /// Input variable (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        vars: Vec<(String, String)>,

        /// Variable definitions file (repeatable)
        #[arg(long = "var-file")]
        var_files: Vec<PathBuf>,

        /// Limit planning to a resource address (repeatable)
        #[arg(long = "target")]
        targets: Vec<String>,

        /// Resource address that must have a planned change (repeatable)
        #[arg(long)]
        expect: Vec<String>,

        /// Also write the rendered plan JSON here, relative to --dir
        #[arg(long)]
        json_out: Option<PathBuf>,

        /// Treat exit code 2 from plan as "changes present"
        #[arg(long)]
        detailed_exitcode: bool,
    },

    /// Read an existing `show -json` document without running any tool
    Inspect {
        /// Path to the plan JSON
        plan_json: PathBuf,

        /// Show a single resource change
        #[arg(short, long)]
        address: Option<String>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("invalid KEY=VALUE: no `=` found in `{}`", s)),
    }
}

/// Logs go to stderr so they never mix with command output
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = Context::new();

    // Ctrl-C kills the in-flight tool process instead of orphaning it
    let token = ctx.cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        tracing::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let tools = ToolOverrides {
        executor: cli.executor,
        binary: cli.binary,
        timeout: cli.timeout,
    };

    match cli.command {
        Commands::Check { config } => {
            CheckCommand::execute(&ctx, &config, &tools)?;
        }
        Commands::Plan {
            dir,
            plan_file,
            vars,
            var_files,
            targets,
            expect,
            json_out,
            detailed_exitcode,
        } => {
            let args = PlanArgs {
                dir,
                plan_file,
                vars,
                var_files,
                targets,
                expect,
                json_out,
                detailed_exit_code: detailed_exitcode,
            };
            PlanCommand::execute(&ctx, &args, &tools)?;
        }
        Commands::Inspect { plan_json, address } => {
            InspectCommand::execute(&ctx, &plan_json, address.as_deref())?;
        }
    }

    Ok(())
}
