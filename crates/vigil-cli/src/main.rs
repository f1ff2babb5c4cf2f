//! Command-line front end for the vigil verification engine.
//!
//! Runs assertion steps against a booted iOS Simulator and reports each
//! result. The exit code summarizes the run: 0 when every assertion passed,
//! 1 when at least one failed, 2 on an infrastructure error, 3 on a usage
//! or parse error.
//!
//! # Usage
//!
//! ```bash
//! # One step; quote it so its words never read as flags
//! vigil check 'visible #login_button'
//! vigil check 'text @Title = "Welcome back"' --timeout 10000
//!
//! # A script, one step per line
//! vigil run smoke.vigil --screens screens.json
//!
//! # Machine-readable results
//! vigil --format json check no-errors
//!
//! # Running simulators
//! vigil devices
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use vigil_core::assertions::screen::{parse_catalog, ScreenDefinition};
use vigil_core::step::{parse_script, Step};
use vigil_core::{AssertionOptions, VerificationResult, Verifier, VerifyError, VigilConfig};

/// Verify iOS Simulator UI state from the command line.
#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Run UI and log assertions against a booted iOS Simulator")]
#[command(version)]
struct Cli {
    /// Simulator UDID (defaults to the first booted device)
    #[arg(short, long, global = true, env = "VIGIL_DEVICE")]
    device: Option<String>,

    /// Session id used to group artifacts
    #[arg(short, long, global = true, default_value = "default", env = "VIGIL_SESSION")]
    session: String,

    /// App bundle id, used to filter the system log
    #[arg(short, long, global = true, env = "VIGIL_BUNDLE_ID")]
    bundle_id: Option<String>,

    /// Polling timeout in milliseconds
    #[arg(short, long, global = true, env = "VIGIL_TIMEOUT")]
    timeout: Option<u64>,

    /// Polling interval in milliseconds
    #[arg(short, long, global = true, env = "VIGIL_INTERVAL")]
    interval: Option<u64>,

    /// JSON file of screen definitions for `screen` steps
    #[arg(long, global = true, env = "VIGIL_SCREENS")]
    screens: Option<PathBuf>,

    /// Config file (defaults to ~/.vigil/config.json)
    #[arg(long, global = true, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Output format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Also write logs to this file
    #[arg(long, global = true, env = "VIGIL_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single step, e.g. `visible #login_button`
    ///
    /// Quote the step as one argument. Unquoted words are joined with
    /// spaces, and options may follow the step. Words starting with `-`
    /// (such as `-i`) must be inside the quotes or after `--`.
    Check {
        /// The step
        #[arg(required = true, num_args = 1..)]
        step: Vec<String>,
    },

    /// Run a script of steps, one per line
    Run {
        /// Path to the script
        file: PathBuf,

        /// Stop at the first failed assertion
        #[arg(long)]
        fail_fast: bool,
    },

    /// List booted simulators
    Devices,
}

#[derive(Debug)]
enum CliError {
    /// Bad arguments, unreadable input or a step that does not parse.
    Usage(String),
    /// The assertion could not run.
    Infrastructure(VerifyError),
    /// Assertions ran and this many did not pass.
    Failed(usize),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Failed(_) => ExitCode::from(1),
            CliError::Infrastructure(_) => ExitCode::from(2),
            CliError::Usage(_) => ExitCode::from(3),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Infrastructure(e) => write!(f, "{} [{}]", e, e.code()),
            CliError::Failed(1) => write!(f, "1 assertion failed"),
            CliError::Failed(n) => write!(f, "{} assertions failed", n),
        }
    }
}

impl From<VerifyError> for CliError {
    fn from(e: VerifyError) -> Self {
        CliError::Infrastructure(e)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version go to stdout and are not errors.
            return if e.use_stderr() {
                CliError::Usage(e.kind().to_string()).exit_code()
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    let _guard = init_tracing(cli.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`). With
/// `--log-file`, an info-level copy is also written to that file.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    let (file, guard) = match log_file.and_then(|p| Some((p.parent()?, p.file_name()?))) {
        Some((dir, name)) => {
            let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("info"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stderr).with(file).init();
    guard
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Check { ref step } => {
            let line = step.join(" ");
            let step = Step::parse(&line).map_err(|e| CliError::Usage(format!("invalid step '{}': {}", line, e)))?;
            let screens = load_screens(cli.screens.as_deref())?;
            let verifier = build_verifier(&cli);
            let options = assertion_options(&cli, cancel_on_ctrl_c());

            let result = step.run(&verifier, &screens, &options).await?;
            print_result(cli.format, None, &result);
            if result.passed {
                Ok(())
            } else {
                Err(CliError::Failed(1))
            }
        }
        Command::Run { ref file, fail_fast } => {
            let source = std::fs::read_to_string(file)
                .map_err(|e| CliError::Usage(format!("cannot read {}: {}", file.display(), e)))?;
            let steps = parse_script(&source).map_err(|e| CliError::Usage(format!("{}: {}", file.display(), e)))?;
            let screens = load_screens(cli.screens.as_deref())?;
            let verifier = build_verifier(&cli);
            let options = assertion_options(&cli, cancel_on_ctrl_c());

            info!(script = %file.display(), steps = steps.len(), "running script");
            let mut failed = 0;
            for (line, step) in &steps {
                let result = step.run(&verifier, &screens, &options).await?;
                print_result(cli.format, Some(*line), &result);
                if !result.passed {
                    failed += 1;
                    if fail_fast {
                        break;
                    }
                }
                if options.cancel.as_ref().map_or(false, CancellationToken::is_cancelled) {
                    warn!("interrupted, skipping remaining steps");
                    failed += 1;
                    break;
                }
            }

            if cli.format == OutputFormat::Text {
                println!("{} step(s), {} failed", steps.len(), failed);
            }
            if failed == 0 {
                Ok(())
            } else {
                Err(CliError::Failed(failed))
            }
        }
        Command::Devices => {
            let verifier = build_verifier(&cli);
            let devices = verifier.collaborators().devices.list_running_devices().await?;
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&devices).unwrap_or_default());
                }
                OutputFormat::Text => {
                    if devices.is_empty() {
                        eprintln!("No booted simulators found");
                    }
                    for d in &devices {
                        println!(
                            "{}  {}  {}  {}",
                            d.id,
                            d.name,
                            d.state,
                            d.os_version.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
            Ok(())
        }
    }
}

fn build_verifier(cli: &Cli) -> Verifier {
    let config = match cli.config {
        Some(ref path) => VigilConfig::load_from(path),
        None => VigilConfig::load(),
    };
    debug!(?config, "loaded config");
    Verifier::simulator(config)
}

fn assertion_options(cli: &Cli, cancel: CancellationToken) -> AssertionOptions {
    let mut options = AssertionOptions::new(cli.session.as_str()).with_cancel(cancel);
    options.device_id = cli.device.clone();
    options.bundle_id = cli.bundle_id.clone();
    options.timeout_ms = cli.timeout;
    options.poll_interval_ms = cli.interval;
    options
}

fn load_screens(path: Option<&Path>) -> Result<HashMap<String, ScreenDefinition>, CliError> {
    let Some(path) = path else {
        return Ok(HashMap::new());
    };
    let json = std::fs::read_to_string(path)
        .map_err(|e| CliError::Usage(format!("cannot read {}: {}", path.display(), e)))?;
    parse_catalog(&json).map_err(|e| CliError::Usage(format!("invalid screen definitions in {}: {}", path.display(), e)))
}

/// A token cancelled on Ctrl-C, so an in-flight poll ends promptly.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn print_result(format: OutputFormat, line: Option<usize>, result: &VerificationResult<serde_json::Value>) {
    match format {
        OutputFormat::Json => match serde_json::to_string(result) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!(error = %e, "failed to serialize result"),
        },
        OutputFormat::Text => {
            let prefix = line.map(|n| format!("{:>4}  ", n)).unwrap_or_default();
            let status = result.status.name().to_uppercase();
            println!(
                "{}{:<8}{} {}: {} ({}ms, {} attempt(s))",
                prefix,
                status,
                result.assertion_type.name(),
                result.target,
                result.message,
                result.duration_ms,
                result.attempts.len()
            );
            for artifact in &result.artifacts {
                println!("{}          artifact: {}", " ".repeat(prefix.len()), artifact.display());
            }
        }
    }
}
