// crates/weather-loader-cli/src/main.rs
// ============================================================================
// Module: Weather Loader CLI Entry Point
// Description: Command dispatcher for the ingestion API, worker, and tooling.
// Purpose: Provide a safe CLI for serving, processing, signing, and diagnostics.
// Dependencies: clap, serde_json, thiserror, tokio, weather-loader-api.
// ============================================================================

//! ## Overview
//! The `weather-loader` binary starts the HTTP API, runs a single worker pass,
//! signs and verifies measurement payloads, prints diagnostics snapshots, and
//! validates configuration. Command output is JSON on stdout; errors go to
//! stderr with a failure exit code.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;
use weather_loader_api::WeatherApiServer;
use weather_loader_cli::collect_report;
use weather_loader_cli::load_config;
use weather_loader_cli::resolve_codec;
use weather_loader_cli::run_worker_pass;
use weather_loader_cli::sign_measurement;
use weather_loader_cli::verify_input;
use weather_loader_config::config_toml_example;
use weather_loader_core::DEFAULT_REPORT_LIMIT;
use weather_loader_core::utc_minute_now;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a `verify --file` input.
const MAX_VERIFY_INPUT_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "weather-loader", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP ingestion API.
    Serve(ServeCommand),
    /// Queue worker utilities.
    Worker {
        /// Selected worker subcommand.
        #[command(subcommand)]
        command: WorkerCommand,
    },
    /// Sign a measurement and print the record with its envelope.
    Sign(SignCommand),
    /// Check the integrity of a submitted payload.
    Verify(VerifyCommand),
    /// Print the most recent queue, measurement, and dead-letter rows.
    Report(ReportCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to weather-loader.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Worker subcommands.
#[derive(Subcommand, Debug)]
enum WorkerCommand {
    /// Run a single processing pass and print its summary.
    Run(WorkerRunCommand),
}

/// Arguments for `worker run`.
#[derive(Args, Debug)]
struct WorkerRunCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `sign`.
#[derive(Args, Debug)]
struct SignCommand {
    /// Measurement tag.
    #[arg(long, default_value = "temperature")]
    measurement: String,
    /// Location name.
    #[arg(long)]
    location: String,
    /// Measured value.
    #[arg(long, allow_negative_numbers = true)]
    value: f64,
    /// ISO-8601 instant (defaults to the current UTC minute).
    #[arg(long)]
    timestamp: Option<String>,
    /// Shared secret (overrides the config file).
    #[arg(long, value_name = "SECRET")]
    secret: Option<String>,
    /// Optional config file path used to resolve the secret.
    #[arg(long, value_name = "PATH", conflicts_with = "secret")]
    config: Option<PathBuf>,
}

/// Arguments for `verify`.
#[derive(Args, Debug)]
struct VerifyCommand {
    /// Payload text: an envelope, a bare record, or base64 with `--base64`.
    #[arg(long, value_name = "PAYLOAD", required_unless_present = "file")]
    input: Option<String>,
    /// Read the payload from a file instead.
    #[arg(long, value_name = "PATH", conflicts_with = "input")]
    file: Option<PathBuf>,
    /// Treat the payload as the raw `DataBase64` value.
    #[arg(long)]
    base64: bool,
    /// Shared secret (overrides the config file).
    #[arg(long, value_name = "SECRET")]
    secret: Option<String>,
    /// Optional config file path used to resolve the secret.
    #[arg(long, value_name = "PATH", conflicts_with = "secret")]
    config: Option<PathBuf>,
}

/// Arguments for `report`.
#[derive(Args, Debug)]
struct ReportCommand {
    /// Rows per view.
    #[arg(long, default_value_t = DEFAULT_REPORT_LIMIT)]
    limit: usize,
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a Weather Loader configuration file.
    Validate(ConfigValidateCommand),
    /// Print an annotated example configuration.
    Example,
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the message shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Worker {
            command,
        } => command_worker(command).await,
        Commands::Sign(command) => command_sign(&command),
        Commands::Verify(command) => command_verify(&command),
        Commands::Report(command) => command_report(command).await,
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let bind = config.server.bind.clone();
    let server = tokio::task::spawn_blocking(move || WeatherApiServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("weather-loader listening on {bind}"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Worker Command
// ============================================================================

/// Dispatches worker subcommands.
async fn command_worker(command: WorkerCommand) -> CliResult<ExitCode> {
    match command {
        WorkerCommand::Run(command) => command_worker_run(command).await,
    }
}

/// Runs one worker pass and prints its summary.
async fn command_worker_run(command: WorkerRunCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let summary = tokio::task::spawn_blocking(move || run_worker_pass(&config))
        .await
        .map_err(|err| CliError::new(format!("worker pass join failed: {err}")))?
        .map_err(|err| CliError::new(format!("worker pass failed: {err}")))?;
    write_json(&summary)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Integrity Commands
// ============================================================================

/// Executes the `sign` command.
fn command_sign(command: &SignCommand) -> CliResult<ExitCode> {
    let codec = resolve_codec(command.secret.as_deref(), command.config.as_deref())
        .map_err(|err| CliError::new(err.to_string()))?;
    let timestamp = command.timestamp.clone().unwrap_or_else(|| format!("{}Z", utc_minute_now()));
    let signed = sign_measurement(
        &codec,
        &command.measurement,
        &command.location,
        command.value,
        &timestamp,
    )
    .map_err(|err| CliError::new(err.to_string()))?;
    write_json(&signed)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `verify` command. Exits non-zero on a checksum mismatch.
fn command_verify(command: &VerifyCommand) -> CliResult<ExitCode> {
    let codec = resolve_codec(command.secret.as_deref(), command.config.as_deref())
        .map_err(|err| CliError::new(err.to_string()))?;
    let input = match (&command.input, &command.file) {
        (Some(input), _) => input.clone(),
        (None, Some(path)) => read_text_with_limit(path, MAX_VERIFY_INPUT_BYTES)?,
        (None, None) => return Err(CliError::new("verify requires --input or --file".to_string())),
    };
    let verification = verify_input(&codec, &input, command.base64)
        .map_err(|err| CliError::new(err.to_string()))?;
    write_json(&verification)?;
    if verification.valid { Ok(ExitCode::SUCCESS) } else { Ok(ExitCode::FAILURE) }
}

// ============================================================================
// SECTION: Report Command
// ============================================================================

/// Prints a diagnostics snapshot.
async fn command_report(command: ReportCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let limit = command.limit;
    let report = tokio::task::spawn_blocking(move || collect_report(&config, limit))
        .await
        .map_err(|err| CliError::new(format!("report join failed: {err}")))?
        .map_err(|err| CliError::new(err.to_string()))?;
    write_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
        ConfigCommand::Example => {
            write_stdout_line(config_toml_example().trim_end())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = load_config(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads a UTF-8 text input with a size limit.
fn read_text_with_limit(path: &Path, max_bytes: usize) -> CliResult<String> {
    let bytes = read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} is too large ({size} bytes, limit {limit} bytes)",
            path.display()
        )),
    })?;
    String::from_utf8(bytes)
        .map_err(|_| CliError::new(format!("{} is not valid UTF-8", path.display())))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    write_stdout_line(&text).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
