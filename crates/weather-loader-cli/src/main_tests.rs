// crates/weather-loader-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and bounded input reads.
// Purpose: Ensure the command surface parses as documented and reads fail closed.
// Dependencies: weather-loader-cli main helpers
// ============================================================================

//! ## Overview
//! Validates the clap definitions and `read_bytes_with_limit`.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use clap::CommandFactory;
use clap::Parser;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::ReadLimitError;
use super::WorkerCommand;
use super::read_bytes_with_limit;

// ============================================================================
// SECTION: Argument Parsing
// ============================================================================

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn sign_accepts_negative_values_and_defaults_measurement() {
    let cli = Cli::try_parse_from([
        "weather-loader",
        "sign",
        "--location",
        "Cieszyn",
        "--value",
        "-3.5",
        "--secret",
        "ThisIsASecretKey",
    ])
    .unwrap();
    let Some(Commands::Sign(command)) = cli.command else {
        panic!("expected sign command");
    };
    assert_eq!(command.measurement, "temperature");
    assert_eq!(command.value, -3.5);
    assert!(command.timestamp.is_none());
}

#[test]
fn sign_rejects_secret_with_config() {
    let result = Cli::try_parse_from([
        "weather-loader",
        "sign",
        "--location",
        "Cieszyn",
        "--value",
        "1",
        "--secret",
        "s",
        "--config",
        "weather-loader.toml",
    ]);
    assert!(result.is_err());
}

#[test]
fn verify_requires_exactly_one_input_source() {
    assert!(Cli::try_parse_from(["weather-loader", "verify"]).is_err());
    assert!(
        Cli::try_parse_from(["weather-loader", "verify", "--input", "{}", "--file", "payload.json"])
            .is_err()
    );
    let cli =
        Cli::try_parse_from(["weather-loader", "verify", "--input", "e30=", "--base64"]).unwrap();
    let Some(Commands::Verify(command)) = cli.command else {
        panic!("expected verify command");
    };
    assert!(command.base64);
    assert_eq!(command.input.as_deref(), Some("e30="));
}

#[test]
fn nested_subcommands_parse() {
    let cli = Cli::try_parse_from(["weather-loader", "worker", "run"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Worker {
            command: WorkerCommand::Run(_)
        })
    ));
    let cli = Cli::try_parse_from(["weather-loader", "config", "example"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Config {
            command: ConfigCommand::Example
        })
    ));
    let cli = Cli::try_parse_from(["weather-loader", "report"]).unwrap();
    let Some(Commands::Report(command)) = cli.command else {
        panic!("expected report command");
    };
    assert_eq!(command.limit, weather_loader_core::DEFAULT_REPORT_LIMIT);
}

// ============================================================================
// SECTION: Bounded Reads
// ============================================================================

#[test]
fn read_bytes_with_limit_allows_small_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small.json");
    fs::write(&path, b"{\"ok\":true}").unwrap();
    let bytes = read_bytes_with_limit(&path, 64).unwrap();
    assert_eq!(bytes, b"{\"ok\":true}");
}

#[test]
fn read_bytes_with_limit_rejects_oversized_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("large.json");
    fs::write(&path, vec![b'a'; 65]).unwrap();
    match read_bytes_with_limit(&path, 64) {
        Err(ReadLimitError::TooLarge {
            size,
            limit,
        }) => {
            assert_eq!(size, 65);
            assert_eq!(limit, 64);
        }
        other => panic!("expected TooLarge, got {other:?}"),
    }
}

#[test]
fn read_bytes_with_limit_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_bytes_with_limit(&dir.path().join("missing.json"), 64);
    assert!(matches!(result, Err(ReadLimitError::Io(_))));
}
