//! aviutl2-check - conformance runner for AviUtl ExEdit2 plugins
//!
//! Loads a plugin library into a simulated host, drives every lifecycle hook
//! and module table it exports, and reports where it breaks the host's
//! calling contract.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod completion;
mod error;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::ConfigCommands;

#[derive(Parser)]
#[command(name = "aviutl2-check")]
#[command(about = "Conformance checks for AviUtl ExEdit2 plugins")]
#[command(version)]
#[command(long_about = "
aviutl2-check loads a plugin library (.aui2, .auo2, .auf2, .mod2 or .aux2)
into a simulated host and verifies the contracts the host relies on:
lifecycle order, registration, filter items, input thread safety and
track selection, edit section exclusion, project storage, script
functions and output abort handling.

Use --json for machine-readable output suitable for CI.
")]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every conformance check against a plugin library
    Check {
        /// Plugin library to load
        library: PathBuf,

        /// Conformance configuration file (JSON)
        #[arg(short, long, env = "AVIUTL2_CHECK_CONFIG")]
        config: Option<PathBuf>,

        /// Media file the input plugin should open (repeatable)
        #[arg(short, long = "input")]
        inputs: Vec<PathBuf>,

        /// Treat gaps and skipped checks as failures
        #[arg(long)]
        strict: bool,

        /// Use the fast smoke-run preset
        #[arg(long, conflicts_with = "config")]
        quick: bool,

        /// Simulated host version
        #[arg(long)]
        host_version: Option<u32>,
    },

    /// Show the entry points and registrations of a plugin library
    Inspect {
        /// Plugin library to load
        library: PathBuf,
    },

    /// List the checks in run order
    Checks,

    /// Conformance configuration files
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_env| format!("aviutl2_conformance={log_level},aviutl2_check={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    if let Err(e) = execute_command(&cli) {
        if cli.json {
            output::print_error_json(&e);
        } else {
            output::print_error_human(&e);
        }
        std::process::exit(error::exit_code(&e));
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Check {
            library,
            config,
            inputs,
            strict,
            quick,
            host_version,
        } => {
            let options = commands::check::CheckOptions {
                config: config.clone(),
                inputs: inputs.clone(),
                strict: *strict,
                quick: *quick,
                host_version: *host_version,
            };
            commands::check::execute(library, &options, cli.json)
        }
        Commands::Inspect { library } => commands::inspect::execute(library, cli.json),
        Commands::Checks => {
            output::print_check_names(cli.json);
            Ok(())
        }
        Commands::Config(cmd) => commands::config::execute(cmd, cli.json),
        Commands::Completion { shell } => {
            completion::generate_completion(*shell);
            Ok(())
        }
    }
}
