//! `config`: create and validate configuration files

use std::path::{Path, PathBuf};

use anyhow::Result;
use aviutl2_conformance::ConformanceConfig;
use clap::{Subcommand, ValueEnum};

use crate::error::CliError;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file from a preset
    Init {
        /// Destination file
        path: PathBuf,

        /// Preset to start from
        #[arg(long, value_enum, default_value_t = Preset::Default)]
        preset: Preset,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load a configuration file and print the effective settings
    Show {
        /// Configuration file
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Default,
    Quick,
    Strict,
}

impl Preset {
    pub fn config(self) -> ConformanceConfig {
        match self {
            Self::Default => ConformanceConfig::default(),
            Self::Quick => ConformanceConfig::quick(),
            Self::Strict => ConformanceConfig::strict(),
        }
    }
}

pub fn execute(cmd: &ConfigCommands, json: bool) -> Result<()> {
    match cmd {
        ConfigCommands::Init { path, preset, force } => init(path, *preset, *force, json),
        ConfigCommands::Show { path } => {
            let config = ConformanceConfig::from_file(path)?;
            output::print_config(&config, json);
            Ok(())
        }
    }
}

fn init(path: &Path, preset: Preset, force: bool, json: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::AlreadyExists(path.display().to_string()).into());
    }
    let config = preset.config();
    config.to_file(path)?;
    output::print_success(&format!("Wrote {}", path.display()), json);
    Ok(())
}
