//! `check`: run the conformance suite

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aviutl2_conformance::{ConformanceConfig, ensure_passed, run_library};

use crate::output;

/// Options collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub config: Option<PathBuf>,
    pub inputs: Vec<PathBuf>,
    pub strict: bool,
    pub quick: bool,
    pub host_version: Option<u32>,
}

impl CheckOptions {
    /// Effective configuration: file or preset, then command-line overrides.
    pub fn resolve(&self) -> Result<ConformanceConfig> {
        let mut config = match &self.config {
            Some(path) => ConformanceConfig::from_file(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None if self.quick => ConformanceConfig::quick(),
            None => ConformanceConfig::default(),
        };
        config.input_files.extend(self.inputs.iter().cloned());
        config.strict |= self.strict;
        if let Some(version) = self.host_version {
            config.host_version = version;
        }
        Ok(config)
    }
}

pub fn execute(library: &Path, options: &CheckOptions, json: bool) -> Result<()> {
    super::require_library(library)?;
    let config = options.resolve()?;
    tracing::info!(library = %library.display(), strict = config.strict, "running conformance checks");

    let report = run_library(library, &config)?;
    output::print_report(&report, json);
    ensure_passed(&report)?;
    Ok(())
}
