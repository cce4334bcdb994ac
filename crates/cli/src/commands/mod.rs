//! Command implementations

pub mod check;
pub mod config;
pub mod inspect;

pub use config::ConfigCommands;

use std::path::Path;

use anyhow::Result;

use crate::error::CliError;

/// Fail early with a clear error when the library path does not exist.
fn require_library(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(CliError::LibraryNotFound(path.display().to_string()).into());
    }
    Ok(())
}
