//! `inspect`: list what a plugin library exports and registers

use std::path::Path;

use anyhow::Result;
use aviutl2_conformance::{ConformanceConfig, PluginLibrary, PluginSession};

use crate::output;

pub fn execute(library: &Path, json: bool) -> Result<()> {
    super::require_library(library)?;
    let loaded = PluginLibrary::load(library)?;
    let entry = loaded.entry_points();
    let exported = entry.exported();

    let mut session = PluginSession::start(library.display().to_string(), entry, &ConformanceConfig::default())?;
    let summary = session.summary();
    session.finish();

    output::print_summary(library, &exported, &summary, json);
    Ok(())
}
