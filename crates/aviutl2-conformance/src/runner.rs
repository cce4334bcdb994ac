//! Whole-plugin runs.

use std::path::Path;

use crate::checks::{self, names};
use crate::config::ConformanceConfig;
use crate::error::{ConformanceError, Result};
use crate::loader::{EntryPoints, PluginLibrary};
use crate::mock::RegistrationState;
use crate::report::{CheckOutcome, ConformanceReport};
use crate::session::PluginSession;

/// Name of the outcome recorded after `UninitializePlugin`.
pub const UNLOAD: &str = "unload";

/// Load the library at `path` and run every check against it.
///
/// # Errors
///
/// Fails if the library cannot be loaded or the plugin refuses to start.
/// Check failures are recorded in the report, not returned.
pub fn run_library(path: &Path, config: &ConformanceConfig) -> Result<ConformanceReport> {
    let library = PluginLibrary::load(path)?;
    tracing::info!(path = %path.display(), exports = ?library.entry_points().exported(), "library loaded");
    let report = run_entry_points(&path.display().to_string(), library.entry_points(), config);
    drop(library);
    report
}

/// Run every check against already-resolved entry points.
///
/// # Errors
///
/// As for [`run_library`].
pub fn run_entry_points(name: &str, entry: EntryPoints, config: &ConformanceConfig) -> Result<ConformanceReport> {
    let mut session = PluginSession::start(name, entry, config)?;
    let mut report = ConformanceReport::new(name, config.host_version, config.strict);
    for outcome in checks::run_all(&session, config) {
        report.push(outcome);
    }
    report.push(check_unload(&mut session));
    let [pass, fail, gap, skipped] = report.counts();
    tracing::info!(plugin = name, pass, fail, gap, skipped, "conformance run finished");
    Ok(report)
}

/// `UninitializePlugin` runs last and exactly once.
fn check_unload(session: &mut PluginSession) -> CheckOutcome {
    let state = session.finish();
    let again = session.finish();
    match (state, again) {
        (RegistrationState::Unloaded, RegistrationState::Unloaded) if session.lifecycle().is_ordered() => {
            CheckOutcome::pass(UNLOAD, format!("{:?}", session.lifecycle().events()))
        }
        _ => CheckOutcome::fail(UNLOAD, format!("state after unload: {state:?}")),
    }
}

/// Turn a report into an error if it did not pass.
///
/// # Errors
///
/// [`ConformanceError::ChecksFailed`] when any outcome fails the run.
pub fn ensure_passed(report: &ConformanceReport) -> Result<()> {
    if report.passed() {
        Ok(())
    } else {
        Err(ConformanceError::ChecksFailed {
            failed: report.failures(),
            total: report.outcomes.len(),
        })
    }
}

/// Every check name in run order, including [`UNLOAD`].
pub fn check_names() -> [&'static str; 13] {
    [
        names::LIFECYCLE,
        names::REGISTRATION,
        names::FILTER_ITEMS,
        names::FILTER_PROCESS,
        names::INPUT_READ,
        names::INPUT_CONCURRENCY,
        names::INPUT_TRACKS,
        names::EDIT_EXCLUSION,
        names::PROJECT_ROUND_TRIP,
        names::PROJECT_BINARY_LIMIT,
        names::SCRIPT_FUNCTIONS,
        names::OUTPUT_ABORT,
        UNLOAD,
    ]
}
