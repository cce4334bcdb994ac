//! Error types and exit codes for aviutl2-check

use aviutl2_conformance::ConformanceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Library not found: {0}")]
    LibraryNotFound(String),

    #[error("Refusing to overwrite {0}")]
    AlreadyExists(String),
}

/// Exit code for a failed command.
///
/// 2: checks failed. 3: the library could not be loaded or exports nothing.
/// 4: the plugin refused to start. 5: bad configuration.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(cli) = error.downcast_ref::<CliError>() {
        return match cli {
            CliError::LibraryNotFound(_) => 3,
            CliError::AlreadyExists(_) => 5,
        };
    }
    match error.downcast_ref::<ConformanceError>() {
        Some(ConformanceError::ChecksFailed { .. }) => 2,
        Some(ConformanceError::Library(_) | ConformanceError::NoEntryPoint { .. }) => 3,
        Some(ConformanceError::VersionTooOld { .. } | ConformanceError::InitializationFailed) => 4,
        Some(ConformanceError::Io { .. } | ConformanceError::Json(_) | ConformanceError::InvalidPath(_)) => 5,
        _ => 1,
    }
}

/// Short machine-readable name of an error.
pub fn type_name(error: &anyhow::Error) -> &'static str {
    if let Some(cli) = error.downcast_ref::<CliError>() {
        return match cli {
            CliError::LibraryNotFound(_) => "library_not_found",
            CliError::AlreadyExists(_) => "already_exists",
        };
    }
    match error.downcast_ref::<ConformanceError>() {
        Some(ConformanceError::Library(_)) => "library",
        Some(ConformanceError::NoEntryPoint { .. }) => "no_entry_point",
        Some(ConformanceError::VersionTooOld { .. }) => "version_too_old",
        Some(ConformanceError::InitializationFailed) => "initialization_failed",
        Some(ConformanceError::Contract(_)) => "contract",
        Some(ConformanceError::Io { .. }) => "io",
        Some(ConformanceError::Json(_)) => "json",
        Some(ConformanceError::InvalidPath(_)) => "invalid_path",
        Some(ConformanceError::ChecksFailed { .. }) => "checks_failed",
        None => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_kind() {
        let failed = anyhow::Error::new(ConformanceError::ChecksFailed { failed: 1, total: 3 });
        assert_eq!(exit_code(&failed), 2);
        assert_eq!(type_name(&failed), "checks_failed");

        let version = anyhow::Error::new(ConformanceError::VersionTooOld {
            required: 2,
            host: 1,
        });
        assert_eq!(exit_code(&version), 4);

        let missing = anyhow::Error::new(CliError::LibraryNotFound("x.aui2".into()));
        assert_eq!(exit_code(&missing), 3);

        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 1);
        assert_eq!(type_name(&anyhow::anyhow!("plain")), "other");
    }

    #[test]
    fn context_keeps_the_code() {
        let error = anyhow::Error::new(ConformanceError::InitializationFailed).context("starting plugin");
        assert_eq!(exit_code(&error), 4);
    }
}
