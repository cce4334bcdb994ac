//! Check outcomes and the run report.

use std::fmt;

use serde::Serialize;

/// Result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// The contract holds.
    Pass,
    /// The contract is broken.
    Fail,
    /// Observed behaviour differs from the documented contract in a way the
    /// contract leaves undefined.
    Gap,
    /// Not applicable to this plugin.
    Skipped,
}

impl CheckStatus {
    /// Whether this status fails the run.
    pub fn is_failure(self, strict: bool) -> bool {
        match self {
            Self::Pass => false,
            Self::Fail => true,
            Self::Gap | Self::Skipped => strict,
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Gap => "GAP",
            Self::Skipped => "SKIP",
        };
        f.write_str(text)
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    /// Check name, e.g. `filter_items`.
    pub name: String,
    /// Result.
    pub status: CheckStatus,
    /// Human-readable detail.
    pub detail: String,
}

impl CheckOutcome {
    /// Passing outcome.
    pub fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Pass, detail)
    }

    /// Failing outcome.
    pub fn fail(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, detail)
    }

    /// Conformance gap.
    pub fn gap(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Gap, detail)
    }

    /// Skipped check.
    pub fn skipped(name: &str, detail: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Skipped, detail)
    }

    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

/// All outcomes of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConformanceReport {
    /// Library path or plugin name.
    pub plugin: String,
    /// Host version simulated.
    pub host_version: u32,
    /// Whether gaps and skips count as failures.
    pub strict: bool,
    /// Outcomes in run order.
    pub outcomes: Vec<CheckOutcome>,
}

impl ConformanceReport {
    /// Empty report.
    pub fn new(plugin: impl Into<String>, host_version: u32, strict: bool) -> Self {
        Self {
            plugin: plugin.into(),
            host_version,
            strict,
            outcomes: Vec::new(),
        }
    }

    /// Append an outcome and log it.
    pub fn push(&mut self, outcome: CheckOutcome) {
        match outcome.status {
            CheckStatus::Fail => {
                tracing::warn!(check = %outcome.name, detail = %outcome.detail, "check failed");
            }
            status => {
                tracing::debug!(check = %outcome.name, %status, detail = %outcome.detail, "check finished");
            }
        }
        self.outcomes.push(outcome);
    }

    /// Outcome of the named check.
    pub fn outcome(&self, name: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    /// Number of outcomes that fail the run.
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_failure(self.strict))
            .count()
    }

    /// Whether the run passed.
    pub fn passed(&self) -> bool {
        self.failures() == 0
    }

    /// Count of each status, in `Pass, Fail, Gap, Skipped` order.
    pub fn counts(&self) -> [usize; 4] {
        let count = |s| self.outcomes.iter().filter(|o| o.status == s).count();
        [
            count(CheckStatus::Pass),
            count(CheckStatus::Fail),
            count(CheckStatus::Gap),
            count(CheckStatus::Skipped),
        ]
    }
}
