//! Resource release errors.

use std::fmt;

use thiserror::Error;

use crate::driver::VendorError;

/// Result type for releasing a resource handle.
pub type ReleaseResult = Result<(), ReleaseError>;

/// One step of releasing a resource handle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseStep {
    CloseCursor,
    CloseStatement,
    Rollback,
    RestoreAutoCommit,
    CloseConnection,
}

impl fmt::Display for ReleaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReleaseStep::CloseCursor => "close cursor",
            ReleaseStep::CloseStatement => "close statement",
            ReleaseStep::Rollback => "roll back",
            ReleaseStep::RestoreAutoCommit => "restore auto-commit",
            ReleaseStep::CloseConnection => "close connection",
        };
        f.write_str(name)
    }
}

/// A single failed release step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFailure {
    pub step: ReleaseStep,
    pub source: VendorError,
}

/// Every step that failed while releasing a handle. The remaining steps
/// still ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} release step(s) failed: {}", .failures.len(), failures_display(.failures))]
pub struct ReleaseError {
    pub failures: Vec<ReleaseFailure>,
}

fn failures_display(failures: &[ReleaseFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.step, f.source))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ReleaseError {
    /// Whether `step` is among the failures.
    pub fn failed(&self, step: ReleaseStep) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_all_failures() {
        let err = ReleaseError {
            failures: vec![
                ReleaseFailure {
                    step: ReleaseStep::CloseStatement,
                    source: VendorError::new(90007, "already closed"),
                },
                ReleaseFailure {
                    step: ReleaseStep::CloseConnection,
                    source: VendorError::new(90067, "connection broken"),
                },
            ],
        };

        let text = err.to_string();
        assert!(text.starts_with("2 release step(s) failed"));
        assert!(text.contains("close statement: already closed"));
        assert!(text.contains("close connection: connection broken"));
        assert!(err.failed(ReleaseStep::CloseConnection));
        assert!(!err.failed(ReleaseStep::RestoreAutoCommit));
    }
}
