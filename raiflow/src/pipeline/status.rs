//! Pair and run lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// State of one (assessment, artifacts) pair.
///
/// Moves forward only: `Pending -> Running -> {Succeeded, Failed}`, or
/// `Pending -> Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// Not started.
    #[default]
    Pending,
    /// Running.
    Running,
    /// Finished with valid evidence.
    Succeeded,
    /// Finished with a failure record.
    Failed,
    /// Never started.
    Skipped,
}

impl PairStatus {
    /// Returns true for `Succeeded`, `Failed` and `Skipped`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Returns true if moving to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Skipped)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

impl fmt::Display for PairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// A rejected status regression or jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid pair transition {from} -> {to}")]
pub struct InvalidTransition {
    /// Current status.
    pub from: PairStatus,
    /// Requested status.
    pub to: PairStatus,
}

/// State of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Not started.
    #[default]
    Pending,
    /// Pairs are executing.
    Running,
    /// Every attempted pair succeeded, or nothing was attempted.
    Complete,
    /// At least one pair succeeded and at least one failed.
    Partial,
    /// Every attempted pair failed.
    Failed,
}

impl RunStatus {
    /// Final status from the attempted pair counts. Skipped pairs are not
    /// attempted.
    #[must_use]
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::Complete,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }

    /// Returns true for `Complete`, `Partial` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Partial | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Complete => write!(f, "complete"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_transitions_are_monotonic() {
        use PairStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));

        assert!(!Running.can_transition_to(Pending));
        assert!(!Running.can_transition_to(Skipped));
        assert!(!Succeeded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Succeeded));
    }

    #[test]
    fn test_run_status_from_counts() {
        assert_eq!(RunStatus::from_counts(0, 0), RunStatus::Complete);
        assert_eq!(RunStatus::from_counts(3, 0), RunStatus::Complete);
        assert_eq!(RunStatus::from_counts(2, 1), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(0, 2), RunStatus::Failed);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&RunStatus::Partial).unwrap(), "\"partial\"");
        assert_eq!(serde_json::to_string(&PairStatus::Succeeded).unwrap(), "\"succeeded\"");
    }
}
