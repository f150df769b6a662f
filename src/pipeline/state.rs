//! Workflow progress values and run outcomes.
//!
//! [`WorkflowProgress`] is the status shown to the client. The orchestrator
//! produces a fresh value at each step rather than mutating shared state;
//! [`ProgressTracker`] refuses any value that would move backwards.
//!
//! ```text
//! Starting ──▶ 0 / N ──▶ 1 / N ──▶ … ──▶ N / N ──▶ Generating Analysis ──▶ Complete
//! Starting ──────────────────────────────────────────────────────────────▶ Complete   (suggest)
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// WorkflowProgress
// ---------------------------------------------------------------------------

/// Pipeline phase as reported to the client.
///
/// The derived ordering is the order phases are reached in, so a run's
/// progress values must be strictly increasing.
///
/// ```
/// use proofreader::pipeline::WorkflowProgress;
///
/// let p = WorkflowProgress::Units { completed: 2, total: 5 };
/// assert_eq!(p.to_string(), "2 / 5");
/// assert!(WorkflowProgress::Starting < p);
/// assert!(p < WorkflowProgress::GeneratingAnalysis);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkflowProgress {
    Starting,
    Units { completed: usize, total: usize },
    GeneratingAnalysis,
    Complete,
}

impl fmt::Display for WorkflowProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowProgress::Starting => f.write_str("Starting"),
            WorkflowProgress::Units { completed, total } => write!(f, "{completed} / {total}"),
            WorkflowProgress::GeneratingAnalysis => f.write_str("Generating Analysis"),
            WorkflowProgress::Complete => f.write_str("Complete"),
        }
    }
}

impl Serialize for WorkflowProgress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// ProgressTracker
// ---------------------------------------------------------------------------

/// Last progress value of one run.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    current: Option<WorkflowProgress>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `next` if it is strictly ahead of the current value.
    ///
    /// Returns `None` (and logs) for a repeat or a regression.
    pub fn advance(&mut self, next: WorkflowProgress) -> Option<WorkflowProgress> {
        match self.current {
            Some(current) if next <= current => {
                log::warn!("progress: refusing to move from {current} to {next}");
                None
            }
            _ => {
                self.current = Some(next);
                Some(next)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowOutcome
// ---------------------------------------------------------------------------

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// `Complete` was emitted.
    Completed,
    /// The request failed validation; no provider call was made.
    Rejected,
    /// A fatal provider error was reported to the client.
    Failed,
    /// The client went away or the run was cancelled.
    Cancelled,
}

impl WorkflowOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowOutcome::Completed => "completed",
            WorkflowOutcome::Rejected => "rejected",
            WorkflowOutcome::Failed => "failed",
            WorkflowOutcome::Cancelled => "cancelled",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(WorkflowProgress::Starting.to_string(), "Starting");
        assert_eq!(
            WorkflowProgress::Units { completed: 0, total: 3 }.to_string(),
            "0 / 3"
        );
        assert_eq!(
            WorkflowProgress::GeneratingAnalysis.to_string(),
            "Generating Analysis"
        );
        assert_eq!(WorkflowProgress::Complete.to_string(), "Complete");
    }

    #[test]
    fn ordering_follows_phases() {
        let sequence = [
            WorkflowProgress::Starting,
            WorkflowProgress::Units { completed: 0, total: 2 },
            WorkflowProgress::Units { completed: 1, total: 2 },
            WorkflowProgress::Units { completed: 2, total: 2 },
            WorkflowProgress::GeneratingAnalysis,
            WorkflowProgress::Complete,
        ];
        assert!(sequence.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn serialises_as_status_string() {
        let json = serde_json::to_string(&WorkflowProgress::Units { completed: 1, total: 4 }).unwrap();
        assert_eq!(json, "\"1 / 4\"");
    }

    #[test]
    fn tracker_refuses_regressions_and_repeats() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(
            tracker.advance(WorkflowProgress::Starting),
            Some(WorkflowProgress::Starting)
        );
        assert!(tracker.advance(WorkflowProgress::GeneratingAnalysis).is_some());
        assert!(tracker
            .advance(WorkflowProgress::Units { completed: 1, total: 1 })
            .is_none());
        assert!(tracker.advance(WorkflowProgress::GeneratingAnalysis).is_none());
        assert!(tracker
            .advance(WorkflowProgress::Units { completed: 2, total: 2 })
            .is_none());
        assert!(tracker.advance(WorkflowProgress::Complete).is_some());
    }
}
