//! Convergence state machine for a single stack.

use super::status::StackStatus;
use serde::{Deserialize, Serialize};

/// The single remote call the engine makes for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPlan {
    /// The stack does not exist yet.
    Create,
    /// The stack exists in a terminal state.
    Update,
}

impl SubmitPlan {
    /// Returns the plan name as used in logs and events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

/// Where a stack is in its convergence.
///
/// ```text
/// Absent --create--> Creating --> Ready | Failed
/// Ready | Failed --update--> Updating --> Ready | Failed
/// remote in-flight status --> Conflict
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergencePhase {
    /// No stack exists.
    Absent,
    /// A create was submitted and has not finished.
    Creating,
    /// An update was submitted and has not finished.
    Updating,
    /// The stack is in a successful terminal status.
    Ready {
        /// The observed status.
        status: StackStatus,
    },
    /// The stack is in a failed terminal status.
    Failed {
        /// The observed status.
        status: StackStatus,
    },
    /// Some other operation is driving the stack.
    Conflict {
        /// The observed in-flight status.
        status: StackStatus,
    },
}

impl ConvergencePhase {
    /// Derives the starting phase from an initial describe.
    #[must_use]
    pub fn from_observed(status: Option<StackStatus>) -> Self {
        match status {
            None | Some(StackStatus::DeleteComplete) => Self::Absent,
            Some(status) if status.is_in_progress() => Self::Conflict { status },
            Some(status) if status.is_failure() => Self::Failed { status },
            Some(status) => Self::Ready { status },
        }
    }

    /// Returns the call to make from this phase, or `None` if no
    /// submission is allowed.
    #[must_use]
    pub fn submit(&self) -> Option<SubmitPlan> {
        match self {
            Self::Absent => Some(SubmitPlan::Create),
            Self::Ready { .. } | Self::Failed { .. } => Some(SubmitPlan::Update),
            Self::Creating | Self::Updating | Self::Conflict { .. } => None,
        }
    }

    /// The phase after a submission was accepted.
    #[must_use]
    pub fn submitted(plan: SubmitPlan) -> Self {
        match plan {
            SubmitPlan::Create => Self::Creating,
            SubmitPlan::Update => Self::Updating,
        }
    }

    /// Applies a polled status to an in-flight phase.
    ///
    /// Phases that are not waiting on a submission are unchanged.
    #[must_use]
    pub fn observe(self, status: StackStatus) -> Self {
        match self {
            Self::Creating | Self::Updating => {
                if status.is_in_progress() {
                    self
                } else if status.is_failure() {
                    Self::Failed { status }
                } else {
                    Self::Ready { status }
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_plans_create() {
        let phase = ConvergencePhase::from_observed(None);
        assert_eq!(phase, ConvergencePhase::Absent);
        assert_eq!(phase.submit(), Some(SubmitPlan::Create));
        assert_eq!(
            ConvergencePhase::from_observed(Some(StackStatus::DeleteComplete)).submit(),
            Some(SubmitPlan::Create)
        );
    }

    #[test]
    fn test_terminal_states_plan_update() {
        for status in [StackStatus::CreateComplete, StackStatus::UpdateComplete] {
            let phase = ConvergencePhase::from_observed(Some(status));
            assert_eq!(phase, ConvergencePhase::Ready { status });
            assert_eq!(phase.submit(), Some(SubmitPlan::Update));
        }
        let failed = ConvergencePhase::from_observed(Some(StackStatus::UpdateRollbackComplete));
        assert!(matches!(failed, ConvergencePhase::Failed { .. }));
        assert_eq!(failed.submit(), Some(SubmitPlan::Update));
    }

    #[test]
    fn test_in_flight_is_conflict() {
        let phase = ConvergencePhase::from_observed(Some(StackStatus::UpdateInProgress));
        assert_eq!(
            phase,
            ConvergencePhase::Conflict {
                status: StackStatus::UpdateInProgress
            }
        );
        assert_eq!(phase.submit(), None);
        assert_eq!(phase.observe(StackStatus::UpdateComplete), phase);
    }

    #[test]
    fn test_creating_transitions() {
        let creating = ConvergencePhase::submitted(SubmitPlan::Create);
        assert_eq!(creating.submit(), None);

        let still = creating.observe(StackStatus::CreateInProgress);
        assert_eq!(still, ConvergencePhase::Creating);

        let done = still.observe(StackStatus::CreateComplete);
        assert_eq!(
            done,
            ConvergencePhase::Ready {
                status: StackStatus::CreateComplete
            }
        );
        assert_eq!(done.submit(), Some(SubmitPlan::Update));

        let failed = creating.observe(StackStatus::RollbackComplete);
        assert!(matches!(failed, ConvergencePhase::Failed { .. }));
    }

    #[test]
    fn test_updating_cleanup_is_still_in_flight() {
        let updating = ConvergencePhase::submitted(SubmitPlan::Update);
        assert_eq!(
            updating.observe(StackStatus::UpdateCompleteCleanupInProgress),
            ConvergencePhase::Updating
        );
        assert!(matches!(
            updating.observe(StackStatus::UpdateRollbackComplete),
            ConvergencePhase::Failed { .. }
        ));
    }

    #[test]
    fn test_observe_ignores_settled_phases() {
        let ready = ConvergencePhase::Ready {
            status: StackStatus::CreateComplete,
        };
        assert_eq!(ready.observe(StackStatus::UpdateFailed), ready);
    }
}
