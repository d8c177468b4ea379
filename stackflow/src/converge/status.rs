//! Remote stack statuses and descriptions.

use crate::errors::ProvisionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status reported by the stack backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    /// Creation running.
    CreateInProgress,
    /// Creation succeeded.
    CreateComplete,
    /// Creation failed.
    CreateFailed,
    /// Creation failed and is being rolled back.
    RollbackInProgress,
    /// Creation failed and was rolled back.
    RollbackComplete,
    /// Rollback of a failed creation failed.
    RollbackFailed,
    /// Update running.
    UpdateInProgress,
    /// Update finished; old resources are being removed.
    UpdateCompleteCleanupInProgress,
    /// Update succeeded.
    UpdateComplete,
    /// Update failed.
    UpdateFailed,
    /// Update failed and is being rolled back.
    UpdateRollbackInProgress,
    /// Rolled back update; old resources are being removed.
    UpdateRollbackCompleteCleanupInProgress,
    /// Update failed and was rolled back.
    UpdateRollbackComplete,
    /// Rollback of a failed update failed.
    UpdateRollbackFailed,
    /// Deletion running.
    DeleteInProgress,
    /// Deletion succeeded.
    DeleteComplete,
    /// Deletion failed.
    DeleteFailed,
    /// Change set created but not executed.
    ReviewInProgress,
}

const ALL: [StackStatus; 18] = [
    StackStatus::CreateInProgress,
    StackStatus::CreateComplete,
    StackStatus::CreateFailed,
    StackStatus::RollbackInProgress,
    StackStatus::RollbackComplete,
    StackStatus::RollbackFailed,
    StackStatus::UpdateInProgress,
    StackStatus::UpdateCompleteCleanupInProgress,
    StackStatus::UpdateComplete,
    StackStatus::UpdateFailed,
    StackStatus::UpdateRollbackInProgress,
    StackStatus::UpdateRollbackCompleteCleanupInProgress,
    StackStatus::UpdateRollbackComplete,
    StackStatus::UpdateRollbackFailed,
    StackStatus::DeleteInProgress,
    StackStatus::DeleteComplete,
    StackStatus::DeleteFailed,
    StackStatus::ReviewInProgress,
];

impl StackStatus {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::CreateFailed => "CREATE_FAILED",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::ReviewInProgress => "REVIEW_IN_PROGRESS",
        }
    }

    /// Returns true while the backend is still working on the stack.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS")
    }

    /// Returns true for terminal statuses that mean the requested change
    /// did not take effect.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::CreateFailed
                | Self::RollbackComplete
                | Self::RollbackFailed
                | Self::UpdateFailed
                | Self::UpdateRollbackComplete
                | Self::UpdateRollbackFailed
                | Self::DeleteFailed
                | Self::DeleteComplete
        )
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackStatus {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL.iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ProvisionError::remote_rejected("describe_stack", format!("unknown stack status '{s}'")))
    }
}

/// The backend's view of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescription {
    /// Backend-assigned identifier.
    pub stack_id: String,
    /// Stack name.
    pub stack_name: String,
    /// Current status.
    pub status: StackStatus,
    /// Explanation attached to the status, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
}

impl StackDescription {
    /// Creates a description without a reason.
    #[must_use]
    pub fn new(stack_id: impl Into<String>, stack_name: impl Into<String>, status: StackStatus) -> Self {
        Self {
            stack_id: stack_id.into(),
            stack_name: stack_name.into(),
            status,
            status_reason: None,
        }
    }

    /// Sets the status reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }
}

/// A resource-level event recorded against a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
    /// Logical resource name.
    pub resource: String,
    /// Resource status, verbatim.
    pub status: String,
    /// Resource status reason, verbatim.
    #[serde(default)]
    pub reason: Option<String>,
}

impl StackEvent {
    /// Returns true if the event records a failed resource operation.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.ends_with("_FAILED")
    }
}
