//! The remote stack management interface.

use super::status::{StackDescription, StackEvent};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability acknowledging that the document creates IAM resources.
pub const CAPABILITY_IAM: &str = "CAPABILITY_IAM";

/// A create or update request as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSubmission {
    /// Target stack name.
    pub stack_name: String,
    /// Location of the uploaded document.
    pub template_url: String,
    /// Acknowledged capabilities.
    pub capabilities: Vec<String>,
    /// Idempotency token; a resubmission with the same token is a no-op.
    pub request_token: Uuid,
    /// When the request was made.
    pub submitted_at: DateTime<Utc>,
}

/// The backend's answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The operation was started.
    Submitted {
        /// The stack identifier.
        stack_id: String,
    },
    /// The document matches the deployed stack; nothing was started.
    NoChanges {
        /// The stack identifier.
        stack_id: String,
    },
}

/// Remote stack management operations.
///
/// Implementations classify failures as `RemoteTransient` (unreachable,
/// throttled, 5xx) or `RemoteRejected` (the request itself was refused).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StackBackend: Send + Sync {
    /// Describes a stack. `Ok(None)` means it does not exist.
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>>;

    /// Starts creating a stack.
    async fn create_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome>;

    /// Starts updating an existing stack.
    async fn update_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome>;

    /// Lists resource events recorded at or after `since`, oldest first.
    async fn stack_events(&self, _stack_name: &str, _since: DateTime<Utc>) -> Result<Vec<StackEvent>> {
        Ok(Vec::new())
    }
}
