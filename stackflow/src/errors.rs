//! Error types for stackflow.
//!
//! Every failure surfaced by the core falls into one of a small number of
//! classes, and each class carries a fixed retry policy: malformed input and
//! build defects are never retried, transient remote failures and I/O may be
//! retried by re-running the whole provision call, and timeouts must be
//! re-checked against the backend rather than resubmitted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

/// The main error type for provisioning and convergence.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A caller-supplied or environment-derived value could not be parsed.
    #[error("Malformed input `{field}`: {message}")]
    MalformedInput {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// The builders produced an internally inconsistent graph or topology.
    #[error("{0}")]
    BuildDefect(#[from] BuildDefectError),

    /// A rendered document could not be read back or was structurally invalid.
    #[error("Malformed document: {message}")]
    MalformedDocument {
        /// Description of the problem.
        message: String,
    },

    /// A local filesystem operation failed.
    #[error("IO error while {context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The remote backend was unreachable or temporarily unavailable.
    #[error("Remote backend unavailable during {operation}: {message}")]
    RemoteTransient {
        /// The remote operation.
        operation: String,
        /// Backend or transport message.
        message: String,
    },

    /// The remote backend refused the request.
    #[error("Remote backend rejected {operation}: {message}")]
    RemoteRejected {
        /// The remote operation.
        operation: String,
        /// Backend message, verbatim.
        message: String,
    },

    /// The stack reached a failed terminal status.
    #[error("Stack '{stack_name}' failed to converge: {reason}")]
    StackFailed {
        /// The stack name.
        stack_name: String,
        /// Failure reason reported by the backend, verbatim.
        reason: String,
    },

    /// Polling gave up before a terminal status was observed.
    #[error("Timed out after {waited:?} waiting for stack '{stack_name}' (last status: {last_status})")]
    Timeout {
        /// The stack name.
        stack_name: String,
        /// How long the engine waited.
        waited: Duration,
        /// The last status observed.
        last_status: String,
    },

    /// Another operation already drives the stack.
    #[error("Conflict on stack '{stack_name}': {message}")]
    Conflict {
        /// The stack name.
        stack_name: String,
        /// Description of the conflicting operation.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Broad error classes used for exit handling and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Bad caller or environment input.
    MalformedInput,
    /// Internal inconsistency in builder output.
    BuildDefect,
    /// Local filesystem failure.
    Io,
    /// Backend unavailable.
    RemoteTransient,
    /// Backend refused the request or the stack failed.
    RemoteRejected,
    /// Poll deadline expired.
    Timeout,
    /// Concurrent operation on the same stack.
    Conflict,
}

impl ProvisionError {
    /// Creates a malformed input error.
    #[must_use]
    pub fn malformed_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed document error.
    #[must_use]
    pub fn malformed_document(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }

    /// Wraps an I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a transient remote error.
    #[must_use]
    pub fn remote_transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteTransient {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a rejected remote error.
    #[must_use]
    pub fn remote_rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteRejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(stack_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            stack_name: stack_name.into(),
            message: message.into(),
        }
    }

    /// Returns the error class.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MalformedInput { .. } => ErrorClass::MalformedInput,
            Self::BuildDefect(_) | Self::MalformedDocument { .. } | Self::Serialization(_) => {
                ErrorClass::BuildDefect
            }
            Self::Io { .. } => ErrorClass::Io,
            Self::RemoteTransient { .. } => ErrorClass::RemoteTransient,
            Self::RemoteRejected { .. } | Self::StackFailed { .. } => ErrorClass::RemoteRejected,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::Conflict { .. } => ErrorClass::Conflict,
        }
    }

    /// Returns true if re-running the whole provision call may succeed.
    ///
    /// A timeout counts as retryable, but the stack must be re-checked first:
    /// the remote operation may still be in flight.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::RemoteTransient | ErrorClass::Io | ErrorClass::Timeout
        )
    }
}

/// Diagnostic metadata attached to build defects.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "GRAPH-001-DANGLING_REF").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Diagnostic codes for build defects.
pub mod codes {
    /// A reference names a resource or parameter that does not exist.
    pub const DANGLING_REFERENCE: &str = "GRAPH-001-DANGLING_REF";
    /// A resource or parameter name was registered twice.
    pub const DUPLICATE_NAME: &str = "GRAPH-002-DUPLICATE";
    /// An attribute reference targets a parameter.
    pub const ATTRIBUTE_OF_PARAMETER: &str = "GRAPH-003-ATTRIBUTE_OF_PARAMETER";
    /// An action consumes an artifact not produced before it.
    pub const UNPRODUCED_ARTIFACT: &str = "TOPOLOGY-001-UNPRODUCED_ARTIFACT";
    /// Two stages share a name.
    pub const DUPLICATE_STAGE: &str = "TOPOLOGY-002-DUPLICATE_STAGE";
    /// Two actions in one stage share a name.
    pub const DUPLICATE_ACTION: &str = "TOPOLOGY-003-DUPLICATE_ACTION";
    /// An artifact is produced more than once.
    pub const DUPLICATE_ARTIFACT: &str = "TOPOLOGY-004-DUPLICATE_ARTIFACT";
    /// A run-order of zero.
    pub const INVALID_RUN_ORDER: &str = "TOPOLOGY-005-RUN_ORDER";
    /// A topology or stage with nothing in it.
    pub const EMPTY: &str = "TOPOLOGY-006-EMPTY";
}

/// Error raised when builder output violates a graph or topology invariant.
#[derive(Debug, Clone, Error)]
#[error("Build defect: {message}")]
pub struct BuildDefectError {
    /// The error message.
    pub message: String,
    /// Names of the resources, stages or actions involved.
    pub subjects: Vec<String>,
    /// Optional diagnostic info.
    pub error_info: Option<ErrorInfo>,
}

impl BuildDefectError {
    /// Creates a new build defect.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            subjects: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the subjects involved.
    #[must_use]
    pub fn with_subjects(mut self, subjects: Vec<String>) -> Self {
        self.subjects = subjects;
        self
    }

    /// Sets the diagnostic info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the diagnostic code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}
