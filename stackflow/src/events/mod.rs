//! Provisioning lifecycle events.
//!
//! Every step of a provision run is reported to an [`EventSink`]. Sinks are
//! passed in explicitly; the default logs through `tracing`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The steps a provision run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The resource graph was built.
    #[serde(rename = "provision.graph_built")]
    GraphBuilt,
    /// The pipeline topology was built.
    #[serde(rename = "provision.topology_built")]
    TopologyBuilt,
    /// The document and profile configurations were written locally.
    #[serde(rename = "provision.document_staged")]
    DocumentStaged,
    /// A dry run stopped after staging.
    #[serde(rename = "provision.dry_run")]
    DryRun,
    /// The staged document reached the artifact bucket.
    #[serde(rename = "provision.uploaded")]
    Uploaded,
    /// The run finished.
    #[serde(rename = "provision.completed")]
    Completed,
    /// The run failed.
    #[serde(rename = "provision.failed")]
    Failed,
    /// A create or update was accepted by the backend.
    #[serde(rename = "stack.submitted")]
    StackSubmitted,
    /// A poll observed an in-flight status.
    #[serde(rename = "stack.polled")]
    StackPolled,
    /// The stack reached a successful terminal status.
    #[serde(rename = "stack.converged")]
    StackConverged,
    /// The stack reached a failed terminal status.
    #[serde(rename = "stack.failed")]
    StackFailed,
}

impl EventKind {
    /// Returns the dotted event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GraphBuilt => "provision.graph_built",
            Self::TopologyBuilt => "provision.topology_built",
            Self::DocumentStaged => "provision.document_staged",
            Self::DryRun => "provision.dry_run",
            Self::Uploaded => "provision.uploaded",
            Self::Completed => "provision.completed",
            Self::Failed => "provision.failed",
            Self::StackSubmitted => "stack.submitted",
            Self::StackPolled => "stack.polled",
            Self::StackConverged => "stack.converged",
            Self::StackFailed => "stack.failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
