//! # Stackflow
//!
//! Synthesizes a continuous-delivery pipeline for a service and converges the
//! stack that holds it.
//!
//! Stackflow provides:
//!
//! - **Resource graph**: artifact bucket, pipeline roles and build project,
//!   with cross-resource references checked before anything is written
//! - **Pipeline topology**: source, build, test and production stages with
//!   ordered actions and artifact flow validation
//! - **Rendering**: one JSON infrastructure document, staged atomically
//! - **Convergence**: exactly one create or update per request, polled to a
//!   terminal status under a caller deadline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackflow::prelude::*;
//!
//! let options = ProvisionOptions::new(
//!     "widget",
//!     "delivery",
//!     "https://github.com/acme/widget",
//!     token,
//!     "acme-artifacts",
//! )
//! .with_dry_run(true);
//!
//! let outcome = Provisioner::new(ProvisionerConfig::from_env()?)
//!     .provision(&options)
//!     .await?;
//! println!("staged {}", outcome.staged_path.display());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod converge;
pub mod errors;
pub mod events;
pub mod graph;
pub mod observability;
pub mod options;
pub mod profiles;
pub mod provision;
pub mod render;
pub mod source;
pub mod template;
pub mod topology;
pub mod upload;

#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ProvisionerConfig;
    pub use crate::context::BuildContext;
    pub use crate::converge::{
        ConvergenceEngine, ConvergenceOutcome, ConvergencePhase, ConvergenceRequest, PollPolicy,
        StackBackend, StackLockRegistry, StackStatus,
    };
    pub use crate::errors::{BuildDefectError, ErrorClass, ErrorInfo, ProvisionError, Result};
    pub use crate::events::{EventKind, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::{build_resource_graph, ResourceGraph, ToolchainVersion};
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::options::ProvisionOptions;
    pub use crate::profiles::{EnvironmentProfile, EnvironmentProfiles};
    pub use crate::provision::{ProvisionOutcome, Provisioner};
    pub use crate::render::{stage_document, Document, ParsedDocument};
    pub use crate::source::RepositoryLocator;
    pub use crate::template::{Reference, TemplateValue};
    pub use crate::topology::{build_pipeline_topology, PipelineTopology};
    pub use crate::upload::{ArtifactUploader, LocalDirectoryUploader};

    #[cfg(feature = "http")]
    pub use crate::http::{HttpArtifactUploader, HttpStackBackend};
}
