//! Pipeline topology construction.
//!
//! This module provides:
//! - Action and stage declarations
//! - Artifact, naming and run-order validation
//! - The pure builder for the four-stage delivery pipeline

mod action;
mod builder;
mod stage;

pub use action::{Action, ActionCategory, ActionOwner, ActionType};
pub use builder::{
    build_pipeline_topology, production_change_set_name, BUILD_STAGE, PRODUCTION_APPROVAL_PROMPT,
    PRODUCTION_STAGE, SOURCE_ARTIFACT, SOURCE_STAGE, TEMPLATE_ARTIFACT, TEST_APPROVAL_PROMPT,
    TEST_STAGE,
};
pub use stage::{PipelineTopology, Stage};
