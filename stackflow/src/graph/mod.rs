//! Resource graph construction.
//!
//! This module provides:
//! - Resource, parameter and graph types with reference validation
//! - IAM trust and permission documents for the pipeline roles
//! - Toolchain version parsing for the build image
//! - The pure graph builder

mod builder;
mod iam;
pub mod names;
mod resource;
mod toolchain;

pub use builder::{build_resource_graph, BUILD_TIMEOUT_MINUTES};
pub use iam::{
    assume_role_document, build_runner_role, deployment_orchestrator_role,
    infrastructure_manager_role, policy_document, PolicyStatement, RoleSpec, ServicePrincipal,
    POLICY_VERSION,
};
pub use resource::{DeletionPolicy, Parameter, ResourceDefinition, ResourceGraph, ResourceKind};
pub use toolchain::{ToolchainVersion, TOOLCHAIN_VERSION_ENV};
