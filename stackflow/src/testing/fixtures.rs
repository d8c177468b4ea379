//! Sample inputs shared by unit and integration tests.

use crate::context::BuildContext;
use crate::graph::{build_resource_graph, ResourceDefinition, ResourceGraph, ResourceKind};
use crate::options::ProvisionOptions;
use crate::profiles::EnvironmentProfiles;
use crate::render::Document;
use crate::template::Reference;
use crate::topology::build_pipeline_topology;

/// Raw toolchain string used by the samples.
pub const SAMPLE_TOOLCHAIN: &str = "rustc 1.79.0 (129f3b996 2024-06-10)";

/// Options for service `widget`, pipeline `delivery`.
#[must_use]
pub fn sample_options() -> ProvisionOptions {
    ProvisionOptions::new(
        "widget",
        "delivery",
        "https://github.com/acme/widget",
        "ghp_secret",
        "acme-artifacts",
    )
}

/// A resolved context for [`sample_options`].
#[must_use]
pub fn sample_context() -> BuildContext {
    BuildContext::resolve(sample_options(), SAMPLE_TOOLCHAIN, EnvironmentProfiles::default())
        .expect("sample context resolves")
}

/// A resolved context for another service name.
#[must_use]
pub fn sample_context_for(service_name: &str) -> BuildContext {
    let mut options = sample_options();
    options.service_name = service_name.to_string();
    BuildContext::resolve(options, SAMPLE_TOOLCHAIN, EnvironmentProfiles::default())
        .expect("sample context resolves")
}

/// The assembled document for [`sample_context`].
#[must_use]
pub fn sample_document() -> Document {
    let ctx = sample_context();
    let graph = build_resource_graph(&ctx).expect("sample graph builds");
    let topology = build_pipeline_topology(&ctx).expect("sample topology builds");
    Document::assemble("Sample pipeline", &graph, &topology).expect("sample document assembles")
}

/// A document whose build project names a role that was never defined.
#[must_use]
pub fn dangling_document() -> Document {
    let mut graph = ResourceGraph::new();
    graph
        .insert_resource(
            "CodeBuildProject",
            ResourceDefinition::new(ResourceKind::BuildProject)
                .with_property("ServiceRole", Reference::by_attribute("MissingRole", "Arn")),
        )
        .expect("single resource inserts");
    Document::unchecked("Dangling pipeline", graph)
}
