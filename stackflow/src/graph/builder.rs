//! Resource graph construction.

use super::iam::{build_runner_role, deployment_orchestrator_role, infrastructure_manager_role};
use super::names;
use super::resource::{DeletionPolicy, Parameter, ResourceDefinition, ResourceGraph, ResourceKind};
use crate::context::BuildContext;
use crate::errors::Result;
use crate::template::{Reference, TemplateValue};
use tracing::debug;

/// Build project timeout in minutes.
pub const BUILD_TIMEOUT_MINUTES: i64 = 10;

/// Builds the pipeline's supporting resources and parameters.
///
/// The graph holds the artifact bucket, the three pipeline roles and the
/// build project. The pipeline resource itself is added when the document
/// is assembled.
///
/// # Errors
///
/// Returns a build defect if a logical name is registered twice.
pub fn build_resource_graph(ctx: &BuildContext) -> Result<ResourceGraph> {
    let mut graph = ResourceGraph::new();
    add_parameters(&mut graph, ctx)?;

    graph.insert_resource(names::ARTIFACT_BUCKET, artifact_bucket())?;
    graph.insert_resource(names::INFRASTRUCTURE_ROLE, infrastructure_manager_role().to_resource())?;
    graph.insert_resource(names::BUILD_ROLE, build_runner_role().to_resource())?;
    graph.insert_resource(names::PIPELINE_ROLE, deployment_orchestrator_role().to_resource())?;
    graph.insert_resource(names::BUILD_PROJECT, build_project(ctx))?;

    debug!(
        resources = graph.resource_count(),
        image = %ctx.toolchain().build_image(),
        "Resource graph built"
    );
    Ok(graph)
}

/// Versioned bucket that survives stack deletion.
fn artifact_bucket() -> ResourceDefinition {
    ResourceDefinition::new(ResourceKind::Bucket)
        .with_property(
            "VersioningConfiguration",
            TemplateValue::map([("Status", "Enabled")]),
        )
        .with_deletion_policy(DeletionPolicy::Retain)
}

fn build_project(ctx: &BuildContext) -> ResourceDefinition {
    ResourceDefinition::new(ResourceKind::BuildProject)
        .with_property("Name", format!("CodeBuild-{}", ctx.service_name()))
        .with_property("Description", "Builds and deploys the service")
        .with_property(
            "ServiceRole",
            Reference::by_attribute(names::BUILD_ROLE, names::ARN_ATTRIBUTE),
        )
        .with_property("TimeoutInMinutes", BUILD_TIMEOUT_MINUTES)
        .with_property("Source", TemplateValue::map([("Type", "CODEPIPELINE")]))
        .with_property(
            "Artifacts",
            TemplateValue::map([
                ("Type", "CODEPIPELINE"),
                ("NamespaceType", "NONE"),
                ("Name", "BuiltApplication"),
                ("Packaging", "NONE"),
            ]),
        )
        .with_property(
            "Environment",
            TemplateValue::map([
                ("Type", TemplateValue::from("LINUX_CONTAINER")),
                ("Image", TemplateValue::from(ctx.toolchain().build_image())),
                ("ComputeType", TemplateValue::from("BUILD_GENERAL1_SMALL")),
                ("PrivilegedMode", TemplateValue::from(false)),
            ]),
        )
}

fn add_parameters(graph: &mut ResourceGraph, ctx: &BuildContext) -> Result<()> {
    let service = ctx.service_name();
    let source = ctx.source();
    let options = ctx.options();
    let profiles = ctx.profiles();

    let parameters = [
        (
            names::PARAM_PIPELINE_NAME,
            Parameter::string(&options.pipeline_name, format!("Provision the {service} service")),
        ),
        (
            names::PARAM_SOURCE_TOKEN,
            Parameter::string(
                &options.source_credential,
                "Create a token with 'repo' and 'admin:repo_hook' permissions here https://github.com/settings/tokens",
            )
            .no_echo(),
        ),
        (
            names::PARAM_SOURCE_OWNER,
            Parameter::string(&source.owner, "GitHub username"),
        ),
        (
            names::PARAM_SOURCE_REPO,
            Parameter::string(&source.repo, "GitHub repository name that should be monitored for changes"),
        ),
        (
            names::PARAM_SOURCE_BRANCH,
            Parameter::string(&source.branch, "GitHub branch to monitor"),
        ),
        (
            names::PARAM_TEMPLATE_FILE,
            Parameter::string(names::DEFAULT_TEMPLATE_FILE, "The file name of the service template"),
        ),
        (
            names::PARAM_TEST_STACK_NAME,
            Parameter::string(
                format!("Test-{service}-{}", source.branch),
                format!("Test {service} service stack"),
            ),
        ),
        (
            names::PARAM_TEST_STACK_CONFIG,
            Parameter::string(
                profiles.test.config_file_name(),
                format!("The configuration file name for the Test {service} stack"),
            ),
        ),
        (
            names::PARAM_PROD_STACK_NAME,
            Parameter::string(
                format!("Prod-{service}-{}", source.branch),
                format!("Production {service} service stack"),
            ),
        ),
        (
            names::PARAM_PROD_STACK_CONFIG,
            Parameter::string(
                profiles.production.config_file_name(),
                format!("The configuration file name for the Production {service} stack"),
            ),
        ),
        (
            names::PARAM_CHANGE_SET_NAME,
            Parameter::string(
                format!("UpdatePreview-{service}"),
                format!("A name for the production {service} stack ChangeSet"),
            ),
        ),
    ];

    for (name, parameter) in parameters {
        graph.insert_parameter(name, parameter)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::sample_context;

    #[test]
    fn test_graph_resource_counts() {
        let graph = build_resource_graph(&sample_context()).unwrap();
        assert_eq!(graph.count_of(ResourceKind::Bucket), 1);
        assert_eq!(graph.count_of(ResourceKind::Role), 3);
        assert_eq!(graph.count_of(ResourceKind::BuildProject), 1);
        assert_eq!(graph.count_of(ResourceKind::Pipeline), 0);
        assert_eq!(graph.resource_count(), 5);
    }

    #[test]
    fn test_graph_has_no_dangling_references() {
        let graph = build_resource_graph(&sample_context()).unwrap();
        assert!(graph.dangling_references().is_empty());
        assert!(graph.validate_references().is_ok());
    }

    #[test]
    fn test_bucket_is_versioned_and_retained() {
        let graph = build_resource_graph(&sample_context()).unwrap();
        let bucket = graph.resource(names::ARTIFACT_BUCKET).unwrap();
        assert_eq!(bucket.deletion_policy, Some(DeletionPolicy::Retain));
        assert_eq!(bucket.properties_json()["VersioningConfiguration"]["Status"], "Enabled");
    }

    #[test]
    fn test_build_project_image_and_role() {
        let graph = build_resource_graph(&sample_context()).unwrap();
        let project = graph.resource(names::BUILD_PROJECT).unwrap();
        let rendered = project.properties_json();

        assert_eq!(rendered["Environment"]["Image"], "rust:1.79.0");
        assert_eq!(rendered["Name"], "CodeBuild-widget");
        assert_eq!(
            project.references(),
            vec![&Reference::by_attribute(names::BUILD_ROLE, names::ARN_ATTRIBUTE)]
        );
    }

    #[test]
    fn test_parameters_defaults() {
        let graph = build_resource_graph(&sample_context()).unwrap();
        assert_eq!(graph.parameters().count(), 11);
        assert_eq!(graph.parameter(names::PARAM_SOURCE_BRANCH).unwrap().default, "master");
        assert_eq!(
            graph.parameter(names::PARAM_TEST_STACK_NAME).unwrap().default,
            "Test-widget-master"
        );
        assert_eq!(
            graph.parameter(names::PARAM_PROD_STACK_CONFIG).unwrap().default,
            "production.json"
        );
        assert!(graph.parameter(names::PARAM_SOURCE_TOKEN).unwrap().no_echo);
    }
}
