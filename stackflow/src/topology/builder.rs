//! The fixed Source → Build → Test → Production pipeline shape.

use super::action::{Action, ActionCategory, ActionOwner};
use super::stage::{PipelineTopology, Stage};
use crate::context::BuildContext;
use crate::errors::Result;
use crate::graph::names;
use crate::template::{Reference, TemplateValue};
use tracing::debug;

/// Source stage name.
pub const SOURCE_STAGE: &str = "Source";
/// Build stage name.
pub const BUILD_STAGE: &str = "Build";
/// Test stage name.
pub const TEST_STAGE: &str = "TestStage";
/// Production stage name.
pub const PRODUCTION_STAGE: &str = "ProdStage";

/// Artifact holding the fetched source.
pub const SOURCE_ARTIFACT: &str = "Source";
/// Artifact holding the service's rendered template and configuration files.
pub const TEMPLATE_ARTIFACT: &str = "Template";

/// Prompt shown before promoting to production.
pub const TEST_APPROVAL_PROMPT: &str =
    "Would you like to create a change set to update the production stack";
/// Prompt shown before executing the production change set.
pub const PRODUCTION_APPROVAL_PROMPT: &str = "Would you like to make these production changes?";

const DEPLOY_CAPABILITIES: &str = "CAPABILITY_IAM";

/// Name of the production change set.
///
/// Derived from the service name alone so that the create, approve and
/// execute actions refer to the same change set.
#[must_use]
pub fn production_change_set_name(service_name: &str) -> String {
    format!("ProdChangeSet-{service_name}")
}

/// Builds and validates the four-stage delivery topology.
///
/// # Errors
///
/// Returns a build defect if the assembled topology violates an invariant.
pub fn build_pipeline_topology(ctx: &BuildContext) -> Result<PipelineTopology> {
    let change_set = production_change_set_name(ctx.service_name());

    let topology = PipelineTopology::new(vec![
        source_stage(ctx),
        build_stage(),
        test_stage(),
        production_stage(&change_set),
    ]);
    topology.validate()?;

    debug!(
        stages = ?topology.stage_names(),
        change_set = %change_set,
        "Pipeline topology built"
    );
    Ok(topology)
}

fn source_stage(ctx: &BuildContext) -> Stage {
    let source = ctx.source();
    Stage::new(SOURCE_STAGE).with_action(
        Action::new("GitHub", ActionCategory::Source, ActionOwner::ThirdParty, "GitHub")
            .with_config("Owner", source.owner.as_str())
            .with_config("Repo", source.repo.as_str())
            .with_config("Branch", source.branch.as_str())
            .with_config("PollForSourceChanges", "true")
            .with_config("OAuthToken", ctx.options().source_credential.as_str())
            .with_output(SOURCE_ARTIFACT)
            .with_run_order(1),
    )
}

fn build_stage() -> Stage {
    Stage::new(BUILD_STAGE).with_action(
        Action::new("Build", ActionCategory::Build, ActionOwner::Aws, "CodeBuild")
            .with_input(SOURCE_ARTIFACT)
            .with_config("ProjectName", Reference::by_name(names::BUILD_PROJECT))
            .with_output(TEMPLATE_ARTIFACT)
            .with_run_order(1),
    )
}

fn test_stage() -> Stage {
    Stage::new(TEST_STAGE)
        .with_action(
            deploy_action("CreateStack", "CREATE_UPDATE", names::PARAM_TEST_STACK_NAME)
                .with_input(TEMPLATE_ARTIFACT)
                .with_config("TemplateConfiguration", artifact_path(names::PARAM_TEST_STACK_CONFIG))
                .with_config("TemplatePath", artifact_path(names::PARAM_TEMPLATE_FILE))
                .with_run_order(1),
        )
        .with_action(Action::manual_approval("ApproveTestStack", TEST_APPROVAL_PROMPT).with_run_order(2))
}

fn production_stage(change_set: &str) -> Stage {
    Stage::new(PRODUCTION_STAGE)
        .with_action(
            deploy_action("CreateChangeSet", "CHANGE_SET_REPLACE", names::PARAM_PROD_STACK_NAME)
                .with_input(TEMPLATE_ARTIFACT)
                .with_config("ChangeSetName", change_set)
                .with_config("TemplateConfiguration", artifact_path(names::PARAM_PROD_STACK_CONFIG))
                .with_config("TemplatePath", artifact_path(names::PARAM_TEMPLATE_FILE))
                .with_run_order(1),
        )
        .with_action(
            Action::manual_approval("ApproveChangeSet", PRODUCTION_APPROVAL_PROMPT).with_run_order(2),
        )
        .with_action(
            Action::new("ExecuteChangeSet", ActionCategory::Deploy, ActionOwner::Aws, "CloudFormation")
                .with_config("ActionMode", "CHANGE_SET_EXECUTE")
                .with_config("ChangeSetName", change_set)
                .with_config(
                    "RoleArn",
                    Reference::by_attribute(names::INFRASTRUCTURE_ROLE, names::ARN_ATTRIBUTE),
                )
                .with_config("StackName", Reference::by_name(names::PARAM_PROD_STACK_NAME))
                .with_run_order(3),
        )
}

fn deploy_action(name: &str, mode: &str, stack_name_param: &str) -> Action {
    Action::new(name, ActionCategory::Deploy, ActionOwner::Aws, "CloudFormation")
        .with_config("ActionMode", mode)
        .with_config("Capabilities", DEPLOY_CAPABILITIES)
        .with_config(
            "RoleArn",
            Reference::by_attribute(names::INFRASTRUCTURE_ROLE, names::ARN_ATTRIBUTE),
        )
        .with_config("StackName", Reference::by_name(stack_name_param))
}

/// `Template::<file>` where the file name comes from a parameter.
fn artifact_path(file_param: &str) -> TemplateValue {
    TemplateValue::join(
        "",
        [
            TemplateValue::from(format!("{TEMPLATE_ARTIFACT}::")),
            Reference::by_name(file_param).into(),
        ],
    )
}
