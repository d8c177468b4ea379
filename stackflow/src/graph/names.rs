//! Logical names of the resources and parameters in the pipeline document.

/// Artifact storage bucket.
pub const ARTIFACT_BUCKET: &str = "S3ArtifactBucket";
/// Role assumed by the infrastructure manager.
pub const INFRASTRUCTURE_ROLE: &str = "CloudFormationRole";
/// Role assumed by the build runner.
pub const BUILD_ROLE: &str = "CodeBuildRole";
/// Role assumed by the deployment orchestrator.
pub const PIPELINE_ROLE: &str = "CodePipelineRole";
/// Build project.
pub const BUILD_PROJECT: &str = "CodeBuildProject";
/// The pipeline resource added at render time.
pub const PIPELINE: &str = "BuildPipeline";

/// Attribute holding a resource's generated ARN.
pub const ARN_ATTRIBUTE: &str = "Arn";

/// Pipeline name parameter.
pub const PARAM_PIPELINE_NAME: &str = "PipelineName";
/// Source credential parameter.
pub const PARAM_SOURCE_TOKEN: &str = "GitHubOAuthToken";
/// Repository owner parameter.
pub const PARAM_SOURCE_OWNER: &str = "GitHubUser";
/// Repository name parameter.
pub const PARAM_SOURCE_REPO: &str = "GitHubRepoName";
/// Branch parameter.
pub const PARAM_SOURCE_BRANCH: &str = "GitHubBranch";
/// Service template file name parameter.
pub const PARAM_TEMPLATE_FILE: &str = "TemplateFileName";
/// Test stack name parameter.
pub const PARAM_TEST_STACK_NAME: &str = "TestStackName";
/// Test stack configuration file parameter.
pub const PARAM_TEST_STACK_CONFIG: &str = "TestStackConfig";
/// Production stack name parameter.
pub const PARAM_PROD_STACK_NAME: &str = "ProdStackName";
/// Production stack configuration file parameter.
pub const PARAM_PROD_STACK_CONFIG: &str = "ProdStackConfig";
/// Change-set name parameter.
pub const PARAM_CHANGE_SET_NAME: &str = "ChangeSetName";

/// Default file name of the service template inside the build output.
pub const DEFAULT_TEMPLATE_FILE: &str = "cloudformation.json";
