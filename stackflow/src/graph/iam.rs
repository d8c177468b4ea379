//! IAM trust and permission documents for the pipeline roles.

use super::resource::{ResourceDefinition, ResourceKind};
use crate::template::TemplateValue;

/// IAM policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

/// The service principals allowed to assume pipeline roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServicePrincipal {
    /// The deployment orchestrator.
    CodePipeline,
    /// The build runner.
    CodeBuild,
    /// The infrastructure manager.
    CloudFormation,
}

impl ServicePrincipal {
    /// Returns the principal's service identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodePipeline => "codepipeline.amazonaws.com",
            Self::CodeBuild => "codebuild.amazonaws.com",
            Self::CloudFormation => "cloudformation.amazonaws.com",
        }
    }
}

/// A single allow statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    /// Actions granted.
    pub actions: Vec<String>,
    /// Resource pattern the actions apply to.
    pub resource: String,
}

impl PolicyStatement {
    /// Allows the actions on every resource.
    #[must_use]
    pub fn allow_all<S: Into<String>>(actions: impl IntoIterator<Item = S>) -> Self {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resource: "*".to_string(),
        }
    }

    fn to_template_value(&self) -> TemplateValue {
        TemplateValue::map([
            ("Effect", TemplateValue::from("Allow")),
            ("Action", TemplateValue::list(self.actions.iter())),
            ("Resource", TemplateValue::from(self.resource.as_str())),
        ])
    }
}

/// Builds an assume-role document trusting exactly one principal.
#[must_use]
pub fn assume_role_document(principal: ServicePrincipal) -> TemplateValue {
    TemplateValue::map([
        ("Version", TemplateValue::from(POLICY_VERSION)),
        (
            "Statement",
            TemplateValue::list([TemplateValue::map([
                ("Effect", TemplateValue::from("Allow")),
                (
                    "Principal",
                    TemplateValue::map([("Service", TemplateValue::list([principal.as_str()]))]),
                ),
                ("Action", TemplateValue::list(["sts:AssumeRole"])),
            ])]),
        ),
    ])
}

/// Builds a permission document from statements.
#[must_use]
pub fn policy_document(statements: &[PolicyStatement]) -> TemplateValue {
    TemplateValue::map([
        ("Version", TemplateValue::from(POLICY_VERSION)),
        (
            "Statement",
            TemplateValue::List(statements.iter().map(PolicyStatement::to_template_value).collect()),
        ),
    ])
}

/// Declarative description of one pipeline role.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    /// The trusted principal.
    pub principal: ServicePrincipal,
    /// Name of the inline policy.
    pub policy_name: String,
    /// Granted statements.
    pub statements: Vec<PolicyStatement>,
    /// Optional IAM path.
    pub path: Option<String>,
}

impl RoleSpec {
    /// Renders the role resource.
    #[must_use]
    pub fn to_resource(&self) -> ResourceDefinition {
        let mut role = ResourceDefinition::new(ResourceKind::Role);
        if let Some(path) = &self.path {
            role = role.with_property("Path", path.as_str());
        }
        role.with_property("AssumeRolePolicyDocument", assume_role_document(self.principal))
            .with_property(
                "Policies",
                TemplateValue::list([TemplateValue::map([
                    ("PolicyName", TemplateValue::from(self.policy_name.as_str())),
                    ("PolicyDocument", policy_document(&self.statements)),
                ])]),
            )
    }
}

/// Role assumed by the infrastructure manager: stack and role management.
#[must_use]
pub fn infrastructure_manager_role() -> RoleSpec {
    RoleSpec {
        principal: ServicePrincipal::CloudFormation,
        policy_name: "CloudFormationRole".to_string(),
        statements: vec![
            PolicyStatement::allow_all(["lambda:*", "iam:*"]),
            PolicyStatement::allow_all(["s3:Get*"]),
        ],
        path: None,
    }
}

/// Role assumed by the build runner: artifact read/write, logs, builds.
#[must_use]
pub fn build_runner_role() -> RoleSpec {
    RoleSpec {
        principal: ServicePrincipal::CodeBuild,
        policy_name: "CodeBuildRole".to_string(),
        statements: vec![
            PolicyStatement::allow_all(["s3:Get*", "s3:Put*"]),
            PolicyStatement::allow_all(["logs:*", "codebuild:*"]),
        ],
        path: Some("/".to_string()),
    }
}

/// Role assumed by the deployment orchestrator.
///
/// Grants artifact access, the stack and change-set lifecycle, pass-role,
/// notifications and build invocation.
#[must_use]
pub fn deployment_orchestrator_role() -> RoleSpec {
    RoleSpec {
        principal: ServicePrincipal::CodePipeline,
        policy_name: "CodePipelineAccess".to_string(),
        statements: vec![PolicyStatement::allow_all([
            "s3:*",
            "cloudformation:CreateStack",
            "cloudformation:DescribeStacks",
            "cloudformation:DeleteStack",
            "cloudformation:UpdateStack",
            "cloudformation:CreateChangeSet",
            "cloudformation:ExecuteChangeSet",
            "cloudformation:DeleteChangeSet",
            "cloudformation:DescribeChangeSet",
            "cloudformation:SetStackPolicy",
            "iam:PassRole",
            "sns:Publish",
            "codebuild:StartBuild",
            "codebuild:BatchGetBuilds",
        ])],
        path: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_document_has_single_principal() {
        for spec in [
            infrastructure_manager_role(),
            build_runner_role(),
            deployment_orchestrator_role(),
        ] {
            let rendered = spec.to_resource().properties_json();
            let services = rendered
                .pointer("/AssumeRolePolicyDocument/Statement/0/Principal/Service")
                .and_then(|v| v.as_array())
                .unwrap();
            assert_eq!(services.len(), 1);
            assert_eq!(services[0], spec.principal.as_str());
        }
    }

    #[test]
    fn test_orchestrator_grants_change_set_lifecycle() {
        let spec = deployment_orchestrator_role();
        let actions = &spec.statements[0].actions;
        for required in [
            "cloudformation:CreateChangeSet",
            "cloudformation:ExecuteChangeSet",
            "iam:PassRole",
            "codebuild:StartBuild",
        ] {
            assert!(actions.iter().any(|a| a == required), "missing {required}");
        }
    }

    #[test]
    fn test_build_runner_has_path() {
        let rendered = build_runner_role().to_resource().properties_json();
        assert_eq!(rendered["Path"], "/");
        assert!(infrastructure_manager_role().to_resource().property("Path").is_none());
    }

    #[test]
    fn test_policy_document_shape() {
        let doc = policy_document(&[PolicyStatement::allow_all(["logs:*"])]).to_json();
        assert_eq!(doc["Version"], POLICY_VERSION);
        assert_eq!(doc["Statement"][0]["Effect"], "Allow");
        assert_eq!(doc["Statement"][0]["Resource"], "*");
    }
}
