//! Pipeline actions.

use crate::template::{Reference, TemplateValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of work an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCategory {
    /// Fetches source.
    Source,
    /// Builds artifacts.
    Build,
    /// Deploys infrastructure.
    Deploy,
    /// Waits for a human decision.
    Approval,
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "Source"),
            Self::Build => write!(f, "Build"),
            Self::Deploy => write!(f, "Deploy"),
            Self::Approval => write!(f, "Approval"),
        }
    }
}

/// Who provides an action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionOwner {
    /// A provider built into the backend.
    Aws,
    /// An external provider.
    ThirdParty,
}

impl fmt::Display for ActionOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws => write!(f, "AWS"),
            Self::ThirdParty => write!(f, "ThirdParty"),
        }
    }
}

/// Fully qualified action type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionType {
    /// Category.
    pub category: ActionCategory,
    /// Owner.
    pub owner: ActionOwner,
    /// Provider identifier (e.g. `CodeBuild`).
    pub provider: String,
    /// Provider version.
    pub version: String,
}

/// A unit of work within a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Name, unique within the stage.
    pub name: String,
    /// Action type.
    pub action_type: ActionType,
    /// Provider configuration (string or reference values).
    pub configuration: IndexMap<String, TemplateValue>,
    /// Consumed artifact names, in order.
    pub input_artifacts: Vec<String>,
    /// Produced artifact names, in order.
    pub output_artifacts: Vec<String>,
    /// Position within the stage; equal values may run concurrently.
    pub run_order: u32,
}

impl Action {
    /// Creates an action with run-order 1 and no artifacts.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: ActionCategory,
        owner: ActionOwner,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            action_type: ActionType {
                category,
                owner,
                provider: provider.into(),
                version: "1".to_string(),
            },
            configuration: IndexMap::new(),
            input_artifacts: Vec::new(),
            output_artifacts: Vec::new(),
            run_order: 1,
        }
    }

    /// Manual approval gate with a prompt.
    #[must_use]
    pub fn manual_approval(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(name, ActionCategory::Approval, ActionOwner::Aws, "Manual")
            .with_config("CustomData", prompt.into())
    }

    /// Sets a configuration entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    /// Adds an input artifact.
    #[must_use]
    pub fn with_input(mut self, artifact: impl Into<String>) -> Self {
        self.input_artifacts.push(artifact.into());
        self
    }

    /// Adds an output artifact.
    #[must_use]
    pub fn with_output(mut self, artifact: impl Into<String>) -> Self {
        self.output_artifacts.push(artifact.into());
        self
    }

    /// Sets the run-order.
    #[must_use]
    pub fn with_run_order(mut self, run_order: u32) -> Self {
        self.run_order = run_order;
        self
    }

    /// Returns the category.
    #[must_use]
    pub fn category(&self) -> ActionCategory {
        self.action_type.category
    }

    /// Returns a configuration value.
    #[must_use]
    pub fn config(&self, key: &str) -> Option<&TemplateValue> {
        self.configuration.get(key)
    }

    /// Returns every reference in the configuration.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        self.configuration
            .values()
            .flat_map(TemplateValue::references)
            .collect()
    }

    /// Renders the action declaration.
    #[must_use]
    pub fn to_template_value(&self) -> TemplateValue {
        let mut declaration = IndexMap::new();
        declaration.insert("Name".to_string(), TemplateValue::from(self.name.as_str()));
        declaration.insert(
            "ActionTypeId".to_string(),
            TemplateValue::map([
                ("Category", self.action_type.category.to_string()),
                ("Owner", self.action_type.owner.to_string()),
                ("Version", self.action_type.version.clone()),
                ("Provider", self.action_type.provider.clone()),
            ]),
        );
        if !self.input_artifacts.is_empty() {
            declaration.insert("InputArtifacts".to_string(), artifact_list(&self.input_artifacts));
        }
        declaration.insert(
            "Configuration".to_string(),
            TemplateValue::Map(self.configuration.clone()),
        );
        if !self.output_artifacts.is_empty() {
            declaration.insert("OutputArtifacts".to_string(), artifact_list(&self.output_artifacts));
        }
        declaration.insert("RunOrder".to_string(), TemplateValue::Int(i64::from(self.run_order)));
        TemplateValue::Map(declaration)
    }
}

fn artifact_list(names: &[String]) -> TemplateValue {
    TemplateValue::List(
        names
            .iter()
            .map(|name| TemplateValue::map([("Name", name.as_str())]))
            .collect(),
    )
}
