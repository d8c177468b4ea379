//! Resource definitions, parameters and the resource graph.

use crate::errors::{codes, BuildDefectError, ErrorInfo};
use crate::template::{Reference, TemplateValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The kind of infrastructure a resource definition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Object storage bucket.
    Bucket,
    /// IAM role.
    Role,
    /// Build project.
    BuildProject,
    /// Delivery pipeline.
    Pipeline,
}

impl ResourceKind {
    /// Returns the backend type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bucket => "AWS::S3::Bucket",
            Self::Role => "AWS::IAM::Role",
            Self::BuildProject => "AWS::CodeBuild::Project",
            Self::Pipeline => "AWS::CodePipeline::Pipeline",
        }
    }

    /// Looks up a kind by backend type name.
    #[must_use]
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        [Self::Bucket, Self::Role, Self::BuildProject, Self::Pipeline]
            .into_iter()
            .find(|kind| kind.type_name() == type_name)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bucket => write!(f, "bucket"),
            Self::Role => write!(f, "role"),
            Self::BuildProject => write!(f, "build_project"),
            Self::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// What the backend does with a resource when its stack is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    /// Keep the resource.
    Retain,
    /// Delete the resource with the stack.
    Delete,
}

impl DeletionPolicy {
    /// Returns the backend spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retain => "Retain",
            Self::Delete => "Delete",
        }
    }
}

/// A single named infrastructure resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    /// The resource kind.
    pub kind: ResourceKind,
    /// Type-specific attributes.
    pub properties: IndexMap<String, TemplateValue>,
    /// Deletion policy, if not the backend default.
    pub deletion_policy: Option<DeletionPolicy>,
}

impl ResourceDefinition {
    /// Creates an empty definition of the given kind.
    #[must_use]
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            properties: IndexMap::new(),
            deletion_policy: None,
        }
    }

    /// Sets a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets the deletion policy.
    #[must_use]
    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = Some(policy);
        self
    }

    /// Returns a property by key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&TemplateValue> {
        self.properties.get(key)
    }

    /// Returns every reference made by this resource.
    #[must_use]
    pub fn references(&self) -> Vec<&Reference> {
        self.properties
            .values()
            .flat_map(TemplateValue::references)
            .collect()
    }

    /// Renders the properties as JSON.
    #[must_use]
    pub fn properties_json(&self) -> Value {
        Value::Object(
            self.properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Renders the full resource entry.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut entry = serde_json::Map::new();
        entry.insert("Type".to_string(), json!(self.kind.type_name()));
        if let Some(policy) = self.deletion_policy {
            entry.insert("DeletionPolicy".to_string(), json!(policy.as_str()));
        }
        entry.insert("Properties".to_string(), self.properties_json());
        Value::Object(entry)
    }
}

/// A named input that allows later reconfiguration without rebuilding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter type (always `String` for now).
    pub param_type: String,
    /// Default value.
    pub default: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the backend should mask the value.
    pub no_echo: bool,
}

impl Parameter {
    /// Creates a string parameter.
    #[must_use]
    pub fn string(default: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            param_type: "String".to_string(),
            default: default.into(),
            description: description.into(),
            no_echo: false,
        }
    }

    /// Masks the parameter value.
    #[must_use]
    pub fn no_echo(mut self) -> Self {
        self.no_echo = true;
        self
    }

    /// Renders the parameter entry.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut entry = json!({
            "Type": self.param_type,
            "Description": self.description,
            "Default": self.default,
        });
        if self.no_echo {
            entry["NoEcho"] = json!(true);
        }
        entry
    }
}

/// An ordered mapping of logical names to resources and parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceGraph {
    resources: IndexMap<String, ResourceDefinition>,
    parameters: IndexMap<String, Parameter>,
}

impl ResourceGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already taken by a resource or parameter.
    pub fn insert_resource(
        &mut self,
        name: impl Into<String>,
        definition: ResourceDefinition,
    ) -> Result<(), BuildDefectError> {
        let name = name.into();
        self.ensure_unused(&name)?;
        self.resources.insert(name, definition);
        Ok(())
    }

    /// Returns a copy of the graph with one more resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already taken.
    pub fn with_resource(
        mut self,
        name: impl Into<String>,
        definition: ResourceDefinition,
    ) -> Result<Self, BuildDefectError> {
        self.insert_resource(name, definition)?;
        Ok(self)
    }

    /// Adds a parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already taken.
    pub fn insert_parameter(
        &mut self,
        name: impl Into<String>,
        parameter: Parameter,
    ) -> Result<(), BuildDefectError> {
        let name = name.into();
        self.ensure_unused(&name)?;
        self.parameters.insert(name, parameter);
        Ok(())
    }

    fn ensure_unused(&self, name: &str) -> Result<(), BuildDefectError> {
        if self.resources.contains_key(name) || self.parameters.contains_key(name) {
            return Err(BuildDefectError::new(format!("Logical name '{name}' is registered twice"))
                .with_subjects(vec![name.to_string()])
                .with_error_info(
                    ErrorInfo::new(codes::DUPLICATE_NAME, format!("Duplicate logical name '{name}'"))
                        .with_fix_hint("Logical names must be unique across resources and parameters."),
                ));
        }
        Ok(())
    }

    /// Returns a resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceDefinition> {
        self.resources.get(name)
    }

    /// Returns a parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Iterates resources in insertion order.
    pub fn resources(&self) -> impl Iterator<Item = (&str, &ResourceDefinition)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates parameters in insertion order.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Returns the number of resources of a kind.
    #[must_use]
    pub fn count_of(&self, kind: ResourceKind) -> usize {
        self.resources.values().filter(|r| r.kind == kind).count()
    }

    /// Returns every reference that does not resolve, with the referring resource.
    #[must_use]
    pub fn dangling_references(&self) -> Vec<(String, Reference)> {
        let mut dangling = Vec::new();
        for (name, definition) in &self.resources {
            for reference in definition.references() {
                let resolves = match reference {
                    Reference::ByName(target) => {
                        self.resources.contains_key(target) || self.parameters.contains_key(target)
                    }
                    Reference::ByAttribute { name: target, .. } => {
                        self.resources.contains_key(target)
                    }
                };
                if !resolves {
                    dangling.push((name.clone(), reference.clone()));
                }
            }
        }
        dangling
    }

    /// Validates that every reference resolves.
    ///
    /// # Errors
    ///
    /// Returns a build defect naming the first dangling reference.
    pub fn validate_references(&self) -> Result<(), BuildDefectError> {
        let Some((source, reference)) = self.dangling_references().into_iter().next() else {
            return Ok(());
        };

        let target = reference.target().to_string();
        let (code, summary) = if self.parameters.contains_key(&target) {
            (
                codes::ATTRIBUTE_OF_PARAMETER,
                format!("Parameter '{target}' has no attributes"),
            )
        } else {
            (
                codes::DANGLING_REFERENCE,
                format!("'{target}' is not defined in this graph"),
            )
        };

        Err(BuildDefectError::new(format!(
            "Resource '{source}' references '{reference}' which does not resolve"
        ))
        .with_subjects(vec![source.clone(), target])
        .with_error_info(
            ErrorInfo::new(code, summary)
                .with_fix_hint("Add the referenced resource to the graph before rendering.")
                .with_context_entry("resource", source),
        ))
    }
}
