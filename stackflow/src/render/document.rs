//! Document assembly, serialization and parsing.

use crate::errors::{ProvisionError, Result};
use crate::graph::names;
use crate::graph::{ResourceDefinition, ResourceGraph, ResourceKind};
use crate::template::{Reference, TemplateValue};
use crate::topology::PipelineTopology;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Template format version written into every document.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// An immutable, reference-checked infrastructure document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    description: String,
    graph: ResourceGraph,
}

impl Document {
    /// Combines the resource graph and the pipeline topology.
    ///
    /// The pipeline resource is added to a copy of the graph, then every
    /// reference in the combined graph is checked.
    ///
    /// # Errors
    ///
    /// Returns a build defect if the topology is invalid, the pipeline name is
    /// already taken, or any reference dangles.
    pub fn assemble(
        description: impl Into<String>,
        graph: &ResourceGraph,
        topology: &PipelineTopology,
    ) -> Result<Self> {
        topology.validate()?;
        let graph = graph
            .clone()
            .with_resource(names::PIPELINE, pipeline_resource(topology))?;
        graph.validate_references()?;

        Ok(Self {
            description: description.into(),
            graph,
        })
    }

    /// Wraps a graph without checking it.
    #[cfg(test)]
    pub(crate) fn unchecked(description: impl Into<String>, graph: ResourceGraph) -> Self {
        Self {
            description: description.into(),
            graph,
        }
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the combined graph, including the pipeline resource.
    #[must_use]
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    /// Re-checks every reference.
    ///
    /// # Errors
    ///
    /// Returns a build defect for the first dangling reference.
    pub fn validate(&self) -> Result<()> {
        self.graph.validate_references()?;
        Ok(())
    }

    /// Reference targets of every resource, keyed by logical name.
    #[must_use]
    pub fn reference_map(&self) -> IndexMap<String, BTreeSet<Reference>> {
        self.graph
            .resources()
            .map(|(name, def)| (name.to_string(), def.references().into_iter().cloned().collect()))
            .collect()
    }

    /// Renders the canonical JSON form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let parameters: serde_json::Map<String, Value> = self
            .graph
            .parameters()
            .map(|(name, param)| (name.to_string(), param.to_json()))
            .collect();
        let resources: serde_json::Map<String, Value> = self
            .graph
            .resources()
            .map(|(name, def)| (name.to_string(), def.to_json()))
            .collect();

        json!({
            "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
            "Description": self.description,
            "Parameters": parameters,
            "Resources": resources,
        })
    }

    /// Renders indented JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_pretty_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.to_json())?)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// The pipeline resource: role, artifact store and stages.
fn pipeline_resource(topology: &PipelineTopology) -> ResourceDefinition {
    ResourceDefinition::new(ResourceKind::Pipeline)
        .with_property(
            "RoleArn",
            Reference::by_attribute(names::PIPELINE_ROLE, names::ARN_ATTRIBUTE),
        )
        .with_property(
            "ArtifactStore",
            TemplateValue::map([
                ("Type", TemplateValue::from("S3")),
                ("Location", Reference::by_name(names::ARTIFACT_BUCKET).into()),
            ]),
        )
        .with_property("Stages", topology.to_template_value())
}

/// A resource read back from a rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResource {
    /// The declared type name.
    pub type_name: String,
    /// The kind, if the type is known.
    pub kind: Option<ResourceKind>,
    /// Reference targets found in the properties.
    pub references: BTreeSet<Reference>,
}

/// Structural view of a rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    /// The description.
    pub description: String,
    /// Parameter names, in document order.
    pub parameters: Vec<String>,
    /// Resources, in document order.
    pub resources: IndexMap<String, ParsedResource>,
}

impl ParsedDocument {
    /// Parses rendered document text.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for invalid JSON and a malformed
    /// document error if required sections are missing.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    /// Reads the structure from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a malformed document error if required sections are missing.
    pub fn from_json(value: &Value) -> Result<Self> {
        let resources = value
            .get("Resources")
            .and_then(Value::as_object)
            .ok_or_else(|| ProvisionError::malformed_document("missing Resources section"))?;

        let mut parsed = IndexMap::new();
        for (name, entry) in resources {
            let type_name = entry
                .get("Type")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProvisionError::malformed_document(format!("resource '{name}' has no Type"))
                })?
                .to_string();
            let properties = entry.get("Properties").map_or_else(
                || TemplateValue::Map(IndexMap::new()),
                TemplateValue::from_json,
            );
            parsed.insert(
                name.clone(),
                ParsedResource {
                    kind: ResourceKind::from_type_name(&type_name),
                    type_name,
                    references: properties.references().into_iter().cloned().collect(),
                },
            );
        }

        let parameters = value
            .get("Parameters")
            .and_then(Value::as_object)
            .map(|params| params.keys().cloned().collect())
            .unwrap_or_default();

        Ok(Self {
            description: value
                .get("Description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            parameters,
            resources: parsed,
        })
    }

    /// Reference targets of every resource, keyed by logical name.
    #[must_use]
    pub fn reference_map(&self) -> IndexMap<String, BTreeSet<Reference>> {
        self.resources
            .iter()
            .map(|(name, res)| (name.clone(), res.references.clone()))
            .collect()
    }
}
