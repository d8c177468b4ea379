//! Caller-supplied provisioning options.

use crate::errors::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity of the pipeline to provision.
///
/// Constructed once per invocation and immutable afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOptions {
    /// Name of the service the pipeline deploys.
    pub service_name: String,
    /// Pipeline name.
    pub pipeline_name: String,
    /// Source repository URL (owner/repo and optional branch).
    pub repository_url: String,
    /// Credential for the source-control system.
    pub source_credential: String,
    /// Bucket the rendered document is uploaded to.
    pub artifact_bucket: String,
    /// Render and stage only; never contact the backend.
    #[serde(default)]
    pub dry_run: bool,
}

impl ProvisionOptions {
    /// Creates options with every required field.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        pipeline_name: impl Into<String>,
        repository_url: impl Into<String>,
        source_credential: impl Into<String>,
        artifact_bucket: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            pipeline_name: pipeline_name.into(),
            repository_url: repository_url.into(),
            source_credential: source_credential.into(),
            artifact_bucket: artifact_bucket.into(),
            dry_run: false,
        }
    }

    /// Sets the dry-run flag.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Checks that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("service_name", &self.service_name),
            ("pipeline_name", &self.pipeline_name),
            ("repository_url", &self.repository_url),
            ("source_credential", &self.source_credential),
            ("artifact_bucket", &self.artifact_bucket),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ProvisionError::malformed_input(field, "required value is empty"));
            }
        }
        Ok(())
    }

    /// Name of the stack that holds the pipeline itself.
    #[must_use]
    pub fn pipeline_stack_name(&self) -> String {
        format!("{}-{}", self.service_name, self.pipeline_name)
    }

    /// Object key the rendered document is uploaded under.
    #[must_use]
    pub fn document_key(&self) -> String {
        format!("{}-codepipelineTemplate.json", self.service_name)
    }
}

impl fmt::Debug for ProvisionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionOptions")
            .field("service_name", &self.service_name)
            .field("pipeline_name", &self.pipeline_name)
            .field("repository_url", &self.repository_url)
            .field("source_credential", &"<redacted>")
            .field("artifact_bucket", &self.artifact_bucket)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}
