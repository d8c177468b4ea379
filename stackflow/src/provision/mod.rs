//! End-to-end provisioning.
//!
//! A provision run parses the caller's options, builds the resource graph
//! and pipeline topology, stages the assembled document, and unless it is a
//! dry run uploads the document and converges the pipeline stack.


use crate::config::ProvisionerConfig;
use crate::context::BuildContext;
use crate::converge::{
    ConvergenceEngine, ConvergenceOutcome, ConvergenceRequest, StackBackend, StackLockRegistry,
};
use crate::errors::{ProvisionError, Result};
use crate::events::{EventKind, EventSink, LoggingEventSink};
use crate::graph::{build_resource_graph, ToolchainVersion};
use crate::observability::SpanTimer;
use crate::options::ProvisionOptions;
use crate::profiles::EnvironmentProfiles;
use crate::render::{stage_document, stage_profile_configurations, Document};
use crate::topology::build_pipeline_topology;
use crate::upload::ArtifactUploader;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info, instrument};

/// Result of a provision run.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionOutcome {
    /// Name of the pipeline stack.
    pub stack_name: String,
    /// Local path of the staged document.
    pub staged_path: PathBuf,
    /// Local paths of the staged profile configurations.
    ///
    /// These are not uploaded. The deploy actions read them from the build
    /// output (`Template::<file>`), so they must be committed to the
    /// repository next to the service template.
    pub profile_paths: Vec<PathBuf>,
    /// Where the document was uploaded; `None` on a dry run.
    pub template_url: Option<String>,
    /// The converged stack; `None` on a dry run.
    pub convergence: Option<ConvergenceOutcome>,
}

impl ProvisionOutcome {
    /// The stack identifier, if the stack was converged.
    #[must_use]
    pub fn stack_id(&self) -> Option<&str> {
        self.convergence.as_ref().map(|c| c.stack_id.as_str())
    }
}

/// Runs provisioning against optional remote interfaces.
///
/// Without a backend and uploader only dry runs succeed.
pub struct Provisioner {
    config: ProvisionerConfig,
    backend: Option<Arc<dyn StackBackend>>,
    uploader: Option<Arc<dyn ArtifactUploader>>,
    locks: StackLockRegistry,
    events: Arc<dyn EventSink>,
    profiles: EnvironmentProfiles,
    toolchain_version: Option<String>,
}

impl Provisioner {
    /// Creates a provisioner with no remote interfaces.
    #[must_use]
    pub fn new(config: ProvisionerConfig) -> Self {
        Self {
            config,
            backend: None,
            uploader: None,
            locks: StackLockRegistry::global(),
            events: Arc::new(LoggingEventSink::default()),
            profiles: EnvironmentProfiles::default(),
            toolchain_version: None,
        }
    }

    /// Sets the stack backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn StackBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the artifact uploader.
    #[must_use]
    pub fn with_uploader(mut self, uploader: Arc<dyn ArtifactUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Uses a specific lock registry.
    #[must_use]
    pub fn with_locks(mut self, locks: StackLockRegistry) -> Self {
        self.locks = locks;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the environment profiles.
    #[must_use]
    pub fn with_profiles(mut self, profiles: EnvironmentProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    /// Uses a fixed toolchain version instead of detecting it.
    #[must_use]
    pub fn with_toolchain_version(mut self, raw: impl Into<String>) -> Self {
        self.toolchain_version = Some(raw.into());
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Provisions the pipeline described by `options`.
    ///
    /// # Errors
    ///
    /// Any step's error is returned unchanged; nothing after the failing
    /// step runs.
    #[instrument(
        skip(self, options),
        fields(service = %options.service_name, pipeline = %options.pipeline_name, dry_run = options.dry_run)
    )]
    pub async fn provision(&self, options: &ProvisionOptions) -> Result<ProvisionOutcome> {
        match self.run(options).await {
            Ok(outcome) => {
                self.events
                    .emit(
                        EventKind::Completed,
                        json!({"stack_name": outcome.stack_name, "stack_id": outcome.stack_id()}),
                    )
                    .await;
                Ok(outcome)
            }
            Err(err) => {
                error!(error = %err, class = ?err.class(), "Provisioning failed");
                self.events
                    .emit(
                        EventKind::Failed,
                        json!({"error": err.to_string(), "class": err.class(), "retryable": err.is_retryable()}),
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn run(&self, options: &ProvisionOptions) -> Result<ProvisionOutcome> {
        options.validate()?;
        let raw_toolchain = match &self.toolchain_version {
            Some(raw) => raw.clone(),
            None => ToolchainVersion::detect().await?,
        };
        let ctx = BuildContext::resolve(options.clone(), &raw_toolchain, self.profiles.clone())?;

        let timer = SpanTimer::start("graph");
        let graph = build_resource_graph(&ctx)?;
        self.events
            .emit(
                EventKind::GraphBuilt,
                json!({"resources": graph.resource_count(), "elapsed_ms": timer.finish()}),
            )
            .await;

        let topology = build_pipeline_topology(&ctx)?;
        self.events
            .emit(EventKind::TopologyBuilt, json!({"stages": topology.stage_names()}))
            .await;

        let document = Document::assemble(self.config.description.as_str(), &graph, &topology)?;
        let staged_path = stage_document(&document, &self.config.staging_dir, &self.config.document_file_name)?;
        let profile_paths = stage_profile_configurations(&self.profiles, &self.config.staging_dir)?;
        info!(path = %staged_path.display(), "Document staged");
        self.events
            .emit(
                EventKind::DocumentStaged,
                json!({"path": staged_path.display().to_string(), "profiles": profile_paths.len()}),
            )
            .await;

        let stack_name = options.pipeline_stack_name();
        if options.dry_run {
            info!(%stack_name, "Dry run: skipping upload and convergence");
            self.events
                .emit(EventKind::DryRun, json!({"stack_name": stack_name}))
                .await;
            return Ok(ProvisionOutcome {
                stack_name,
                staged_path,
                profile_paths,
                template_url: None,
                convergence: None,
            });
        }

        let (Some(backend), Some(uploader)) = (&self.backend, &self.uploader) else {
            return Err(ProvisionError::malformed_input(
                "endpoint",
                "no remote backend configured; supply an endpoint or run with dry run",
            ));
        };

        let key = options.document_key();
        let template_url = uploader
            .upload(&staged_path, &options.artifact_bucket, &key)
            .await?;
        info!(%template_url, "Document uploaded");
        self.events
            .emit(EventKind::Uploaded, json!({"location": template_url}))
            .await;

        let engine = ConvergenceEngine::new(Arc::clone(backend))
            .with_locks(self.locks.clone())
            .with_poll_policy(self.config.poll)
            .with_event_sink(Arc::clone(&self.events));
        let request = ConvergenceRequest::new(stack_name.as_str(), document, template_url.as_str());
        let deadline = Instant::now() + self.config.timeout();
        let convergence = engine.converge(&request, deadline).await?;

        Ok(ProvisionOutcome {
            stack_name,
            staged_path,
            profile_paths,
            template_url: Some(template_url),
            convergence: Some(convergence),
        })
    }
}
