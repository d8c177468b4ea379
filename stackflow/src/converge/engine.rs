//! Submit-and-poll convergence of one named stack.

use super::backend::{StackBackend, StackSubmission, SubmitOutcome, CAPABILITY_IAM};
use super::lock::StackLockRegistry;
use super::phase::{ConvergencePhase, SubmitPlan};
use super::poll::PollPolicy;
use super::status::{StackDescription, StackStatus};
use crate::errors::{ProvisionError, Result};
use crate::events::{EventKind, EventSink, LoggingEventSink};
use crate::render::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One convergence of a stack to a rendered document.
#[derive(Debug, Clone)]
pub struct ConvergenceRequest {
    /// Target stack name.
    pub stack_name: String,
    /// The rendered document.
    pub document: Document,
    /// Where the document was uploaded.
    pub template_url: String,
    /// Acknowledged capabilities.
    pub capabilities: Vec<String>,
    /// When the request was made; failure events older than this are ignored.
    pub submitted_at: DateTime<Utc>,
    /// Idempotency token passed to the backend.
    pub request_token: Uuid,
}

impl ConvergenceRequest {
    /// Creates a request acknowledging IAM resources.
    #[must_use]
    pub fn new(stack_name: impl Into<String>, document: Document, template_url: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            document,
            template_url: template_url.into(),
            capabilities: vec![CAPABILITY_IAM.to_string()],
            submitted_at: Utc::now(),
            request_token: Uuid::new_v4(),
        }
    }

    fn submission(&self) -> StackSubmission {
        StackSubmission {
            stack_name: self.stack_name.clone(),
            template_url: self.template_url.clone(),
            capabilities: self.capabilities.clone(),
            request_token: self.request_token,
            submitted_at: self.submitted_at,
        }
    }
}

/// What the engine did to the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceAction {
    /// The stack was created.
    Created,
    /// The stack was updated.
    Updated,
    /// The deployed stack already matched.
    Unchanged,
}

/// A converged stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceOutcome {
    /// The stack identifier.
    pub stack_id: String,
    /// What was done.
    pub action: ConvergenceAction,
    /// The final status, when one was observed.
    pub status: Option<StackStatus>,
}

/// Drives stacks to their desired documents.
#[derive(Clone)]
pub struct ConvergenceEngine {
    backend: Arc<dyn StackBackend>,
    locks: StackLockRegistry,
    poll: PollPolicy,
    events: Arc<dyn EventSink>,
}

impl ConvergenceEngine {
    /// Creates an engine using the process-wide lock registry.
    #[must_use]
    pub fn new(backend: Arc<dyn StackBackend>) -> Self {
        Self {
            backend,
            locks: StackLockRegistry::global(),
            poll: PollPolicy::default(),
            events: Arc::new(LoggingEventSink::default()),
        }
    }

    /// Uses a specific lock registry.
    #[must_use]
    pub fn with_locks(mut self, locks: StackLockRegistry) -> Self {
        self.locks = locks;
        self
    }

    /// Sets the poll policy.
    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Converges the stack named in the request.
    ///
    /// Holds the stack's lock for the whole submit-and-poll. Exactly one
    /// create or update is submitted. On deadline the remote operation is
    /// left running.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the stack is locked locally or in flight remotely
    /// - `RemoteTransient` / `RemoteRejected` from the backend
    /// - `StackFailed` with the backend's reason verbatim
    /// - `Timeout` if no terminal status is seen before `deadline`, including
    ///   when a poll's describe has not answered by then
    /// - `BuildDefect` if the document has a dangling reference; nothing is
    ///   sent to the backend
    #[instrument(skip(self, request, deadline), fields(stack_name = %request.stack_name, token = %request.request_token))]
    pub async fn converge(&self, request: &ConvergenceRequest, deadline: Instant) -> Result<ConvergenceOutcome> {
        let _guard = self.locks.acquire(&request.stack_name)?;
        request.document.validate()?;

        let observed = self.backend.describe_stack(&request.stack_name).await?;
        let phase = ConvergencePhase::from_observed(observed.as_ref().map(|d| d.status));
        debug!(?phase, "Initial phase");

        let Some(plan) = phase.submit() else {
            let status = observed.map_or_else(|| "unknown".to_string(), |d| d.status.to_string());
            return Err(ProvisionError::conflict(
                &request.stack_name,
                format!("stack is {status}; another operation is in flight"),
            ));
        };

        let submission = request.submission();
        let outcome = match plan {
            SubmitPlan::Create => self.backend.create_stack(&submission).await?,
            SubmitPlan::Update => self.backend.update_stack(&submission).await?,
        };

        let stack_id = match outcome {
            SubmitOutcome::Submitted { stack_id } => stack_id,
            SubmitOutcome::NoChanges { stack_id } => {
                info!(%stack_id, "Stack already up to date");
                self.events
                    .emit(
                        EventKind::StackConverged,
                        json!({"stack_name": request.stack_name, "stack_id": stack_id, "changed": false}),
                    )
                    .await;
                return Ok(ConvergenceOutcome {
                    stack_id,
                    action: ConvergenceAction::Unchanged,
                    status: observed.map(|d| d.status),
                });
            }
        };

        info!(%stack_id, plan = plan.as_str(), "Stack operation submitted");
        self.events
            .emit(
                EventKind::StackSubmitted,
                json!({"stack_name": request.stack_name, "stack_id": stack_id, "plan": plan.as_str()}),
            )
            .await;

        self.wait_for_terminal(request, plan, stack_id, deadline).await
    }

    async fn wait_for_terminal(
        &self,
        request: &ConvergenceRequest,
        plan: SubmitPlan,
        stack_id: String,
        deadline: Instant,
    ) -> Result<ConvergenceOutcome> {
        let started = Instant::now();
        let mut phase = ConvergencePhase::submitted(plan);
        let mut last_status = String::from("SUBMITTED");
        let mut attempt: u32 = 0;

        loop {
            let wake = (Instant::now() + self.poll.delay_for(attempt)).min(deadline);
            tokio::time::sleep_until(wake).await;

            let Ok(described) =
                tokio::time::timeout_at(deadline, self.backend.describe_stack(&request.stack_name)).await
            else {
                warn!(%stack_id, "Describe did not answer before the deadline");
                return Err(timed_out(request, started, last_status));
            };
            let description = described?
                .ok_or_else(|| ProvisionError::StackFailed {
                    stack_name: request.stack_name.clone(),
                    reason: "stack disappeared while converging".to_string(),
                })?;
            last_status = description.status.to_string();
            phase = phase.observe(description.status);

            match phase {
                ConvergencePhase::Ready { status } => {
                    info!(%stack_id, %status, "Stack converged");
                    self.events
                        .emit(
                            EventKind::StackConverged,
                            json!({"stack_name": request.stack_name, "stack_id": stack_id, "status": status}),
                        )
                        .await;
                    let action = match plan {
                        SubmitPlan::Create => ConvergenceAction::Created,
                        SubmitPlan::Update => ConvergenceAction::Updated,
                    };
                    return Ok(ConvergenceOutcome {
                        stack_id,
                        action,
                        status: Some(status),
                    });
                }
                ConvergencePhase::Failed { status } => {
                    let reason = self.failure_reason(request, &description).await;
                    warn!(%stack_id, %status, %reason, "Stack failed to converge");
                    self.events
                        .emit(
                            EventKind::StackFailed,
                            json!({"stack_name": request.stack_name, "status": status, "reason": reason}),
                        )
                        .await;
                    return Err(ProvisionError::StackFailed {
                        stack_name: request.stack_name.clone(),
                        reason,
                    });
                }
                _ => {}
            }

            self.events.try_emit(
                EventKind::StackPolled,
                json!({"stack_name": request.stack_name, "status": last_status, "attempt": attempt}),
            );

            if Instant::now() >= deadline {
                return Err(timed_out(request, started, last_status));
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// Status reason first, then the earliest failed event of this request.
    async fn failure_reason(&self, request: &ConvergenceRequest, description: &StackDescription) -> String {
        if let Some(reason) = description.status_reason.as_deref().filter(|r| !r.is_empty()) {
            return reason.to_string();
        }

        match self
            .backend
            .stack_events(&request.stack_name, request.submitted_at)
            .await
        {
            Ok(events) => events
                .into_iter()
                .filter(|e| e.timestamp >= request.submitted_at && e.is_failure())
                .find_map(|e| e.reason.filter(|r| !r.is_empty()))
                .unwrap_or_else(|| description.status.to_string()),
            Err(e) => {
                warn!(error = %e, "Could not read stack events");
                description.status.to_string()
            }
        }
    }
}

fn timed_out(request: &ConvergenceRequest, started: Instant, last_status: String) -> ProvisionError {
    ProvisionError::Timeout {
        stack_name: request.stack_name.clone(),
        waited: started.elapsed(),
        last_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converge::MockStackBackend;
    use crate::converge::StackEvent;
    use crate::events::CollectingEventSink;
    use crate::testing::fixtures::{dangling_document, sample_document};
    use crate::testing::mocks::{BackendCall, ScriptedStackBackend, SubmitScript};
    use std::time::Duration;
    use tokio::sync::Notify;

    const STACK: &str = "widget-delivery";

    fn fast_poll() -> PollPolicy {
        PollPolicy::new()
            .with_interval(Duration::from_millis(1))
            .with_max_interval(Duration::from_millis(5))
    }

    fn engine(backend: Arc<dyn StackBackend>) -> ConvergenceEngine {
        ConvergenceEngine::new(backend)
            .with_locks(StackLockRegistry::new())
            .with_poll_policy(fast_poll())
    }

    fn request() -> ConvergenceRequest {
        ConvergenceRequest::new(STACK, sample_document(), "s3://acme-artifacts/widget-codepipelineTemplate.json")
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(10)
    }

    fn described(status: StackStatus) -> Option<StackDescription> {
        Some(StackDescription::new("arn:stack/widget-delivery/1", STACK, status))
    }

    #[tokio::test]
    async fn test_absent_stack_is_created_once() {
        let backend = Arc::new(ScriptedStackBackend::new().with_describes([
            None,
            described(StackStatus::CreateInProgress),
            described(StackStatus::CreateComplete),
        ]));
        let events = Arc::new(CollectingEventSink::new());
        let engine = engine(backend.clone()).with_event_sink(events.clone());

        let outcome = engine.converge(&request(), far_deadline()).await.unwrap();

        assert_eq!(outcome.action, ConvergenceAction::Created);
        assert_eq!(outcome.status, Some(StackStatus::CreateComplete));
        assert_eq!(backend.count(|c| matches!(c, BackendCall::Create(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::Update(_))), 0);
        assert_eq!(events.of_kind(EventKind::StackSubmitted).len(), 1);
        assert_eq!(events.of_kind(EventKind::StackConverged).len(), 1);
    }

    #[tokio::test]
    async fn test_ready_stack_is_updated_once() {
        let mut mock = MockStackBackend::new();
        let mut describes = vec![
            described(StackStatus::UpdateComplete),
            described(StackStatus::UpdateInProgress),
            described(StackStatus::UpdateComplete),
        ]
        .into_iter()
        .rev()
        .collect::<Vec<_>>();
        mock.expect_describe_stack()
            .times(3)
            .returning(move |_| Ok(describes.pop().flatten()));
        mock.expect_create_stack().times(0);
        mock.expect_update_stack()
            .times(1)
            .withf(|s| s.stack_name == STACK && s.capabilities == vec![CAPABILITY_IAM.to_string()])
            .returning(|_| {
                Ok(SubmitOutcome::Submitted {
                    stack_id: "arn:stack/widget-delivery/1".to_string(),
                })
            });

        let outcome = engine(Arc::new(mock)).converge(&request(), far_deadline()).await.unwrap();
        assert_eq!(outcome.action, ConvergenceAction::Updated);
    }

    #[tokio::test]
    async fn test_in_flight_remote_stack_conflicts_without_submitting() {
        let backend = Arc::new(
            ScriptedStackBackend::new().with_describes([described(StackStatus::UpdateInProgress)]),
        );
        let err = engine(backend.clone())
            .converge(&request(), far_deadline())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Conflict { .. }));
        assert_eq!(backend.submissions(), 0);
    }

    /// Blocks the first describe until released.
    struct GatedBackend {
        inner: ScriptedStackBackend,
        entered: Notify,
        release: Notify,
    }

    #[async_trait::async_trait]
    impl StackBackend for GatedBackend {
        async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
            if self.inner.count(|c| matches!(c, BackendCall::Describe(_))) == 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.describe_stack(stack_name).await
        }

        async fn create_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome> {
            self.inner.create_stack(submission).await
        }

        async fn update_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome> {
            self.inner.update_stack(submission).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_request_for_same_stack_conflicts() {
        let backend = Arc::new(GatedBackend {
            inner: ScriptedStackBackend::new().with_describes([None, described(StackStatus::CreateComplete)]),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let engine = engine(backend.clone());

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.converge(&request(), far_deadline()).await })
        };
        backend.entered.notified().await;

        let err = engine.converge(&request(), far_deadline()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Conflict { .. }));

        backend.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.action, ConvergenceAction::Created);
        assert_eq!(backend.inner.submissions(), 1);
    }

    #[tokio::test]
    async fn test_failure_reason_is_reported_verbatim() {
        let backend = Arc::new(ScriptedStackBackend::new().with_describes([
            None,
            Some(
                StackDescription::new("arn:1", STACK, StackStatus::RollbackComplete)
                    .with_reason("The following resource(s) failed to create: [S3ArtifactBucket]."),
            ),
        ]));
        let err = engine(backend).converge(&request(), far_deadline()).await.unwrap_err();

        match err {
            ProvisionError::StackFailed { stack_name, reason } => {
                assert_eq!(stack_name, STACK);
                assert_eq!(reason, "The following resource(s) failed to create: [S3ArtifactBucket].");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failure_reason_falls_back_to_first_failed_event() {
        let req = request();
        let before = req.submitted_at - chrono::Duration::minutes(5);
        let after = req.submitted_at + chrono::Duration::seconds(1);
        let backend = Arc::new(
            ScriptedStackBackend::new()
                .with_describes([None, described(StackStatus::RollbackComplete)])
                .with_events(vec![
                    StackEvent {
                        timestamp: before,
                        resource: "Old".to_string(),
                        status: "CREATE_FAILED".to_string(),
                        reason: Some("stale failure".to_string()),
                    },
                    StackEvent {
                        timestamp: after,
                        resource: "S3ArtifactBucket".to_string(),
                        status: "CREATE_FAILED".to_string(),
                        reason: Some("acme-artifacts already exists".to_string()),
                    },
                ]),
        );

        let err = engine(backend).converge(&req, far_deadline()).await.unwrap_err();
        assert!(err.to_string().contains("acme-artifacts already exists"));
        assert!(!err.to_string().contains("stale failure"));
    }

    #[tokio::test]
    async fn test_deadline_yields_timeout_with_last_status() {
        let backend = Arc::new(ScriptedStackBackend::new().with_describes([
            None,
            described(StackStatus::CreateInProgress),
        ]));
        let deadline = Instant::now() + Duration::from_millis(30);

        let err = engine(backend.clone()).converge(&request(), deadline).await.unwrap_err();

        match err {
            ProvisionError::Timeout { last_status, .. } => {
                assert_eq!(last_status, "CREATE_IN_PROGRESS");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(backend.submissions(), 1);
    }

    #[tokio::test]
    async fn test_no_changes_converges_without_polling() {
        let backend = Arc::new(
            ScriptedStackBackend::new()
                .with_describes([described(StackStatus::UpdateComplete)])
                .with_submit(SubmitScript::NoChanges),
        );
        let outcome = engine(backend.clone()).converge(&request(), far_deadline()).await.unwrap();

        assert_eq!(outcome.action, ConvergenceAction::Unchanged);
        assert_eq!(outcome.status, Some(StackStatus::UpdateComplete));
        assert_eq!(backend.count(|c| matches!(c, BackendCall::Describe(_))), 1);
    }

    #[tokio::test]
    async fn test_rejected_submission_propagates() {
        let backend = Arc::new(
            ScriptedStackBackend::new()
                .with_describes([None])
                .with_submit(SubmitScript::Reject("Template format error".to_string())),
        );
        let err = engine(backend).converge(&request(), far_deadline()).await.unwrap_err();
        assert!(matches!(err, ProvisionError::RemoteRejected { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_lock_is_released_after_failure() {
        let locks = StackLockRegistry::new();
        let backend = Arc::new(
            ScriptedStackBackend::new().with_describes([described(StackStatus::CreateInProgress)]),
        );
        let engine = engine(backend).with_locks(locks.clone());

        assert!(engine.converge(&request(), far_deadline()).await.is_err());
        assert!(!locks.is_held(STACK));
    }

    #[tokio::test]
    async fn test_transient_describe_propagates_and_releases_lock() {
        let locks = StackLockRegistry::new();
        let backend = Arc::new(ScriptedStackBackend::new().with_describes_unavailable_from(0, "connection reset"));
        let engine = engine(backend.clone()).with_locks(locks.clone());

        let err = engine.converge(&request(), far_deadline()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::RemoteTransient { .. }));
        assert!(err.is_retryable());
        assert_eq!(backend.submissions(), 0);
        assert!(!locks.is_held(STACK));
    }

    #[tokio::test]
    async fn test_transient_poll_propagates_after_one_submission() {
        let locks = StackLockRegistry::new();
        let backend = Arc::new(
            ScriptedStackBackend::new()
                .with_describes([None])
                .with_describes_unavailable_from(1, "503 Service Unavailable"),
        );
        let engine = engine(backend.clone()).with_locks(locks.clone());

        let err = engine.converge(&request(), far_deadline()).await.unwrap_err();

        match &err {
            ProvisionError::RemoteTransient { operation, message } => {
                assert_eq!(operation, "describe_stack");
                assert_eq!(message, "503 Service Unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_retryable());
        assert_eq!(backend.submissions(), 1);
        assert!(!locks.is_held(STACK));
    }

    #[tokio::test]
    async fn test_unavailable_create_is_retryable() {
        let locks = StackLockRegistry::new();
        let backend = Arc::new(
            ScriptedStackBackend::new()
                .with_describes([None])
                .with_submit(SubmitScript::Unavailable("connection refused".to_string())),
        );
        let engine = engine(backend.clone()).with_locks(locks.clone());

        let err = engine.converge(&request(), far_deadline()).await.unwrap_err();

        assert!(matches!(err, ProvisionError::RemoteTransient { .. }));
        assert!(err.is_retryable());
        assert_eq!(backend.count(|c| matches!(c, BackendCall::Create(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, BackendCall::Describe(_))), 1);
        assert!(!locks.is_held(STACK));
    }

    #[tokio::test]
    async fn test_invalid_document_is_rejected_before_submit() {
        let locks = StackLockRegistry::new();
        let backend = Arc::new(ScriptedStackBackend::new());
        let engine = engine(backend.clone()).with_locks(locks.clone());
        let request = ConvergenceRequest::new(STACK, dangling_document(), "s3://acme-artifacts/bad.json");

        let err = engine.converge(&request, far_deadline()).await.unwrap_err();

        match &err {
            ProvisionError::BuildDefect(defect) => {
                assert_eq!(defect.code(), Some(crate::errors::codes::DANGLING_REFERENCE));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_retryable());
        assert!(backend.calls().is_empty());
        assert!(!locks.is_held(STACK));
    }

    /// Answers the first describe, then never answers again.
    struct HangingBackend {
        describes: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl StackBackend for HangingBackend {
        async fn describe_stack(&self, _stack_name: &str) -> Result<Option<StackDescription>> {
            if self.describes.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                return Ok(None);
            }
            std::future::pending().await
        }

        async fn create_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome> {
            Ok(SubmitOutcome::Submitted {
                stack_id: format!("arn:stack/{}/1", submission.stack_name),
            })
        }

        async fn update_stack(&self, _submission: &StackSubmission) -> Result<SubmitOutcome> {
            Err(ProvisionError::remote_rejected("update_stack", "unexpected update"))
        }
    }

    #[tokio::test]
    async fn test_hung_describe_is_bounded_by_deadline() {
        let backend = Arc::new(HangingBackend {
            describes: std::sync::atomic::AtomicUsize::new(0),
        });
        let deadline = Instant::now() + Duration::from_millis(50);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            engine(backend.clone()).converge(&request(), deadline),
        )
        .await
        .expect("converge returns once the deadline passes");

        match result {
            Err(ProvisionError::Timeout { stack_name, last_status, .. }) => {
                assert_eq!(stack_name, STACK);
                assert_eq!(last_status, "SUBMITTED");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(backend.describes.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
