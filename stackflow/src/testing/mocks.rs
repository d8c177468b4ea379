//! Recording fakes for the remote interfaces.

use crate::converge::{StackBackend, StackDescription, StackEvent, StackSubmission, SubmitOutcome};
use crate::errors::{ProvisionError, Result};
use crate::upload::{object_location, ArtifactUploader};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared, ordered log of calls across several fakes.
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns the entries in call order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

/// A call received by [`ScriptedStackBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `describe_stack(name)`.
    Describe(String),
    /// `create_stack(submission)`.
    Create(StackSubmission),
    /// `update_stack(submission)`.
    Update(StackSubmission),
    /// `stack_events(name)`.
    Events(String),
}

/// How create and update calls answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubmitScript {
    /// Accept and start the operation.
    #[default]
    Submitted,
    /// Report that nothing changed.
    NoChanges,
    /// Refuse with the given message.
    Reject(String),
    /// Fail as unreachable with the given message.
    Unavailable(String),
}

/// A backend answering describes from a script.
///
/// Describes pop the next scripted answer; once the script is exhausted the
/// last answer repeats.
#[derive(Debug, Default)]
pub struct ScriptedStackBackend {
    describes: Mutex<VecDeque<Option<StackDescription>>>,
    last_describe: Mutex<Option<StackDescription>>,
    submit: SubmitScript,
    unavailable_from: Option<(usize, String)>,
    events: Vec<StackEvent>,
    calls: Mutex<Vec<BackendCall>>,
    journal: CallJournal,
}

impl ScriptedStackBackend {
    /// Creates a backend that reports every stack as absent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the describe script.
    #[must_use]
    pub fn with_describes(self, describes: impl IntoIterator<Item = Option<StackDescription>>) -> Self {
        *self.describes.lock() = describes.into_iter().collect();
        self
    }

    /// Sets how submissions answer.
    #[must_use]
    pub fn with_submit(mut self, submit: SubmitScript) -> Self {
        self.submit = submit;
        self
    }

    /// Makes describe call `from` (zero-based) and every later one fail as
    /// unreachable.
    #[must_use]
    pub fn with_describes_unavailable_from(mut self, from: usize, message: impl Into<String>) -> Self {
        self.unavailable_from = Some((from, message.into()));
        self
    }

    /// Sets the stack events returned.
    #[must_use]
    pub fn with_events(mut self, events: Vec<StackEvent>) -> Self {
        self.events = events;
        self
    }

    /// Records calls into a shared journal as well.
    #[must_use]
    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Returns every call received.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Counts calls matching a predicate.
    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    /// Counts create and update calls.
    #[must_use]
    pub fn submissions(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Create(_) | BackendCall::Update(_)))
    }

    fn record(&self, call: BackendCall) {
        let label = match &call {
            BackendCall::Describe(_) => "describe",
            BackendCall::Create(_) => "create",
            BackendCall::Update(_) => "update",
            BackendCall::Events(_) => "events",
        };
        self.journal.record(label);
        self.calls.lock().push(call);
    }

    fn answer_submit(&self, operation: &str, submission: &StackSubmission) -> Result<SubmitOutcome> {
        let stack_id = format!("arn:stack/{}/1", submission.stack_name);
        match &self.submit {
            SubmitScript::Submitted => Ok(SubmitOutcome::Submitted { stack_id }),
            SubmitScript::NoChanges => Ok(SubmitOutcome::NoChanges { stack_id }),
            SubmitScript::Reject(message) => Err(ProvisionError::remote_rejected(operation, message.clone())),
            SubmitScript::Unavailable(message) => Err(ProvisionError::remote_transient(operation, message.clone())),
        }
    }
}

#[async_trait]
impl StackBackend for ScriptedStackBackend {
    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDescription>> {
        let previous = self.count(|c| matches!(c, BackendCall::Describe(_)));
        self.record(BackendCall::Describe(stack_name.to_string()));
        if let Some((from, message)) = &self.unavailable_from {
            if previous >= *from {
                return Err(ProvisionError::remote_transient("describe_stack", message.clone()));
            }
        }
        let mut last = self.last_describe.lock();
        if let Some(next) = self.describes.lock().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    async fn create_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome> {
        self.record(BackendCall::Create(submission.clone()));
        self.answer_submit("create_stack", submission)
    }

    async fn update_stack(&self, submission: &StackSubmission) -> Result<SubmitOutcome> {
        self.record(BackendCall::Update(submission.clone()));
        self.answer_submit("update_stack", submission)
    }

    async fn stack_events(&self, stack_name: &str, since: DateTime<Utc>) -> Result<Vec<StackEvent>> {
        self.record(BackendCall::Events(stack_name.to_string()));
        Ok(self.events.iter().filter(|e| e.timestamp >= since).cloned().collect())
    }
}

/// An uploader that records what it was asked to upload.
#[derive(Debug, Default)]
pub struct RecordingUploader {
    uploads: Mutex<Vec<(PathBuf, String, String)>>,
    failure: Option<String>,
    journal: CallJournal,
}

impl RecordingUploader {
    /// Creates an uploader that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every upload fail as unreachable.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Records calls into a shared journal as well.
    #[must_use]
    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Returns `(path, bucket, key)` for every upload.
    #[must_use]
    pub fn uploads(&self) -> Vec<(PathBuf, String, String)> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl ArtifactUploader for RecordingUploader {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<String> {
        self.journal.record("upload");
        self.uploads
            .lock()
            .push((local_path.to_path_buf(), bucket.to_string(), key.to_string()));
        match &self.failure {
            Some(message) => Err(ProvisionError::remote_transient("upload", message.clone())),
            None => Ok(object_location(bucket, key)),
        }
    }
}
