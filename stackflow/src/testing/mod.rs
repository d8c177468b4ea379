//! Test support for stackflow.
//!
//! This module provides:
//! - Sample options, contexts and documents
//! - A scripted stack backend and a recording uploader that log every call

pub mod fixtures;
pub mod mocks;

pub use fixtures::{
    dangling_document, sample_context, sample_context_for, sample_document, sample_options, SAMPLE_TOOLCHAIN,
};
pub use mocks::{BackendCall, CallJournal, RecordingUploader, ScriptedStackBackend, SubmitScript};
