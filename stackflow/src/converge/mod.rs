//! Stack convergence.
//!
//! This module provides:
//! - The `StackBackend` remote interface and its request/response types
//! - The pure `ConvergencePhase` state machine
//! - Poll cadence and the process-wide named-stack lock registry
//! - `ConvergenceEngine`, which submits exactly one create or update and
//!   polls until a terminal status or the caller's deadline

mod backend;
mod engine;
mod lock;
mod phase;
mod poll;
mod status;

#[cfg(test)]
pub use backend::MockStackBackend;
pub use backend::{StackBackend, StackSubmission, SubmitOutcome, CAPABILITY_IAM};
pub use engine::{ConvergenceAction, ConvergenceEngine, ConvergenceOutcome, ConvergenceRequest};
pub use lock::{StackLockGuard, StackLockRegistry};
pub use phase::{ConvergencePhase, SubmitPlan};
pub use poll::{BackoffStrategy, PollPolicy};
pub use status::{StackDescription, StackEvent, StackStatus};
