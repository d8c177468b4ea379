//! Provisioner configuration.
//!
//! Values come from serde defaults and may be overridden by environment
//! variables. Malformed overrides are rejected, never ignored.

use crate::converge::PollPolicy;
use crate::errors::{ProvisionError, Result};
use crate::observability::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Overrides the staging directory.
pub const STAGING_DIR_ENV: &str = "STACKFLOW_STAGING_DIR";
/// Overrides the poll interval, in seconds.
pub const POLL_INTERVAL_ENV: &str = "STACKFLOW_POLL_INTERVAL_SECS";
/// Overrides the convergence timeout, in seconds.
pub const TIMEOUT_ENV: &str = "STACKFLOW_TIMEOUT_SECS";
/// Overrides the log format (`text` or `json`).
pub const LOG_FORMAT_ENV: &str = "STACKFLOW_LOG_FORMAT";

fn default_staging_dir() -> PathBuf {
    PathBuf::from(".stackflow")
}

fn default_document_file_name() -> String {
    "pipeline.json".to_string()
}

fn default_timeout_secs() -> u64 {
    1800
}

fn default_description() -> String {
    "Continuous delivery pipeline".to_string()
}

/// Settings shared by every provision run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Directory the document and profile configurations are written to.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// File name of the staged document.
    #[serde(default = "default_document_file_name")]
    pub document_file_name: String,
    /// Description written into the document.
    #[serde(default = "default_description")]
    pub description: String,
    /// Poll cadence while converging.
    #[serde(default)]
    pub poll: PollPolicy,
    /// Upper bound on a single convergence, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            document_file_name: default_document_file_name(),
            description: default_description(),
            poll: PollPolicy::default(),
            timeout_secs: default_timeout_secs(),
            log_format: LogFormat::default(),
        }
    }
}

impl ProvisionerConfig {
    /// Defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` naming the variable if an override is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` naming the variable if an override is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::default().overlay(lookup)
    }

    /// Applies overrides from `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` naming the variable if an override is invalid.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dir) = lookup(STAGING_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.staging_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(POLL_INTERVAL_ENV) {
            let secs = parse_positive_secs(POLL_INTERVAL_ENV, &raw)?;
            self.poll = self.poll.with_interval(Duration::from_secs(secs));
        }
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            self.timeout_secs = parse_positive_secs(TIMEOUT_ENV, &raw)?;
        }
        if let Some(raw) = lookup(LOG_FORMAT_ENV) {
            self.log_format = raw
                .parse()
                .map_err(|_| ProvisionError::malformed_input(LOG_FORMAT_ENV, format!("unknown format '{raw}'")))?;
        }
        Ok(self)
    }

    /// Sets the staging directory.
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Sets the poll policy.
    #[must_use]
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Upper bound on a single convergence.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_positive_secs(var: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ProvisionError::malformed_input(
            var,
            format!("expected a positive number of seconds, got '{raw}'"),
        )),
    }
}
