//! Toolchain version detection for the build image.

use crate::errors::{ProvisionError, Result};
use regex::Regex;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::debug;

/// Environment variable that overrides toolchain detection.
pub const TOOLCHAIN_VERSION_ENV: &str = "STACKFLOW_TOOLCHAIN_VERSION";

const FIELD: &str = "toolchain_version";
const DEFAULT_PROGRAM: &str = "rustc";

/// A bare version, or `rustc --version` output.
static VERSION_PATTERN: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:rustc\s+)?(\d+\.\d+(?:\.\d+)?)(?:[\s\-+(]|$)"));

/// A parsed toolchain version, used to select the build image tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainVersion {
    raw: String,
    version: String,
}

impl ToolchainVersion {
    /// Extracts a numeric dotted version from a raw version string.
    ///
    /// Accepts a bare `MAJOR.MINOR[.PATCH]` or the output of
    /// `rustc --version`, e.g. `rustc 1.79.0 (129f3b996 2024-06-10)`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if no version is present.
    pub fn parse(raw: &str) -> Result<Self> {
        let pattern = VERSION_PATTERN
            .as_ref()
            .map_err(|e| ProvisionError::malformed_input(FIELD, e.to_string()))?;
        let version = pattern
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                ProvisionError::malformed_input(
                    FIELD,
                    format!("unable to determine toolchain version from '{raw}'"),
                )
            })?;

        Ok(Self {
            raw: raw.to_string(),
            version,
        })
    }

    /// Queries the version of the installed toolchain.
    ///
    /// `STACKFLOW_TOOLCHAIN_VERSION` takes precedence over running
    /// `rustc --version`, which resolves `rustc` through `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the toolchain cannot be queried.
    pub async fn detect() -> Result<String> {
        Self::detect_with(|key| std::env::var(key).ok(), DEFAULT_PROGRAM).await
    }

    async fn detect_with(lookup: impl Fn(&str) -> Option<String>, program: &str) -> Result<String> {
        if let Some(raw) = lookup(TOOLCHAIN_VERSION_ENV).filter(|raw| !raw.trim().is_empty()) {
            debug!(raw = %raw, "Toolchain version taken from environment");
            return Ok(raw);
        }

        let output = Command::new(program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                ProvisionError::malformed_input(
                    FIELD,
                    format!("failed to run {program}: {e}; set {TOOLCHAIN_VERSION_ENV} to skip detection"),
                )
            })?;
        if !output.status.success() {
            return Err(ProvisionError::malformed_input(
                FIELD,
                format!("{program} --version exited with {}", output.status),
            ));
        }

        let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(raw = %raw, "Toolchain version detected");
        Ok(raw)
    }

    /// Returns the extracted version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the raw string the version was parsed from.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the container image for the build project.
    #[must_use]
    pub fn build_image(&self) -> String {
        format!("rust:{}", self.version)
    }
}
