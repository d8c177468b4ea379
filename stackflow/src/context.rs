//! Resolved inputs shared by the graph and topology builders.

use crate::errors::Result;
use crate::graph::ToolchainVersion;
use crate::options::ProvisionOptions;
use crate::profiles::EnvironmentProfiles;
use crate::source::RepositoryLocator;

/// Everything the builders need, derived once from caller options.
#[derive(Debug, Clone)]
pub struct BuildContext {
    options: ProvisionOptions,
    source: RepositoryLocator,
    toolchain: ToolchainVersion,
    profiles: EnvironmentProfiles,
}

impl BuildContext {
    /// Derives the repository locator and toolchain version.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the repository URL or toolchain version
    /// cannot be parsed.
    pub fn resolve(
        options: ProvisionOptions,
        toolchain_version: &str,
        profiles: EnvironmentProfiles,
    ) -> Result<Self> {
        let source = RepositoryLocator::parse(&options.repository_url)?;
        let toolchain = ToolchainVersion::parse(toolchain_version)?;
        Ok(Self {
            options,
            source,
            toolchain,
            profiles,
        })
    }

    /// Returns the caller options.
    #[must_use]
    pub fn options(&self) -> &ProvisionOptions {
        &self.options
    }

    /// Returns the derived repository locator.
    #[must_use]
    pub fn source(&self) -> &RepositoryLocator {
        &self.source
    }

    /// Returns the toolchain version.
    #[must_use]
    pub fn toolchain(&self) -> &ToolchainVersion {
        &self.toolchain
    }

    /// Returns the environment profiles.
    #[must_use]
    pub fn profiles(&self) -> &EnvironmentProfiles {
        &self.profiles
    }

    /// Returns the service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.options.service_name
    }
}
