//! Source repository locators.

use crate::errors::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Branch monitored when the locator does not name one.
pub const DEFAULT_BRANCH: &str = "master";

const FIELD: &str = "repository_url";

/// Owner, repository and branch derived from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLocator {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch to monitor.
    pub branch: String,
}

impl RepositoryLocator {
    /// Parses a repository URL such as `https://github.com/acme/widget/dev`.
    ///
    /// The first two path segments are the owner and repository. When more
    /// segments follow, the last one is the branch; otherwise the branch
    /// defaults to [`DEFAULT_BRANCH`]. Empty segments are ignored.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the URL does not parse or lacks the
    /// owner/repository segments.
    pub fn parse(repository_url: &str) -> Result<Self> {
        let url = Url::parse(repository_url).map_err(|e| {
            ProvisionError::malformed_input(FIELD, format!("'{repository_url}' is not a valid URL: {e}"))
        })?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let (owner, repo) = match segments.as_slice() {
            [owner, repo, ..] => ((*owner).to_string(), (*repo).to_string()),
            _ => {
                return Err(ProvisionError::malformed_input(
                    FIELD,
                    format!("'{repository_url}' is missing the owner/repository path segments"),
                ))
            }
        };

        let branch = if segments.len() > 2 {
            segments[segments.len() - 1].to_string()
        } else {
            DEFAULT_BRANCH.to_string()
        };

        Ok(Self { owner, repo, branch })
    }
}
