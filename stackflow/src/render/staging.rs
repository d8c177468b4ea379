//! All-or-nothing writes of rendered documents to the staging directory.

use super::document::Document;
use crate::errors::{ProvisionError, Result};
use crate::profiles::EnvironmentProfiles;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes the document to `dir/file_name` and returns the final path.
///
/// The bytes go to a temporary file in the same directory which is then
/// renamed over the target, so readers never see a partial document.
///
/// # Errors
///
/// Returns `Io` if the directory cannot be created or written.
pub fn stage_document(doc: &Document, dir: &Path, file_name: &str) -> Result<PathBuf> {
    let bytes = doc.to_pretty_bytes()?;
    write_atomically(dir, file_name, &bytes)
}

/// Writes one template-configuration file per environment profile.
///
/// # Errors
///
/// Returns `Io` if any file cannot be written.
pub fn stage_profile_configurations(
    profiles: &EnvironmentProfiles,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    profiles
        .iter()
        .map(|profile| {
            let bytes = to_pretty_bytes(&profile.template_configuration())?;
            write_atomically(dir, &profile.config_file_name(), &bytes)
        })
        .collect()
}

fn to_pretty_bytes(value: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(value)?)
}

fn write_atomically(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| {
        ProvisionError::io(format!("creating staging directory {}", dir.display()), e)
    })?;

    let target = dir.join(file_name);
    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| ProvisionError::io(format!("creating temporary file in {}", dir.display()), e))?;
    temp.write_all(bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| ProvisionError::io(format!("writing {}", target.display()), e))?;
    temp.persist(&target)
        .map_err(|e| ProvisionError::io(format!("persisting {}", target.display()), e.error))?;

    debug!(path = %target.display(), bytes = bytes.len(), "Staged file");
    Ok(target)
}
