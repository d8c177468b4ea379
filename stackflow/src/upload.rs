//! Artifact upload interface.

use crate::errors::{ProvisionError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Copies a staged file into the artifact bucket.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Uploads `local_path` to `bucket` under `key` and returns the location
    /// the stack backend reads it from. Returns only once the store has
    /// confirmed the write.
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<String>;
}

/// The canonical location of an object.
#[must_use]
pub fn object_location(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

/// Stores objects as files under `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalDirectoryUploader {
    root: PathBuf,
}

impl LocalDirectoryUploader {
    /// Creates an uploader rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path an object is stored at.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the bucket or key would escape the root.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        for (field, value) in [("bucket", bucket), ("key", key)] {
            let relative = Path::new(value);
            let plain = !value.is_empty()
                && relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if !plain {
                return Err(ProvisionError::malformed_input(
                    field,
                    format!("'{value}' is not a relative object name"),
                ));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ArtifactUploader for LocalDirectoryUploader {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<String> {
        let target = self.object_path(bucket, key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProvisionError::io(format!("creating {}", parent.display()), e))?;
        }
        tokio::fs::copy(local_path, &target).await.map_err(|e| {
            ProvisionError::io(
                format!("copying {} to {}", local_path.display(), target.display()),
                e,
            )
        })?;
        debug!(target = %target.display(), "Object stored");
        Ok(object_location(bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_uploader_returns_location() {
        let mut uploader = MockArtifactUploader::new();
        uploader
            .expect_upload()
            .withf(|_, bucket, key| bucket == "acme-artifacts" && key == "widget-codepipelineTemplate.json")
            .times(1)
            .returning(|_, bucket, key| Ok(object_location(bucket, key)));

        let location = uploader
            .upload(Path::new("/tmp/pipeline.json"), "acme-artifacts", "widget-codepipelineTemplate.json")
            .await
            .unwrap();
        assert_eq!(location, "s3://acme-artifacts/widget-codepipelineTemplate.json");
    }

    #[tokio::test]
    async fn test_local_directory_uploader_copies_file() {
        let staging = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let source = staging.path().join("pipeline.json");
        std::fs::write(&source, b"{\"Resources\":{}}").unwrap();

        let uploader = LocalDirectoryUploader::new(store.path());
        let location = uploader
            .upload(&source, "acme-artifacts", "widget-codepipelineTemplate.json")
            .await
            .unwrap();

        assert_eq!(location, "s3://acme-artifacts/widget-codepipelineTemplate.json");
        let stored = std::fs::read(store.path().join("acme-artifacts/widget-codepipelineTemplate.json")).unwrap();
        assert_eq!(stored, b"{\"Resources\":{}}");
    }

    #[tokio::test]
    async fn test_local_directory_uploader_rejects_escaping_keys() {
        let store = tempfile::tempdir().unwrap();
        let uploader = LocalDirectoryUploader::new(store.path());

        for (bucket, key) in [("acme", "../outside.json"), ("..", "x.json"), ("acme", "/abs.json"), ("", "x")] {
            let err = uploader.upload(Path::new("unused"), bucket, key).await.unwrap_err();
            assert!(matches!(err, ProvisionError::MalformedInput { .. }), "{bucket}/{key}");
        }
    }

    #[tokio::test]
    async fn test_missing_source_is_io_error() {
        let store = tempfile::tempdir().unwrap();
        let uploader = LocalDirectoryUploader::new(store.path());
        let err = uploader
            .upload(&store.path().join("missing.json"), "acme", "k.json")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Io { .. }));
    }
}
