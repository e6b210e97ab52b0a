use std::path::Path;

use async_trait::async_trait;
use edge_core::{ArtifactRef, ComponentIdentifier};

use crate::error::DownloaderError;

/// Contract every downloader variant implements (spec §4.2).
#[async_trait]
pub trait ArtifactDownloader: Send + Sync {
    async fn download_size(&self, identifier: &ComponentIdentifier, artifact: &ArtifactRef) -> Result<u64, DownloaderError>;

    /// `false` iff a local copy at `path` already matches `(digest, algorithm)`.
    /// With no declared digest, any existing file is accepted as-is.
    async fn download_required(&self, identifier: &ComponentIdentifier, artifact: &ArtifactRef, path: &Path) -> Result<bool, DownloaderError>;

    /// Idempotent. On success `path` contains a file whose digest matches the
    /// declared one (when one was declared).
    async fn download(&self, identifier: &ComponentIdentifier, artifact: &ArtifactRef, path: &Path) -> Result<(), DownloaderError>;
}

/// Shared `download_required` logic: compares an existing file's digest
/// against the declared one. Variants that can't cheaply recompute a digest
/// (e.g. container layers keyed by content digest already) may override.
pub async fn default_download_required(artifact: &ArtifactRef, path: &Path) -> Result<bool, DownloaderError> {
    if !path.exists() {
        return Ok(true);
    }
    let (Some(expected), Some(algorithm)) = (artifact.digest.as_deref(), artifact.algorithm) else {
        return Ok(false);
    };
    let _ = algorithm;
    let actual = crate::digest::sha256_hex(path).await.map_err(|source| DownloaderError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(!actual.eq_ignore_ascii_case(expected))
}
