//! `ObjectStoreDownloader` (spec §4.2): `s3://`/`https://` artifact URIs that
//! resolve directly to an HTTPS-fetchable location (e.g. a presigned URL
//! already embedded in `ArtifactRef::uri`).

use std::path::Path;

use async_trait::async_trait;
use edge_core::{ArtifactRef, ComponentIdentifier};

use crate::digest::verify_or_delete;
use crate::error::DownloaderError;
use crate::http::{content_length, ranged_download};
use crate::traits::{default_download_required, ArtifactDownloader};

pub struct ObjectStoreDownloader {
    client: reqwest::Client,
}

impl ObjectStoreDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactDownloader for ObjectStoreDownloader {
    async fn download_size(&self, _identifier: &ComponentIdentifier, artifact: &ArtifactRef) -> Result<u64, DownloaderError> {
        content_length(&self.client, &artifact.uri, None).await
    }

    async fn download_required(&self, _identifier: &ComponentIdentifier, artifact: &ArtifactRef, path: &Path) -> Result<bool, DownloaderError> {
        default_download_required(artifact, path).await
    }

    async fn download(&self, _identifier: &ComponentIdentifier, artifact: &ArtifactRef, path: &Path) -> Result<(), DownloaderError> {
        ranged_download(&self.client, &artifact.uri, path, None).await?;
        verify_or_delete(artifact, path).await
    }
}
