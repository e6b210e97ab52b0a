//! `VendorRepoDownloader` (spec §4.2): `vendor://` artifact URIs that name a
//! component artifact in a vendor's package repository rather than a
//! directly-fetchable URL. Resolution to an HTTPS location is delegated to a
//! [`VendorUrlResolver`] so the actual repository API (out of scope here)
//! stays pluggable.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use edge_core::{ArtifactRef, ComponentIdentifier};

use crate::digest::verify_or_delete;
use crate::error::DownloaderError;
use crate::http::{content_length, ranged_download};
use crate::traits::{default_download_required, ArtifactDownloader};

#[async_trait]
pub trait VendorUrlResolver: Send + Sync {
    async fn resolve(&self, identifier: &ComponentIdentifier, artifact: &ArtifactRef) -> Result<String, DownloaderError>;
}

pub struct VendorRepoDownloader {
    client: reqwest::Client,
    resolver: Arc<dyn VendorUrlResolver>,
}

impl VendorRepoDownloader {
    pub fn new(client: reqwest::Client, resolver: Arc<dyn VendorUrlResolver>) -> Self {
        Self { client, resolver }
    }
}

#[async_trait]
impl ArtifactDownloader for VendorRepoDownloader {
    async fn download_size(&self, identifier: &ComponentIdentifier, artifact: &ArtifactRef) -> Result<u64, DownloaderError> {
        let url = self.resolver.resolve(identifier, artifact).await?;
        content_length(&self.client, &url, None).await
    }

    async fn download_required(&self, _identifier: &ComponentIdentifier, artifact: &ArtifactRef, path: &Path) -> Result<bool, DownloaderError> {
        default_download_required(artifact, path).await
    }

    async fn download(&self, identifier: &ComponentIdentifier, artifact: &ArtifactRef, path: &Path) -> Result<(), DownloaderError> {
        let url = self.resolver.resolve(identifier, artifact).await?;
        ranged_download(&self.client, &url, path, None).await?;
        verify_or_delete(artifact, path).await
    }
}
