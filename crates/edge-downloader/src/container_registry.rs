//! `ContainerRegistryDownloader` (spec §4.2): `docker://`/`oci://` artifact
//! URIs naming an image reference. Private registries fetch short-lived
//! credentials through the shared [`CredentialGate`] before login.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use edge_core::{ArtifactRef, ComponentIdentifier, CredentialFetchError, CredentialGate, RegistryCredentials};

use crate::digest::verify_or_delete;
use crate::error::DownloaderError;
use crate::http::{content_length, ranged_download, Auth};
use crate::image_ref::{self, ImageReference};
use crate::traits::{default_download_required, ArtifactDownloader};

pub type CredentialFetchFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<RegistryCredentials, CredentialFetchError>> + Send>> + Send + Sync>;

#[async_trait]
pub trait RegistryUrlResolver: Send + Sync {
    /// Resolves a parsed reference to a fetchable blob/manifest URL.
    async fn resolve(&self, reference: &ImageReference) -> Result<String, DownloaderError>;
    /// Whether this reference's registry requires authenticated, short-lived
    /// credentials rather than anonymous pull.
    fn is_private(&self, reference: &ImageReference) -> bool;
}

pub struct ContainerRegistryDownloader {
    client: reqwest::Client,
    resolver: Arc<dyn RegistryUrlResolver>,
    credential_gate: Option<CredentialGate<CredentialFetchFn>>,
}

impl ContainerRegistryDownloader {
    pub fn new(client: reqwest::Client, resolver: Arc<dyn RegistryUrlResolver>, credential_fetch: Option<CredentialFetchFn>) -> Self {
        Self {
            client,
            resolver,
            credential_gate: credential_fetch.map(CredentialGate::new),
        }
    }

    fn strip_scheme(uri: &str) -> &str {
        uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri)
    }

    async fn auth_for(&self, reference: &ImageReference) -> Result<Option<Auth>, DownloaderError> {
        if !self.resolver.is_private(reference) {
            return Ok(None);
        }
        let gate = self
            .credential_gate
            .as_ref()
            .ok_or_else(|| DownloaderError::Authentication { uri: reference.path.clone(), status: 401 })?;
        let creds = gate.credentials(Instant::now()).await?;
        Ok(Some(Auth::Basic { username: creds.username, password: creds.password }))
    }

    fn parse(artifact: &ArtifactRef) -> Result<ImageReference, DownloaderError> {
        image_ref::parse(Self::strip_scheme(&artifact.uri))
    }
}

#[async_trait]
impl ArtifactDownloader for ContainerRegistryDownloader {
    async fn download_size(&self, _identifier: &ComponentIdentifier, artifact: &ArtifactRef) -> Result<u64, DownloaderError> {
        let reference = Self::parse(artifact)?;
        let auth = self.auth_for(&reference).await?;
        let url = self.resolver.resolve(&reference).await?;
        content_length(&self.client, &url, auth.as_ref()).await
    }

    async fn download_required(&self, _identifier: &ComponentIdentifier, artifact: &ArtifactRef, path: &Path) -> Result<bool, DownloaderError> {
        default_download_required(artifact, path).await
    }

    async fn download(&self, _identifier: &ComponentIdentifier, artifact: &ArtifactRef, path: &Path) -> Result<(), DownloaderError> {
        let reference = Self::parse(artifact)?;
        let auth = self.auth_for(&reference).await?;
        let url = self.resolver.resolve(&reference).await?;
        ranged_download(&self.client, &url, path, auth.as_ref()).await?;
        verify_or_delete(artifact, path).await
    }
}
