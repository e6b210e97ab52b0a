//! `DownloaderFactory` (spec §4.2): dispatches by `ArtifactRef` URI scheme.

use std::collections::HashMap;
use std::sync::Arc;

use edge_core::ArtifactRef;

use crate::error::DownloaderError;
use crate::traits::ArtifactDownloader;

pub struct DownloaderFactory {
    variants: HashMap<&'static str, Arc<dyn ArtifactDownloader>>,
}

impl DownloaderFactory {
    pub fn builder() -> DownloaderFactoryBuilder {
        DownloaderFactoryBuilder::default()
    }

    pub fn for_artifact(&self, artifact: &ArtifactRef) -> Result<Arc<dyn ArtifactDownloader>, DownloaderError> {
        let scheme = artifact.scheme().ok_or_else(|| DownloaderError::UnsupportedScheme { scheme: artifact.uri.clone() })?;
        self.variants
            .get(scheme)
            .cloned()
            .ok_or_else(|| DownloaderError::UnsupportedScheme { scheme: scheme.to_string() })
    }
}

#[derive(Default)]
pub struct DownloaderFactoryBuilder {
    variants: HashMap<&'static str, Arc<dyn ArtifactDownloader>>,
}

impl DownloaderFactoryBuilder {
    pub fn with_scheme(mut self, scheme: &'static str, downloader: Arc<dyn ArtifactDownloader>) -> Self {
        self.variants.insert(scheme, downloader);
        self
    }

    pub fn build(self) -> DownloaderFactory {
        DownloaderFactory { variants: self.variants }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use edge_core::ComponentIdentifier;
    use std::path::Path;

    struct StubDownloader;

    #[async_trait]
    impl ArtifactDownloader for StubDownloader {
        async fn download_size(&self, _id: &ComponentIdentifier, _artifact: &ArtifactRef) -> Result<u64, DownloaderError> {
            Ok(0)
        }
        async fn download_required(&self, _id: &ComponentIdentifier, _artifact: &ArtifactRef, _path: &Path) -> Result<bool, DownloaderError> {
            Ok(true)
        }
        async fn download(&self, _id: &ComponentIdentifier, _artifact: &ArtifactRef, _path: &Path) -> Result<(), DownloaderError> {
            Ok(())
        }
    }

    #[test]
    fn dispatches_by_scheme() {
        let factory = DownloaderFactory::builder().with_scheme("https", Arc::new(StubDownloader)).build();
        assert!(factory.for_artifact(&ArtifactRef::new("https://example.test/x")).is_ok());
        assert!(factory.for_artifact(&ArtifactRef::new("docker://example/x")).is_err());
        assert!(factory.for_artifact(&ArtifactRef::new("not-a-uri")).is_err());
    }
}
