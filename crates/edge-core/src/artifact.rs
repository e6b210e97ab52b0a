//! `ArtifactRef` (spec §3): a URI plus an optional digest to verify against.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
}

impl DigestAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
        }
    }
}

/// A reference to one downloadable file. `uri`'s scheme selects the
/// downloader variant (spec §4.2). Absent `digest` means "accept any local
/// copy" — `DownloadRequired` must treat that as "never re-download once a
/// file exists at the target path".
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub uri: String,
    pub digest: Option<String>,
    pub algorithm: Option<DigestAlgorithm>,
}

impl ArtifactRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            digest: None,
            algorithm: None,
        }
    }

    pub fn with_digest(mut self, algorithm: DigestAlgorithm, digest: impl Into<String>) -> Self {
        self.algorithm = Some(algorithm);
        self.digest = Some(digest.into());
        self
    }

    /// The URI scheme (`"s3"`, `"https"`, `"vendor"`, `"docker"`, ...), used
    /// by the downloader factory to pick a variant.
    pub fn scheme(&self) -> Option<&str> {
        self.uri.split_once("://").map(|(scheme, _)| scheme)
    }

    pub fn has_declared_digest(&self) -> bool {
        self.digest.is_some() && self.algorithm.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_extraction() {
        assert_eq!(ArtifactRef::new("s3://bucket/key").scheme(), Some("s3"));
        assert_eq!(ArtifactRef::new("docker://registry/image:tag").scheme(), Some("docker"));
        assert_eq!(ArtifactRef::new("not-a-uri").scheme(), None);
    }

    #[test]
    fn declared_digest_requires_both_fields() {
        let bare = ArtifactRef::new("https://example.test/app.tgz");
        assert!(!bare.has_declared_digest());
        let with_digest = bare.with_digest(DigestAlgorithm::Sha256, "deadbeef");
        assert!(with_digest.has_declared_digest());
    }
}
