use edge_core::{Classify, DetailedStatus, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum DownloaderError {
    #[error("transport error fetching {uri}: {source}")]
    Transport { uri: String, #[source] source: reqwest::Error },
    #[error("filesystem error staging {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("{uri} returned a non-retryable status {status}")]
    ServiceUnavailable { uri: String, status: u16 },
    #[error("{uri} refused the request with status {status}")]
    Authentication { uri: String, status: u16 },
    #[error("digest mismatch for {uri}: expected {expected}, got {actual}")]
    IntegrityMismatch { uri: String, expected: String, actual: String },
    #[error("malformed container image reference {reference:?}: {reason}")]
    MalformedImageReference { reference: String, reason: &'static str },
    #[error("no downloader variant handles scheme {scheme:?}")]
    UnsupportedScheme { scheme: String },
    #[error("credential rotation requested: {0}")]
    CredentialRotation(#[from] edge_core::CredentialRotationRequested),
}

impl Classify for DownloaderError {
    fn kind(&self) -> ErrorKind {
        match self {
            DownloaderError::Transport { .. } | DownloaderError::ServiceUnavailable { .. } => ErrorKind::TransientIo,
            DownloaderError::Io { .. } => ErrorKind::TransientIo,
            DownloaderError::Authentication { .. } => ErrorKind::CredentialExpiry,
            DownloaderError::IntegrityMismatch { .. } => ErrorKind::Integrity,
            DownloaderError::MalformedImageReference { .. } => ErrorKind::UnsatisfiableDependency,
            DownloaderError::UnsupportedScheme { .. } => ErrorKind::UnsatisfiableDependency,
            DownloaderError::CredentialRotation(_) => ErrorKind::CredentialExpiry,
        }
    }

    fn detailed_status(&self) -> DetailedStatus {
        match self {
            DownloaderError::Transport { .. } | DownloaderError::ServiceUnavailable { .. } | DownloaderError::Io { .. } => DetailedStatus::Failed,
            DownloaderError::Authentication { .. } | DownloaderError::CredentialRotation(_) => DetailedStatus::CredentialExpired,
            DownloaderError::IntegrityMismatch { .. } => DetailedStatus::IntegrityFailure,
            DownloaderError::MalformedImageReference { .. } | DownloaderError::UnsupportedScheme { .. } => DetailedStatus::UnsatisfiableDependency,
        }
    }
}

/// Whether this error belongs to the *connection-class* retry regime
/// (infinite attempts, capped interval) versus *bounded* (spec §4.2).
pub fn is_connection_class(error: &DownloaderError) -> bool {
    matches!(error, DownloaderError::Transport { .. } | DownloaderError::ServiceUnavailable { .. } | DownloaderError::Io { .. })
}
