use edge_core::{Classify, DetailedStatus, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("status publish failed: {reason}")]
    PublishFailed { reason: String },
}

impl Classify for StatusError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransientIo
    }

    fn detailed_status(&self) -> DetailedStatus {
        DetailedStatus::Failed
    }
}
