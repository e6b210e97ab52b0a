use edge_core::{Classify, DetailedStatus, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("no session reached the broker before the caller's deadline")]
    NoConnection,
    #[error("broker refused subscribe to {filter:?}: {reason}")]
    SubscribeRefused { filter: String, reason: String },
    #[error("transient broker/transport error: {0}")]
    Transient(#[from] rumqttc::ClientError),
    #[error("connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
}

impl Classify for MqttError {
    fn kind(&self) -> ErrorKind {
        match self {
            MqttError::NoConnection | MqttError::Transient(_) | MqttError::Connection(_) => ErrorKind::TransientIo,
            MqttError::SubscribeRefused { .. } => ErrorKind::BrokerAuthorization,
        }
    }

    fn detailed_status(&self) -> DetailedStatus {
        match self {
            MqttError::NoConnection | MqttError::Transient(_) | MqttError::Connection(_) => DetailedStatus::Failed,
            MqttError::SubscribeRefused { .. } => DetailedStatus::BrokerAuthorizationRefused,
        }
    }
}
