//! Adapts `edge_mqtt::Multiplexer` to `edge_status::StatusPublisher` (spec
//! §6: `$aws/things/<thingName>/greengrassv2/health/json`, QoS 1).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use edge_mqtt::Multiplexer;
use edge_status::StatusError;
use rumqttc::QoS;

pub struct MqttStatusPublisher {
    multiplexer: Arc<Multiplexer>,
    topic: String,
    publish_timeout: Duration,
}

impl MqttStatusPublisher {
    pub fn new(multiplexer: Arc<Multiplexer>, thing_name: &str, publish_timeout: Duration) -> Self {
        Self {
            multiplexer,
            topic: format!("$aws/things/{thing_name}/greengrassv2/health/json"),
            publish_timeout,
        }
    }
}

#[async_trait]
impl edge_status::StatusPublisher for MqttStatusPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), StatusError> {
        let deadline = Instant::now() + self.publish_timeout;
        self.multiplexer
            .publish(self.topic.clone(), payload, QoS::AtLeastOnce, deadline)
            .await
            .map_err(|source| StatusError::PublishFailed { reason: source.to_string() })
    }
}
