//! `BrokerProducer` and `TopicAdmin` adapters backed by `rdkafka`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use outbox_router_core::dispatcher::TopicRoute;
use outbox_router_core::error::{ProducerError, ProvisioningError};
use outbox_router_core::model::OutgoingMessage;
use outbox_router_core::ports::{BrokerProducer, TopicAdmin};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use tracing::{info, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);
const ADMIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a [`FutureProducer`] configured for at-least-once delivery with
/// ordering: full-ISR acks and a bounded retry budget, matching the
/// original system's producer configuration.
pub fn build_producer(brokers: &str) -> Result<FutureProducer, KafkaError> {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("acks", "all")
        .set("message.send.max.retries", "10")
        .set("retry.backoff.ms", "250")
        .create()
}

pub struct RdKafkaProducer {
    producer: FutureProducer,
}

impl RdKafkaProducer {
    pub fn new(producer: FutureProducer) -> Self {
        Self { producer }
    }
}

#[async_trait]
impl BrokerProducer for RdKafkaProducer {
    async fn send(&self, message: OutgoingMessage) -> Result<(), ProducerError> {
        let mut headers = OwnedHeaders::new();
        for header in &message.headers {
            headers = headers.insert(Header {
                key: header.name.as_str(),
                value: Some(header.value.as_slice()),
            });
        }

        let record = FutureRecord::to(&message.topic)
            .key(&message.key)
            .payload(&message.value)
            .headers(headers);

        self.producer
            .send(record, DELIVERY_TIMEOUT)
            .await
            .map_err(|(err, _)| ProducerError::PublishFailed(err.to_string()))?;

        info!(topic = %message.topic, "published event to kafka");
        Ok(())
    }
}

/// Ensures every route's topic exists, creating it with the route's
/// configured partitions/replication when it does not. Existing topics are
/// left untouched, mirroring the original dispatcher's describe-then-create
/// provisioning flow.
pub struct RdKafkaAdmin {
    admin: AdminClient<DefaultClientContext>,
}

impl RdKafkaAdmin {
    pub fn new(brokers: &str) -> Result<Self, KafkaError> {
        let admin = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()?;
        Ok(Self { admin })
    }
}

#[async_trait]
impl TopicAdmin for RdKafkaAdmin {
    async fn ensure_topics(&self, routes: &[TopicRoute]) -> Result<(), ProvisioningError> {
        let mut by_topic = HashMap::new();
        for route in routes {
            by_topic.entry(route.topic.as_str()).or_insert(route);
        }

        let new_topics: Vec<NewTopic> = by_topic
            .values()
            .map(|route| {
                let (partitions, replication_factor) = route
                    .topic_config
                    .as_ref()
                    .map(|c| (c.partitions, c.replication_factor))
                    .unwrap_or((1, 1));
                NewTopic::new(
                    &route.topic,
                    partitions,
                    TopicReplication::Fixed(replication_factor.into()),
                )
            })
            .collect();

        if new_topics.is_empty() {
            return Ok(());
        }

        let results = self
            .admin
            .create_topics(&new_topics, &AdminOptions::new().request_timeout(Some(ADMIN_TIMEOUT)))
            .await
            .map_err(|e| ProvisioningError::Failed(anyhow::anyhow!(e)))?;

        for result in results {
            match result {
                Ok(topic) => info!(topic = %topic, "topic created"),
                Err((topic, code)) if code == RDKafkaErrorCode::TopicAlreadyExists => {
                    warn!(topic = %topic, "topic already exists, skipping");
                }
                Err((topic, code)) => {
                    return Err(ProvisioningError::Failed(anyhow::anyhow!(
                        "failed to create topic {topic}: {code:?}"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_producer_accepts_broker_list() {
        let producer = build_producer("localhost:9092");
        assert!(producer.is_ok());
    }
}
