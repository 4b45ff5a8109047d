//! Routes an `OutboxEvent` to one or more broker topics, attaches headers,
//! and publishes synchronously via a [`BrokerProducer`].

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::metrics;
use crate::model::{Header, OutboxEvent, OutgoingMessage};
use crate::ports::BrokerProducer;

pub const TRANSACTION_TIMESTAMP_HEADER_NAME: &str = "transactionTimestamp";

/// A topic-provisioning hint: partitions and replication factor to use if
/// the topic does not already exist. Existing topics are never reconfigured.
#[derive(Debug, Clone)]
pub struct TopicConfig {
    pub partitions: i32,
    pub replication_factor: i16,
}

/// `(aggregate_type_pattern, topic, topic_config)`. Multiple routes may
/// match one event, causing fan-out.
#[derive(Debug, Clone)]
pub struct TopicRoute {
    pub aggregate_type_pattern: Regex,
    pub topic: String,
    pub topic_config: Option<TopicConfig>,
}

/// `(column_name, header_name)`. A mapping whose column is absent from the
/// event is an error.
#[derive(Debug, Clone)]
pub struct HeaderMapping {
    pub column_name: String,
    pub header_name: String,
}

/// Routes, header mappings and the synthetic-timestamp-header toggle are
/// immutable after construction — no locking required at dispatch time.
pub struct Dispatcher<P: BrokerProducer> {
    producer: Arc<P>,
    routes: Vec<TopicRoute>,
    header_mappings: Vec<HeaderMapping>,
    include_transaction_timestamp: bool,
}

impl<P: BrokerProducer> Dispatcher<P> {
    pub fn new(
        producer: Arc<P>,
        routes: Vec<TopicRoute>,
        header_mappings: Vec<HeaderMapping>,
        include_transaction_timestamp: bool,
    ) -> Self {
        Self {
            producer,
            routes,
            header_mappings,
            include_transaction_timestamp,
        }
    }

    pub fn routes(&self) -> &[TopicRoute] {
        &self.routes
    }

    /// Dispatches `event` to every matching route. Zero matches is not an
    /// error — header computation is skipped entirely in that case (routing
    /// is evaluated first). A broker failure on any route aborts the
    /// remaining routes for this event immediately.
    pub async fn dispatch(&self, event: &OutboxEvent) -> Result<(), DispatchError> {
        let matched: Vec<&TopicRoute> = self
            .routes
            .iter()
            .filter(|route| {
                route
                    .aggregate_type_pattern
                    .is_match(&String::from_utf8_lossy(&event.aggregate_type))
            })
            .collect();

        if matched.is_empty() {
            debug!(
                aggregate_type = %String::from_utf8_lossy(&event.aggregate_type),
                "no route matched, skipping publish"
            );
            metrics::record_event_dropped("no_route_match");
            return Ok(());
        }

        let headers = self.build_headers(event)?;

        for route in matched {
            let message = OutgoingMessage {
                topic: route.topic.clone(),
                key: event.aggregate_id.clone(),
                value: event.payload.clone(),
                headers: headers.clone(),
            };

            self.producer.send(message).await.map_err(|e| {
                warn!(topic = %route.topic, error = %e, "broker publish failed");
                DispatchError::BrokerPublishFailed(e)
            })?;
            metrics::record_event_published(&route.topic);
        }

        Ok(())
    }

    fn build_headers(&self, event: &OutboxEvent) -> Result<Vec<Header>, DispatchError> {
        let mut headers = Vec::with_capacity(self.header_mappings.len() + 1);

        for mapping in &self.header_mappings {
            let column = event
                .columns
                .iter()
                .find(|c| c.name == mapping.column_name)
                .ok_or_else(|| DispatchError::HeaderColumnMissing {
                    header: mapping.header_name.clone(),
                    column: mapping.column_name.clone(),
                })?;

            let value = column.value.clone().unwrap_or_default();
            headers.push(Header {
                name: mapping.header_name.clone(),
                value,
            });
        }

        if self.include_transaction_timestamp {
            headers.push(Header {
                name: TRANSACTION_TIMESTAMP_HEADER_NAME.to_string(),
                value: event
                    .event_timestamp_from_database
                    .to_string()
                    .into_bytes(),
            });
        }

        Ok(headers)
    }
}
