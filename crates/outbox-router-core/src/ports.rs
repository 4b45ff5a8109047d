//! Trait contracts the core depends on, implemented by adapter crates.
//!
//! These are the "external collaborators" spec.md §1 names as out of scope
//! for this crate: a replication source, a broker producer, a topic admin,
//! and a position store. The core is generic over them and never reaches
//! for a concrete driver itself.

use async_trait::async_trait;

use crate::dispatcher::TopicRoute;
use crate::error::{PositionStoreError, ProducerError, ProvisioningError, SourceError};
use crate::model::{OutgoingMessage, Position, RowsEvent};

/// The replication-source callback surface. Modeled as a trait with two
/// operations and a self-describing name, per spec.md §9's design notes,
/// rather than as an inheritance hierarchy.
#[async_trait]
pub trait RowEventHandler: Send + Sync {
    async fn on_row(&self, event: RowsEvent) -> Result<(), crate::error::HandlerError>;

    async fn on_pos_synced(&self, position: Position) -> Result<(), crate::error::HandlerError>;

    fn name(&self) -> &'static str;
}

/// A "canal-like" replication source: tails the database's replication log
/// from a given position until cancelled or a fatal error occurs.
#[async_trait]
pub trait ReplicationSource: Send + Sync {
    /// Blocks until the stream terminates or an unrecoverable error occurs.
    async fn run_from(&self, position: Position) -> Result<(), SourceError>;

    /// Releases the underlying connection. Called once by the `Runner`
    /// after `run_from` returns.
    async fn close(&self) -> Result<(), SourceError>;
}

/// Synchronous, keyed publish with headers, requiring ack from all
/// in-sync replicas. Implementations own their own retry budget.
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<(), ProducerError>;
}

/// Ensures declared topics exist before the dispatcher accepts publishes.
#[async_trait]
pub trait TopicAdmin: Send + Sync {
    async fn ensure_topics(&self, routes: &[TopicRoute]) -> Result<(), ProvisioningError>;
}

/// Persists and retrieves the single scalar checkpoint.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Returns the persisted position, or the zero position if none has
    /// ever been written — never an error on its own.
    async fn get_last_position(&self) -> Result<Position, PositionStoreError>;

    async fn set_last_position(&self, position: Position) -> Result<(), PositionStoreError>;
}
