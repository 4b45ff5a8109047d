//! Core domain logic for the transactional outbox router: mapping
//! row-change events into broker-independent outbox events, routing and
//! header projection, and the checkpointed run loop. Adapters (the
//! replication source, the broker producer/admin, the position store) live
//! in sibling crates and implement the traits in [`ports`].

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod mapper;
pub mod metrics;
pub mod model;
pub mod ports;
pub mod runner;

pub use dispatcher::{Dispatcher, HeaderMapping, TopicConfig, TopicRoute};
pub use handler::EventHandler;
pub use mapper::EventMapper;
pub use model::{
    CellValue, Column, Header, OutboxEvent, OutgoingMessage, Position, RowAction, RowsEvent,
};
pub use ports::{BrokerProducer, PositionStore, ReplicationSource, RowEventHandler, TopicAdmin};
pub use runner::Runner;
