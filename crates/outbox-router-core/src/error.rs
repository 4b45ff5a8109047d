//! Error types for the outbox router core.

use thiserror::Error;

/// Errors returned by [`crate::mapper::EventMapper::map`].
#[derive(Error, Debug)]
pub enum MapperError {
    /// The row-change event's action was not `INSERT`. Recognized upstream
    /// as "skip, not fatal" — never propagated past the handler.
    #[error("row-event is not an insert")]
    NotInsert,

    /// A row's cell count did not match the column schema's length.
    #[error("unexpected row length: expected {expected} columns, got {actual}")]
    RowSizeMismatch { expected: usize, actual: usize },

    /// One of the three semantic columns (aggregate id/type, payload) was
    /// absent from the row.
    #[error("{0} column not found")]
    ColumnMissing(String),
}

/// Errors returned by [`crate::dispatcher::Dispatcher::dispatch`].
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A configured header mapping named a column absent from the event.
    #[error("column not found for header. column: {column}, header: {header}")]
    HeaderColumnMissing { header: String, column: String },

    /// The broker producer reported a publish failure.
    #[error("broker publish failed: {0}")]
    BrokerPublishFailed(#[from] ProducerError),
}

/// Errors returned by a [`crate::ports::BrokerProducer`] implementation.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// Errors returned by [`crate::ports::TopicAdmin::ensure_topics`].
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("topic provisioning failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// Errors returned by the [`crate::handler::EventHandler`]'s callback
/// methods; fatal to the stream worker whenever surfaced.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("failed to offer position to checkpoint channel: {0}")]
    PositionChannelClosed(String),
}

/// Errors returned by a [`crate::ports::PositionStore`] implementation.
#[derive(Error, Debug)]
pub enum PositionStoreError {
    #[error("failed to read last position: {0}")]
    GetFailed(#[from] anyhow::Error),

    #[error("failed to persist last position: {0}")]
    SetFailed(String),
}

/// Errors returned by a [`crate::ports::ReplicationSource`] implementation.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("replication stream error: {0}")]
    StreamError(#[from] anyhow::Error),
}

/// The union of errors [`crate::runner::Runner::run`] can surface. Every
/// variant here is fatal: the runner has only one crash-safe mode — fail
/// fast, rely on restart and replay from the last persisted position.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to read starting position: {0}")]
    PositionStoreGetFailed(#[source] PositionStoreError),

    #[error("failed to persist checkpoint: {0}")]
    PositionStoreSetFailed(#[source] PositionStoreError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Stream(#[from] SourceError),
}
