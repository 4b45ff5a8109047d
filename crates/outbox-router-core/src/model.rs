//! Broker-independent data model shared by the mapper, dispatcher and handler.

use serde::{Deserialize, Serialize};

/// The resume coordinate of the replication stream.
///
/// Treated as opaque and comparable only by equality outside of the
/// replication source itself; monotonicity is the source's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub log_name: String,
    pub log_offset: u32,
}

impl Position {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// A single column value as it arrives off the wire: a tagged union, since
/// Rust has no dynamic dispatch over primitive scalar types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Bytes(Vec<u8>),
    Text(String),
    Integer(i64),
    Null,
}

impl CellValue {
    /// Coerce the cell to its canonical byte-string representation, or
    /// `None` for a null cell. Bytes and text pass through (text as UTF-8);
    /// anything else is rendered via its decimal/textual form.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            CellValue::Bytes(b) => Some(b.clone()),
            CellValue::Text(s) => Some(s.as_bytes().to_vec()),
            CellValue::Integer(i) => Some(i.to_string().into_bytes()),
            CellValue::Null => None,
        }
    }
}

/// The row-change action kind reported by the replication source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Insert,
    Update,
    Delete,
}

/// A single decoded row-change event: schema, action, rows, and the
/// transaction header (commit timestamp + log position) the source attached.
#[derive(Debug, Clone)]
pub struct RowsEvent {
    pub table_columns: Vec<String>,
    pub action: RowAction,
    pub rows: Vec<Vec<CellValue>>,
    pub transaction_timestamp: u32,
    pub log_position: Position,
}

/// A single column, preserved in source-table order, value `None` for null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub value: Option<Vec<u8>>,
}

/// The internal, broker-independent record emitted per mapped row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxEvent {
    pub aggregate_id: Vec<u8>,
    pub aggregate_type: Vec<u8>,
    pub payload: Vec<u8>,
    pub columns: Vec<Column>,
    pub event_timestamp_from_database: u32,
}

/// A single message header to attach to the outgoing broker record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: Vec<u8>,
}

/// A fully-built outgoing message, ready for a `BrokerProducer` to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub topic: String,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub headers: Vec<Header>,
}
