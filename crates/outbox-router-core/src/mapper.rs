//! Pure row-change -> `OutboxEvent` mapping.
//!
//! Deliberately dumb about routing and headers: every column is returned so
//! that downstream rule engines can project without re-parsing the row.
//! Null preservation in `Column::value` matters because a later projection
//! into a header must distinguish "absent" from "empty".

use crate::error::MapperError;
use crate::model::{Column, OutboxEvent, RowAction, RowsEvent};

pub const DEFAULT_AGGREGATE_ID_COLUMN_NAME: &str = "aggregate_id";
pub const DEFAULT_AGGREGATE_TYPE_COLUMN_NAME: &str = "aggregate_type";
pub const DEFAULT_PAYLOAD_COLUMN_NAME: &str = "payload";

/// Configurable column-name lookup, independent of the rest of the mapper's
/// (stateless) logic.
#[derive(Debug, Clone)]
pub struct EventMapper {
    aggregate_id_column_name: String,
    aggregate_type_column_name: String,
    payload_column_name: String,
}

impl Default for EventMapper {
    fn default() -> Self {
        Self {
            aggregate_id_column_name: DEFAULT_AGGREGATE_ID_COLUMN_NAME.to_string(),
            aggregate_type_column_name: DEFAULT_AGGREGATE_TYPE_COLUMN_NAME.to_string(),
            payload_column_name: DEFAULT_PAYLOAD_COLUMN_NAME.to_string(),
        }
    }
}

impl EventMapper {
    pub fn new(
        aggregate_id_column_name: Option<String>,
        aggregate_type_column_name: Option<String>,
        payload_column_name: Option<String>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            aggregate_id_column_name: aggregate_id_column_name
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.aggregate_id_column_name),
            aggregate_type_column_name: aggregate_type_column_name
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.aggregate_type_column_name),
            payload_column_name: payload_column_name
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.payload_column_name),
        }
    }

    /// Maps a row-change event into zero-or-more `OutboxEvent`s.
    ///
    /// Fails with `MapperError::NotInsert` for any action other than
    /// `INSERT` — this is a sentinel, not a fatal error: callers (the
    /// handler) recognize it and continue.
    pub fn map(&self, event: &RowsEvent) -> Result<Vec<OutboxEvent>, MapperError> {
        if event.action != RowAction::Insert {
            return Err(MapperError::NotInsert);
        }

        for row in &event.rows {
            if row.len() != event.table_columns.len() {
                return Err(MapperError::RowSizeMismatch {
                    expected: event.table_columns.len(),
                    actual: row.len(),
                });
            }
        }

        let mut outbox_events = Vec::with_capacity(event.rows.len());
        for row in &event.rows {
            let columns = zip_columns(&event.table_columns, row);
            let (aggregate_id, aggregate_type, payload) = self.main_column_values(&columns)?;

            outbox_events.push(OutboxEvent {
                aggregate_id,
                aggregate_type,
                payload,
                columns,
                event_timestamp_from_database: event.transaction_timestamp,
            });
        }

        Ok(outbox_events)
    }

    fn main_column_values(
        &self,
        columns: &[Column],
    ) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>), MapperError> {
        let mut aggregate_id = None;
        let mut aggregate_type = None;
        let mut payload = None;

        for column in columns {
            if column.name == self.aggregate_id_column_name {
                aggregate_id = column.value.clone();
            } else if column.name == self.aggregate_type_column_name {
                aggregate_type = column.value.clone();
            } else if column.name == self.payload_column_name {
                payload = column.value.clone();
            }
        }

        let aggregate_id = aggregate_id
            .ok_or_else(|| MapperError::ColumnMissing(self.aggregate_id_column_name.clone()))?;
        let aggregate_type = aggregate_type
            .ok_or_else(|| MapperError::ColumnMissing(self.aggregate_type_column_name.clone()))?;
        let payload = payload
            .ok_or_else(|| MapperError::ColumnMissing(self.payload_column_name.clone()))?;

        Ok((aggregate_id, aggregate_type, payload))
    }
}

fn zip_columns(table_columns: &[String], row: &[crate::model::CellValue]) -> Vec<Column> {
    table_columns
        .iter()
        .zip(row.iter())
        .map(|(name, value)| Column {
            name: name.clone(),
            value: value.to_bytes(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, Position};

    fn event(action: RowAction, columns: &[&str], rows: Vec<Vec<CellValue>>) -> RowsEvent {
        RowsEvent {
            table_columns: columns.iter().map(|s| s.to_string()).collect(),
            action,
            rows,
            transaction_timestamp: 5,
            log_position: Position::zero(),
        }
    }

    #[test]
    fn non_insert_action_is_skipped() {
        let mapper = EventMapper::default();
        let e = event(
            RowAction::Delete,
            &["aggregate_id", "aggregate_type", "payload"],
            vec![vec![
                CellValue::Text("c44ade3e-9394-4e6e-8d2d-20707d61061c".into()),
                CellValue::Text("order".into()),
                CellValue::Text(r#"{"name": "new order"}"#.into()),
            ]],
        );

        let err = mapper.map(&e).unwrap_err();
        assert!(matches!(err, MapperError::NotInsert));
    }

    #[test]
    fn single_row_with_default_column_names() {
        let mapper = EventMapper::default();
        let e = event(
            RowAction::Insert,
            &["aggregate_id", "aggregate_type", "payload", "other_column"],
            vec![vec![
                CellValue::Text("c44ade3e-9394-4e6e-8d2d-20707d61061c".into()),
                CellValue::Text("order".into()),
                CellValue::Bytes(br#"{"name": "new order"}"#.to_vec()),
                CellValue::Integer(11),
            ]],
        );

        let got = mapper.map(&e).unwrap();
        assert_eq!(got.len(), 1);
        let oe = &got[0];
        assert_eq!(oe.aggregate_id, b"c44ade3e-9394-4e6e-8d2d-20707d61061c");
        assert_eq!(oe.aggregate_type, b"order");
        assert_eq!(oe.payload, br#"{"name": "new order"}"#);
        assert_eq!(oe.event_timestamp_from_database, 5);
        assert_eq!(
            oe.columns,
            vec![
                Column {
                    name: "aggregate_id".into(),
                    value: Some(b"c44ade3e-9394-4e6e-8d2d-20707d61061c".to_vec())
                },
                Column {
                    name: "aggregate_type".into(),
                    value: Some(b"order".to_vec())
                },
                Column {
                    name: "payload".into(),
                    value: Some(br#"{"name": "new order"}"#.to_vec())
                },
                Column {
                    name: "other_column".into(),
                    value: Some(b"11".to_vec())
                },
            ]
        );
    }

    #[test]
    fn custom_column_names_and_reordering() {
        let mapper = EventMapper::new(
            Some("aggregateId".to_string()),
            Some("aggregateType".to_string()),
            Some("payload_".to_string()),
        );
        let e = event(
            RowAction::Insert,
            &["aggregateType", "payload_", "aggregateId", "other_column"],
            vec![vec![
                CellValue::Text("order".into()),
                CellValue::Text(r#"{"name": "new order"}"#.into()),
                CellValue::Text("c44ade3e-9394-4e6e-8d2d-20707d61061c".into()),
                CellValue::Integer(11),
            ]],
        );

        let got = mapper.map(&e).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].aggregate_id, b"c44ade3e-9394-4e6e-8d2d-20707d61061c");
        assert_eq!(got[0].aggregate_type, b"order");
    }

    #[test]
    fn multiple_rows_preserve_order_and_null_columns() {
        let mapper = EventMapper::default();
        let e = event(
            RowAction::Insert,
            &["aggregate_id", "aggregate_type", "payload", "other_column"],
            vec![
                vec![
                    CellValue::Text("c44ade3e-9394-4e6e-8d2d-20707d61061c".into()),
                    CellValue::Text("order".into()),
                    CellValue::Text(r#"{"name": "new order"}"#.into()),
                    CellValue::Integer(11),
                ],
                vec![
                    CellValue::Text("c38a5d13-788c-4878-8bdc-c012cbad5b82".into()),
                    CellValue::Text("invoice".into()),
                    CellValue::Text(r#"{"name": "new invoice"}"#.into()),
                    CellValue::Null,
                ],
            ],
        );

        let got = mapper.map(&e).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].aggregate_type, b"order");
        assert_eq!(got[1].aggregate_type, b"invoice");
        assert_eq!(got[1].columns.last().unwrap().value, None);
    }

    #[test]
    fn row_size_mismatch_is_an_error() {
        let mapper = EventMapper::default();
        let e = event(
            RowAction::Insert,
            &["aggregate_id", "aggregate_type", "payload"],
            vec![vec![CellValue::Text("only-one".into())]],
        );

        let err = mapper.map(&e).unwrap_err();
        assert!(matches!(err, MapperError::RowSizeMismatch { .. }));
    }

    #[test]
    fn missing_semantic_column_is_an_error() {
        let mapper = EventMapper::new(Some("aggregateId".to_string()), None, None);
        let e = event(
            RowAction::Insert,
            &["aggregate_id", "aggregate_type", "payload"],
            vec![vec![
                CellValue::Text("c44ade3e-9394-4e6e-8d2d-20707d61061c".into()),
                CellValue::Text("order".into()),
                CellValue::Text(r#"{"name": "new order"}"#.into()),
            ]],
        );

        let err = mapper.map(&e).unwrap_err();
        match err {
            MapperError::ColumnMissing(name) => assert_eq!(name, "aggregateId"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
