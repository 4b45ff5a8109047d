//! Binds the mapper and dispatcher into the `RowEventHandler` the
//! replication source calls back into, and forwards synced positions to the
//! checkpoint task via a `watch` channel.

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::dispatcher::Dispatcher;
use crate::error::{HandlerError, MapperError};
use crate::mapper::EventMapper;
use crate::metrics;
use crate::model::{Position, RowsEvent};
use crate::ports::{BrokerProducer, RowEventHandler};

/// The production `RowEventHandler`. Construction wires a `watch::Sender`
/// supplied by the `Runner` so the handler never owns the checkpoint
/// persistence itself — it only reports "this position has been fully
/// processed".
pub struct EventHandler<P: BrokerProducer> {
    mapper: EventMapper,
    dispatcher: Dispatcher<P>,
    position_tx: watch::Sender<Position>,
}

impl<P: BrokerProducer> EventHandler<P> {
    pub fn new(
        mapper: EventMapper,
        dispatcher: Dispatcher<P>,
        position_tx: watch::Sender<Position>,
    ) -> Self {
        Self {
            mapper,
            dispatcher,
            position_tx,
        }
    }
}

#[async_trait]
impl<P: BrokerProducer> RowEventHandler for EventHandler<P> {
    /// Maps and dispatches every event in the row-change. A non-insert
    /// action is logged at debug level and treated as a no-op; any other
    /// mapper or dispatch error is fatal and propagates to the runner.
    async fn on_row(&self, event: RowsEvent) -> Result<(), HandlerError> {
        let outbox_events = match self.mapper.map(&event) {
            Ok(events) => events,
            Err(MapperError::NotInsert) => {
                debug!("skipping non-insert row event");
                metrics::record_event_dropped("not_insert");
                return Ok(());
            }
            Err(other) => return Err(HandlerError::Mapper(other)),
        };

        for outbox_event in outbox_events {
            metrics::record_event_mapped(&String::from_utf8_lossy(&outbox_event.aggregate_type));
            self.dispatcher.dispatch(&outbox_event).await?;
        }

        Ok(())
    }

    /// Offers the synced position to the checkpoint task. The channel is
    /// "latest wins": an intermediate position dropped because a newer one
    /// arrived before the checkpoint task read it is not a bug.
    async fn on_pos_synced(&self, position: Position) -> Result<(), HandlerError> {
        self.position_tx.send(position).map_err(|e| {
            error!(error = %e, "checkpoint channel has no receiver");
            HandlerError::PositionChannelClosed(e.to_string())
        })
    }

    fn name(&self) -> &'static str {
        "outbox-router-event-handler"
    }
}
