//! Prometheus metrics for the router, registered against the process-wide
//! default registry the first time each is touched, so the binary only needs
//! to mount one `/metrics` handler.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, IntGauge, Opts};

static EVENTS_MAPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "outbox_router_events_mapped_total",
            "Row-change events successfully mapped into outbox events",
        ),
        &["aggregate_type"],
    )
    .expect("failed to create outbox_router_events_mapped_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register outbox_router_events_mapped_total");
    counter
});

static EVENTS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "outbox_router_events_published_total",
            "Outbox events successfully published to the broker",
        ),
        &["topic"],
    )
    .expect("failed to create outbox_router_events_published_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register outbox_router_events_published_total");
    counter
});

static EVENTS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "outbox_router_events_dropped_total",
            "Row-change events or outbox events that were not published",
        ),
        &["reason"],
    )
    .expect("failed to create outbox_router_events_dropped_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register outbox_router_events_dropped_total");
    counter
});

static LAST_POSITION_OFFSET: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::with_opts(Opts::new(
        "outbox_router_last_position_offset",
        "Log offset of the most recently flushed replication position",
    ))
    .expect("failed to create outbox_router_last_position_offset");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register outbox_router_last_position_offset");
    gauge
});

static CHECKPOINT_FLUSH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "outbox_router_checkpoint_flush_failures_total",
            "Failed attempts to persist the checkpoint position",
        ),
        &["store"],
    )
    .expect("failed to create outbox_router_checkpoint_flush_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register outbox_router_checkpoint_flush_failures_total");
    counter
});

/// One row successfully mapped into an outbox event for `aggregate_type`.
pub fn record_event_mapped(aggregate_type: &str) {
    EVENTS_MAPPED_TOTAL.with_label_values(&[aggregate_type]).inc();
}

/// One outbox event published to `topic`.
pub fn record_event_published(topic: &str) {
    EVENTS_PUBLISHED_TOTAL.with_label_values(&[topic]).inc();
}

/// One row-change or outbox event that did not result in a publish, tagged
/// with why (`not_insert`, `no_route_match`).
pub fn record_event_dropped(reason: &str) {
    EVENTS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
}

/// The log offset most recently written to the position store.
pub fn set_last_position_offset(offset: u32) {
    LAST_POSITION_OFFSET.set(offset as i64);
}

/// A checkpoint flush to `store` failed.
pub fn record_checkpoint_flush_failure(store: &str) {
    CHECKPOINT_FLUSH_FAILURES_TOTAL.with_label_values(&[store]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_helpers_do_not_panic_across_repeated_calls() {
        record_event_mapped("order");
        record_event_mapped("order");
        record_event_published("order");
        record_event_dropped("not_insert");
        set_last_position_offset(42);
        record_checkpoint_flush_failure("redis");
    }
}
