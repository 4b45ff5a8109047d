//! Owns the replication source's lifetime and the periodic checkpoint task.
//!
//! The source is expected to already be wired with a `RowEventHandler` at
//! construction time (adapter-specific) — the runner only drives `run_from`
//! to completion and keeps the externally-persisted position fresh while it
//! runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{PositionStoreError, RunnerError};
use crate::metrics;
use crate::model::Position;
use crate::ports::{PositionStore, ReplicationSource};

pub struct Runner<S: ReplicationSource, PS: PositionStore> {
    source: Arc<S>,
    position_store: Arc<PS>,
    position_rx: watch::Receiver<Position>,
    flush_period: Duration,
}

impl<S: ReplicationSource + 'static, PS: PositionStore + 'static> Runner<S, PS> {
    pub fn new(
        source: Arc<S>,
        position_store: Arc<PS>,
        position_rx: watch::Receiver<Position>,
        flush_period: Duration,
    ) -> Self {
        Self {
            source,
            position_store,
            position_rx,
            flush_period,
        }
    }

    /// Reads the starting position, then runs the stream and the checkpoint
    /// task concurrently until the stream terminates or the checkpoint task
    /// reports a fatal persistence failure, whichever comes first. The
    /// checkpoint task is always given one last chance to flush before
    /// returning, unless it has already failed to persist.
    pub async fn run(&self) -> Result<(), RunnerError> {
        let start_position = self
            .position_store
            .get_last_position()
            .await
            .map_err(RunnerError::PositionStoreGetFailed)?;

        info!(
            log_name = %start_position.log_name,
            log_offset = start_position.log_offset,
            "starting replication from persisted position"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let (checkpoint_err_tx, mut checkpoint_err_rx) = mpsc::channel::<PositionStoreError>(1);
        let checkpoint_handle = self.spawn_checkpoint_task(shutdown_rx, checkpoint_err_tx);

        let stream_result: Result<(), RunnerError> = tokio::select! {
            result = self.source.run_from(start_position) => result.map_err(RunnerError::Stream),
            Some(err) = checkpoint_err_rx.recv() => {
                error!(error = %err, "checkpoint flush failed mid-stream, terminating run");
                Err(RunnerError::PositionStoreSetFailed(err))
            }
        };

        let _ = shutdown_tx.send(());
        if let Err(e) = checkpoint_handle.await {
            error!(error = %e, "checkpoint task panicked");
        }

        if let Err(e) = self.source.close().await {
            warn!(error = %e, "error closing replication source");
        }

        if stream_result.is_ok() {
            self.flush_current_position().await?;
        }

        stream_result
    }

    fn spawn_checkpoint_task(
        &self,
        mut shutdown_rx: watch::Receiver<()>,
        error_tx: mpsc::Sender<PositionStoreError>,
    ) -> JoinHandle<()> {
        let position_store = self.position_store.clone();
        let mut position_rx = self.position_rx.clone();
        let flush_period = self.flush_period;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(flush_period);
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let position = position_rx.borrow_and_update().clone();
                        let offset = position.log_offset;
                        match position_store.set_last_position(position).await {
                            Ok(()) => metrics::set_last_position_offset(offset),
                            Err(e) => {
                                error!(error = %e, "failed to persist checkpoint");
                                metrics::record_checkpoint_flush_failure("position_store");
                                let _ = error_tx.send(e).await;
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
        })
    }

    async fn flush_current_position(&self) -> Result<(), RunnerError> {
        let position = self.position_rx.borrow().clone();
        let offset = position.log_offset;
        self.position_store
            .set_last_position(position)
            .await
            .map(|()| metrics::set_last_position_offset(offset))
            .map_err(|e| {
                metrics::record_checkpoint_flush_failure("position_store");
                RunnerError::PositionStoreSetFailed(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockSource {
        run_from_calls: AtomicUsize,
        close_calls: AtomicUsize,
        fail_run: bool,
    }

    #[async_trait]
    impl ReplicationSource for MockSource {
        async fn run_from(&self, _position: Position) -> Result<(), SourceError> {
            self.run_from_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_run {
                return Err(SourceError::StreamError(anyhow::anyhow!("canal run failed")));
            }
            Ok(())
        }

        async fn close(&self) -> Result<(), SourceError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockPositionStore {
        last: Mutex<Position>,
        fail_get: bool,
        fail_set: bool,
    }

    impl MockPositionStore {
        fn new() -> Self {
            Self {
                last: Mutex::new(Position::zero()),
                fail_get: false,
                fail_set: false,
            }
        }
    }

    #[async_trait]
    impl PositionStore for MockPositionStore {
        async fn get_last_position(&self) -> Result<Position, PositionStoreError> {
            if self.fail_get {
                return Err(PositionStoreError::GetFailed(anyhow::anyhow!(
                    "state handler get failed"
                )));
            }
            Ok(self.last.lock().unwrap().clone())
        }

        async fn set_last_position(&self, position: Position) -> Result<(), PositionStoreError> {
            if self.fail_set {
                return Err(PositionStoreError::SetFailed(
                    "state handler set failed".into(),
                ));
            }
            *self.last.lock().unwrap() = position;
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_when_state_handler_get_fails() {
        let source = Arc::new(MockSource::default());
        let store = Arc::new(MockPositionStore {
            fail_get: true,
            ..MockPositionStore::new()
        });
        let (_tx, rx) = watch::channel(Position::zero());
        let runner = Runner::new(source.clone(), store, rx, Duration::from_millis(10));

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, RunnerError::PositionStoreGetFailed(_)));
        assert_eq!(source.run_from_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_when_canal_run_fails() {
        let source = Arc::new(MockSource {
            fail_run: true,
            ..MockSource::default()
        });
        let store = Arc::new(MockPositionStore::new());
        let (_tx, rx) = watch::channel(Position::zero());
        let runner = Runner::new(source.clone(), store, rx, Duration::from_millis(10));

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, RunnerError::Stream(_)));
        assert_eq!(source.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_when_state_handler_set_fails_on_final_flush() {
        let source = Arc::new(MockSource::default());
        let store = Arc::new(MockPositionStore {
            fail_set: true,
            ..MockPositionStore::new()
        });
        let (_tx, rx) = watch::channel(Position::zero());
        let runner = Runner::new(source.clone(), store, rx, Duration::from_millis(10));

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, RunnerError::PositionStoreSetFailed(_)));
    }

    #[derive(Default)]
    struct BlockingSource {
        close_calls: AtomicUsize,
    }

    #[async_trait]
    impl ReplicationSource for BlockingSource {
        async fn run_from(&self, _position: Position) -> Result<(), SourceError> {
            // Never resolves on its own; the test relies on the checkpoint
            // failure winning the race and dropping this future.
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn close(&self) -> Result<(), SourceError> {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn run_when_checkpoint_flush_fails_mid_stream() {
        let source = Arc::new(BlockingSource::default());
        let store = Arc::new(MockPositionStore {
            fail_set: true,
            ..MockPositionStore::new()
        });
        let (_tx, rx) = watch::channel(Position::zero());
        let runner = Runner::new(source.clone(), store, rx, Duration::from_millis(10));

        let result = tokio::time::timeout(Duration::from_secs(2), runner.run())
            .await
            .expect("runner did not terminate after a mid-stream checkpoint failure");

        assert!(matches!(result.unwrap_err(), RunnerError::PositionStoreSetFailed(_)));
        assert_eq!(source.close_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_with_no_error_flushes_final_position() {
        let source = Arc::new(MockSource::default());
        let store = Arc::new(MockPositionStore::new());
        let final_position = Position {
            log_name: "binlog.000003".into(),
            log_offset: 900,
        };
        let (tx, rx) = watch::channel(Position::zero());
        tx.send(final_position.clone()).unwrap();

        let runner = Runner::new(source.clone(), store.clone(), rx, Duration::from_millis(10));
        runner.run().await.unwrap();

        assert_eq!(*store.last.lock().unwrap(), final_position);
        assert_eq!(source.run_from_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.close_calls.load(Ordering::SeqCst), 1);
    }
}
