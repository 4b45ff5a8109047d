//! `PositionStore` adapter persisting the checkpoint in Redis as a single
//! JSON-encoded key.

use async_trait::async_trait;
use outbox_router_core::error::PositionStoreError;
use outbox_router_core::model::Position;
use outbox_router_core::ports::PositionStore;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

const DEFAULT_POSITION_KEY: &str = "outbox-router:position";

pub struct RedisPositionStore {
    connection: ConnectionManager,
    key: String,
}

impl RedisPositionStore {
    pub async fn connect(redis_url: &str, key: Option<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            key: key.unwrap_or_else(|| DEFAULT_POSITION_KEY.to_string()),
        })
    }
}

#[async_trait]
impl PositionStore for RedisPositionStore {
    /// A missing key is the expected "never checkpointed" state, not an
    /// error — it resolves to [`Position::zero`].
    async fn get_last_position(&self) -> Result<Position, PositionStoreError> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection
            .get(&self.key)
            .await
            .map_err(|e| PositionStoreError::GetFailed(anyhow::anyhow!(e)))?;

        match raw {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| PositionStoreError::GetFailed(anyhow::anyhow!(e))),
            None => {
                debug!(key = %self.key, "no persisted position, starting from zero");
                Ok(Position::zero())
            }
        }
    }

    async fn set_last_position(&self, position: Position) -> Result<(), PositionStoreError> {
        let json = serde_json::to_string(&position)
            .map_err(|e| PositionStoreError::SetFailed(e.to_string()))?;

        let mut connection = self.connection.clone();
        connection
            .set::<_, _, ()>(&self.key, json)
            .await
            .map_err(|e| PositionStoreError::SetFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Requires a running Redis instance. Run with:
    //   REDIS_URL=redis://127.0.0.1 cargo test -p outbox-router-redis -- --ignored
    #[tokio::test]
    #[ignore]
    async fn round_trips_a_position_through_redis() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1".to_string());
        let store = RedisPositionStore::connect(&redis_url, Some("outbox-router:test".into()))
            .await
            .expect("failed to connect to test redis");

        let position = Position {
            log_name: "binlog.000005".into(),
            log_offset: 4096,
        };

        store.set_last_position(position.clone()).await.unwrap();
        let got = store.get_last_position().await.unwrap();
        assert_eq!(got, position);
    }

    #[tokio::test]
    #[ignore]
    async fn missing_key_resolves_to_zero_position() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1".to_string());
        let store = RedisPositionStore::connect(&redis_url, Some("outbox-router:test-empty".into()))
            .await
            .expect("failed to connect to test redis");

        let got = store.get_last_position().await.unwrap();
        assert_eq!(got, Position::zero());
    }
}
