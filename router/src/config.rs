//! Environment-driven configuration, loaded once at process startup.

use std::env;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub db: DbConfig,
    pub routing: RoutingConfig,
    pub kafka: KafkaConfig,
    pub redis: RedisConfig,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub outbox_table_ref: String,
    pub aggregate_id_column_name: String,
    pub aggregate_type_column_name: String,
    pub payload_column_name: String,
    pub headers_columns_name: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub aggregate_type_regexes: Vec<String>,
    pub topics: Vec<String>,
    pub include_transaction_timestamp: bool,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub key: String,
}

fn default_port() -> u16 {
    3306
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_db() -> i64 {
    0
}

fn default_redis_key() -> String {
    "outbox-router:position".to_string()
}

impl RouterConfig {
    /// Loads configuration from the process environment, after giving a
    /// local `.env` file (if present) a chance to populate it. Variables
    /// with no sensible default fail fast with a descriptive error instead
    /// of propagating a confusing downstream connection failure.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let db = DbConfig {
            host: env::var("DB_HOST").context("DB_HOST must be set")?,
            port: parse_or_default("DB_PORT", default_port()),
            user: env::var("DB_USER").context("DB_USER must be set")?,
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            outbox_table_ref: env::var("DB_OUTBOX_TABLE_REF")
                .context("DB_OUTBOX_TABLE_REF must be set")?,
            aggregate_id_column_name: env::var("DB_AGGREGATE_ID_COLUMN_NAME")
                .unwrap_or_else(|_| "aggregate_id".to_string()),
            aggregate_type_column_name: env::var("DB_AGGREGATE_TYPE_COLUMN_NAME")
                .unwrap_or_else(|_| "aggregate_type".to_string()),
            payload_column_name: env::var("DB_PAYLOAD_COLUMN_NAME")
                .unwrap_or_else(|_| "payload".to_string()),
            headers_columns_name: split_csv(env::var("DB_HEADERS_COLUMNS_NAME").unwrap_or_default()),
        };

        let aggregate_type_regexes =
            split_csv(env::var("AGGREGATE_TYPE_REGEX_TO_PAIR_WITH_TOPICS").unwrap_or_default());
        let topics =
            split_csv(env::var("TOPICS_TO_PAIR_WITH_AGGREGATE_TYPE_REGEX").unwrap_or_default());
        if aggregate_type_regexes.len() != topics.len() {
            bail!(
                "AGGREGATE_TYPE_REGEX_TO_PAIR_WITH_TOPICS has {} entries but \
                 TOPICS_TO_PAIR_WITH_AGGREGATE_TYPE_REGEX has {}; lengths must match",
                aggregate_type_regexes.len(),
                topics.len()
            );
        }

        let routing = RoutingConfig {
            aggregate_type_regexes,
            topics,
            include_transaction_timestamp: parse_or_default("INCLUDE_TRANSACTION_TIMESTAMP", true),
        };

        let kafka = KafkaConfig {
            brokers: env::var("KAFKA_BROKERS").context("KAFKA_BROKERS must be set")?,
        };

        let redis = RedisConfig {
            host: env::var("REDIS_HOST").context("REDIS_HOST must be set")?,
            port: parse_or_default("REDIS_PORT", default_redis_port()),
            db: parse_or_default("REDIS_DB", default_redis_db()),
            key: env::var("REDIS_KEY").unwrap_or_else(|_| default_redis_key()),
        };

        Ok(Self {
            db,
            routing,
            kafka,
            redis,
        })
    }
}

impl RedisConfig {
    pub fn connection_url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

fn parse_or_default<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn split_csv(raw: String) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(
            split_csv(" order, invoice ,,".to_string()),
            vec!["order".to_string(), "invoice".to_string()]
        );
    }

    #[test]
    fn split_csv_on_empty_string_is_empty() {
        assert!(split_csv(String::new()).is_empty());
    }

    #[test]
    fn redis_connection_url_format() {
        let redis = RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            db: 2,
            key: "k".to_string(),
        };
        assert_eq!(redis.connection_url(), "redis://localhost:6379/2");
    }
}
