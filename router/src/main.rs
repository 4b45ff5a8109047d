mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use outbox_router_core::dispatcher::{Dispatcher, HeaderMapping, TopicRoute};
use outbox_router_core::handler::EventHandler;
use outbox_router_core::mapper::EventMapper;
use outbox_router_core::model::Position;
use outbox_router_core::ports::{RowEventHandler, TopicAdmin};
use outbox_router_core::runner::Runner;
use outbox_router_kafka::{build_producer, RdKafkaAdmin, RdKafkaProducer};
use outbox_router_mysql::{MySqlReplicationSource, MySqlSourceConfig};
use outbox_router_redis::RedisPositionStore;
use regex::Regex;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_secs(5);

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

fn split_table_ref(table_ref: &str) -> Result<(String, String)> {
    match table_ref.split_once('.') {
        Some((db, table)) => Ok((db.to_string(), table.to_string())),
        None => bail!("DB_OUTBOX_TABLE_REF must be fully-qualified as <database>.<table>, got {table_ref}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args[1] != "run" {
        bail!("usage: outbox-router run");
    }

    let config = config::RouterConfig::from_env().context("failed to load configuration")?;

    let (database, table) = split_table_ref(&config.db.outbox_table_ref)?;

    let routes: Vec<TopicRoute> = config
        .routing
        .aggregate_type_regexes
        .iter()
        .zip(config.routing.topics.iter())
        .map(|(pattern, topic)| {
            Ok(TopicRoute {
                aggregate_type_pattern: Regex::new(pattern)
                    .with_context(|| format!("invalid aggregate type regex: {pattern}"))?,
                topic: topic.clone(),
                topic_config: None,
            })
        })
        .collect::<Result<_>>()?;

    let header_mappings: Vec<HeaderMapping> = config
        .db
        .headers_columns_name
        .iter()
        .map(|column| HeaderMapping {
            column_name: column.clone(),
            header_name: column.clone(),
        })
        .collect();

    let kafka_producer = build_producer(&config.kafka.brokers)
        .context("failed to build kafka producer")?;
    let producer = Arc::new(RdKafkaProducer::new(kafka_producer));

    let admin =
        RdKafkaAdmin::new(&config.kafka.brokers).context("failed to build kafka admin client")?;
    admin
        .ensure_topics(&routes)
        .await
        .context("failed to provision kafka topics")?;

    let dispatcher = Dispatcher::new(
        producer,
        routes,
        header_mappings,
        config.routing.include_transaction_timestamp,
    );

    let mapper = EventMapper::new(
        Some(config.db.aggregate_id_column_name.clone()),
        Some(config.db.aggregate_type_column_name.clone()),
        Some(config.db.payload_column_name.clone()),
    );

    let (position_tx, position_rx) = watch::channel(Position::zero());
    let handler: Arc<dyn RowEventHandler> =
        Arc::new(EventHandler::new(mapper, dispatcher, position_tx));

    let mysql_config = MySqlSourceConfig {
        hostname: config.db.host.clone(),
        port: config.db.port,
        username: config.db.user.clone(),
        password: config.db.password.clone(),
        server_id: 1,
        outbox_database: database,
        outbox_table: table,
        outbox_table_columns: vec![
            config.db.aggregate_id_column_name.clone(),
            config.db.aggregate_type_column_name.clone(),
            config.db.payload_column_name.clone(),
        ]
        .into_iter()
        .chain(config.db.headers_columns_name.clone())
        .collect(),
    };
    let source = Arc::new(MySqlReplicationSource::new(mysql_config, handler));

    let position_store = Arc::new(
        RedisPositionStore::connect(&config.redis.connection_url(), Some(config.redis.key.clone()))
            .await
            .context("failed to connect to redis position store")?,
    );

    let runner = Runner::new(source, position_store, position_rx, DEFAULT_FLUSH_PERIOD);

    info!("outbox router starting");
    runner.run().await.context("router run loop exited with an error")?;

    Ok(())
}
