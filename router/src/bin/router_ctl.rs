use std::env;

use outbox_router_core::model::Position;
use outbox_router_core::ports::PositionStore;
use outbox_router_redis::RedisPositionStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage:");
        eprintln!("  router-ctl show-position");
        eprintln!("  router-ctl reset-position <log_name> <log_offset>");
        std::process::exit(1);
    }

    let redis_url = env::var("REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());
    let redis_key = env::var("REDIS_KEY").ok();
    let store = RedisPositionStore::connect(&redis_url, redis_key).await?;

    match args[1].as_str() {
        "show-position" => {
            let position = store.get_last_position().await?;
            println!("{}:{}", position.log_name, position.log_offset);
        }
        "reset-position" if args.len() == 4 => {
            let log_name = args[2].clone();
            let log_offset: u32 = args[3].parse()?;
            store
                .set_last_position(Position {
                    log_name: log_name.clone(),
                    log_offset,
                })
                .await?;
            println!("Position reset to {log_name}:{log_offset}");
        }
        _ => {
            eprintln!("Invalid arguments");
            std::process::exit(1);
        }
    }

    Ok(())
}
