//! Connect to a local event gateway and print everything it pushes.
//!
//! Run with a gateway listening on localhost:
//!
//! ```sh
//! PULSE_TOKEN=dev-token cargo run --example basic_usage
//! ```

use std::sync::Arc;

use pulse_stream::{
    Channel, ConnectionManager, StaticToken, StreamConfig, ERROR_EVENT, OPEN_EVENT,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = std::env::var("PULSE_TOKEN").unwrap_or_else(|_| "dev-token".to_string());
    let manager = ConnectionManager::new(
        StreamConfig::new("http://localhost:8080"),
        Arc::new(StaticToken::new(token)),
    )?;

    let channel = Channel::global();
    let key = channel.key();

    manager.subscribe(
        &key,
        OPEN_EVENT,
        Arc::new(|key, _, _| println!("[{key}] stream open")),
    );
    manager.subscribe(
        &key,
        ERROR_EVENT,
        Arc::new(|key, _, payload| println!("[{key}] error: {payload}")),
    );
    manager.subscribe(
        &key,
        "message",
        Arc::new(|key, event, payload| println!("[{key}] {event}: {payload}")),
    );

    manager.set_status_listener(Arc::new(|key, state| {
        println!("[{key}] -> {state}");
    }));

    manager.connect(channel)?;

    tokio::signal::ctrl_c().await?;
    manager.shutdown();
    Ok(())
}
