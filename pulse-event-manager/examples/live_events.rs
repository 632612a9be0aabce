//! Bind a conversation channel and print its events while the binding lives.
//!
//! ```sh
//! PULSE_TOKEN=dev-token cargo run --example live_events -- <conversation-id>
//! ```

use std::sync::Arc;

use pulse_event_manager::prelude::*;
use pulse_stream::StaticToken;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let conversation_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demo".to_string());
    let token = std::env::var("PULSE_TOKEN").unwrap_or_else(|_| "dev-token".to_string());

    let manager = BindingManager::new(
        StreamConfig::new("http://localhost:8080"),
        Arc::new(StaticToken::new(token)),
    )?;

    let handlers: Vec<(String, EventHandler)> = vec![
        (
            "open".to_string(),
            Arc::new(|key: &ChannelKey, _: &str, _: &serde_json::Value| {
                println!("[{key}] connected");
            }) as EventHandler,
        ),
        (
            "message.created".to_string(),
            Arc::new(|key: &ChannelKey, _: &str, payload: &serde_json::Value| {
                println!("[{key}] new message: {payload}");
            }) as EventHandler,
        ),
        (
            "error".to_string(),
            Arc::new(|key: &ChannelKey, _: &str, payload: &serde_json::Value| {
                println!("[{key}] degraded: {payload}");
            }) as EventHandler,
        ),
    ];

    let binding = manager.bind(Channel::conversation(conversation_id)?, handlers)?;
    println!("listening on {} (ctrl-c to stop)", binding.key());

    tokio::signal::ctrl_c().await?;

    // Dropping the binding releases the channel and closes the stream.
    drop(binding);
    manager.shutdown();
    Ok(())
}
