//! Realtime chat server.
//!
//! Tracks who is online and which room each connection is viewing, delivers messages
//! directly when the recipient is looking, and parks them in a pending mailbox otherwise.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lapak-server
//! cargo run --bin lapak-server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;

use clap::Parser;
use lapak_server::{
    config::ServerConfig,
    infrastructure::{presence::PresenceRegistry, repository::InMemoryChatStore},
    ui::{AppState, Server},
};
use lapak_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    let settings = match config.connection_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize dependencies in order:
    // 1. Store
    // 2. Presence Registry
    // 3. UseCases (AppState)
    // 4. Server

    // 1. Create the chat store (in-memory)
    let store = Arc::new(InMemoryChatStore::new());

    // 2. Start the presence registry control loop
    let registry = PresenceRegistry::spawn();

    // 3. Wire the use cases
    let state = AppState::new(
        store.clone(),
        store,
        registry,
        Arc::new(SystemClock),
        settings,
    );

    // 4. Create and run the server
    let server = Server::new(state);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
