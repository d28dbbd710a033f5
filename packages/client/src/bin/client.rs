//! Lapak CLI chat client with reconnection support.
//!
//! Connects as a user, prints every server event and sends commands typed at the prompt.
//! Automatically reconnects on disconnection (max 5 attempts with 5 second interval).
//! A rejected handshake ends the client immediately.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lapak-client -- --user-id 1
//! cargo run --bin lapak-client -- -u 2 --url ws://127.0.0.1:8080/ws
//! ```

use clap::Parser;

use lapak_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "lapak-client")]
#[command(about = "CLI chat client for the Lapak presence hub", long_about = None)]
struct Args {
    /// User ID to connect as
    #[arg(short = 'u', long)]
    user_id: u64,

    /// WebSocket server URL
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = lapak_client::run_client(args.url, args.user_id).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
