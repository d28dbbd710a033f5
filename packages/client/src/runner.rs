//! Client execution logic with reconnection support.

use std::time::Duration;

use super::{
    domain::{NextStep, next_step},
    error::ClientError,
    session::run_client_session,
};

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL_SECS: u64 = 5;

/// Run the WebSocket client with reconnection logic
pub async fn run_client(url: String, user_id: u64) -> Result<(), ClientError> {
    let mut failures = 0;

    loop {
        tracing::info!(
            "Attempting to connect to {} as user {} (attempt {}/{})",
            url,
            user_id,
            failures + 1,
            MAX_RECONNECT_ATTEMPTS
        );

        let error = match run_client_session(&url, user_id).await {
            Ok(()) => {
                tracing::info!("Client session ended normally");
                return Ok(());
            }
            Err(e) => e,
        };
        failures += 1;

        match next_step(&error, failures, MAX_RECONNECT_ATTEMPTS) {
            NextStep::Refused => {
                tracing::error!("Server refused user {}: {}. Exiting.", user_id, error);
                return Err(error);
            }
            NextStep::OutOfAttempts => {
                tracing::error!(
                    "Failed to reconnect after {} attempts. Exiting.",
                    MAX_RECONNECT_ATTEMPTS
                );
                return Err(error);
            }
            NextStep::Reconnect => {
                tracing::warn!("Connection lost: {}", error);
                tracing::info!(
                    "Reconnecting in {} seconds... (attempt {}/{})",
                    RECONNECT_INTERVAL_SECS,
                    failures + 1,
                    MAX_RECONNECT_ATTEMPTS
                );
                tokio::time::sleep(Duration::from_secs(RECONNECT_INTERVAL_SECS)).await;
            }
        }
    }
}
