//! Server configuration.
//!
//! Every setting can be given as a command-line flag or an environment variable.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Realtime chat server for marketplace conversations
#[derive(Parser, Debug, Clone)]
#[command(name = "lapak-server")]
#[command(about = "Realtime presence and delivery server for one-to-one chat", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "LAPAK_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "LAPAK_PORT", default_value = "8080")]
    pub port: u16,

    /// Frames buffered per connection before it is evicted as a slow consumer
    #[arg(long, env = "LAPAK_OUTBOUND_CAPACITY", default_value = "256")]
    pub outbound_capacity: usize,

    /// Maximum size of an inbound frame in bytes
    #[arg(long, env = "LAPAK_MAX_MESSAGE_SIZE", default_value = "4096")]
    pub max_message_size: usize,

    /// Seconds to wait for a pong before the connection is considered dead
    #[arg(long, env = "LAPAK_PONG_WAIT_SECS", default_value = "60")]
    pub pong_wait_secs: u64,

    /// Seconds allowed for a single write to the socket
    #[arg(long, env = "LAPAK_WRITE_WAIT_SECS", default_value = "10")]
    pub write_wait_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "LAPAK_LOG_LEVEL", default_value = "debug")]
    pub log_level: String,
}

/// Per-connection limits and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub outbound_capacity: usize,
    pub max_message_size: usize,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub write_wait: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from_secs(256, 4096, 60, 10)
    }
}

impl ConnectionSettings {
    fn from_secs(
        outbound_capacity: usize,
        max_message_size: usize,
        pong_wait_secs: u64,
        write_wait_secs: u64,
    ) -> Self {
        let pong_wait = Duration::from_secs(pong_wait_secs);
        Self {
            outbound_capacity,
            max_message_size,
            pong_wait,
            // ping must go out before the pong deadline expires
            ping_period: pong_wait * 9 / 10,
            write_wait: Duration::from_secs(write_wait_secs),
        }
    }
}

impl ServerConfig {
    pub fn connection_settings(&self) -> Result<ConnectionSettings, ConfigError> {
        if self.outbound_capacity == 0 {
            return Err(ConfigError::Zero("outbound-capacity"));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Zero("max-message-size"));
        }
        if self.pong_wait_secs == 0 {
            return Err(ConfigError::Zero("pong-wait-secs"));
        }
        if self.write_wait_secs == 0 {
            return Err(ConfigError::Zero("write-wait-secs"));
        }
        Ok(ConnectionSettings::from_secs(
            self.outbound_capacity,
            self.max_message_size,
            self.pong_wait_secs,
            self.write_wait_secs,
        ))
    }
}
