//! Reconnect policy.
//!
//! A refused handshake is final: the server answers 4xx for a bad user id, and asking
//! again with the same id gets the same answer. Anything else is a lost connection and is
//! retried until the attempt budget runs out.

use crate::error::ClientError;

/// What the runner does after a session ended with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    Reconnect,
    /// The server refused the handshake.
    Refused,
    OutOfAttempts,
}

/// `failures` counts the sessions that have failed so far, including this one.
pub fn next_step(error: &ClientError, failures: u32, max_attempts: u32) -> NextStep {
    match error {
        ClientError::Rejected(_) => NextStep::Refused,
        ClientError::ConnectionError(_) if failures < max_attempts => NextStep::Reconnect,
        ClientError::ConnectionError(_) => NextStep::OutOfAttempts,
    }
}
