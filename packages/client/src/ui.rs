//! UI utilities for the client.

use std::io::Write;

/// Prompt shown while waiting for input
pub fn prompt(user_id: u64) -> String {
    format!("user {}> ", user_id)
}

/// Redisplay the prompt after receiving a message
pub fn redisplay_prompt(user_id: u64) {
    print!("{}", prompt(user_id));
    std::io::stdout().flush().ok();
}
