//! Message formatting utilities for client display.

use lapak_server::infrastructure::dto::websocket::{MessagePayload, ServerEvent};

const RULE: &str = "------------------------------------------------------------";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format any server event for the terminal
    ///
    /// # Arguments
    ///
    /// * `event` - The decoded server event
    /// * `me` - The current user's ID (to mark own messages)
    pub fn format_event(event: &ServerEvent, me: u64) -> String {
        match event {
            ServerEvent::Chat { message, .. } => Self::format_chat_message(message, me),
            ServerEvent::UserStatus { user_id, is_online } => {
                let state = if *is_online { "online" } else { "offline" };
                format!("\n* user {} is {}\n", user_id, state)
            }
            ServerEvent::RoomStatus {
                user_id,
                chat_room_id,
                in_room,
            } => {
                let action = if *in_room { "opened" } else { "left" };
                format!("\n* user {} {} room #{}\n", user_id, action, chat_room_id)
            }
            ServerEvent::OnlineUsersList { user_ids } => Self::format_online_users(user_ids),
            ServerEvent::ReadReceipt {
                message_id,
                read_by,
                ..
            } => format!("\n✓ message {} read by user {}\n", message_id, read_by),
        }
    }

    /// Format the list of users online at connect time
    pub fn format_online_users(user_ids: &[u64]) -> String {
        if user_ids.is_empty() {
            return "\nOnline: (nobody else)\n".to_string();
        }
        let users: Vec<String> = user_ids.iter().map(u64::to_string).collect();
        format!("\nOnline: {}\n", users.join(", "))
    }

    /// Format a chat message
    ///
    /// Stored messages show their ID so they can be acknowledged with `/read`.
    pub fn format_chat_message(message: &MessagePayload, me: u64) -> String {
        let from = if message.sender_id == me {
            "me".to_string()
        } else {
            format!("user {}", message.sender_id)
        };
        let id = if message.id == 0 {
            String::new()
        } else {
            format!(" [{}]", message.id)
        };
        format!(
            "\n\n{rule}\n#{room} @{from}{id}: {content}\nsent at {at}\n{rule}\n",
            rule = RULE,
            room = message.chat_room_id,
            from = from,
            id = id,
            content = message.content,
            at = message.created_at,
        )
    }

    /// Format a raw text message (when parsing fails)
    pub fn format_raw_message(text: &str) -> String {
        format!("\n← Received: {}\n", text)
    }
}
