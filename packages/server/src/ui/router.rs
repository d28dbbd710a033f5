//! Per-connection message router.
//!
//! Decodes inbound frames and dispatches them to the matching use case. Nothing here
//! closes the connection: bad frames and failed operations are logged and dropped.

use std::sync::Arc;

use crate::{
    infrastructure::{
        dto::websocket::{ClientCommand, decode_client_frame},
        presence::ConnectionHandle,
    },
    ui::state::AppState,
};

pub struct MessageRouter {
    connection: Arc<ConnectionHandle>,
    state: Arc<AppState>,
}

impl MessageRouter {
    pub fn new(connection: Arc<ConnectionHandle>, state: Arc<AppState>) -> Self {
        Self { connection, state }
    }

    /// Handle one text frame.
    pub async fn handle_text(&self, text: &str) {
        tracing::debug!(
            "Received frame from user {} (connection {}): {}",
            self.connection.user_id(),
            self.connection.id(),
            text
        );
        match decode_client_frame(text) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => tracing::warn!(
                "Dropping frame from user {}: {}",
                self.connection.user_id(),
                e
            ),
        }
    }

    pub async fn dispatch(&self, command: ClientCommand) {
        let user_id = self.connection.user_id();

        match command {
            ClientCommand::SendChat {
                room_id,
                content,
                product,
            } => {
                if let Err(e) = self
                    .state
                    .send_chat_usecase
                    .execute(&self.connection, room_id, content, product)
                    .await
                {
                    tracing::warn!("Chat from user {} dropped: {}", user_id, e);
                }
            }
            ClientCommand::MarkRead { message_id } => {
                if let Err(e) = self
                    .state
                    .mark_read_usecase
                    .execute(user_id, message_id)
                    .await
                {
                    tracing::warn!(
                        "Read receipt for message {} from user {} dropped: {}",
                        message_id,
                        user_id,
                        e
                    );
                }
            }
            ClientCommand::JoinRoom { room_id } => {
                // the pending-message flush keeps running in the background
                if let Err(e) = self
                    .state
                    .join_room_usecase
                    .execute(&self.connection, room_id)
                    .await
                {
                    tracing::warn!("Join from user {} dropped: {}", user_id, e);
                }
            }
            ClientCommand::LeaveRoom => {
                self.state
                    .leave_room_usecase
                    .execute(&self.connection)
                    .await;
            }
        }
    }
}
