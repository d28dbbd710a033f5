//! Request handlers.

mod http;
mod websocket;

pub use http::{
    drain_room_messages, get_room_status, health_check, init_private_chat, leave_chat, list_chats,
};
pub use websocket::websocket_handler;
