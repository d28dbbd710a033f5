//! UseCase layer: one struct per operation, each with an `execute` method.

pub mod connect_user;
pub mod disconnect_user;
pub mod drain_messages;
pub mod error;
pub mod get_room_status;
pub mod init_private_chat;
pub mod join_room;
pub mod leave_chat;
pub mod leave_room;
pub mod list_chats;
pub mod mark_read;
pub mod notify;
pub mod send_chat;

pub use connect_user::ConnectUserUseCase;
pub use disconnect_user::DisconnectUserUseCase;
pub use drain_messages::DrainMessagesUseCase;
pub use error::{
    InitPrivateChatError, ListChatsError, ReadReceiptError, RoomAccessError, SendChatError,
};
pub use get_room_status::{GetRoomStatusUseCase, ParticipantPresence};
pub use init_private_chat::InitPrivateChatUseCase;
pub use join_room::JoinRoomUseCase;
pub use leave_chat::LeaveChatUseCase;
pub use leave_room::LeaveRoomUseCase;
pub use list_chats::{ChatSummary, ListChatsUseCase};
pub use mark_read::MarkReadUseCase;
pub use notify::RoomStatusNotifier;
pub use send_chat::{ChatDelivery, SendChatUseCase};
