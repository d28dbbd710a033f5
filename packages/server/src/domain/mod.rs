//! Domain layer: value objects, entities and the store contract.
//!
//! Chat rooms, participants and pending messages live in an external store. This layer
//! only names them and defines the narrow contract the core needs from that store.

pub mod entity;
pub mod error;
pub mod repository;
pub mod value_object;

pub use entity::{ChatRoom, NewPendingMessage, Participant, PendingMessage};
pub use error::{RepositoryError, ValueObjectError};
pub use repository::{ChatRoomRepository, PendingMessageStore};
#[cfg(test)]
pub use repository::{MockChatRoomRepository, MockPendingMessageStore};
pub use value_object::{
    ConnectionId, ConnectionIdFactory, MessageContent, MessageId, RoomId, Timestamp, UserId,
};
