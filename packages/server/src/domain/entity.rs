//! Entities owned by the external chat store.

use serde_json::Value;

use super::value_object::{MessageContent, MessageId, RoomId, Timestamp, UserId};

/// A member of a chat room.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: UserId,
    pub joined_at: Timestamp,
}

impl Participant {
    pub fn new(user_id: UserId, joined_at: Timestamp) -> Self {
        Self { user_id, joined_at }
    }
}

/// A one-to-one chat room together with its participants.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRoom {
    pub id: RoomId,
    pub participants: Vec<Participant>,
    pub last_message_content: Option<String>,
    pub last_message_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl ChatRoom {
    pub fn new(id: RoomId, participants: Vec<Participant>, created_at: Timestamp) -> Self {
        Self {
            id,
            participants,
            last_message_content: None,
            last_message_at: None,
            created_at,
        }
    }

    pub fn has_participant(&self, user_id: UserId) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    /// The first participant that is not `user_id`.
    ///
    /// `None` when the room has no second participant.
    pub fn other_participant(&self, user_id: UserId) -> Option<UserId> {
        self.participants
            .iter()
            .map(|p| p.user_id)
            .find(|id| *id != user_id)
    }

    /// Every participant except `user_id`.
    pub fn others(&self, user_id: UserId) -> impl Iterator<Item = UserId> + '_ {
        self.participants
            .iter()
            .map(|p| p.user_id)
            .filter(move |id| *id != user_id)
    }
}

/// A message about to be parked in the pending-message mailbox.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPendingMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub product_info: Option<Value>,
    pub created_at: Timestamp,
}

/// A message persisted only because its recipient was not viewing the room.
///
/// It is removed from the store on first read or delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub product_info: Option<Value>,
    pub is_read: bool,
    pub created_at: Timestamp,
}
