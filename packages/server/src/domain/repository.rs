//! Store contract.
//!
//! The chat store is an external collaborator. The core depends on these traits only,
//! and the infrastructure layer provides the implementations.

use async_trait::async_trait;

use super::{
    ChatRoom, MessageContent, MessageId, NewPendingMessage, PendingMessage, RepositoryError,
    RoomId, Timestamp, UserId,
};

/// Read-mostly access to chat rooms and their participants.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRoomRepository: Send + Sync {
    /// Fetch a room with its participants preloaded.
    async fn find_room_with_participants(
        &self,
        room_id: RoomId,
    ) -> Result<ChatRoom, RepositoryError>;

    /// Write the denormalized last-message fields used by chat list views.
    async fn update_room_last_message(
        &self,
        room_id: RoomId,
        content: &MessageContent,
        at: Timestamp,
    ) -> Result<(), RepositoryError>;

    /// Every room `user_id` takes part in, participants preloaded, in no particular order.
    async fn rooms_for_user(&self, user_id: UserId) -> Result<Vec<ChatRoom>, RepositoryError>;

    /// Take `user_id` out of a room. The room stays for the other participant.
    ///
    /// Returns `false` when the user was not a participant.
    async fn remove_participant(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;

    /// Find the private room shared by two users, or create it with both participants.
    ///
    /// Creation is all-or-nothing: a room is never left without its participants.
    /// Returns the room id and whether it was created.
    async fn find_or_create_private_room(
        &self,
        user_id: UserId,
        target_user_id: UserId,
        at: Timestamp,
    ) -> Result<(RoomId, bool), RepositoryError>;
}

/// Transient mailbox for messages whose recipient was not viewing the room.
///
/// Nothing here is an archive: every message leaves the store on first read or delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PendingMessageStore: Send + Sync {
    /// Park a message. The stored copy is unread.
    async fn create_pending_message(
        &self,
        message: NewPendingMessage,
    ) -> Result<PendingMessage, RepositoryError>;

    async fn find_pending_message(
        &self,
        id: MessageId,
    ) -> Result<Option<PendingMessage>, RepositoryError>;

    /// Returns `false` when nothing was deleted.
    async fn delete_pending_message(&self, id: MessageId) -> Result<bool, RepositoryError>;

    /// Returns the number of deleted messages.
    async fn delete_pending_messages(&self, ids: &[MessageId]) -> Result<usize, RepositoryError>;

    /// Unread messages in `room_id` not sent by `reader`, oldest first.
    async fn unread_for_room(
        &self,
        room_id: RoomId,
        reader: UserId,
    ) -> Result<Vec<PendingMessage>, RepositoryError>;

    /// Number of unread messages in `room_id` not sent by `reader`.
    async fn count_unread_for_room(
        &self,
        room_id: RoomId,
        reader: UserId,
    ) -> Result<usize, RepositoryError>;

    /// Delete every unread message in `room_id` not sent by `reader`.
    async fn delete_unread_for_room(
        &self,
        room_id: RoomId,
        reader: UserId,
    ) -> Result<usize, RepositoryError>;

    /// Take a message out of the mailbox.
    ///
    /// `Ok(None)` when it was already consumed.
    async fn pop_pending_message(
        &self,
        id: MessageId,
    ) -> Result<Option<PendingMessage>, RepositoryError> {
        let Some(message) = self.find_pending_message(id).await? else {
            return Ok(None);
        };
        if !self.delete_pending_message(id).await? {
            return Ok(None);
        }
        Ok(Some(message))
    }
}
