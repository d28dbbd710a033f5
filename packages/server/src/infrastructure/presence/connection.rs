//! One registered connection as seen by the presence registry.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{ConnectionId, ConnectionIdFactory, RoomId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The outbound queue is saturated. The connection is treated as a slow consumer.
    #[error("outbound queue is full")]
    Full,

    /// The outbound queue was already closed.
    #[error("outbound queue is closed")]
    Closed,
}

/// Handle to a live connection.
///
/// Owns the only sender of the connection's bounded outbound queue. Closing the handle
/// drops that sender, which is what tells the write pump to send a close frame and stop.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: UserId,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    /// Room the client is currently viewing. Only the owning connection's router writes it.
    active_room: Mutex<Option<RoomId>>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end of its outbound queue.
    pub fn new(user_id: UserId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: ConnectionIdFactory::generate(),
            user_id,
            outbound: Mutex::new(Some(tx)),
            active_room: Mutex::new(None),
        };
        (Arc::new(handle), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Enqueue a pre-encoded frame without waiting.
    pub fn try_send(&self, payload: String) -> Result<(), SendError> {
        let outbound = lock(&self.outbound);
        let Some(sender) = outbound.as_ref() else {
            return Err(SendError::Closed);
        };
        sender.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Close the outbound queue. Returns `false` if it was already closed.
    ///
    /// Frames already queued are still drained by the write pump.
    pub fn close(&self) -> bool {
        lock(&self.outbound).take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.outbound).is_none()
    }

    pub fn active_room(&self) -> Option<RoomId> {
        *lock(&self.active_room)
    }

    /// Replace the active room, returning the previous one.
    pub fn set_active_room(&self, room: Option<RoomId>) -> Option<RoomId> {
        std::mem::replace(&mut *lock(&self.active_room), room)
    }
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
