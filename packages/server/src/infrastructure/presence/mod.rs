//! Presence tracking and delivery to live connections.

mod connection;
mod registry;

pub use connection::{ConnectionHandle, SendError};
pub use registry::{PresenceRegistry, RegistryError};
