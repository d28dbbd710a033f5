//! In-process store implementations.

mod chat;

pub use chat::InMemoryChatStore;
