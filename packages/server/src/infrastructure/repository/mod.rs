//! Store implementations of the domain's repository traits.

pub mod inmemory;

pub use inmemory::InMemoryChatStore;
