//! Realtime presence and delivery core for one-to-one marketplace chat.
//!
//! Layers:
//! - `domain`: value objects, entities and the store contract
//! - `infrastructure`: wire DTOs, the presence registry and store implementations
//! - `usecase`: one struct per operation
//! - `ui`: axum handlers, the per-connection router and the server

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
