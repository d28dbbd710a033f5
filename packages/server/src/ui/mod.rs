//! WebSocket chat server implementation.

mod handler;
pub mod router;
mod server;
mod signal;
pub mod state;

pub use router::MessageRouter;
pub use server::Server;
pub use state::AppState;
