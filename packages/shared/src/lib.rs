//! Utilities shared by the Lapak server and client binaries.

pub mod logger;
pub mod time;
