//! Infrastructure layer: DTOs, the presence registry and store implementations.

pub mod dto;
pub mod presence;
pub mod repository;
