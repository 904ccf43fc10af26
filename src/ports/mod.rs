//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the orchestrator and an
//! external system. Implementations live in `src/adapters/`.

pub mod clock;
pub mod image_provider;

pub use image_provider::ImageProvider;
