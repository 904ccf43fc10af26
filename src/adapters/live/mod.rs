//! Live adapters that talk to real services.

pub mod clock;
pub mod gateway;
pub mod replicate;
