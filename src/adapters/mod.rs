//! Adapter implementations for port traits.
//!
//! - `live/` — Real provider APIs and the tokio clock
//! - `recording/` — Record provider exchanges to cassettes
//! - `replaying/` — Replay provider exchanges from cassettes

pub mod live;
pub mod recording;
pub mod replaying;
