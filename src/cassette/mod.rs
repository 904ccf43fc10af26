//! Record/replay of provider exchanges for offline runs and tests.

pub mod config;
pub mod format;
pub mod recorder;
pub mod replayer;
