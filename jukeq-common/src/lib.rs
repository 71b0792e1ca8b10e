//! # JukeQ Common Library
//!
//! Shared code for the JukeQ daemon:
//! - Queue entry model and its on-disk line format
//! - Event types and the per-subscriber event bus
//! - Duration formatting (HH:MM:SS)
//! - Config file loading with write-back

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod track;

pub use error::{Error, Result};
pub use track::QueueEntry;
