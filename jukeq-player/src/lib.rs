//! # JukeQ Queue Player Library (jukeq-player)
//!
//! Single-stream media queue scheduler.
//!
//! **Purpose:** Accept song requests into a durable file-backed queue,
//! prefetch the next entry while the current one plays, fall back to an
//! endless filler playlist when the queue is empty, drive a single playback
//! device, and publish a live event stream over HTTP/SSE.

pub mod api;
pub mod device;
pub mod error;
pub mod filler;
pub mod media;
pub mod scheduler;
pub mod store;

pub use error::{Error, Result};
pub use scheduler::Scheduler;
