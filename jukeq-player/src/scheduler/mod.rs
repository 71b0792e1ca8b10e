//! Playback scheduling
//!
//! **Responsibilities:**
//! - Owning the active/staged slots and the scheduler loop ([`core`])
//! - Request, skip, seek, and player-state operations ([`control`])
//!
//! All mutation of the active/staged slots goes through the scheduler's
//! single slot lock; API handlers never touch the slots directly.

mod control;
mod core;

pub use control::{PlayerCommand, PlayerStateInfo, QueueSnapshot};
pub use core::Scheduler;
