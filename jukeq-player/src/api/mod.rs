//! HTTP API surface
//!
//! REST endpoints for queue control plus the SSE event stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, AppContext};
