//! HTTP server setup and routing
//!
//! Sets up the Axum router with control endpoints and the SSE stream.

use crate::filler::FillerSupplier;
use crate::scheduler::Scheduler;
use axum::{
    routing::{get, post},
    Router,
};
use jukeq_common::config::ConfigStore;
use jukeq_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub scheduler: Arc<Scheduler>,
    pub filler: Arc<FillerSupplier>,
    pub bus: Arc<EventBus>,
    pub config: Arc<ConfigStore>,
}

/// Build the application router with all routes.
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        // Queue
        .route("/api/queue", get(super::handlers::get_queue))
        .route("/api/queue/push", post(super::handlers::push))
        .route("/api/queue/skip", post(super::handlers::skip))
        // Playback control
        .route(
            "/api/playerstate",
            get(super::handlers::get_playerstate).post(super::handlers::set_playerstate),
        )
        .route("/api/seek", post(super::handlers::seek))
        // Filler playlist
        .route(
            "/api/filler",
            get(super::handlers::get_filler).post(super::handlers::set_filler),
        )
        // Overlay control
        .route(
            "/api/overlay/persistent",
            post(super::handlers::set_overlay_persistent),
        )
        // SSE event stream
        .route("/api/events", get(super::sse::event_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
