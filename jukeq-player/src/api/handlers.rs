//! HTTP request handlers
//!
//! Implements the REST endpoints for queue and playback control. Handlers
//! stay thin; queue and slot semantics live in the scheduler.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::scheduler::{PlayerCommand, QueueSnapshot};
use axum::{extract::State, http::StatusCode, Json};
use jukeq_common::events::Event;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    url: String,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    position: i64,
}

#[derive(Debug, Deserialize)]
pub struct SkipRequest {
    #[serde(default = "default_skip_count")]
    count: usize,
    #[serde(default)]
    purge: bool,
}

fn default_skip_count() -> usize {
    1
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    skipped: usize,
}

#[derive(Debug, Deserialize)]
pub struct PlayerStateRequest {
    state: String,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct FillerRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    shuffle: bool,
}

#[derive(Debug, Serialize)]
pub struct FillerResponse {
    url: Option<String>,
    index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct OverlayRequest {
    #[serde(default)]
    value: bool,
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, Json<StatusResponse>) {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "queue_player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Queue Endpoints
// ============================================================================

/// GET /api/queue - Current, staged, and queued entries
pub async fn get_queue(
    State(ctx): State<AppContext>,
) -> Result<Json<QueueSnapshot>, (StatusCode, Json<StatusResponse>)> {
    ctx.scheduler
        .queue_snapshot()
        .await
        .map(Json)
        .map_err(internal_error)
}

/// POST /api/queue/push - Resolve a URL and append it to the queue
///
/// Responds 403 when the URL cannot be resolved; the rejection is also
/// announced on the event stream.
pub async fn push(
    State(ctx): State<AppContext>,
    Json(req): Json<PushRequest>,
) -> Result<Json<PushResponse>, (StatusCode, Json<StatusResponse>)> {
    match ctx.scheduler.push_request(&req.url).await {
        Ok(position) => Ok(Json(PushResponse { position })),
        Err(Error::Resolution(e)) => Err((
            StatusCode::FORBIDDEN,
            Json(StatusResponse {
                status: format!("unresolvable: {}", e),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

/// POST /api/queue/skip - Skip entries in effective play order
pub async fn skip(
    State(ctx): State<AppContext>,
    Json(req): Json<SkipRequest>,
) -> Result<Json<SkipResponse>, (StatusCode, Json<StatusResponse>)> {
    match ctx.scheduler.skip(req.count, req.purge).await {
        Ok(skipped) => Ok(Json(SkipResponse { skipped })),
        Err(e) => Err(internal_error(e)),
    }
}

// ============================================================================
// Player State Endpoints
// ============================================================================

/// GET /api/playerstate - Report the player state
///
/// `{"state": null}` when nothing is active.
pub async fn get_playerstate(State(ctx): State<AppContext>) -> Json<Value> {
    Json(playerstate_body(ctx.scheduler.player_state(None).await))
}

/// POST /api/playerstate - Set play/pause
pub async fn set_playerstate(
    State(ctx): State<AppContext>,
    Json(req): Json<PlayerStateRequest>,
) -> Result<Json<Value>, (StatusCode, Json<StatusResponse>)> {
    let Some(command) = PlayerCommand::parse(&req.state) else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(StatusResponse {
                status: format!("invalid playerstate: {}", req.state),
            }),
        ));
    };
    let state = ctx.scheduler.player_state(Some(command)).await;
    Ok(Json(playerstate_body(state)))
}

/// POST /api/seek - Reposition the active playback
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> Result<Json<Value>, (StatusCode, Json<StatusResponse>)> {
    match ctx.scheduler.seek(req.seconds).await {
        Ok(state) => Ok(Json(playerstate_body(state))),
        Err(e) => Err(internal_error(e)),
    }
}

fn playerstate_body(state: Option<crate::scheduler::PlayerStateInfo>) -> Value {
    match state {
        Some(info) => json!({ "state": info.state, "position_ms": info.position_ms }),
        None => json!({ "state": null }),
    }
}

// ============================================================================
// Filler Endpoints
// ============================================================================

/// GET /api/filler - Current filler configuration
pub async fn get_filler(State(ctx): State<AppContext>) -> Json<FillerResponse> {
    let current = ctx.filler.current();
    Json(FillerResponse {
        url: current.as_ref().map(|(url, _)| url.clone()),
        index: current.map(|(_, index)| index),
    })
}

/// POST /api/filler - Reconfigure (or clear) the filler source
///
/// A source whose length cannot be resolved disables the filler and reports
/// 502; scheduling continues from the queue alone.
pub async fn set_filler(
    State(ctx): State<AppContext>,
    Json(req): Json<FillerRequest>,
) -> Result<Json<FillerResponse>, (StatusCode, Json<StatusResponse>)> {
    match req.url {
        Some(url) => {
            if let Err(e) = ctx.filler.configure(&url, req.index, req.shuffle).await {
                return Err((
                    StatusCode::BAD_GATEWAY,
                    Json(StatusResponse {
                        status: format!("filler disabled: {}", e),
                    }),
                ));
            }
        }
        None => {
            ctx.filler.clear();
            if let Err(e) = ctx.config.update(|c| c.filler = None) {
                return Err(internal_error(e));
            }
        }
    }
    Ok(get_filler(State(ctx)).await)
}

// ============================================================================
// Overlay Endpoint
// ============================================================================

/// POST /api/overlay/persistent - Toggle overlay persistence
///
/// Pure event fan-out; the overlay clients react, the daemon stores nothing.
pub async fn set_overlay_persistent(
    State(ctx): State<AppContext>,
    Json(req): Json<OverlayRequest>,
) -> StatusCode {
    ctx.bus.emit(Event::overlay_persistence(req.value));
    StatusCode::OK
}
