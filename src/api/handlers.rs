//! REST handlers for playback control

use crate::api::AppContext;
use crate::error::Error;
use crate::playback::PlayerStatus;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

/// Error wrapper mapping the crate taxonomy onto HTTP statuses
///
/// Contract violations are client errors; anything else that escapes this
/// far is a server error. Environmental failures never reach here; they
/// surface as events and observable state.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::TrackOutOfRange { .. } => StatusCode::BAD_REQUEST,
            Error::SlotActive(_) | Error::SlotNotLoaded(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "segue",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /playback/play
pub async fn play(State(ctx): State<AppContext>) -> Json<Value> {
    let outcome = ctx.controller.play().await;
    Json(json!({ "playing": outcome.is_playing() }))
}

/// POST /playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> Json<Value> {
    ctx.controller.pause().await;
    Json(json!({ "playing": false }))
}

/// POST /playback/next
pub async fn next(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    ctx.controller.next_track().await?;
    let session = ctx.controller.session().await;
    Ok(Json(json!({
        "index": session.current_index,
        "playing": session.is_playing,
    })))
}

/// POST /playback/previous
pub async fn previous(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    ctx.controller.prev_track().await?;
    let session = ctx.controller.session().await;
    Ok(Json(json!({
        "index": session.current_index,
        "playing": session.is_playing,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub index: usize,
    #[serde(default = "default_crossfade")]
    pub crossfade: bool,
}

fn default_crossfade() -> bool {
    true
}

/// POST /playback/select
pub async fn select(
    State(ctx): State<AppContext>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<Value>, ApiError> {
    let loaded = ctx
        .controller
        .select_track(request.index, request.crossfade)
        .await?;
    Ok(Json(json!({
        "index": request.index,
        "loaded": loaded,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    /// Target position as a percentage of duration (0-100)
    pub percent: f64,
}

/// POST /playback/seek
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(request): Json<SeekRequest>,
) -> Result<Json<Value>, ApiError> {
    ctx.controller.seek_to_percent(request.percent).await?;
    let session = ctx.controller.session().await;
    Ok(Json(json!({ "position_seconds": session.position_seconds })))
}

/// POST /playback/shuffle (toggle)
pub async fn shuffle(State(ctx): State<AppContext>) -> Json<Value> {
    let enabled = ctx.controller.toggle_shuffle().await;
    Json(json!({ "shuffle_enabled": enabled }))
}

/// POST /playback/repeat (cycle off/one/all)
pub async fn repeat(State(ctx): State<AppContext>) -> Json<Value> {
    let mode = ctx.controller.cycle_repeat().await;
    Json(json!({ "repeat_mode": u8::from(mode) }))
}

/// GET /playback/status
pub async fn status(State(ctx): State<AppContext>) -> Json<PlayerStatus> {
    Json(ctx.controller.status().await)
}

/// GET /lyrics/current
pub async fn current_lyric(State(ctx): State<AppContext>) -> Json<Value> {
    let status = ctx.controller.status().await;
    Json(json!({
        "line": status.lyric_line,
        "text": status.lyric_text,
    }))
}
