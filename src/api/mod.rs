//! HTTP control surface
//!
//! REST endpoints for user intents plus an SSE stream of player events.
//! This is the machine interface to the player; rendering and input wiring
//! live with whatever client connects here.

pub mod handlers;
pub mod sse;

use crate::playback::PlayerController;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppContext {
    pub controller: PlayerController,
}

/// Create the API router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                // Playback control
                .route("/playback/play", post(handlers::play))
                .route("/playback/pause", post(handlers::pause))
                .route("/playback/next", post(handlers::next))
                .route("/playback/previous", post(handlers::previous))
                .route("/playback/select", post(handlers::select))
                .route("/playback/seek", post(handlers::seek))
                .route("/playback/shuffle", post(handlers::shuffle))
                .route("/playback/repeat", post(handlers::repeat))
                .route("/playback/status", get(handlers::status))
                // Lyrics
                .route("/lyrics/current", get(handlers::current_lyric))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

// ========================================
// Tests
// ========================================
