//! REST API for the soundboard engine
//!
//! The HTTP surface is the UI boundary: a separate front-end process drives
//! the engine through these endpoints and follows along via the SSE stream.

pub mod handlers;
pub mod sse;

use crate::integrations::{Downloader, SpeechSynthesizer};
use crate::playback::Dispatcher;
use axum::{
    extract::State,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Playback dispatcher
    pub dispatcher: Arc<Dispatcher>,
    /// Optional download collaborator (501 when absent)
    pub downloader: Option<Arc<dyn Downloader>>,
    /// Optional speech synthesis collaborator (501 when absent)
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    /// Server port (reported by /health)
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                // Sound library
                .route("/sounds", get(handlers::list_sounds))
                .route("/sounds", post(handlers::add_sound))
                .route("/sounds/:name", delete(handlers::remove_sound))
                .route("/sounds/:name/rename", post(handlers::rename_sound))
                .route("/sounds/:name/play", post(handlers::play_sound))
                .route("/sounds/download", post(handlers::download_sound))
                .route("/sounds/tts", post(handlers::synthesize_sound))
                // Playback control
                .route("/playback/stop", post(handlers::stop_playback))
                // Audio device endpoints
                .route("/audio/devices", get(handlers::list_audio_devices))
                .route("/audio/device", get(handlers::get_audio_device))
                .route("/audio/device", post(handlers::set_audio_device))
                // Volume / monitoring
                .route("/audio/volume", get(handlers::get_volume))
                .route("/audio/volume", post(handlers::set_volume))
                .route("/audio/monitoring", get(handlers::get_monitoring))
                .route("/audio/monitoring", post(handlers::set_monitoring))
                // Keybinds
                .route("/keybinds", get(handlers::get_keybinds))
                .route("/keybinds", post(handlers::set_keybind))
                .route("/keybinds/:key", delete(handlers::clear_keybind))
                .route("/keybinds/stop_key", post(handlers::set_stop_key))
                // SSE events
                .route("/events", get(sse::event_stream)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "boardcast",
        "version": env!("CARGO_PKG_VERSION"),
        "build": {
            "git_hash": env!("GIT_HASH"),
            "timestamp": env!("BUILD_TIMESTAMP"),
            "profile": env!("BUILD_PROFILE"),
        },
        "port": state.port,
        "sounds": state.dispatcher.sounds().len(),
    }))
}
