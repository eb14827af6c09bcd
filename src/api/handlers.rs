//! HTTP request handlers
//!
//! Implements the REST endpoints through which a UI drives the engine.
//! Playback itself is fire-and-forget: `play` returns as soon as the session
//! thread is spawned, and decode/device failures arrive on the SSE stream.

use crate::api::AppState;
use crate::error::Error;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct SoundInfo {
    name: String,
    file_path: String,
    /// Key bound to this sound, if any
    key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SoundListResponse {
    sounds: Vec<SoundInfo>,
}

#[derive(Debug, Deserialize)]
pub struct AddSoundRequest {
    name: String,
    file_path: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameSoundRequest {
    new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    url: String,
    /// Library name; defaults to the fetched title
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TtsRequest {
    text: String,
    name: String,
    #[serde(default = "default_language")]
    language: String,
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    status: String,
    name: String,
    file_path: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    devices: Vec<crate::audio::device::OutputDevice>,
}

#[derive(Debug, Deserialize)]
pub struct SetDeviceRequest {
    /// Device id (name); null selects the system default
    device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    main: f32,
    monitoring: f32,
}

#[derive(Debug, Deserialize)]
pub struct SetVolumeRequest {
    target: crate::events::VolumeTarget,
    volume: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonitoringRequest {
    enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct KeybindsResponse {
    keybinds: std::collections::BTreeMap<String, String>,
    stop_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetKeybindRequest {
    key: String,
    sound: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStopKeyRequest {
    key: Option<String>,
}

type HandlerError = (StatusCode, Json<StatusResponse>);

/// Map an engine error to an HTTP status
fn error_response(e: Error) -> HandlerError {
    let status = match &e {
        Error::DuplicateName(_) => StatusCode::CONFLICT,
        Error::SoundNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

fn not_implemented(what: &str) -> HandlerError {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(StatusResponse {
            status: format!("error: no {} configured", what),
        }),
    )
}

fn ok_status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Sound Library Endpoints
// ============================================================================

/// GET /sounds - List the sound library
pub async fn list_sounds(State(state): State<AppState>) -> Json<SoundListResponse> {
    let sounds = state
        .dispatcher
        .sounds()
        .into_iter()
        .map(|(name, file_path)| {
            let key = state.dispatcher.sound_key(&name);
            SoundInfo {
                name,
                file_path,
                key,
            }
        })
        .collect();
    Json(SoundListResponse { sounds })
}

/// POST /sounds - Add a sound to the library
pub async fn add_sound(
    State(state): State<AppState>,
    Json(req): Json<AddSoundRequest>,
) -> Result<Json<StatusResponse>, HandlerError> {
    info!("Add sound '{}' -> {}", req.name, req.file_path);
    state
        .dispatcher
        .add_sound(&req.name, &req.file_path)
        .map_err(error_response)?;
    Ok(ok_status())
}

/// DELETE /sounds/:name - Remove a sound
pub async fn remove_sound(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatusResponse>, HandlerError> {
    info!("Remove sound '{}'", name);
    state.dispatcher.remove_sound(&name).map_err(error_response)?;
    Ok(ok_status())
}

/// POST /sounds/:name/rename - Rename a sound
pub async fn rename_sound(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<RenameSoundRequest>,
) -> Result<Json<StatusResponse>, HandlerError> {
    info!("Rename sound '{}' -> '{}'", name, req.new_name);
    state
        .dispatcher
        .rename_sound(&name, &req.new_name)
        .map_err(error_response)?;
    Ok(ok_status())
}

/// POST /sounds/:name/play - Trigger playback
pub async fn play_sound(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StatusResponse>, HandlerError> {
    state.dispatcher.play(&name).map_err(error_response)?;
    Ok(ok_status())
}

/// POST /sounds/download - Fetch a remote clip via the download collaborator
pub async fn download_sound(
    State(state): State<AppState>,
    Json(req): Json<DownloadRequest>,
) -> Result<Json<ImportResponse>, HandlerError> {
    let Some(downloader) = state.downloader.clone() else {
        return Err(not_implemented("downloader"));
    };

    info!("Downloading {}", req.url);
    let url = req.url.clone();
    let fetched = tokio::task::spawn_blocking(move || downloader.fetch(&url))
        .await
        .map_err(|e| {
            error!("Download task panicked: {}", e);
            error_response(Error::Playback("download task failed".to_string()))
        })?
        .map_err(|e| {
            error!("Download failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(StatusResponse {
                    status: format!("error: {}", e),
                }),
            )
        })?;

    let name = req.name.unwrap_or_else(|| fetched.title.clone());
    let file_path = fetched.file_path.to_string_lossy().into_owned();
    state
        .dispatcher
        .add_sound(&name, &file_path)
        .map_err(error_response)?;

    Ok(Json(ImportResponse {
        status: "ok".to_string(),
        name,
        file_path,
    }))
}

/// POST /sounds/tts - Generate a spoken clip via the speech collaborator
pub async fn synthesize_sound(
    State(state): State<AppState>,
    Json(req): Json<TtsRequest>,
) -> Result<Json<ImportResponse>, HandlerError> {
    let Some(synthesizer) = state.synthesizer.clone() else {
        return Err(not_implemented("speech synthesizer"));
    };

    info!("Synthesizing '{}' ({})", req.name, req.language);
    let TtsRequest {
        text,
        name,
        language,
    } = req;
    let tts_name = name.clone();
    let path = tokio::task::spawn_blocking(move || {
        synthesizer.synthesize(&text, &tts_name, &language)
    })
    .await
    .map_err(|e| {
        error!("TTS task panicked: {}", e);
        error_response(Error::Playback("synthesis task failed".to_string()))
    })?
    .map_err(|e| {
        error!("TTS failed: {}", e);
        (
            StatusCode::BAD_GATEWAY,
            Json(StatusResponse {
                status: format!("error: {}", e),
            }),
        )
    })?;

    let file_path = path.to_string_lossy().into_owned();
    state
        .dispatcher
        .add_sound(&name, &file_path)
        .map_err(error_response)?;

    Ok(Json(ImportResponse {
        status: "ok".to_string(),
        name,
        file_path,
    }))
}

// ============================================================================
// Playback Endpoints
// ============================================================================

/// POST /playback/stop - Fade out and stop whatever is playing
pub async fn stop_playback(State(state): State<AppState>) -> Json<StatusResponse> {
    state.dispatcher.stop_all();
    ok_status()
}

// ============================================================================
// Audio Device Endpoints
// ============================================================================

/// GET /audio/devices - List available audio output devices
pub async fn list_audio_devices(State(state): State<AppState>) -> Json<DeviceListResponse> {
    let devices = state.dispatcher.list_devices();
    info!("Found {} audio devices", devices.len());
    Json(DeviceListResponse { devices })
}

/// GET /audio/device - Get the selected main output device
pub async fn get_audio_device(State(state): State<AppState>) -> Json<DeviceResponse> {
    Json(DeviceResponse {
        device_id: state.dispatcher.output_device(),
    })
}

/// POST /audio/device - Select the main output device
///
/// Takes effect on the next play; an in-flight session keeps its device.
pub async fn set_audio_device(
    State(state): State<AppState>,
    Json(req): Json<SetDeviceRequest>,
) -> Json<StatusResponse> {
    info!("Set audio device: {:?}", req.device_id);
    state.dispatcher.set_output_device(req.device_id);
    ok_status()
}

// ============================================================================
// Volume / Monitoring Endpoints
// ============================================================================

/// GET /audio/volume - Both volume levels
pub async fn get_volume(State(state): State<AppState>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        main: state.dispatcher.volume_main(),
        monitoring: state.dispatcher.volume_monitoring(),
    })
}

/// POST /audio/volume - Set one volume level (clamped to [0.0, 1.0])
pub async fn set_volume(
    State(state): State<AppState>,
    Json(req): Json<SetVolumeRequest>,
) -> Json<VolumeResponse> {
    match req.target {
        crate::events::VolumeTarget::Main => state.dispatcher.set_volume_main(req.volume),
        crate::events::VolumeTarget::Monitoring => {
            state.dispatcher.set_volume_monitoring(req.volume)
        }
    }
    Json(VolumeResponse {
        main: state.dispatcher.volume_main(),
        monitoring: state.dispatcher.volume_monitoring(),
    })
}

/// GET /audio/monitoring - Whether the monitoring output is audible
pub async fn get_monitoring(State(state): State<AppState>) -> Json<MonitoringRequest> {
    Json(MonitoringRequest {
        enabled: state.dispatcher.monitoring(),
    })
}

/// POST /audio/monitoring - Toggle the monitoring output
pub async fn set_monitoring(
    State(state): State<AppState>,
    Json(req): Json<MonitoringRequest>,
) -> Json<StatusResponse> {
    state.dispatcher.set_monitoring(req.enabled);
    ok_status()
}

// ============================================================================
// Keybind Endpoints
// ============================================================================

/// GET /keybinds - The keybind map and stop key
pub async fn get_keybinds(State(state): State<AppState>) -> Json<KeybindsResponse> {
    Json(KeybindsResponse {
        keybinds: state.dispatcher.keybinds(),
        stop_key: state.dispatcher.stop_key(),
    })
}

/// POST /keybinds - Bind a key to a sound
pub async fn set_keybind(
    State(state): State<AppState>,
    Json(req): Json<SetKeybindRequest>,
) -> Result<Json<StatusResponse>, HandlerError> {
    state
        .dispatcher
        .set_keybind(&req.key, &req.sound)
        .map_err(error_response)?;
    Ok(ok_status())
}

/// DELETE /keybinds/:key - Remove a binding
pub async fn clear_keybind(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<StatusResponse> {
    state.dispatcher.clear_keybind(&key);
    ok_status()
}

/// POST /keybinds/stop_key - Set or clear the stop key
pub async fn set_stop_key(
    State(state): State<AppState>,
    Json(req): Json<SetStopKeyRequest>,
) -> Json<StatusResponse> {
    state.dispatcher.set_stop_key(req.key);
    ok_status()
}
