//! Event types for the engine's SSE event system
//!
//! Every state change the UI cares about is broadcast as an `EngineEvent`.
//! Events are serialized with a `type` tag and carry UTC timestamps so
//! clients can order them without trusting delivery order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a playback session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Clip played to the end of its buffer
    Completed,
    /// Faded out after an explicit stop request
    Stopped,
    /// Faded out because a newer playback superseded it
    Superseded,
}

/// Engine event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// A playback session entered the streaming state
    PlaybackStarted {
        sound: String,
        generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// A playback session ended (completion or fade-out)
    PlaybackFinished {
        sound: String,
        generation: u64,
        reason: FinishReason,
        timestamp: DateTime<Utc>,
    },

    /// A playback session failed before or during streaming
    PlaybackFailed {
        sound: String,
        generation: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A volume level changed
    VolumeChanged {
        target: VolumeTarget,
        volume: f32,
        timestamp: DateTime<Utc>,
    },

    /// Monitoring was toggled
    MonitoringChanged {
        enabled: bool,
        timestamp: DateTime<Utc>,
    },

    /// Main output device selection changed
    DeviceChanged {
        device_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Sound library contents changed (add/remove/rename)
    LibraryChanged {
        timestamp: DateTime<Utc>,
    },

    /// Keybind map or stop key changed
    KeybindsChanged {
        timestamp: DateTime<Utc>,
    },
}

/// Which of the two independent volume levels an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTarget {
    Main,
    Monitoring,
}

impl EngineEvent {
    /// Event type string used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::PlaybackStarted { .. } => "PlaybackStarted",
            EngineEvent::PlaybackFinished { .. } => "PlaybackFinished",
            EngineEvent::PlaybackFailed { .. } => "PlaybackFailed",
            EngineEvent::VolumeChanged { .. } => "VolumeChanged",
            EngineEvent::MonitoringChanged { .. } => "MonitoringChanged",
            EngineEvent::DeviceChanged { .. } => "DeviceChanged",
            EngineEvent::LibraryChanged { .. } => "LibraryChanged",
            EngineEvent::KeybindsChanged { .. } => "KeybindsChanged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EngineEvent::VolumeChanged {
            target: VolumeTarget::Main,
            volume: 0.5,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"VolumeChanged\""));
        assert!(json.contains("\"target\":\"main\""));
    }

    #[test]
    fn test_finish_reason_snake_case() {
        let json = serde_json::to_string(&FinishReason::Superseded).unwrap();
        assert_eq!(json, "\"superseded\"");
    }
}
