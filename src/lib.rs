//! # boardcast
//!
//! Headless soundboard playback engine with dual-output routing.
//!
//! **Purpose:** Decode short audio clips and fan them out to a main output
//! (e.g. a virtual microphone cable heard by a remote listener) and a
//! monitoring output (the operator's own headphones), with independent
//! per-destination volume, live monitoring toggle, and generation-based
//! supersession: a new trigger always fades out whatever is playing.
//!
//! **Architecture:** symphonia decode -> optional rubato resample -> per-block
//! gain/fade envelope -> cpal output streams behind lock-free ring buffers.
//! One thread per playback session; an HTTP + SSE control surface as the UI
//! boundary.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod hotkey;
pub mod integrations;
pub mod playback;

pub use config::Config;
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use playback::Dispatcher;
