//! Error types for boardcast
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//!
//! Every failure is recovered at the session or dispatcher boundary: a bad
//! clip or a missing device never takes the process down.

use thiserror::Error;

/// Main error type for the boardcast engine
#[derive(Error, Debug)]
pub enum Error {
    /// Audio decoding errors (unreadable, corrupt, or unsupported file)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Main output stream could not be opened
    #[error("Audio device error: {0}")]
    DeviceOpen(String),

    /// Configuration file loading or persistence errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Library mutation collides with an existing sound name
    #[error("Sound name already in use: {0}")]
    DuplicateName(String),

    /// Requested sound is not in the library
    #[error("Sound not found: {0}")]
    SoundNotFound(String),

    /// Playback session errors (stream write failures, dead output)
    #[error("Playback error: {0}")]
    Playback(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using the boardcast Error
pub type Result<T> = std::result::Result<T, Error>;
