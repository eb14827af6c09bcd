//! Test helper modules for boardcast integration tests
//!
//! Provides reusable test infrastructure:
//! - audio_generator: deterministic WAV fixtures (hound)
//! - capture: stream openers that record every block a session writes

#![allow(dead_code)]

pub mod audio_generator;
pub mod capture;

pub use audio_generator::{generate_const_wav, generate_sine_wav, generate_silent_wav};
pub use capture::{BlockRecord, CaptureOpener};
