//! Audio test file generation utilities
//!
//! Generates small deterministic WAV files with known characteristics so
//! tests can assert on exact amplitudes and frame counts.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

fn spec(channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Generate a silent stereo WAV file.
pub fn generate_silent_wav<P: AsRef<Path>>(path: P, duration_ms: u64) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(2))?;
    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;
    for _ in 0..total_frames * 2 {
        writer.write_sample(0i16)?;
    }
    writer.finalize()
}

/// Generate a constant-amplitude stereo WAV file.
///
/// Every sample on both channels has the same value, which makes gain
/// assertions trivial: an output block's peak is `amplitude * gain`.
pub fn generate_const_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(2))?;
    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;
    let value = (amplitude.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
    for _ in 0..total_frames * 2 {
        writer.write_sample(value)?;
    }
    writer.finalize()
}

/// Generate a sine wave WAV file with the given channel count.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
    channels: u16,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(channels))?;
    let total_frames = (TEST_SAMPLE_RATE as u64 * duration_ms) / 1000;
    for i in 0..total_frames {
        let t = i as f32 / TEST_SAMPLE_RATE as f32;
        let value = (2.0 * PI * frequency_hz * t).sin() * amplitude;
        let sample = (value * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()
}
