//! Audio resampling using rubato
//!
//! Output streams negotiate their own sample rate with the device; when that
//! rate differs from the clip's native rate, the clip is converted once, up
//! front, before streaming begins. Nothing resamples inside the block loop.

use crate::audio::types::{DecodedClip, CHANNELS};
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Resample a decoded clip to `target_rate`.
///
/// Returns the clip unchanged when it is already at the target rate.
/// FastFixedIn gives a good quality/CPU tradeoff for one-shot clip
/// conversion.
pub fn resample_clip(clip: &DecodedClip, target_rate: u32) -> Result<DecodedClip> {
    if clip.sample_rate == target_rate {
        debug!("Clip already at {} Hz, skipping resample", target_rate);
        return Ok(clip.clone());
    }

    debug!(
        "Resampling clip from {} Hz to {} Hz",
        clip.sample_rate, target_rate
    );

    // rubato wants planar input
    let planar_input = deinterleave(&clip.samples);
    let input_frames = planar_input[0].len();
    if input_frames == 0 {
        return Ok(DecodedClip {
            samples: Vec::new().into(),
            sample_rate: target_rate,
        });
    }

    let mut resampler = FastFixedIn::<f32>::new(
        target_rate as f64 / clip.sample_rate as f64,
        1.0, // fixed ratio, no runtime changes
        PolynomialDegree::Septic,
        input_frames,
        CHANNELS,
    )
    .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

    let planar_output = resampler
        .process(&planar_input, None)
        .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

    let interleaved = interleave(planar_output);

    debug!(
        "Resampled {} input frames to {} output frames",
        input_frames,
        interleaved.len() / CHANNELS
    );

    Ok(DecodedClip {
        samples: interleaved.into(),
        sample_rate: target_rate,
    })
}

/// Convert interleaved stereo samples to planar format.
///
/// Input:  [L, R, L, R, ...]
/// Output: [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32]) -> Vec<Vec<f32>> {
    let num_frames = samples.len() / CHANNELS;
    let mut planar = vec![Vec::with_capacity(num_frames); CHANNELS];

    for frame_idx in 0..num_frames {
        for ch_idx in 0..CHANNELS {
            planar[ch_idx].push(samples[frame_idx * CHANNELS + ch_idx]);
        }
    }

    planar
}

/// Convert planar samples back to interleaved format.
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }

    let num_channels = planar.len();
    let num_frames = planar[0].len();
    let mut interleaved = Vec::with_capacity(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for ch_idx in 0..num_channels {
            interleaved.push(planar[ch_idx][frame_idx]);
        }
    }

    interleaved
}
