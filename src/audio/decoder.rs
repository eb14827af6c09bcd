//! Audio decoder using symphonia
//!
//! Decodes a clip file (WAV, MP3, FLAC, AAC, Vorbis) into the engine's
//! internal format: a contiguous, immutable buffer of interleaved stereo f32
//! samples plus the native sample rate.
//!
//! Whole-file decode is intentional: soundboard clips are short, and holding
//! the full buffer lets overlapping sessions (one fading out, one fading in)
//! share it without any streaming coordination.

use crate::audio::types::DecodedClip;
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Decode an entire audio file to interleaved stereo f32 samples.
///
/// # Returns
/// A [`DecodedClip`] at the file's native sample rate. Mono sources are
/// duplicated to both channels; multi-channel sources are downmixed.
///
/// # Errors
/// `Error::Decode` when the file is missing, unreadable, or not a supported
/// audio format. Callers abort the playback session and report; the process
/// keeps running.
pub fn decode_file(path: &Path) -> Result<DecodedClip> {
    debug!("Decoding clip: {}", path.display());

    let file = std::fs::File::open(path)
        .map_err(|e| Error::Decode(format!("Failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint the probe with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    // First track with a real codec
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("Error reading packet from {}: {}", path.display(), e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => convert_to_stereo_f32(&decoded, &mut samples),
            Err(e) => {
                // A single bad packet is skippable; the rest of the clip decodes
                warn!("Decode error in {}: {}", path.display(), e);
                continue;
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode(format!(
            "No decodable audio in {}",
            path.display()
        )));
    }

    debug!(
        "Decoded {} frames at {} Hz from {}",
        samples.len() / 2,
        sample_rate,
        path.display()
    );

    Ok(DecodedClip {
        samples: samples.into(),
        sample_rate,
    })
}

/// Convert a decoded symphonia buffer to interleaved stereo f32.
///
/// Handles every PCM sample format symphonia produces; output is appended to
/// `output`.
fn convert_to_stereo_f32(decoded: &AudioBufferRef, output: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::U8(buf) => append_stereo(buf, output),
        AudioBufferRef::U16(buf) => append_stereo(buf, output),
        AudioBufferRef::U24(buf) => append_stereo(buf, output),
        AudioBufferRef::U32(buf) => append_stereo(buf, output),
        AudioBufferRef::S8(buf) => append_stereo(buf, output),
        AudioBufferRef::S16(buf) => append_stereo(buf, output),
        AudioBufferRef::S24(buf) => append_stereo(buf, output),
        AudioBufferRef::S32(buf) => append_stereo(buf, output),
        AudioBufferRef::F32(buf) => append_stereo(buf, output),
        AudioBufferRef::F64(buf) => append_stereo(buf, output),
    }
}

/// Interleave one planar buffer into stereo f32 output.
///
/// Mono is duplicated to both channels; more than two channels are averaged
/// pairwise into left/right (simple downmix).
fn append_stereo<S>(buf: &AudioBuffer<S>, output: &mut Vec<f32>)
where
    S: Sample,
    f32: FromSample<S>,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    output.reserve(frames * 2);

    match channels {
        1 => {
            for frame_idx in 0..frames {
                let sample = f32::from_sample(buf.chan(0)[frame_idx]);
                output.push(sample);
                output.push(sample);
            }
        }
        2 => {
            for frame_idx in 0..frames {
                output.push(f32::from_sample(buf.chan(0)[frame_idx]));
                output.push(f32::from_sample(buf.chan(1)[frame_idx]));
            }
        }
        _ => {
            // Downmix: even channels to the left, odd to the right
            let half = (channels as f32 / 2.0).max(1.0);
            for frame_idx in 0..frames {
                let mut left = 0.0f32;
                let mut right = 0.0f32;
                for ch_idx in 0..channels {
                    let sample = f32::from_sample(buf.chan(ch_idx)[frame_idx]);
                    if ch_idx % 2 == 0 {
                        left += sample;
                    } else {
                        right += sample;
                    }
                }
                output.push(left / half);
                output.push(right / half);
            }
        }
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonexistent_file_is_decode_error() {
        let result = decode_file(Path::new("/nonexistent/clip.mp3"));
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_non_audio_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_audio.wav");
        std::fs::write(&path, b"this is definitely not a wav file").unwrap();

        let result = decode_file(&path);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    // Full decode coverage (WAV fixtures generated with hound) lives in
    // tests/decoder_integration.rs
}
