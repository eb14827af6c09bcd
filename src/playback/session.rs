//! Playback session - the per-clip state machine
//!
//! One session is one decode-and-stream-out of a single clip, running on its
//! own dedicated thread. The machine is `Starting -> Streaming -> FadingOut
//! -> Stopped`, with `Failed` reachable from the first two states on decode
//! or device errors.
//!
//! A session never receives commands. It captures the generation value the
//! dispatcher handed out at spawn and watches the live counter on every
//! block; a mismatch (or the stop flag) means it has been superseded, and it
//! ramps itself down and exits. The stream pair is released on every exit
//! path because the session owns it by value.

use crate::audio::decoder;
use crate::audio::output::{StreamOpener, StreamSpec};
use crate::audio::resampler;
use crate::audio::types::{OutputRoute, CHANNELS};
use crate::error::Result;
use crate::events::{EngineEvent, FinishReason};
use crate::playback::controls::PlaybackControls;
use crate::playback::envelope::{Envelope, BLOCK_FRAMES};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Starting,
    Streaming,
    FadingOut,
    Stopped,
    Failed,
}

/// One decode-and-stream-out operation for a single clip.
pub struct PlaybackSession {
    /// Library name of the sound (file stem for direct file playback)
    sound: String,
    path: PathBuf,
    /// Generation captured at spawn; mismatch with the live counter = superseded
    generation: u64,
    /// Main device selection captured at spawn (device changes apply to the
    /// *next* play, never to a session already in flight)
    main_device: Option<String>,
    controls: Arc<PlaybackControls>,
    opener: Arc<dyn StreamOpener>,
    events: broadcast::Sender<EngineEvent>,
}

impl PlaybackSession {
    pub fn new(
        sound: String,
        path: PathBuf,
        generation: u64,
        main_device: Option<String>,
        controls: Arc<PlaybackControls>,
        opener: Arc<dyn StreamOpener>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            sound,
            path,
            generation,
            main_device,
            controls,
            opener,
            events,
        }
    }

    /// Run the session to completion on the calling thread.
    ///
    /// All failures are absorbed here and reported as events; a bad clip or a
    /// missing device never propagates past the session boundary.
    pub fn run(self) {
        match self.stream_clip() {
            Ok(reason) => {
                info!(
                    "Session {} ('{}') finished: {:?}",
                    self.generation, self.sound, reason
                );
                let _ = self.events.send(EngineEvent::PlaybackFinished {
                    sound: self.sound.clone(),
                    generation: self.generation,
                    reason,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!(
                    "Session {} ('{}') failed: {} (state {:?})",
                    self.generation, self.sound, e, SessionState::Failed
                );
                let _ = self.events.send(EngineEvent::PlaybackFailed {
                    sound: self.sound.clone(),
                    generation: self.generation,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn stream_clip(&self) -> Result<FinishReason> {
        let mut state = SessionState::Starting;
        debug!(
            "Session {} ({:?}): decoding {}",
            self.generation,
            state,
            self.path.display()
        );

        let clip = decoder::decode_file(&self.path)?;

        let spec = StreamSpec {
            sample_rate: clip.sample_rate,
            main_device: self.main_device.clone(),
        };
        let mut pair = self.opener.open(&spec)?;

        // The pair may have negotiated a different rate than the clip's
        let clip = if pair.sample_rate() != clip.sample_rate {
            resampler::resample_clip(&clip, pair.sample_rate())?
        } else {
            clip
        };

        state = SessionState::Streaming;
        debug!(
            "Session {} ({:?}): {} frames at {} Hz, monitor stream: {}",
            self.generation,
            state,
            clip.frames(),
            pair.sample_rate(),
            pair.has_monitor()
        );
        let _ = self.events.send(EngineEvent::PlaybackStarted {
            sound: self.sound.clone(),
            generation: self.generation,
            timestamp: Utc::now(),
        });

        let mut envelope = Envelope::new(pair.sample_rate());
        let total_frames = clip.frames();
        let mut position = 0usize;
        let mut finish = FinishReason::Completed;

        let mut main_block = Vec::with_capacity(BLOCK_FRAMES * CHANNELS);
        let mut monitor_block = Vec::with_capacity(BLOCK_FRAMES * CHANNELS);
        let zero_block = vec![0.0f32; BLOCK_FRAMES * CHANNELS];

        while position < total_frames {
            // Live reads, once per block
            if self.controls.is_superseded(self.generation) && !envelope.is_fading_out() {
                finish = if self.controls.stop_requested() {
                    FinishReason::Stopped
                } else {
                    FinishReason::Superseded
                };
                envelope.begin_fade_out();
                state = SessionState::FadingOut;
                debug!("Session {} ({:?}): {:?}", self.generation, state, finish);
            }
            if envelope.is_fading_out() {
                envelope.step_fade_out();
                if envelope.is_silent() {
                    break;
                }
            }

            let vol_main = self.controls.volume_main();
            let vol_monitoring = self.controls.volume_monitoring();
            let monitoring = self.controls.monitoring();

            let end = (position + BLOCK_FRAMES).min(total_frames);
            let src = &clip.samples[position * CHANNELS..end * CHANNELS];

            main_block.clear();
            monitor_block.clear();
            for (i, frame) in src.chunks_exact(CHANNELS).enumerate() {
                let gain = envelope.frame_gain(i);
                main_block.push(frame[0] * gain * vol_main);
                main_block.push(frame[1] * gain * vol_main);
                if monitoring {
                    monitor_block.push(frame[0] * gain * vol_monitoring);
                    monitor_block.push(frame[1] * gain * vol_monitoring);
                }
            }

            // Both destinations get their block in the same iteration, main
            // first: they never drift apart by more than one block. When
            // monitoring is off the monitor stream still receives an
            // equal-length zero block so a mid-clip toggle stays in sync.
            pair.write(OutputRoute::Main, &main_block)?;
            if monitoring {
                pair.write(OutputRoute::Monitor, &monitor_block)?;
            } else {
                pair.write(OutputRoute::Monitor, &zero_block[..src.len()])?;
            }

            envelope.advance(end - position);
            position = end;
        }

        if finish == FinishReason::Completed {
            // Let the buffered tail play out before the streams close
            pair.drain();
        }

        state = SessionState::Stopped;
        debug!("Session {} ({:?})", self.generation, state);
        Ok(finish)
    }
}
