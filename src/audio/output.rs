//! Audio output streams using cpal
//!
//! A playback session owns a [`StreamPair`]: a mandatory main stream and an
//! optional monitoring stream, each wrapped around a lock-free ring buffer.
//! The session thread pushes fixed-size blocks with [`StreamPair::write`],
//! which blocks while the ring is full - the device drains it in real time,
//! so backpressure paces the whole block loop. The cpal callback side never
//! locks; an empty ring plays silence.
//!
//! [`StreamOpener`] is the seam between the engine and the platform: the
//! production implementation talks to cpal, tests substitute capture sinks.

use crate::audio::device;
use crate::audio::types::OutputRoute;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Ring capacity per stream, in interleaved samples (~93 ms of stereo at 44.1 kHz)
const RING_CAPACITY: usize = 8192;

/// Sleep granularity while waiting for ring space
const WRITE_POLL: Duration = Duration::from_millis(2);

/// Upper bound on waiting for a completed clip's tail to leave the ring
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// What a session asks the opener for
#[derive(Debug, Clone)]
pub struct StreamSpec {
    /// The clip's native sample rate (the pair may negotiate a different one)
    pub sample_rate: u32,
    /// Selected main output device name (None = system default)
    pub main_device: Option<String>,
}

/// One destination's block-write endpoint.
///
/// Implementations block in `write_block` until the device has accepted the
/// samples; this is the engine's only blocking call.
pub trait BlockSink {
    /// Push one block of interleaved stereo samples, blocking on backpressure.
    fn write_block(&mut self, samples: &[f32]) -> Result<()>;

    /// Wait (bounded) for already-written samples to reach the device.
    fn drain(&mut self);
}

/// Opens stream pairs against the platform audio API.
///
/// Sessions receive an `Arc<dyn StreamOpener>` and call it exactly once, at
/// session start. Tests inject openers that capture blocks instead.
pub trait StreamOpener: Send + Sync {
    fn open(&self, spec: &StreamSpec) -> Result<StreamPair>;
}

/// The one-or-two live output streams owned by a single playback session.
///
/// Streams are released when the pair drops, on every exit path.
pub struct StreamPair {
    main: Box<dyn BlockSink>,
    monitor: Option<Box<dyn BlockSink>>,
    sample_rate: u32,
}

impl StreamPair {
    pub fn new(
        main: Box<dyn BlockSink>,
        monitor: Option<Box<dyn BlockSink>>,
        sample_rate: u32,
    ) -> Self {
        Self {
            main,
            monitor,
            sample_rate,
        }
    }

    /// The rate both streams were opened at. When this differs from the
    /// clip's native rate the session resamples before streaming.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether a distinct monitoring stream was opened.
    pub fn has_monitor(&self) -> bool {
        self.monitor.is_some()
    }

    /// Write one block to one destination.
    ///
    /// A monitor write with no monitor stream is a no-op: the main device is
    /// also the default device, so a second stream would double the audio.
    pub fn write(&mut self, route: OutputRoute, samples: &[f32]) -> Result<()> {
        match route {
            OutputRoute::Main => self.main.write_block(samples),
            OutputRoute::Monitor => match self.monitor.as_mut() {
                Some(sink) => sink.write_block(samples),
                None => Ok(()),
            },
        }
    }

    /// Let the buffered tail of a completed clip play out.
    pub fn drain(&mut self) {
        self.main.drain();
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.drain();
        }
    }
}

// ------------------------------------------------------------------
// cpal implementation
// ------------------------------------------------------------------

/// Production opener backed by cpal.
pub struct CpalOpener;

impl StreamOpener for CpalOpener {
    /// Open the pair for a session.
    ///
    /// The main stream must open or the session aborts. The monitoring stream
    /// targets the system default device, is only opened when that device
    /// differs from the main one, and is best-effort: failure degrades to
    /// main-only without surfacing an error.
    fn open(&self, spec: &StreamSpec) -> Result<StreamPair> {
        let main_device = device::resolve_output_device(spec.main_device.as_deref())
            .ok_or_else(|| Error::DeviceOpen("No output device available".to_string()))?;
        let main_name = main_device.name().unwrap_or_else(|_| "Unknown".to_string());

        let main_sink = CpalSink::open(&main_device, spec.sample_rate)
            .map_err(|e| Error::DeviceOpen(format!("Main stream on '{}': {}", main_name, e)))?;
        let pair_rate = main_sink.sample_rate();
        info!(
            "Opened main stream on '{}' at {} Hz",
            main_name, pair_rate
        );

        let monitor_sink = match device::default_output_device() {
            Some(monitor_name) if monitor_name != main_name => {
                match device::resolve_output_device(None) {
                    // The monitor must run at the pair rate or the two streams
                    // would drift; skip it otherwise (monitoring is best-effort)
                    Some(monitor_device) => match CpalSink::open_at(&monitor_device, pair_rate) {
                        Ok(sink) => {
                            info!(
                                "Opened monitoring stream on '{}' at {} Hz",
                                monitor_name, pair_rate
                            );
                            Some(Box::new(sink) as Box<dyn BlockSink>)
                        }
                        Err(e) => {
                            warn!(
                                "Monitoring stream on '{}' unavailable ({}), continuing main-only",
                                monitor_name, e
                            );
                            None
                        }
                    },
                    None => None,
                }
            }
            _ => {
                debug!("Main output is the default device; monitoring shares it");
                None
            }
        };

        Ok(StreamPair::new(
            Box::new(main_sink),
            monitor_sink,
            pair_rate,
        ))
    }
}

/// A single cpal output stream fed through a lock-free ring buffer.
struct CpalSink {
    producer: HeapProd<f32>,
    stream: Stream,
    sample_rate: u32,
    /// Set by the cpal error callback; checked on every write
    error_flag: Arc<AtomicBool>,
}

impl CpalSink {
    /// Open a stream preferring stereo f32 at `preferred_rate`, falling back
    /// to the device default configuration.
    fn open(device: &Device, preferred_rate: u32) -> Result<Self> {
        let (config, sample_format) = best_config(device, preferred_rate)?;
        Self::build(device, config, sample_format)
    }

    /// Open a stream that must run at exactly `rate`.
    fn open_at(device: &Device, rate: u32) -> Result<Self> {
        let (config, sample_format) = best_config(device, rate)?;
        if config.sample_rate.0 != rate {
            return Err(Error::DeviceOpen(format!(
                "Device cannot run at {} Hz",
                rate
            )));
        }
        Self::build(device, config, sample_format)
    }

    fn build(device: &Device, config: StreamConfig, sample_format: SampleFormat) -> Result<Self> {
        let rb = HeapRb::<f32>::new(RING_CAPACITY);
        let (producer, consumer) = rb.split();
        let error_flag = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(device, &config, consumer, Arc::clone(&error_flag))?
            }
            SampleFormat::I16 => {
                build_stream::<i16>(device, &config, consumer, Arc::clone(&error_flag))?
            }
            SampleFormat::U16 => {
                build_stream::<u16>(device, &config, consumer, Arc::clone(&error_flag))?
            }
            other => {
                return Err(Error::DeviceOpen(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceOpen(format!("Failed to start stream: {}", e)))?;

        Ok(Self {
            producer,
            stream,
            sample_rate: config.sample_rate.0,
            error_flag,
        })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl BlockSink for CpalSink {
    fn write_block(&mut self, samples: &[f32]) -> Result<()> {
        let mut written = 0;
        while written < samples.len() {
            if self.error_flag.load(Ordering::SeqCst) {
                return Err(Error::Playback("Output stream error".to_string()));
            }

            // Only push whole frames so the callback never sees a split L/R pair
            let free = self.producer.vacant_len() & !1;
            if free == 0 {
                std::thread::sleep(WRITE_POLL);
                continue;
            }

            let end = (written + free).min(samples.len());
            written += self.producer.push_slice(&samples[written..end]);
        }
        Ok(())
    }

    fn drain(&mut self) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while self.producer.occupied_len() > 0
            && !self.error_flag.load(Ordering::SeqCst)
            && Instant::now() < deadline
        {
            std::thread::sleep(WRITE_POLL);
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        // Stop the device before the ring goes away
        let _ = self.stream.pause();
    }
}

/// Pick the stream configuration for a device.
///
/// Prefers stereo f32 at the requested rate (no resample needed); otherwise
/// falls back to the device default and lets the session resample.
fn best_config(device: &Device, preferred_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
    let mut supported = device
        .supported_output_configs()
        .map_err(|e| Error::DeviceOpen(format!("Failed to get device configs: {}", e)))?;

    let preferred = supported.find(|config| {
        config.channels() == 2
            && config.min_sample_rate().0 <= preferred_rate
            && config.max_sample_rate().0 >= preferred_rate
            && config.sample_format() == SampleFormat::F32
    });

    if let Some(supported_config) = preferred {
        let sample_format = supported_config.sample_format();
        let config = supported_config
            .with_sample_rate(SampleRate(preferred_rate))
            .config();
        return Ok((config, sample_format));
    }

    let supported_config = device
        .default_output_config()
        .map_err(|e| Error::DeviceOpen(format!("Failed to get default config: {}", e)))?;

    let sample_format = supported_config.sample_format();
    Ok((supported_config.config(), sample_format))
}

/// Build one output stream that pulls interleaved stereo frames off the ring.
///
/// Runs on the real-time audio thread: no locks, no allocation. Underruns
/// (ring empty) produce silence; devices with more than two channels get the
/// extra channels zeroed, mono devices get the left channel.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let (left, right) = if consumer.occupied_len() >= 2 {
                        let l = consumer.try_pop().unwrap_or(0.0);
                        let r = consumer.try_pop().unwrap_or(0.0);
                        (l, r)
                    } else {
                        (0.0, 0.0)
                    };

                    frame[0] = T::from_sample(left.clamp(-1.0, 1.0));
                    if channels > 1 {
                        frame[1] = T::from_sample(right.clamp(-1.0, 1.0));
                    }
                    for extra in frame.iter_mut().skip(2) {
                        *extra = T::from_sample(0.0);
                    }
                }
            },
            move |err| {
                warn!("Output stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| Error::DeviceOpen(format!("Failed to build stream: {}", e)))?;

    Ok(stream)
}

// ========================================
// Tests
// ========================================
