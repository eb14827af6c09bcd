//! Capturing stream opener
//!
//! Stands in for the cpal backend: every block a session writes is recorded
//! with its session index and destination, in write order. An optional
//! per-write sleep emulates device backpressure so overlapping sessions stay
//! overlapped long enough to observe supersession.

use boardcast::audio::output::{BlockSink, StreamOpener, StreamPair, StreamSpec};
use boardcast::audio::types::OutputRoute;
use boardcast::error::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One captured block write
#[derive(Debug, Clone)]
pub struct BlockRecord {
    /// Which `open` call the writing session came from (0-based)
    pub session: usize,
    pub route: OutputRoute,
    pub samples: Vec<f32>,
}

impl BlockRecord {
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

/// Opener whose sinks append every write to a shared log.
pub struct CaptureOpener {
    log: Arc<Mutex<Vec<BlockRecord>>>,
    opens: AtomicUsize,
    with_monitor: bool,
    /// Rate the pair reports; None mirrors the requested rate
    rate_override: Option<u32>,
    /// Per-write sleep emulating device backpressure
    write_delay: Duration,
}

impl CaptureOpener {
    pub fn new(with_monitor: bool) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            opens: AtomicUsize::new(0),
            with_monitor,
            rate_override: None,
            write_delay: Duration::ZERO,
        }
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn with_rate(mut self, rate: u32) -> Self {
        self.rate_override = Some(rate);
        self
    }

    /// Number of stream pairs opened so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Snapshot of all captured writes, in order
    pub fn records(&self) -> Vec<BlockRecord> {
        self.log.lock().unwrap().clone()
    }

    /// Captured writes for one session and destination
    pub fn session_blocks(&self, session: usize, route: OutputRoute) -> Vec<BlockRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.session == session && r.route == route)
            .collect()
    }
}

struct CaptureSink {
    session: usize,
    route: OutputRoute,
    log: Arc<Mutex<Vec<BlockRecord>>>,
    write_delay: Duration,
}

impl BlockSink for CaptureSink {
    fn write_block(&mut self, samples: &[f32]) -> Result<()> {
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        self.log.lock().unwrap().push(BlockRecord {
            session: self.session,
            route: self.route,
            samples: samples.to_vec(),
        });
        Ok(())
    }

    fn drain(&mut self) {}
}

impl StreamOpener for CaptureOpener {
    fn open(&self, spec: &StreamSpec) -> Result<StreamPair> {
        let session = self.opens.fetch_add(1, Ordering::SeqCst);
        let rate = self.rate_override.unwrap_or(spec.sample_rate);

        let main = Box::new(CaptureSink {
            session,
            route: OutputRoute::Main,
            log: Arc::clone(&self.log),
            write_delay: self.write_delay,
        });
        let monitor = self.with_monitor.then(|| {
            Box::new(CaptureSink {
                session,
                route: OutputRoute::Monitor,
                log: Arc::clone(&self.log),
                write_delay: Duration::ZERO,
            }) as Box<dyn BlockSink>
        });

        Ok(StreamPair::new(main, monitor, rate))
    }
}
