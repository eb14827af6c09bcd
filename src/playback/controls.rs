//! Shared playback controls
//!
//! The one piece of state shared between the dispatcher (UI side) and every
//! playback session thread. All fields are plain atomics: sessions read them
//! on every block without taking a lock, and nothing here is ever held across
//! a blocking stream write.
//!
//! The generation counter is the sole cancellation mechanism. A session
//! captures the value handed out when it starts; any later `begin_playback`
//! or `request_stop` bumps the live counter, and the session notices the
//! mismatch on its next block and fades itself out.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Atomic control fields shared by the dispatcher and session threads.
///
/// Volumes are stored as f32 bit patterns in `AtomicU32`; there is no
/// atomic f32, but the bit-cast round-trip is exact.
pub struct PlaybackControls {
    /// Monotonic playback generation; bumped on every play and stop
    generation: AtomicU64,

    /// Explicit stop requested (cleared by the next play)
    stop: AtomicBool,

    /// Whether the monitoring destination is audible
    monitoring: AtomicBool,

    /// Main output volume (f32 bits)
    vol_main: AtomicU32,

    /// Monitoring output volume (f32 bits)
    vol_monitoring: AtomicU32,
}

impl PlaybackControls {
    pub fn new(monitoring: bool, vol_main: f32, vol_monitoring: f32) -> Self {
        Self {
            generation: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            monitoring: AtomicBool::new(monitoring),
            vol_main: AtomicU32::new(vol_main.clamp(0.0, 1.0).to_bits()),
            vol_monitoring: AtomicU32::new(vol_monitoring.clamp(0.0, 1.0).to_bits()),
        }
    }

    /// Start a new playback: clear the stop flag and bump the generation.
    ///
    /// Returns the new generation value for the session to capture. Any
    /// session holding an older value is superseded from this moment on.
    pub fn begin_playback(&self) -> u64 {
        self.stop.store(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Request stop of whatever is playing.
    ///
    /// Also bumps the generation so a play issued immediately afterwards is
    /// never confused with the session being stopped.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Current live generation value.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether an explicit stop is pending.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Whether a session holding `captured` has been superseded or stopped.
    pub fn is_superseded(&self, captured: u64) -> bool {
        self.stop_requested() || self.generation() != captured
    }

    pub fn set_monitoring(&self, enabled: bool) {
        self.monitoring.store(enabled, Ordering::SeqCst);
    }

    pub fn monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// Set the main output volume, clamped to [0.0, 1.0].
    ///
    /// Returns the stored value.
    pub fn set_volume_main(&self, volume: f32) -> f32 {
        let clamped = volume.clamp(0.0, 1.0);
        self.vol_main.store(clamped.to_bits(), Ordering::SeqCst);
        clamped
    }

    pub fn volume_main(&self) -> f32 {
        f32::from_bits(self.vol_main.load(Ordering::SeqCst))
    }

    /// Set the monitoring output volume, clamped to [0.0, 1.0].
    ///
    /// Returns the stored value.
    pub fn set_volume_monitoring(&self, volume: f32) -> f32 {
        let clamped = volume.clamp(0.0, 1.0);
        self.vol_monitoring.store(clamped.to_bits(), Ordering::SeqCst);
        clamped
    }

    pub fn volume_monitoring(&self) -> f32 {
        f32::from_bits(self.vol_monitoring.load(Ordering::SeqCst))
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_playback_supersedes_previous() {
        let controls = PlaybackControls::new(false, 1.0, 1.0);

        let first = controls.begin_playback();
        assert!(!controls.is_superseded(first));

        let second = controls.begin_playback();
        assert!(controls.is_superseded(first));
        assert!(!controls.is_superseded(second));
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_stop_supersedes_and_bumps_generation() {
        let controls = PlaybackControls::new(false, 1.0, 1.0);
        let generation = controls.begin_playback();

        controls.request_stop();
        assert!(controls.stop_requested());
        assert!(controls.is_superseded(generation));

        // A fresh play clears the stop flag and gets its own generation
        let next = controls.begin_playback();
        assert!(!controls.stop_requested());
        assert!(!controls.is_superseded(next));
        assert!(next > generation);
    }

    #[test]
    fn test_volume_clamping() {
        let controls = PlaybackControls::new(false, 1.0, 1.0);

        assert_eq!(controls.set_volume_main(-0.5), 0.0);
        assert_eq!(controls.volume_main(), 0.0);

        assert_eq!(controls.set_volume_main(1.7), 1.0);
        assert_eq!(controls.volume_main(), 1.0);

        assert_eq!(controls.set_volume_main(0.42), 0.42);
        assert_eq!(controls.volume_main(), 0.42);

        assert_eq!(controls.set_volume_monitoring(2.0), 1.0);
        assert_eq!(controls.volume_monitoring(), 1.0);
    }

    #[test]
    fn test_monitoring_toggle() {
        let controls = PlaybackControls::new(false, 1.0, 1.0);
        assert!(!controls.monitoring());
        controls.set_monitoring(true);
        assert!(controls.monitoring());
    }
}
