//! Playback dispatcher - the process-wide coordinator
//!
//! Owns the shared playback controls, the persisted configuration, and the
//! handle of the most recent session. Guarantees at most one audible session:
//! `play` bumps the generation counter before spawning, so the previous
//! session notices the mismatch on its next block and fades itself out. There
//! is no queue and no mutual exclusion between sessions - supersession is the
//! whole mechanism.
//!
//! Every public operation runs on the caller's thread, mutates in-memory
//! state, persists the configuration synchronously, and returns. Nothing here
//! blocks on audio.

use crate::audio::device::{self, OutputDevice};
use crate::audio::output::StreamOpener;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EngineEvent, VolumeTarget};
use crate::playback::controls::PlaybackControls;
use crate::playback::session::PlaybackSession;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Configuration plus the path it persists to
struct Store {
    config: Config,
    path: PathBuf,
}

/// Process-wide playback coordinator.
///
/// Safe to share behind an `Arc` and call concurrently from the HTTP
/// handlers, the hotkey router, and anything else: control fields are
/// atomics, configuration sits behind a mutex that is never held across a
/// blocking call.
pub struct Dispatcher {
    controls: Arc<PlaybackControls>,
    store: Mutex<Store>,
    opener: Arc<dyn StreamOpener>,
    events: broadcast::Sender<EngineEvent>,
    /// Most recent session thread, joined on shutdown
    last_session: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create a dispatcher from a configuration file path.
    ///
    /// A missing or malformed file starts the engine with defaults; that is
    /// routine first-run behavior, not an error.
    pub fn new(config_path: PathBuf, opener: Arc<dyn StreamOpener>) -> Self {
        let config = Config::load(&config_path);
        let controls = Arc::new(PlaybackControls::new(
            config.monitoring,
            config.vol_output,
            config.vol_monitoring,
        ));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            "Dispatcher ready: {} sounds, device {:?}",
            config.sounds.len(),
            config.device_id
        );

        Self {
            controls,
            store: Mutex::new(Store {
                config,
                path: config_path,
            }),
            opener,
            events,
            last_session: Mutex::new(None),
        }
    }

    /// Subscribe to engine events (SSE, tests).
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Play a sound from the library, superseding any current playback.
    ///
    /// Returns as soon as the session thread is spawned. Safe to call as fast
    /// as a user can mash a button: every call supersedes, nothing queues.
    pub fn play(&self, name: &str) -> Result<()> {
        let path = {
            let store = self.store.lock().unwrap();
            store
                .config
                .sound_path(name)
                .map(PathBuf::from)
                .ok_or_else(|| Error::SoundNotFound(name.to_string()))?
        };
        self.spawn_session(name.to_string(), path)
    }

    /// Play an arbitrary file, bypassing the library.
    pub fn play_file(&self, path: &Path) -> Result<()> {
        let sound = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.spawn_session(sound, path.to_path_buf())
    }

    fn spawn_session(&self, sound: String, path: PathBuf) -> Result<()> {
        let main_device = self.store.lock().unwrap().config.device_id.clone();
        let generation = self.controls.begin_playback();
        debug!("Spawning session {} for '{}'", generation, sound);

        let session = PlaybackSession::new(
            sound,
            path,
            generation,
            main_device,
            Arc::clone(&self.controls),
            Arc::clone(&self.opener),
            self.events.clone(),
        );

        let handle = std::thread::Builder::new()
            .name(format!("playback-{}", generation))
            .spawn(move || session.run())
            .map_err(|e| Error::Playback(format!("Failed to spawn session thread: {}", e)))?;

        // The superseded session cleans itself up; only the newest handle is
        // kept, for shutdown
        *self.last_session.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Stop whatever is playing, with a fade-out.
    ///
    /// Never blocks waiting for the fade; with no active session this is a
    /// no-op.
    pub fn stop_all(&self) {
        debug!("Stop requested");
        self.controls.request_stop();
    }

    /// Stop playback and wait for the last session thread to exit.
    pub fn shutdown(&self) {
        self.stop_all();
        if let Some(handle) = self.last_session.lock().unwrap().take() {
            let _ = handle.join();
        }
        info!("Dispatcher shut down");
    }

    // ------------------------------------------------------------------
    // Volume / monitoring / device
    // ------------------------------------------------------------------

    /// Set the main output volume (clamped to [0.0, 1.0]) and persist.
    pub fn set_volume_main(&self, volume: f32) {
        let stored = self.controls.set_volume_main(volume);
        self.persist();
        self.emit(EngineEvent::VolumeChanged {
            target: VolumeTarget::Main,
            volume: stored,
            timestamp: Utc::now(),
        });
    }

    /// Set the monitoring output volume (clamped to [0.0, 1.0]) and persist.
    pub fn set_volume_monitoring(&self, volume: f32) {
        let stored = self.controls.set_volume_monitoring(volume);
        self.persist();
        self.emit(EngineEvent::VolumeChanged {
            target: VolumeTarget::Monitoring,
            volume: stored,
            timestamp: Utc::now(),
        });
    }

    pub fn volume_main(&self) -> f32 {
        self.controls.volume_main()
    }

    pub fn volume_monitoring(&self) -> f32 {
        self.controls.volume_monitoring()
    }

    /// Toggle the monitoring output. Applies to the running session's next
    /// block - amplitude only, the stream stays time-aligned.
    pub fn set_monitoring(&self, enabled: bool) {
        self.controls.set_monitoring(enabled);
        self.persist();
        self.emit(EngineEvent::MonitoringChanged {
            enabled,
            timestamp: Utc::now(),
        });
    }

    pub fn monitoring(&self) -> bool {
        self.controls.monitoring()
    }

    /// Select the main output device (None = system default).
    ///
    /// Takes effect on the next `play`; an in-flight session keeps the
    /// device it opened with.
    pub fn set_output_device(&self, device_id: Option<String>) {
        {
            let mut store = self.store.lock().unwrap();
            store.config.device_id = device_id.clone();
        }
        self.persist();
        self.emit(EngineEvent::DeviceChanged {
            device_id,
            timestamp: Utc::now(),
        });
    }

    pub fn output_device(&self) -> Option<String> {
        self.store.lock().unwrap().config.device_id.clone()
    }

    /// Enumerate output devices (read-only platform query).
    pub fn list_devices(&self) -> Vec<OutputDevice> {
        device::list_output_devices()
    }

    // ------------------------------------------------------------------
    // Sound library
    // ------------------------------------------------------------------

    pub fn add_sound(&self, name: &str, path: &str) -> Result<()> {
        self.with_config(|config| config.add_sound(name, path))?;
        self.emit(EngineEvent::LibraryChanged {
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub fn remove_sound(&self, name: &str) -> Result<()> {
        self.with_config(|config| config.remove_sound(name))?;
        self.emit(EngineEvent::LibraryChanged {
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub fn rename_sound(&self, old: &str, new: &str) -> Result<()> {
        self.with_config(|config| config.rename_sound(old, new))?;
        self.emit(EngineEvent::LibraryChanged {
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Snapshot of the sound library (name -> file path).
    pub fn sounds(&self) -> BTreeMap<String, String> {
        self.store.lock().unwrap().config.sounds.clone()
    }

    // ------------------------------------------------------------------
    // Keybinds
    // ------------------------------------------------------------------

    pub fn set_keybind(&self, key: &str, sound_name: &str) -> Result<()> {
        self.with_config(|config| config.set_keybind(key, sound_name))?;
        self.emit(EngineEvent::KeybindsChanged {
            timestamp: Utc::now(),
        });
        Ok(())
    }

    pub fn clear_keybind(&self, key: &str) {
        let _ = self.with_config(|config| {
            config.clear_keybind(key);
            Ok(())
        });
        self.emit(EngineEvent::KeybindsChanged {
            timestamp: Utc::now(),
        });
    }

    pub fn set_stop_key(&self, key: Option<String>) {
        let _ = self.with_config(|config| {
            config.set_stop_key(key);
            Ok(())
        });
        self.emit(EngineEvent::KeybindsChanged {
            timestamp: Utc::now(),
        });
    }

    /// The key bound to a sound, if any.
    pub fn sound_key(&self, sound_name: &str) -> Option<String> {
        self.store
            .lock()
            .unwrap()
            .config
            .sound_key(sound_name)
            .map(String::from)
    }

    /// Snapshot of the keybind map (key -> sound name).
    pub fn keybinds(&self) -> BTreeMap<String, String> {
        self.store.lock().unwrap().config.keybinds.clone()
    }

    pub fn stop_key(&self) -> Option<String> {
        self.store.lock().unwrap().config.stop_key.clone()
    }

    // ------------------------------------------------------------------
    // Hotkey entry point
    // ------------------------------------------------------------------

    /// Handle a key-down event from the injected hotkey source.
    ///
    /// Checks the stop key first, then the keybind map; unknown keys are
    /// ignored. Playback failures are logged, never propagated - an event
    /// source has nobody to return an error to.
    pub fn on_key(&self, key: &str) {
        let (is_stop, bound_sound) = {
            let store = self.store.lock().unwrap();
            (
                store.config.stop_key.as_deref() == Some(key),
                store.config.keybinds.get(key).cloned(),
            )
        };

        if is_stop {
            self.stop_all();
            return;
        }

        if let Some(sound) = bound_sound {
            if let Err(e) = self.play(&sound) {
                warn!("Keybind '{}' -> '{}' failed: {}", key, sound, e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Apply a mutation to the configuration and persist the result.
    ///
    /// A failed mutation (duplicate name, unknown sound) leaves state and
    /// disk untouched.
    fn with_config<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Config) -> Result<()>,
    {
        let mut store = self.store.lock().unwrap();
        mutate(&mut store.config)?;
        Self::save_store(&mut store, &self.controls);
        Ok(())
    }

    /// Persist the current configuration (volumes and flags live in the
    /// atomics and are folded in at write time).
    fn persist(&self) {
        let mut store = self.store.lock().unwrap();
        Self::save_store(&mut store, &self.controls);
    }

    /// Best-effort synchronous save; a write failure is logged and the next
    /// mutation retries.
    fn save_store(store: &mut Store, controls: &PlaybackControls) {
        store.config.vol_output = controls.volume_main();
        store.config.vol_monitoring = controls.volume_monitoring();
        store.config.monitoring = controls.monitoring();
        if let Err(e) = store.config.save(&store.path) {
            warn!("Failed to persist configuration: {}", e);
        }
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::{BlockSink, StreamPair, StreamSpec};
    use crate::error::Error;

    /// Sink that discards blocks (sessions in these tests never get that far
    /// or do not care about the audio itself)
    struct NullSink;

    impl BlockSink for NullSink {
        fn write_block(&mut self, _samples: &[f32]) -> Result<()> {
            Ok(())
        }
        fn drain(&mut self) {}
    }

    struct NullOpener;

    impl StreamOpener for NullOpener {
        fn open(&self, spec: &StreamSpec) -> Result<StreamPair> {
            Ok(StreamPair::new(
                Box::new(NullSink),
                Some(Box::new(NullSink)),
                spec.sample_rate,
            ))
        }
    }

    fn test_dispatcher() -> (Dispatcher, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(dir.path().join("config.json"), Arc::new(NullOpener));
        (dispatcher, dir)
    }

    #[test]
    fn test_play_unknown_sound_is_error() {
        let (dispatcher, _dir) = test_dispatcher();
        let err = dispatcher.play("Ghost").unwrap_err();
        assert!(matches!(err, Error::SoundNotFound(_)));
    }

    #[test]
    fn test_stop_all_without_session_is_noop() {
        let (dispatcher, _dir) = test_dispatcher();
        dispatcher.stop_all();
        dispatcher.shutdown();
    }

    #[test]
    fn test_play_missing_file_reports_decode_failure() {
        let (dispatcher, _dir) = test_dispatcher();
        dispatcher
            .add_sound("Ghost", "/nonexistent/ghost.wav")
            .unwrap();

        let mut events = dispatcher.subscribe_events();
        dispatcher.play("Ghost").unwrap();

        // The session runs on its own thread; wait for its failure event
        loop {
            match events.blocking_recv().unwrap() {
                EngineEvent::PlaybackFailed { sound, error, .. } => {
                    assert_eq!(sound, "Ghost");
                    assert!(error.contains("decode"), "unexpected error: {}", error);
                    break;
                }
                _ => continue,
            }
        }
        dispatcher.shutdown();
    }

    #[test]
    fn test_volume_setters_clamp_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let dispatcher = Dispatcher::new(path.clone(), Arc::new(NullOpener));

        dispatcher.set_volume_main(-0.5);
        assert_eq!(dispatcher.volume_main(), 0.0);
        dispatcher.set_volume_main(1.7);
        assert_eq!(dispatcher.volume_main(), 1.0);
        dispatcher.set_volume_main(0.42);
        assert_eq!(dispatcher.volume_main(), 0.42);

        let persisted = Config::load(&path);
        assert_eq!(persisted.vol_output, 0.42);
    }

    #[test]
    fn test_config_round_trip_through_fresh_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let first = Dispatcher::new(path.clone(), Arc::new(NullOpener));
        first.add_sound("Boom", "/clips/boom.wav").unwrap();
        first.set_keybind("f1", "Boom").unwrap();
        first.set_stop_key(Some("f12".to_string()));
        first.set_volume_main(0.6);
        first.set_volume_monitoring(0.3);
        first.set_monitoring(true);
        first.set_output_device(Some("CABLE Input".to_string()));

        let second = Dispatcher::new(path, Arc::new(NullOpener));
        assert_eq!(second.sounds(), first.sounds());
        assert_eq!(second.volume_main(), 0.6);
        assert_eq!(second.volume_monitoring(), 0.3);
        assert!(second.monitoring());
        assert_eq!(second.output_device(), Some("CABLE Input".to_string()));
        assert_eq!(second.keybinds(), first.keybinds());
        assert_eq!(second.stop_key(), Some("f12".to_string()));
    }

    #[test]
    fn test_keybind_rebind_moves_key() {
        let (dispatcher, _dir) = test_dispatcher();
        dispatcher.add_sound("Boom", "/clips/boom.wav").unwrap();

        dispatcher.set_keybind("f1", "Boom").unwrap();
        dispatcher.set_keybind("f2", "Boom").unwrap();

        assert_eq!(dispatcher.sound_key("Boom"), Some("f2".to_string()));
        assert!(!dispatcher.keybinds().contains_key("f1"));
    }

    #[test]
    fn test_on_key_ignores_unbound_keys() {
        let (dispatcher, _dir) = test_dispatcher();
        dispatcher.on_key("f9");
    }

    #[test]
    fn test_on_key_stop_takes_precedence() {
        let (dispatcher, _dir) = test_dispatcher();
        dispatcher.add_sound("Boom", "/clips/boom.wav").unwrap();
        dispatcher.set_keybind("f1", "Boom").unwrap();
        dispatcher.set_stop_key(Some("f1".to_string()));

        let mut events = dispatcher.subscribe_events();
        dispatcher.on_key("f1");

        // The stop key must win over the keybind: no session may spawn
        std::thread::sleep(std::time::Duration::from_millis(50));
        loop {
            match events.try_recv() {
                Ok(EngineEvent::PlaybackStarted { .. })
                | Ok(EngineEvent::PlaybackFailed { .. }) => {
                    panic!("stop key must not start a session")
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    }

    #[test]
    fn test_duplicate_add_leaves_disk_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let dispatcher = Dispatcher::new(path.clone(), Arc::new(NullOpener));

        dispatcher.add_sound("Boom", "/a.wav").unwrap();
        let err = dispatcher.add_sound("Boom", "/b.wav").unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));

        let persisted = Config::load(&path);
        assert_eq!(persisted.sound_path("Boom"), Some("/a.wav"));
    }
}
