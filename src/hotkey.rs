//! Hotkey routing
//!
//! The OS-level keyboard hook lives outside this crate. Whatever installs it
//! implements [`HotkeySource`] and the router thread pumps its key-down
//! events into [`Dispatcher::on_key`], which resolves the stop key and the
//! keybind map. Tests drive the same path with synthetic sources.

use crate::playback::Dispatcher;
use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// A source of key-down events.
///
/// `next_key` blocks until the next event and returns `None` when the source
/// is exhausted, which ends the router thread.
pub trait HotkeySource: Send {
    fn next_key(&mut self) -> Option<String>;
}

/// Spawn the router thread connecting a hotkey source to the dispatcher.
pub fn spawn_key_router(
    mut source: impl HotkeySource + 'static,
    dispatcher: Arc<Dispatcher>,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("hotkey-router".to_string())
        .spawn(move || {
            while let Some(key) = source.next_key() {
                debug!("Key event: {}", key);
                dispatcher.on_key(&key);
            }
            info!("Hotkey source exhausted, router exiting");
        })
        .expect("failed to spawn hotkey router thread")
}

/// Reference source reading key names from stdin, one per line.
///
/// Useful for driving the engine from a terminal or a pipe when no global
/// hook is installed (`boardcast --stdin-keys`).
pub struct StdinKeySource;

impl HotkeySource for StdinKeySource {
    fn next_key(&mut self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let key = line.trim().to_string();
                if key.is_empty() {
                    self.next_key()
                } else {
                    Some(key)
                }
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
    use crate::audio::output::{BlockSink, StreamOpener, StreamPair, StreamSpec};
    use crate::error::Result;

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
            Ok(StreamPair::new(Box::new(NullSink), None, spec.sample_rate))
        }
    }

    /// Synthetic source yielding a fixed sequence of keys
    struct ScriptedSource {
        keys: std::vec::IntoIter<String>,
    }

    impl HotkeySource for ScriptedSource {
        fn next_key(&mut self) -> Option<String> {
            self.keys.next()
        }
    }

    #[test]
    fn test_router_feeds_keys_to_dispatcher() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            dir.path().join("config.json"),
            Arc::new(NullOpener),
        ));
        dispatcher.add_sound("Boom", "/nonexistent/boom.wav").unwrap();
        dispatcher.set_keybind("f1", "Boom").unwrap();

        let mut events = dispatcher.subscribe_events();

        let source = ScriptedSource {
            keys: vec!["f7".to_string(), "f1".to_string()]
                .into_iter(),
        };
        let router = spawn_key_router(source, Arc::clone(&dispatcher));
        router.join().unwrap();

        // f7 is unbound and ignored; f1 plays Boom, whose file is missing,
        // so the session reports a failure - proof the key was routed
        loop {
            match events.blocking_recv().unwrap() {
                crate::events::EngineEvent::PlaybackFailed { sound, .. } => {
                    assert_eq!(sound, "Boom");
                    break;
                }
                _ => continue,
            }
        }
        dispatcher.shutdown();
    }
}
