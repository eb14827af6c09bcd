//! Persisted soundboard configuration
//!
//! One small JSON file holds everything the engine needs across restarts:
//! the sound library, the selected main output device, the monitoring flag,
//! both volume levels, and the keybind map. The file is rewritten
//! synchronously after every mutation.
//!
//! Loading is deliberately forgiving: a missing or malformed file falls back
//! to defaults rather than failing startup, and a save failure is reported to
//! the caller but leaves the in-memory state intact (the next mutation
//! retries the write).

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Persisted engine state
///
/// Field names match the on-disk JSON schema. Unknown fields are ignored,
/// missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Sound library: unique name -> file path
    pub sounds: BTreeMap<String, String>,

    /// Selected main output device (None = system default).
    ///
    /// Devices are identified by name; older config files stored an integer
    /// backend index, which is not portable and is read back as None.
    #[serde(deserialize_with = "lenient_device_id")]
    pub device_id: Option<String>,

    /// Whether the monitoring output is audible
    pub monitoring: bool,

    /// Main output volume, 0.0 to 1.0
    pub vol_output: f32,

    /// Monitoring output volume, 0.0 to 1.0
    pub vol_monitoring: f32,

    /// Keybind map: key identifier -> sound name
    pub keybinds: BTreeMap<String, String>,

    /// Key that stops all playback (None = unset)
    pub stop_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sounds: BTreeMap::new(),
            device_id: None,
            monitoring: false,
            vol_output: 1.0,
            vol_monitoring: 1.0,
            keybinds: BTreeMap::new(),
            stop_key: None,
        }
    }
}

/// Accept `"name"`, `null`, or a legacy integer index for `device_id`.
///
/// Integer indices came from a backend that numbered devices; they are
/// meaningless here, so they degrade to "use the default device".
fn lenient_device_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Name(String),
        LegacyIndex(i64),
        Unset,
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Name(name) => Some(name),
        Raw::LegacyIndex(_) | Raw::Unset => None,
    })
}

impl Config {
    /// Load configuration from disk.
    ///
    /// A missing file or unparseable content yields defaults; neither is an
    /// error. Only the path is remembered by the caller.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!(
                        "Malformed configuration file {}: {} - using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No configuration file at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!(
                    "Failed to read configuration file {}: {} - using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Write configuration to disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize configuration: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sound library mutations
    // ------------------------------------------------------------------

    /// Add a sound to the library.
    ///
    /// Rejects names already in use; the library is keyed by name.
    pub fn add_sound(&mut self, name: &str, path: &str) -> Result<()> {
        if self.sounds.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }
        self.sounds.insert(name.to_string(), path.to_string());
        Ok(())
    }

    /// Remove a sound and any keybind pointing at it.
    pub fn remove_sound(&mut self, name: &str) -> Result<()> {
        if self.sounds.remove(name).is_none() {
            return Err(Error::SoundNotFound(name.to_string()));
        }
        self.keybinds.retain(|_, sound| sound != name);
        Ok(())
    }

    /// Rename a sound, carrying its keybind over to the new name.
    pub fn rename_sound(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.sounds.contains_key(new) {
            return Err(Error::DuplicateName(new.to_string()));
        }
        let path = self
            .sounds
            .remove(old)
            .ok_or_else(|| Error::SoundNotFound(old.to_string()))?;
        self.sounds.insert(new.to_string(), path);
        for sound in self.keybinds.values_mut() {
            if sound == old {
                *sound = new.to_string();
            }
        }
        Ok(())
    }

    /// Resolve a sound name to its file path.
    pub fn sound_path(&self, name: &str) -> Option<&str> {
        self.sounds.get(name).map(String::as_str)
    }

    // ------------------------------------------------------------------
    // Keybind mutations
    // ------------------------------------------------------------------

    /// Bind a key to a sound.
    ///
    /// Enforces both uniqueness invariants: the sound's previous key is
    /// released, and a key already bound to another sound is overwritten.
    pub fn set_keybind(&mut self, key: &str, sound_name: &str) -> Result<()> {
        if !self.sounds.contains_key(sound_name) {
            return Err(Error::SoundNotFound(sound_name.to_string()));
        }
        self.keybinds.retain(|_, sound| sound != sound_name);
        self.keybinds.insert(key.to_string(), sound_name.to_string());
        Ok(())
    }

    /// Remove the binding for a key, if any.
    pub fn clear_keybind(&mut self, key: &str) {
        self.keybinds.remove(key);
    }

    /// Reverse lookup: the key bound to a sound, if any.
    pub fn sound_key(&self, sound_name: &str) -> Option<&str> {
        self.keybinds
            .iter()
            .find(|(_, sound)| sound.as_str() == sound_name)
            .map(|(key, _)| key.as_str())
    }

    /// Set or clear the stop key.
    pub fn set_stop_key(&mut self, key: Option<String>) {
        self.stop_key = key;
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.sounds.is_empty());
        assert_eq!(config.device_id, None);
        assert!(!config.monitoring);
        assert_eq!(config.vol_output, 1.0);
        assert_eq!(config.vol_monitoring, 1.0);
        assert!(config.keybinds.is_empty());
        assert_eq!(config.stop_key, None);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/boardcast.json"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let config = Config::load(&path);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.add_sound("Boom", "/clips/boom.wav").unwrap();
        config.add_sound("Tada", "/clips/tada.mp3").unwrap();
        config.set_keybind("f1", "Boom").unwrap();
        config.set_stop_key(Some("f12".to_string()));
        config.device_id = Some("CABLE Input".to_string());
        config.monitoring = true;
        config.vol_output = 0.8;
        config.vol_monitoring = 0.3;

        config.save(&path).unwrap();
        let reloaded = Config::load(&path);
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_legacy_integer_device_id_reads_as_none() {
        let config: Config = serde_json::from_str(r#"{"device_id": 7}"#).unwrap();
        assert_eq!(config.device_id, None);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config: Config =
            serde_json::from_str(r#"{"monitoring": true, "theme": "dark"}"#).unwrap();
        assert!(config.monitoring);
    }

    #[test]
    fn test_add_sound_rejects_duplicate() {
        let mut config = Config::default();
        config.add_sound("Boom", "/a.wav").unwrap();

        let err = config.add_sound("Boom", "/b.wav").unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
        // No state change on rejection
        assert_eq!(config.sound_path("Boom"), Some("/a.wav"));
    }

    #[test]
    fn test_rename_rejects_collision() {
        let mut config = Config::default();
        config.add_sound("Boom", "/a.wav").unwrap();
        config.add_sound("Tada", "/b.wav").unwrap();

        let err = config.rename_sound("Boom", "Tada").unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
        assert_eq!(config.sound_path("Boom"), Some("/a.wav"));
    }

    #[test]
    fn test_rename_carries_keybind() {
        let mut config = Config::default();
        config.add_sound("Boom", "/a.wav").unwrap();
        config.set_keybind("f1", "Boom").unwrap();

        config.rename_sound("Boom", "BigBoom").unwrap();
        assert_eq!(config.sound_key("BigBoom"), Some("f1"));
        assert_eq!(config.sound_key("Boom"), None);
    }

    #[test]
    fn test_remove_sound_clears_keybind() {
        let mut config = Config::default();
        config.add_sound("Boom", "/a.wav").unwrap();
        config.set_keybind("f1", "Boom").unwrap();

        config.remove_sound("Boom").unwrap();
        assert!(config.keybinds.is_empty());
    }

    #[test]
    fn test_keybind_one_key_per_sound() {
        let mut config = Config::default();
        config.add_sound("Boom", "/a.wav").unwrap();

        config.set_keybind("f1", "Boom").unwrap();
        config.set_keybind("f2", "Boom").unwrap();

        assert_eq!(config.sound_key("Boom"), Some("f2"));
        assert!(!config.keybinds.contains_key("f1"));
    }

    #[test]
    fn test_keybind_one_sound_per_key() {
        let mut config = Config::default();
        config.add_sound("Boom", "/a.wav").unwrap();
        config.add_sound("Tada", "/b.wav").unwrap();

        config.set_keybind("f1", "Boom").unwrap();
        config.set_keybind("f1", "Tada").unwrap();

        assert_eq!(config.keybinds.get("f1").map(String::as_str), Some("Tada"));
        assert_eq!(config.sound_key("Boom"), None);
    }
}
