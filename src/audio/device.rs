//! Output device enumeration
//!
//! Read-only queries against the default cpal host. Restricting enumeration
//! to one host keeps a physical endpoint from showing up once per driver
//! backend; names are additionally deduplicated because some drivers expose
//! the same endpoint twice even within a host.
//!
//! The registry is consulted at exactly two points: the device-list API and
//! playback session start. It never runs inside the block loop.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// One selectable output endpoint
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutputDevice {
    /// Stable identifier (the device name; cpal has no numeric ids)
    pub id: String,
    /// Human-readable name shown in the UI
    pub display_name: String,
}

/// List available audio output devices, deduplicated by display name.
///
/// An unavailable audio subsystem yields an empty list, never an error:
/// callers are expected to tolerate zero devices.
pub fn list_output_devices() -> Vec<OutputDevice> {
    let host = cpal::default_host();

    let devices = match host.output_devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("Failed to enumerate output devices: {}", e);
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        if seen.insert(name.clone()) {
            out.push(OutputDevice {
                id: name.clone(),
                display_name: name,
            });
        }
    }

    debug!("Found {} output devices", out.len());
    out
}

/// Name of the system default output device, if any.
pub fn default_output_device() -> Option<String> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;
    device.name().ok()
}

/// Resolve a device name to a cpal device handle.
///
/// `None` (or a name that has disappeared) falls back to the default device.
pub fn resolve_output_device(name: Option<&str>) -> Option<Device> {
    let host = cpal::default_host();

    if let Some(wanted) = name {
        match host.output_devices() {
            Ok(mut devices) => {
                if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(wanted)) {
                    debug!("Found requested output device: {}", wanted);
                    return Some(device);
                }
                warn!(
                    "Requested device '{}' not found, falling back to default",
                    wanted
                );
            }
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
            }
        }
    }

    host.default_output_device()
}
