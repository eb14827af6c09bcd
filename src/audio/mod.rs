//! Audio subsystem: decoding, device enumeration, and output streams

pub mod decoder;
pub mod device;
pub mod output;
pub mod resampler;
pub mod types;

pub use types::{DecodedClip, OutputRoute, CHANNELS};
