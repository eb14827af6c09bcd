//! Playback core: shared controls, fade envelopes, sessions, and the dispatcher

pub mod controls;
pub mod dispatcher;
pub mod envelope;
pub mod session;

pub use controls::PlaybackControls;
pub use dispatcher::Dispatcher;
