//! Microphone capture for the widget.
//!
//! Host capabilities (device access, supported encodings) sit behind the
//! traits in [`host`]; [`controller`] runs the recording lifecycle and its
//! countdown on top of them, and [`audio`] is the cpal implementation used by
//! the application.

pub mod audio;
pub mod controller;
pub mod countdown;
pub mod encoder;
pub mod ffmpeg;
pub mod format;
pub mod host;

#[cfg(test)]
pub(crate) mod testing;

pub use audio::CpalHost;
pub use controller::{CaptureController, CaptureState, Clip, StopOutcome, TickOutcome};
pub use countdown::Tick;
pub use format::EncodingFormat;
pub use host::{ActiveCapture, CaptureError, CaptureHost};
