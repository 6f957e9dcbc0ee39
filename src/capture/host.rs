//! Capability traits the capture controller needs from its environment.
//!
//! The controller never talks to an audio backend directly. A [`CaptureHost`]
//! grants access to an input device and reports which encodings it can
//! produce; the [`ActiveCapture`] it hands out is the live session that is
//! started in a chosen format and finalized into a payload.

use thiserror::Error;

use super::format::EncodingFormat;

/// Errors surfaced by the capture path.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The host refused or could not provide microphone access
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    /// None of the configured encodings is supported by the host
    #[error("no supported audio encoding available")]
    NoSupportedEncoding,
    /// A recording session is already running
    #[error("a recording session is already active")]
    SessionActive,
    /// The capture could not be finalized into a clip
    #[error("failed to finalize recording: {0}")]
    Finalize(String),
}

/// Source of microphone capture sessions.
pub trait CaptureHost {
    /// Live capture handle produced by a successful access request.
    type Capture: ActiveCapture;

    /// Requests access to the input device.
    ///
    /// # Errors
    /// - `PermissionDenied` if the device is missing, busy, or access is refused
    fn request_capture(&mut self) -> Result<Self::Capture, CaptureError>;

    /// Whether the host can finalize captures into `format`.
    fn supports(&self, format: EncodingFormat) -> bool;
}

/// A granted microphone capture.
pub trait ActiveCapture {
    /// Starts delivering audio, to be encoded as `format` when finalized.
    ///
    /// # Errors
    /// - `PermissionDenied` if the stream cannot be started
    fn begin(&mut self, format: EncodingFormat) -> Result<(), CaptureError>;

    /// Stops capturing and returns the encoded payload. An empty payload
    /// means nothing was recorded.
    ///
    /// # Errors
    /// - `Finalize` if encoding fails
    fn finalize(self) -> Result<Vec<u8>, CaptureError>;

    /// Current input level in percent of the reference level.
    fn level(&self) -> u8 {
        0
    }
}
