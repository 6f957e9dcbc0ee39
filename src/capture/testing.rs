//! Scripted capture host for tests.

use super::format::EncodingFormat;
use super::host::{ActiveCapture, CaptureError, CaptureHost};

/// Host whose behaviour is fixed up front.
#[derive(Debug, Clone)]
pub struct FakeHost {
    /// Refuse every access request
    pub deny: bool,
    /// Formats reported as supported
    pub supported: Vec<EncodingFormat>,
    /// Payload every capture finalizes into
    pub payload: Vec<u8>,
    /// Make finalization fail
    pub fail_finalize: bool,
    /// Number of access requests seen
    pub requests: usize,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            deny: false,
            supported: vec![EncodingFormat::Wav],
            payload: b"RIFF-fake-audio".to_vec(),
            fail_finalize: false,
            requests: 0,
        }
    }

    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }
}

#[derive(Debug)]
pub struct FakeCapture {
    payload: Vec<u8>,
    fail_finalize: bool,
    begun: Option<EncodingFormat>,
}

impl CaptureHost for FakeHost {
    type Capture = FakeCapture;

    fn request_capture(&mut self) -> Result<FakeCapture, CaptureError> {
        self.requests += 1;
        if self.deny {
            return Err(CaptureError::PermissionDenied("denied by test".to_string()));
        }
        Ok(FakeCapture {
            payload: self.payload.clone(),
            fail_finalize: self.fail_finalize,
            begun: None,
        })
    }

    fn supports(&self, format: EncodingFormat) -> bool {
        self.supported.contains(&format)
    }
}

impl ActiveCapture for FakeCapture {
    fn begin(&mut self, format: EncodingFormat) -> Result<(), CaptureError> {
        self.begun = Some(format);
        Ok(())
    }

    fn finalize(self) -> Result<Vec<u8>, CaptureError> {
        if self.fail_finalize {
            return Err(CaptureError::Finalize("encoder exploded".to_string()));
        }
        assert!(self.begun.is_some(), "finalized a capture that never began");
        Ok(self.payload)
    }

    fn level(&self) -> u8 {
        42
    }
}
