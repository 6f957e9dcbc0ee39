//! The voice message widget.
//!
//! [`VoiceMessage`] ties the capture controller, the attachment list and the
//! intake adapter together and turns their outcomes into what the user sees:
//! blocking notices for the two errors a user has to act on, and short status
//! messages for everything else. It has no terminal dependency; [`ui`] renders
//! it and maps input onto it.

pub mod ui;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::attachments::{intake, AttachmentList, IncomingFile};
use crate::capture::{
    CaptureController, CaptureError, CaptureHost, CaptureState, Clip, StopOutcome, Tick,
    TickOutcome,
};

pub use ui::{VoiceMessageTui, WidgetCommand};

/// How long a status message stays visible.
const STATUS_TTL: Duration = Duration::from_secs(3);

const PERMISSION_NOTICE: &str = "Error accessing media devices. Please ensure you have given permission to access the microphone.";
const ENCODING_NOTICE: &str = "No supported audio format is available for recording on this device.";

/// Widget state: one capture controller, one attachment list.
pub struct VoiceMessage<H: CaptureHost> {
    capture: CaptureController<H>,
    attachments: AttachmentList,
    notices: VecDeque<String>,
    status: Option<(String, Instant)>,
}

impl<H: CaptureHost> VoiceMessage<H> {
    pub fn new(capture: CaptureController<H>) -> Self {
        Self {
            capture,
            attachments: AttachmentList::new(),
            notices: VecDeque::new(),
            status: None,
        }
    }

    /// Record affordance.
    pub fn start_recording(&mut self) {
        match self.capture.start() {
            Ok(()) => self.set_status("Recording"),
            Err(CaptureError::SessionActive) => {
                tracing::debug!("Record pressed while already recording");
            }
            Err(e @ CaptureError::PermissionDenied(_)) => {
                tracing::error!("Error accessing media devices: {}", e);
                self.notices.push_back(PERMISSION_NOTICE.to_string());
            }
            Err(e @ CaptureError::NoSupportedEncoding) => {
                tracing::error!("Cannot start recording: {}", e);
                self.notices.push_back(ENCODING_NOTICE.to_string());
            }
            Err(e) => {
                tracing::error!("Cannot start recording: {}", e);
                self.set_status(format!("Recording failed: {e}"));
            }
        }
    }

    /// Stop affordance. Does nothing when idle.
    pub fn stop_recording(&mut self) {
        let result = self.capture.stop();
        self.report_stop(result);
    }

    /// Feeds a countdown tick from the timer channel.
    pub fn on_tick(&mut self, tick: Tick) {
        match self.capture.tick(tick) {
            Ok(TickOutcome::Expired(outcome)) => {
                self.report_stop(Ok(outcome));
                if outcome == StopOutcome::Clip {
                    self.set_status("Time limit reached");
                }
            }
            Ok(_) => {}
            Err(e) => self.report_stop(Err(e)),
        }
    }

    /// Keep ("upload") affordance for the pending clip.
    pub fn keep_recording(&mut self) {
        if let Some(attachment) = self.capture.keep() {
            self.attachments.push(attachment);
            self.set_status("Recording added");
        }
    }

    /// Appends the audio files of a dropped or picked batch.
    pub fn drop_files(&mut self, batch: Vec<IncomingFile>) -> usize {
        let offered = batch.len();
        let added = self.attachments.extend(intake::accept(batch));
        if offered > 0 {
            tracing::info!("Intake: {} of {} files added", added, offered);
        }
        if added > 0 {
            self.set_status(match added {
                1 => "1 file added".to_string(),
                n => format!("{n} files added"),
            });
        }
        added
    }

    fn report_stop(&mut self, result: Result<StopOutcome, CaptureError>) {
        match result {
            Ok(StopOutcome::Clip) => self.set_status("Recording ready to preview"),
            Ok(StopOutcome::Empty) => self.set_status("Nothing was recorded"),
            Ok(StopOutcome::NotRecording) => {}
            Err(e) => {
                tracing::error!("Failed to finish recording: {}", e);
                self.set_status(format!("Recording failed: {e}"));
            }
        }
    }

    /// Shows a short-lived status message.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    /// Current blocking notice, if any.
    pub fn notice(&self) -> Option<&str> {
        self.notices.front().map(String::as_str)
    }

    pub fn dismiss_notice(&mut self) {
        self.notices.pop_front();
    }

    /// Number of notices waiting to be shown.
    #[cfg(test)]
    pub(crate) fn notice_count(&self) -> usize {
        self.notices.len()
    }

    /// Status message, while it is still fresh.
    pub fn status(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, at)| at.elapsed() < STATUS_TTL)
            .map(|(message, _)| message.as_str())
    }

    pub fn state(&self) -> CaptureState {
        self.capture.state()
    }

    pub fn time_left(&self) -> u32 {
        self.capture.time_left()
    }

    pub fn input_level(&self) -> u8 {
        self.capture.input_level()
    }

    pub fn pending_clip(&self) -> Option<&Clip> {
        self.capture.pending_clip()
    }

    pub fn attachments(&self) -> &AttachmentList {
        &self.attachments
    }

    pub fn capture(&self) -> &CaptureController<H> {
        &self.capture
    }
}
