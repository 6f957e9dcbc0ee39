//! Recording lifecycle: `idle -> recording -> idle`.
//!
//! The controller owns at most one [`RecordingSession`]. The session carries
//! the capture handle and its [`CountdownTimer`], so every way a session ends
//! (user stop, countdown reaching zero, the controller being dropped) tears
//! the timer down together with the capture.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tokio::sync::mpsc::UnboundedSender;

use super::countdown::{CountdownTimer, SessionId, Tick, TICK_PERIOD};
use super::format::{negotiate, EncodingFormat};
use super::host::{ActiveCapture, CaptureError, CaptureHost};
use crate::attachments::{Attachment, Origin};

/// Whether a recording session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
}

/// A finished recording waiting to be kept.
#[derive(Debug, Clone)]
pub struct Clip {
    payload: Arc<[u8]>,
    format: EncodingFormat,
    duration: Duration,
}

impl Clip {
    pub fn payload(&self) -> &Arc<[u8]> {
        &self.payload
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    /// Wall-clock length of the session that produced the clip.
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Result of a countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belonged to a session that no longer exists
    Stale,
    /// Seconds left after this tick
    Counting(u32),
    /// Time ran out and the session was stopped
    Expired(StopOutcome),
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was recording
    NotRecording,
    /// The session ended without any audio
    Empty,
    /// The session ended and its clip is pending
    Clip,
}

struct RecordingSession<C> {
    id: SessionId,
    capture: C,
    format: EncodingFormat,
    started_at: Instant,
    timer: CountdownTimer,
}

/// Drives microphone recording with a maximum duration.
pub struct CaptureController<H: CaptureHost> {
    host: H,
    preference: Vec<EncodingFormat>,
    max_duration: u32,
    time_left: u32,
    session: Option<RecordingSession<H::Capture>>,
    pending: Option<Clip>,
    ticks: UnboundedSender<Tick>,
    tick_period: Duration,
}

impl<H: CaptureHost> CaptureController<H> {
    /// Creates an idle controller.
    ///
    /// # Arguments
    /// * `host` - Capture capability provider
    /// * `preference` - Encodings to try, most preferred first
    /// * `max_duration` - Recording limit in seconds
    /// * `ticks` - Channel the countdown timer reports into
    pub fn new(
        host: H,
        preference: Vec<EncodingFormat>,
        max_duration: u32,
        ticks: UnboundedSender<Tick>,
    ) -> Self {
        Self {
            host,
            preference,
            max_duration,
            time_left: max_duration,
            session: None,
            pending: None,
            ticks,
            tick_period: TICK_PERIOD,
        }
    }

    /// Starts a recording session.
    ///
    /// Must be called within a tokio runtime, which runs the countdown.
    ///
    /// # Errors
    /// - `SessionActive` if a session is already running (it is left untouched)
    /// - `PermissionDenied` if the host refuses microphone access
    /// - `NoSupportedEncoding` if the host supports none of the preferred formats
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.session.is_some() {
            tracing::warn!("Start requested while a session is active");
            return Err(CaptureError::SessionActive);
        }

        let mut capture = self.host.request_capture()?;

        let host = &self.host;
        let format = negotiate(&self.preference, |f| host.supports(f)).ok_or_else(|| {
            tracing::warn!("None of {:?} is supported by the capture host", self.preference);
            CaptureError::NoSupportedEncoding
        })?;

        capture.begin(format)?;

        let id = SessionId::next();
        self.time_left = self.max_duration;
        let timer = CountdownTimer::spawn(id, self.tick_period, self.ticks.clone());
        self.session = Some(RecordingSession {
            id,
            capture,
            format,
            started_at: Instant::now(),
            timer,
        });

        tracing::info!(
            "Recording session {} started ({}, limit {}s)",
            id,
            format,
            self.max_duration
        );
        Ok(())
    }

    /// Applies one countdown tick.
    ///
    /// # Errors
    /// - `Finalize` if time ran out and the capture could not be finalized
    pub fn tick(&mut self, tick: Tick) -> Result<TickOutcome, CaptureError> {
        match &self.session {
            Some(session) if session.id == tick.session => {}
            _ => {
                tracing::trace!("Ignoring stale tick for session {}", tick.session);
                return Ok(TickOutcome::Stale);
            }
        }

        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left > 0 {
            return Ok(TickOutcome::Counting(self.time_left));
        }

        tracing::info!("Recording limit of {}s reached", self.max_duration);
        let outcome = self.stop()?;
        Ok(TickOutcome::Expired(outcome))
    }

    /// Ends the active session, if any, and keeps its clip pending.
    ///
    /// # Errors
    /// - `Finalize` if encoding fails; the session is ended regardless
    pub fn stop(&mut self) -> Result<StopOutcome, CaptureError> {
        let Some(session) = self.session.take() else {
            tracing::debug!("Stop requested with no active session");
            return Ok(StopOutcome::NotRecording);
        };

        let RecordingSession {
            id,
            capture,
            format,
            started_at,
            timer,
        } = session;
        timer.cancel();

        let payload = capture.finalize()?;
        if payload.is_empty() {
            tracing::warn!("Recording session {} produced no audio", id);
            return Ok(StopOutcome::Empty);
        }

        let duration = started_at.elapsed();
        tracing::info!(
            "Recording session {} finished: {:.1}s, {} bytes of {}",
            id,
            duration.as_secs_f32(),
            payload.len(),
            format
        );
        self.pending = Some(Clip {
            payload: payload.into(),
            format,
            duration,
        });
        Ok(StopOutcome::Clip)
    }

    /// Moves the pending clip out as a recorded attachment.
    pub fn keep(&mut self) -> Option<Attachment> {
        self.keep_at(Local::now())
    }

    fn keep_at(&mut self, now: DateTime<Local>) -> Option<Attachment> {
        let clip = self.pending.take()?;
        let name = format!(
            "recording-{}.{}",
            now.timestamp_millis(),
            clip.format.extension()
        );
        Some(Attachment::new(
            name,
            clip.payload,
            clip.format.media_type(),
            Origin::Recorded,
        ))
    }

    pub fn state(&self) -> CaptureState {
        if self.session.is_some() {
            CaptureState::Recording
        } else {
            CaptureState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Seconds left in the current or most recent session.
    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn max_duration(&self) -> u32 {
        self.max_duration
    }

    pub fn pending_clip(&self) -> Option<&Clip> {
        self.pending.as_ref()
    }

    /// Format of the running session.
    pub fn recording_format(&self) -> Option<EncodingFormat> {
        self.session.as_ref().map(|s| s.format)
    }

    /// Input level of the running session, 0 when idle.
    pub fn input_level(&self) -> u8 {
        self.session.as_ref().map_or(0, |s| s.capture.level())
    }

    /// Whether a countdown task is running for the current session.
    pub fn timer_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.timer.is_running())
    }

    /// Session id of the running session.
    #[cfg(test)]
    pub(crate) fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    #[cfg(test)]
    pub(crate) fn host(&self) -> &H {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    use super::*;
    use crate::capture::testing::FakeHost;

    fn controller(host: FakeHost, max: u32) -> (CaptureController<FakeHost>, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller =
            CaptureController::new(host, EncodingFormat::DEFAULT_PREFERENCE.to_vec(), max, tx);
        (controller, rx)
    }

    fn tick_of(controller: &CaptureController<FakeHost>) -> Tick {
        Tick {
            session: controller.session_id().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_countdown_to_zero_stops_and_leaves_clip() {
        let (mut controller, _rx) = controller(FakeHost::new(), 5);
        controller.start().unwrap();
        assert_eq!(controller.state(), CaptureState::Recording);
        assert_eq!(controller.time_left(), 5);

        let tick = tick_of(&controller);
        for expected in (1..5).rev() {
            assert_eq!(controller.tick(tick).unwrap(), TickOutcome::Counting(expected));
        }
        assert_eq!(
            controller.tick(tick).unwrap(),
            TickOutcome::Expired(StopOutcome::Clip)
        );

        assert_eq!(controller.state(), CaptureState::Idle);
        assert_eq!(controller.time_left(), 0);
        assert!(!controller.timer_active());
        assert!(controller.pending_clip().is_some());
    }

    #[tokio::test]
    async fn test_countdown_for_various_limits() {
        for max in [1, 2, 7, 30] {
            let (mut controller, _rx) = controller(FakeHost::new(), max);
            controller.start().unwrap();
            let tick = tick_of(&controller);
            let mut expired_after = 0;
            for n in 1..=max {
                if matches!(controller.tick(tick).unwrap(), TickOutcome::Expired(_)) {
                    expired_after = n;
                    break;
                }
            }
            assert_eq!(expired_after, max);
            assert_eq!(controller.time_left(), 0);
            assert!(!controller.is_recording());
        }
    }

    #[tokio::test]
    async fn test_ticks_after_stop_are_stale() {
        let (mut controller, _rx) = controller(FakeHost::new(), 5);
        controller.start().unwrap();
        let tick = tick_of(&controller);
        controller.tick(tick).unwrap();
        controller.stop().unwrap();

        assert_eq!(controller.tick(tick).unwrap(), TickOutcome::Stale);
        assert_eq!(controller.time_left(), 4);
    }

    #[tokio::test]
    async fn test_ticks_from_previous_session_are_ignored() {
        let (mut controller, _rx) = controller(FakeHost::new(), 5);
        controller.start().unwrap();
        let old = tick_of(&controller);
        controller.stop().unwrap();
        controller.start().unwrap();

        assert_eq!(controller.tick(old).unwrap(), TickOutcome::Stale);
        assert_eq!(controller.time_left(), 5);
    }

    #[tokio::test]
    async fn test_double_stop_is_noop() {
        let (mut controller, _rx) = controller(FakeHost::new(), 5);
        controller.start().unwrap();
        assert_eq!(controller.stop().unwrap(), StopOutcome::Clip);
        assert!(!controller.timer_active());

        assert_eq!(controller.stop().unwrap(), StopOutcome::NotRecording);
        assert!(!controller.timer_active());
        assert!(controller.pending_clip().is_some());
    }

    #[test]
    fn test_stop_when_idle_needs_no_runtime() {
        let (mut controller, _rx) = controller(FakeHost::new(), 5);
        assert_eq!(controller.stop().unwrap(), StopOutcome::NotRecording);
        assert_eq!(controller.stop().unwrap(), StopOutcome::NotRecording);
    }

    #[tokio::test]
    async fn test_start_while_recording_is_rejected() {
        let (mut controller, _rx) = controller(FakeHost::new(), 5);
        controller.start().unwrap();
        let session = controller.session_id();

        assert!(matches!(controller.start(), Err(CaptureError::SessionActive)));
        assert_eq!(controller.session_id(), session);
        assert_eq!(controller.host().requests, 1);
    }

    #[test]
    fn test_permission_denied_stays_idle() {
        let (mut controller, _rx) = controller(FakeHost::denying(), 5);
        assert!(matches!(
            controller.start(),
            Err(CaptureError::PermissionDenied(_))
        ));
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(!controller.timer_active());
    }

    #[test]
    fn test_no_supported_encoding_stays_idle() {
        let mut host = FakeHost::new();
        host.supported.clear();
        let (mut controller, _rx) = controller(host, 5);
        assert!(matches!(
            controller.start(),
            Err(CaptureError::NoSupportedEncoding)
        ));
        assert_eq!(controller.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_negotiates_first_supported_format() {
        let mut host = FakeHost::new();
        host.supported = vec![EncodingFormat::Wav, EncodingFormat::Mp3];
        let (mut controller, _rx) = controller(host, 5);
        controller.start().unwrap();
        assert_eq!(controller.recording_format(), Some(EncodingFormat::Mp3));
    }

    #[tokio::test]
    async fn test_empty_capture_leaves_no_clip() {
        let mut host = FakeHost::new();
        host.payload.clear();
        let (mut controller, _rx) = controller(host, 5);
        controller.start().unwrap();
        assert_eq!(controller.stop().unwrap(), StopOutcome::Empty);
        assert!(controller.pending_clip().is_none());
        assert!(controller.keep().is_none());
    }

    #[tokio::test]
    async fn test_finalize_failure_still_ends_session() {
        let mut host = FakeHost::new();
        host.fail_finalize = true;
        let (mut controller, _rx) = controller(host, 5);
        controller.start().unwrap();
        assert!(matches!(controller.stop(), Err(CaptureError::Finalize(_))));
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(!controller.timer_active());
    }

    #[tokio::test]
    async fn test_keep_names_clip_after_time_and_format() {
        let (mut controller, _rx) = controller(FakeHost::new(), 5);
        controller.start().unwrap();
        controller.stop().unwrap();

        let now = Local.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let attachment = controller.keep_at(now).unwrap();
        assert_eq!(attachment.name(), "recording-1700000000123.wav");
        assert_eq!(attachment.media_type(), "audio/wav");
        assert_eq!(attachment.origin(), Origin::Recorded);
        assert_eq!(&attachment.payload()[..], b"RIFF-fake-audio");
        assert!(controller.pending_clip().is_none());
    }

    #[test]
    fn test_keep_without_clip_is_noop() {
        let (mut controller, _rx) = controller(FakeHost::new(), 5);
        assert!(controller.keep().is_none());
    }

    fn fast_controller(max: u32) -> (CaptureController<FakeHost>, mpsc::UnboundedReceiver<Tick>) {
        let (mut controller, rx) = controller(FakeHost::new(), max);
        controller.tick_period = Duration::from_millis(10);
        (controller, rx)
    }

    /// Drains what was queued before teardown, then waits several periods and
    /// returns any tick that still arrived for `session`.
    async fn late_tick(rx: &mut mpsc::UnboundedReceiver<Tick>, session: SessionId) -> Option<Tick> {
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(60)).await;
        std::iter::from_fn(|| rx.try_recv().ok()).find(|t| t.session == session)
    }

    #[tokio::test]
    async fn test_stop_cancels_countdown_task() {
        let (mut controller, mut rx) = fast_controller(30);
        controller.start().unwrap();
        assert!(controller.timer_active());
        let session = controller.session_id().unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.session, session);

        controller.stop().unwrap();
        assert!(!controller.timer_active());
        assert_eq!(late_tick(&mut rx, session).await, None);
    }

    #[tokio::test]
    async fn test_expiry_cancels_countdown_task() {
        let (mut controller, mut rx) = fast_controller(2);
        controller.start().unwrap();
        let session = controller.session_id().unwrap();

        loop {
            let tick = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let TickOutcome::Expired(_) = controller.tick(tick).unwrap() {
                break;
            }
        }

        assert!(!controller.timer_active());
        assert_eq!(late_tick(&mut rx, session).await, None);
    }

    #[tokio::test]
    async fn test_timer_delivers_ticks_for_active_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = CaptureController::new(
            FakeHost::new(),
            vec![EncodingFormat::Wav],
            2,
            tx,
        );
        controller.tick_period = Duration::from_millis(10);
        controller.start().unwrap();

        while controller.is_recording() {
            let tick = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            controller.tick(tick).unwrap();
        }
        assert_eq!(controller.time_left(), 0);
        assert!(controller.pending_clip().is_some());
    }
}
