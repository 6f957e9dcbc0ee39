//! One-second countdown driving the recording time limit.
//!
//! The timer is a tokio task that sends a [`Tick`] per period into the widget's
//! event channel. Each tick names the session it was started for, and the
//! timer task is aborted when its [`CountdownTimer`] is cancelled or dropped,
//! so a torn-down session never receives fresh ticks. Ticks that were already
//! queued are recognised as stale by their session id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Countdown period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Identifies one recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocates an id no other session in this process has used.
    pub fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One elapsed countdown period for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub session: SessionId,
}

/// Owned handle to a running countdown task.
#[derive(Debug)]
pub struct CountdownTimer {
    session: SessionId,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    /// Spawns a timer sending a tick for `session` every `period`, the first
    /// one a full period from now. Must be called within a tokio runtime.
    pub fn spawn(session: SessionId, period: Duration, ticks: UnboundedSender<Tick>) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                interval.tick().await;
                if ticks.send(Tick { session }).is_err() {
                    break;
                }
            }
        });
        tracing::debug!("Countdown started for session {}", session);
        Self { session, task }
    }

    /// Whether the countdown task is still alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the timer. Consumes the handle so it cannot be cancelled twice.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("Countdown cancelled for session {}", self.session);
    }
}
