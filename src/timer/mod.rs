//! Timer primitive and the two timer policies built on it.
//!
//! ```text
//!  ┌──────────────┐   ┌────────────────┐
//!  │ AutoOffTimer │   │ DutyCycleTimer │   policies (own their Timer)
//!  └──────┬───────┘   └───────┬────────┘
//!         └────────┬──────────┘
//!                  ▼
//!            ┌──────────┐
//!            │  Timer   │  arm / cancel / retime / claim
//!            └────┬─────┘
//!                 ▼
//!       ClockPort + TimerPort    (host timer service)
//! ```
//!
//! A [`Timer`] holds at most one live registration.  Re-arming always
//! cancels first, and an expiry is honoured only when it carries the handle
//! of the live registration, so a stale fire that was already queued when
//! the timer was cancelled can never act twice.

pub mod auto_off;
pub mod duty_cycle;

use log::debug;

use crate::app::ports::{ClockPort, Ticks, TimerError, TimerHandle, TimerId, TimerPort};

pub use auto_off::AutoOffTimer;
pub use duty_cycle::{DutyCycleTimer, Phase};

pub const TICKS_PER_SEC: Ticks = 1_000;
pub const TICKS_PER_MIN: Ticks = 60 * TICKS_PER_SEC;
pub const TICKS_PER_HOUR: Ticks = 60 * TICKS_PER_MIN;

/// A recomputed deadline closer than this is treated as already elapsed.
pub const FATIGUE_MARGIN: Ticks = TICKS_PER_SEC;

/// Outcome of [`Timer::retime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retime {
    /// The timer was not running; nothing changed.
    Idle,
    /// A new deadline was registered for the remaining time.
    Rearmed,
    /// The new deadline has already passed; the timer is now idle and the
    /// caller must run its expiry action itself.
    Expired,
}

/// Single-registration deadline timer.
#[derive(Debug)]
pub struct Timer {
    owner: TimerId,
    handle: Option<TimerHandle>,
    start: Ticks,
    deadline: Ticks,
}

impl Timer {
    pub const fn new(owner: TimerId) -> Self {
        Self {
            owner,
            handle: None,
            start: 0,
            deadline: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Absolute deadline of the live registration.
    pub fn deadline(&self) -> Option<Ticks> {
        self.handle.map(|_| self.deadline)
    }

    /// Tick at which the current countdown started.
    pub fn started_at(&self) -> Ticks {
        self.start
    }

    /// Deregister the live registration, if any.  Idempotent.
    pub fn cancel(&mut self, timers: &mut impl TimerPort) {
        if let Some(handle) = self.handle.take() {
            timers.deregister(handle);
        }
    }

    /// Start a fresh countdown of `timeout` ticks from now.
    pub fn start(
        &mut self,
        timeout: Ticks,
        hw: &mut (impl ClockPort + TimerPort),
    ) -> Result<(), TimerError> {
        let now = hw.now();
        self.arm(now, now.saturating_add(timeout), hw)
    }

    /// Replace the timeout of a running countdown, keeping its start tick.
    pub fn retime(
        &mut self,
        timeout: Ticks,
        hw: &mut (impl ClockPort + TimerPort),
    ) -> Result<Retime, TimerError> {
        if !self.is_running() {
            return Ok(Retime::Idle);
        }
        self.cancel(hw);

        let now = hw.now();
        let deadline = self.start.saturating_add(timeout);
        if deadline < now.saturating_add(FATIGUE_MARGIN) {
            debug!("{:?} timer: new deadline already passed", self.owner);
            return Ok(Retime::Expired);
        }
        self.arm(self.start, deadline, hw)?;
        Ok(Retime::Rearmed)
    }

    /// Accept an expiry.  Returns `false` for a handle that is not the live
    /// registration (cancelled or superseded), which must be ignored.
    pub fn claim(&mut self, handle: TimerHandle) -> bool {
        if self.handle == Some(handle) {
            self.handle = None;
            true
        } else {
            debug!("{:?} timer: ignoring stale expiry {:?}", self.owner, handle);
            false
        }
    }

    fn arm(
        &mut self,
        start: Ticks,
        deadline: Ticks,
        hw: &mut (impl ClockPort + TimerPort),
    ) -> Result<(), TimerError> {
        self.cancel(hw);
        let handle = hw.register(self.owner, deadline)?;
        self.handle = Some(handle);
        self.start = start;
        self.deadline = deadline;
        debug!(
            "{:?} timer will fire in {:.2} min",
            self.owner,
            minutes(deadline.saturating_sub(hw.now()))
        );
        Ok(())
    }
}

/// Ticks as fractional minutes, for log output.
pub(crate) fn minutes(ticks: Ticks) -> f32 {
    ticks as f32 / TICKS_PER_MIN as f32
}
