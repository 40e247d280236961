//! Duty-cycle oscillator.
//!
//! Alternates an on-phase and an off-phase for as long as the accessory
//! runs.  The on-phase lasts `fan_duty_cycle` percent of an hour.  The
//! off-phase lasts until the wall clock reaches the anchor minute (the top
//! of the hour), so the cycle stays locked to clock hours instead of
//! drifting with timer granularity, and re-locks after a clock correction.
//!
//! ```text
//!  :00            :06                               :00
//!   ├── on (10%) ──┤────────── off (to anchor) ──────┤── on ...
//! ```

use log::info;

use crate::app::ports::{
    ClockPort, Ticks, TimerError, TimerHandle, TimerId, TimerPort, WallClockPort, WallTime,
};
use crate::config::PersistedState;

use super::{Retime, TICKS_PER_HOUR, TICKS_PER_SEC, Timer, minutes};

const SECS_PER_HOUR: i64 = 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Off,
    On,
}

#[derive(Debug)]
pub struct DutyCycleTimer {
    timer: Timer,
    /// Tracked separately from `fan_active_auto`, which a manual "off"
    /// write may clear in the middle of an on-phase.
    phase: Phase,
    /// Minute of the hour at which on-phases begin.
    anchor_minute: u8,
}

impl Default for DutyCycleTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DutyCycleTimer {
    /// Oscillator anchored to the top of the hour.
    pub const fn new() -> Self {
        Self::with_anchor(0)
    }

    pub const fn with_anchor(anchor_minute: u8) -> Self {
        Self {
            timer: Timer::new(TimerId::DutyCycle),
            phase: Phase::Off,
            anchor_minute: anchor_minute % 60,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn deadline(&self) -> Option<Ticks> {
        self.timer.deadline()
    }

    /// Begin oscillating.  Called once at boot.
    pub fn start(
        &mut self,
        state: &PersistedState,
        hw: &mut (impl ClockPort + WallClockPort + TimerPort),
    ) -> Result<(), TimerError> {
        self.start_next(state, hw)
    }

    /// Arm the timer for the remainder of the current phase.
    pub fn start_next(
        &mut self,
        state: &PersistedState,
        hw: &mut (impl ClockPort + WallClockPort + TimerPort),
    ) -> Result<(), TimerError> {
        let timeout = match self.phase {
            Phase::On => on_phase_ticks(state),
            Phase::Off => self.off_phase_ticks(hw.wall_time()),
        };
        info!(
            "DutyCycle fan is {}. Will toggle in {:.2} min.",
            if self.phase == Phase::On { "on" } else { "off" },
            minutes(timeout)
        );
        self.timer.start(timeout, hw)
    }

    /// Handle an expiry: toggle the phase and update `fan_active_auto`.
    ///
    /// Returns the new phase, or `None` for a stale handle.  The caller
    /// re-resolves outputs and then calls [`start_next`](Self::start_next).
    pub fn on_expired(&mut self, handle: TimerHandle, state: &mut PersistedState) -> Option<Phase> {
        if !self.timer.claim(handle) {
            return None;
        }
        Some(self.toggle(state))
    }

    /// The wall clock was corrected.  An off-phase deadline computed
    /// against the old clock is recomputed; on-phases are unaffected.
    pub fn time_changed(
        &mut self,
        state: &PersistedState,
        hw: &mut (impl ClockPort + WallClockPort + TimerPort),
    ) -> Result<(), TimerError> {
        info!(
            "Time changed. Fan auto cycling is currently {}.",
            if self.phase == Phase::On { "on" } else { "off" }
        );
        match self.phase {
            Phase::On => Ok(()),
            Phase::Off => {
                self.timer.cancel(hw);
                self.start_next(state, hw)
            }
        }
    }

    /// `fan_duty_cycle` changed.  A running on-phase is re-timed from its
    /// original start; off-phases pick the new value up at the next entry.
    ///
    /// Returns `Some(phase)` when the re-timed on-phase had already run out
    /// and was ended here; the caller then proceeds as after an expiry.
    pub fn duty_cycle_changed(
        &mut self,
        state: &mut PersistedState,
        hw: &mut (impl ClockPort + TimerPort),
    ) -> Result<Option<Phase>, TimerError> {
        info!(
            "DutyCycle changed to {}%. Fans are currently {}.",
            state.fan_duty_cycle,
            if self.phase == Phase::On { "on" } else { "off" }
        );
        if self.phase == Phase::Off {
            return Ok(None);
        }
        match self.timer.retime(on_phase_ticks(state), hw)? {
            Retime::Expired => Ok(Some(self.toggle(state))),
            Retime::Idle | Retime::Rearmed => Ok(None),
        }
    }

    fn toggle(&mut self, state: &mut PersistedState) -> Phase {
        match self.phase {
            Phase::On => {
                info!("DutyCycle turning off");
                self.phase = Phase::Off;
                state.fan_active_auto = false;
            }
            Phase::Off if state.fan_duty_cycle > 0 => {
                info!("DutyCycle turning on");
                self.phase = Phase::On;
                state.fan_active_auto = true;
            }
            // Keep cycling so a later non-zero duty cycle takes effect.
            Phase::Off => info!("DutyCycle on-phase suppressed (0%)"),
        }
        self.phase
    }

    /// Time until the wall clock next reaches the anchor minute.
    fn off_phase_ticks(&self, wall: WallTime) -> Ticks {
        let anchor = i64::from(self.anchor_minute) * 60;
        let position = i64::from(wall.minute) * 60 + i64::from(wall.second);
        let mut remaining = anchor - position;
        if remaining <= 0 {
            remaining += SECS_PER_HOUR;
        }
        remaining as Ticks * TICKS_PER_SEC
    }
}

/// On-phase length: the duty cycle as a percentage of one hour.
fn on_phase_ticks(state: &PersistedState) -> Ticks {
    u64::from(state.fan_duty_cycle) * TICKS_PER_HOUR / 100
}
