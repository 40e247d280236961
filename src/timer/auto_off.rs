//! Auto-off countdown.
//!
//! Started whenever manual fan demand is asserted.  When it runs out it
//! clears manual fan and HRV demand; duty-cycle demand is left alone.

use log::info;

use crate::app::ports::{ClockPort, TimerError, TimerHandle, TimerId, TimerPort};
use crate::config::PersistedState;

use super::{Retime, TICKS_PER_MIN, Timer, minutes};

#[derive(Debug)]
pub struct AutoOffTimer {
    timer: Timer,
}

impl Default for AutoOffTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoOffTimer {
    pub const fn new() -> Self {
        Self {
            timer: Timer::new(TimerId::AutoOff),
        }
    }

    /// `true` while counting down.
    pub fn is_counting(&self) -> bool {
        self.timer.is_running()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.timer.deadline()
    }

    /// (Re)start the countdown from now.
    pub fn start(
        &mut self,
        state: &PersistedState,
        hw: &mut (impl ClockPort + TimerPort),
    ) -> Result<(), TimerError> {
        let timeout = timeout_ticks(state);
        info!("AutoOffTimer starting, will fire in {:.2} min", minutes(timeout));
        self.timer.start(timeout, hw)
    }

    /// Apply a changed `fan_timeout_minutes` to a running countdown.
    ///
    /// Returns `true` when the new deadline had already passed and the
    /// outputs were switched off here.
    pub fn update_timeout(
        &mut self,
        state: &mut PersistedState,
        hw: &mut (impl ClockPort + TimerPort),
    ) -> Result<bool, TimerError> {
        match self.timer.retime(timeout_ticks(state), hw)? {
            Retime::Idle => Ok(false),
            Retime::Rearmed => {
                info!(
                    "AutoOffTimer timeout changed, firing in {:.2} min",
                    minutes(self.timer.deadline().unwrap_or(0).saturating_sub(hw.now()))
                );
                Ok(false)
            }
            Retime::Expired => {
                info!("AutoOffTimer timeout changed, turning off");
                Self::turn_off(state);
                Ok(true)
            }
        }
    }

    /// Stop counting without touching demand.
    pub fn cancel(&mut self, hw: &mut impl TimerPort) {
        self.timer.cancel(hw);
    }

    /// Handle an expiry.  Returns `true` if demand was cleared.
    pub fn on_expired(&mut self, handle: TimerHandle, state: &mut PersistedState) -> bool {
        if !self.timer.claim(handle) {
            return false;
        }
        info!("AutoOffTimer turning outputs off");
        Self::turn_off(state);
        true
    }

    fn turn_off(state: &mut PersistedState) {
        state.fan_active_manual = false;
        state.hrv_active = false;
    }
}

fn timeout_ticks(state: &PersistedState) -> u64 {
    u64::from(state.fan_timeout_minutes) * TICKS_PER_MIN
}
