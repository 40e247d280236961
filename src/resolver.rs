//! Effective-state resolver.
//!
//! Pure functions that combine manual and duty-cycle demand with the mode
//! selectors.  Both the write handlers and the timer policies consult these
//! after every mutation.

use crate::config::{PersistedState, TargetFanState};

/// Duty-cycle demand counts only while the fan is in auto mode.
pub fn duty_cycle_effective(state: &PersistedState) -> bool {
    state.fan_active_auto && state.fan_target_state == TargetFanState::Auto
}

pub fn fan_effective(state: &PersistedState) -> bool {
    state.fan_active_manual || duty_cycle_effective(state)
}

/// The ventilator follows the duty cycle only when its own mode is auto.
pub fn hrv_effective(state: &PersistedState) -> bool {
    state.hrv_active
        || (duty_cycle_effective(state) && state.hrv_target_state == TargetFanState::Auto)
}

/// Both resolved outputs at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolved {
    pub fan: bool,
    pub hrv: bool,
}

pub fn resolve(state: &PersistedState) -> Resolved {
    Resolved {
        fan: fan_effective(state),
        hrv: hrv_effective(state),
    }
}
