//! Output update routine.
//!
//! Drives both relays from the resolved state and notifies only on an
//! observable transition.  The previously driven values live in
//! [`OutputLatch`] rather than in hidden statics.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, OutputChannel, OutputPort};
use crate::config::{PersistedState, TargetFanState};
use crate::resolver::{self, Resolved};

/// Last values driven to the relays.
#[derive(Debug, Default)]
pub struct OutputLatch {
    last: Resolved,
}

impl OutputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force both relays off, e.g. at boot before state is known.
    pub fn drive_off(&mut self, hw: &mut impl OutputPort) {
        hw.set_output(OutputChannel::FurnaceFan, false);
        hw.set_output(OutputChannel::Hrv, false);
        self.last = Resolved::default();
    }

    /// Resolve, drive pins, and emit one event per changed output.
    /// Returns the resolved values.
    pub fn update(
        &mut self,
        state: &PersistedState,
        hw: &mut (impl OutputPort + EventSink),
    ) -> Resolved {
        let next = resolver::resolve(state);

        hw.set_output(OutputChannel::FurnaceFan, next.fan);
        hw.set_output(OutputChannel::Hrv, next.hrv);

        if next.fan != self.last.fan {
            info!(
                "Setting fan {}. Manual demand = {}. Auto demand = {}.",
                on_off(next.fan),
                state.fan_active_manual,
                state.fan_active_auto
            );
            self.last.fan = next.fan;
            hw.emit(&AppEvent::OutputChanged {
                channel: OutputChannel::FurnaceFan,
                active: next.fan,
                manual_demand: state.fan_active_manual,
                auto_demand: state.fan_active_auto,
            });
        }

        if next.hrv != self.last.hrv {
            info!(
                "Setting HRV {}. Manual demand = {}. Mode = {}.",
                on_off(next.hrv),
                state.hrv_active,
                if state.hrv_target_state == TargetFanState::Auto {
                    "auto"
                } else {
                    "manual"
                }
            );
            self.last.hrv = next.hrv;
            hw.emit(&AppEvent::OutputChanged {
                channel: OutputChannel::Hrv,
                active: next.hrv,
                manual_demand: state.hrv_active,
                auto_demand: resolver::duty_cycle_effective(state),
            });
        }

        next
    }

    /// Values most recently driven.
    pub fn last(&self) -> Resolved {
        self.last
    }
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}
