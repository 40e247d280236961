//! Application service, the hexagonal core.
//!
//! [`AccessoryService`] owns the persisted record, both timer policies and
//! the output latch.  It exposes one entry point per protocol write plus
//! [`handle_command`](AccessoryService::handle_command) for everything that
//! arrives through the serialized queue.  All I/O flows through the port
//! traits bundled in [`AccessoryPlatform`], so the whole service runs
//! against mock adapters in tests.
//!
//! ```text
//!  protocol writes ──┐                       ┌──▶ OutputPort (relays)
//!  timer expiries  ──┼─▶ AccessoryService ───┼──▶ EventSink (notify)
//!  time sync       ──┘   record · timers     └──▶ ConfigPort (NVS)
//! ```
//!
//! Every mutation that can affect an output is followed in the same step by
//! a resolver pass through [`OutputLatch::update`].

use log::{info, warn};

use crate::config::{MAX_DUTY_CYCLE, PersistedState, TargetFanState};
use crate::error::{Error, Result};
use crate::outputs::OutputLatch;
use crate::resolver::{self, Resolved};
use crate::timer::{AutoOffTimer, DutyCycleTimer, Phase};

use super::commands::AppCommand;
use super::events::{AppEvent, Characteristic};
use super::ports::{AccessoryPlatform, TimerHandle, TimerId};

/// Characteristics that hold configuration rather than demand.
const CONFIG_CHARACTERISTICS: [Characteristic; 4] = [
    Characteristic::FanTargetState,
    Characteristic::FanTimeout,
    Characteristic::FanDutyCycle,
    Characteristic::HrvTargetState,
];

// ───────────────────────────────────────────────────────────────
// AccessoryService
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct AccessoryService {
    state: PersistedState,
    auto_off: AutoOffTimer,
    duty_cycle: DutyCycleTimer,
    latch: OutputLatch,
}

impl AccessoryService {
    /// Construct the service with default state.
    ///
    /// Does **not** touch hardware; call [`boot`](Self::boot) next.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct with a duty-cycle anchor other than the top of the hour.
    pub fn with_anchor_minute(anchor_minute: u8) -> Self {
        Self {
            duty_cycle: DutyCycleTimer::with_anchor(anchor_minute),
            ..Self::default()
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring the accessory up: relays off, load the record (defaults on a
    /// missing or unusable one), drop transient demand, resolve outputs and
    /// start the duty-cycle oscillator.
    pub fn boot(&mut self, hw: &mut impl AccessoryPlatform) -> Result<()> {
        self.latch.drive_off(hw);

        let restored = match hw.load() {
            Ok(Some(state)) if state.is_current() => {
                self.state = state;
                true
            }
            Ok(Some(state)) => {
                warn!(
                    "Stored state v{} (duty {}%) unusable, using defaults",
                    state.version, state.fan_duty_cycle
                );
                self.state = PersistedState::default();
                false
            }
            Ok(None) => {
                info!("No stored state, using defaults");
                self.state = PersistedState::default();
                false
            }
            Err(e) if e.is_recoverable() => {
                warn!("Stored state rejected ({e}), using defaults");
                self.state = PersistedState::default();
                false
            }
            Err(e) => return Err(e.into()),
        };
        self.state.clear_transient();

        self.latch.update(&self.state, hw);
        self.duty_cycle.start(&self.state, hw)?;

        info!(
            "AccessoryService started: fan mode {:?}, HRV mode {:?}, duty {}%, timeout {} min",
            self.state.fan_target_state,
            self.state.hrv_target_state,
            self.state.fan_duty_cycle,
            self.state.fan_timeout_minutes
        );
        hw.emit(&AppEvent::Started { restored });
        Ok(())
    }

    /// Purge the stored record and return to defaults.
    ///
    /// The oscillator keeps its phase; a running on-phase is re-timed to
    /// the default duty cycle exactly as a write would.  Every
    /// configuration characteristic that changed is announced so
    /// subscribed controllers drop their stale values.
    pub fn factory_reset(&mut self, hw: &mut impl AccessoryPlatform) -> Result<()> {
        warn!("Factory reset: erasing stored state");
        hw.erase()?;
        self.auto_off.cancel(hw);

        let before = CONFIG_CHARACTERISTICS.map(|c| self.read(c));
        let old_duty = self.state.fan_duty_cycle;
        self.state = PersistedState::default();

        if old_duty != self.state.fan_duty_cycle
            && self.duty_cycle.duty_cycle_changed(&mut self.state, hw)?.is_some()
        {
            self.latch.update(&self.state, hw);
            self.duty_cycle.start_next(&self.state, hw)?;
        }
        self.latch.update(&self.state, hw);

        for (c, old) in CONFIG_CHARACTERISTICS.into_iter().zip(before) {
            if self.read(c) != old {
                hw.emit(&AppEvent::CharacteristicChanged(c));
            }
        }
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one command drained from the serialized queue.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl AccessoryPlatform,
    ) -> Result<()> {
        match cmd {
            AppCommand::Write {
                characteristic,
                value,
            } => self.write(characteristic, value, hw),
            AppCommand::TimerExpired { owner, handle } => self.timer_expired(owner, handle, hw),
            AppCommand::TimeSynced => {
                self.duty_cycle.time_changed(&self.state, hw)?;
                Ok(())
            }
            AppCommand::Identify => {
                info!("Identify requested");
                hw.emit(&AppEvent::Identified);
                Ok(())
            }
            AppCommand::FactoryReset => self.factory_reset(hw),
        }
    }

    /// Dispatch a UInt8 protocol write to its handler.
    pub fn write(
        &mut self,
        characteristic: Characteristic,
        value: u8,
        hw: &mut impl AccessoryPlatform,
    ) -> Result<()> {
        match characteristic {
            Characteristic::FanActive => self.write_fan_active(value != 0, hw),
            Characteristic::FanTargetState => self.write_fan_target_state(value, hw),
            Characteristic::FanTimeout => self.write_fan_timeout(value, hw),
            Characteristic::FanDutyCycle => self.write_fan_duty_cycle(value, hw),
            Characteristic::HrvActive => self.write_hrv_active(value != 0, hw),
            Characteristic::HrvTargetState => self.write_hrv_target_state(value, hw),
        }
    }

    // ── Protocol writes ───────────────────────────────────────

    /// "Fan active".  On asserts manual demand and (re)starts the auto-off
    /// countdown, even if the fan was already on.  Off clears every demand
    /// source, but only when the fan was effectively on.
    pub fn write_fan_active(&mut self, on: bool, hw: &mut impl AccessoryPlatform) -> Result<()> {
        info!("Write fan active = {on}");
        let mut changed = false;
        if on {
            if !self.state.fan_active_manual {
                self.state.fan_active_manual = true;
                changed = true;
            }
            self.auto_off.start(&self.state, hw)?;
        } else if resolver::fan_effective(&self.state) {
            self.state.fan_active_manual = false;
            self.state.fan_active_auto = false;
            self.state.hrv_active = false;
            self.auto_off.cancel(hw);
            changed = true;
        }

        if changed {
            hw.save(&self.state)?;
            self.latch.update(&self.state, hw);
        }
        Ok(())
    }

    pub fn write_fan_target_state(
        &mut self,
        value: u8,
        hw: &mut impl AccessoryPlatform,
    ) -> Result<()> {
        info!("Write fan target state = {value}");
        let target = parse_target(Characteristic::FanTargetState, value)?;
        if target == self.state.fan_target_state {
            return Ok(());
        }
        self.state.fan_target_state = target;
        hw.save(&self.state)?;
        self.latch.update(&self.state, hw);
        hw.emit(&AppEvent::CharacteristicChanged(
            Characteristic::FanTargetState,
        ));
        Ok(())
    }

    /// "Fan timeout" in minutes.  A running countdown is re-timed from its
    /// original start.
    pub fn write_fan_timeout(&mut self, minutes: u8, hw: &mut impl AccessoryPlatform) -> Result<()> {
        info!("Write fan timeout = {minutes} min");
        if minutes == self.state.fan_timeout_minutes {
            return Ok(());
        }
        self.state.fan_timeout_minutes = minutes;
        if self.auto_off.update_timeout(&mut self.state, hw)? {
            self.latch.update(&self.state, hw);
        }
        hw.save(&self.state)?;
        hw.emit(&AppEvent::CharacteristicChanged(Characteristic::FanTimeout));
        Ok(())
    }

    /// "Fan duty cycle" in percent of an hour (0–100).
    pub fn write_fan_duty_cycle(
        &mut self,
        percent: u8,
        hw: &mut impl AccessoryPlatform,
    ) -> Result<()> {
        info!("Write fan duty cycle = {percent}%");
        if percent > MAX_DUTY_CYCLE {
            return Err(Error::InvalidValue {
                characteristic: Characteristic::FanDutyCycle,
                value: percent,
            });
        }
        if percent == self.state.fan_duty_cycle {
            return Ok(());
        }
        self.state.fan_duty_cycle = percent;
        if self.duty_cycle.duty_cycle_changed(&mut self.state, hw)?.is_some() {
            self.latch.update(&self.state, hw);
            self.duty_cycle.start_next(&self.state, hw)?;
        }
        hw.save(&self.state)?;
        hw.emit(&AppEvent::CharacteristicChanged(
            Characteristic::FanDutyCycle,
        ));
        Ok(())
    }

    /// "HRV active".  Turning the ventilator on also asserts manual fan
    /// demand and restarts the countdown.  Turning it off while the duty
    /// cycle still carries it ends the current automatic cycle.
    pub fn write_hrv_active(&mut self, on: bool, hw: &mut impl AccessoryPlatform) -> Result<()> {
        info!("Write HRV active = {on}");
        if on == resolver::hrv_effective(&self.state) {
            return Ok(());
        }
        self.state.hrv_active = on;
        if on {
            self.state.fan_active_manual = true;
            self.auto_off.start(&self.state, hw)?;
        } else if resolver::hrv_effective(&self.state) {
            self.state.fan_active_auto = false;
        }
        hw.save(&self.state)?;
        self.latch.update(&self.state, hw);
        Ok(())
    }

    pub fn write_hrv_target_state(
        &mut self,
        value: u8,
        hw: &mut impl AccessoryPlatform,
    ) -> Result<()> {
        info!("Write HRV target state = {value}");
        let target = parse_target(Characteristic::HrvTargetState, value)?;
        if target == self.state.hrv_target_state {
            return Ok(());
        }
        self.state.hrv_target_state = target;
        hw.save(&self.state)?;
        self.latch.update(&self.state, hw);
        hw.emit(&AppEvent::CharacteristicChanged(
            Characteristic::HrvTargetState,
        ));
        Ok(())
    }

    // ── Timer expiries ────────────────────────────────────────

    fn timer_expired(
        &mut self,
        owner: TimerId,
        handle: TimerHandle,
        hw: &mut impl AccessoryPlatform,
    ) -> Result<()> {
        match owner {
            TimerId::AutoOff => {
                if self.auto_off.on_expired(handle, &mut self.state) {
                    self.latch.update(&self.state, hw);
                }
            }
            TimerId::DutyCycle => {
                if self.duty_cycle.on_expired(handle, &mut self.state).is_some() {
                    self.latch.update(&self.state, hw);
                    self.duty_cycle.start_next(&self.state, hw)?;
                }
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Effective fan state, as read by controllers.
    pub fn fan_active(&self) -> bool {
        resolver::fan_effective(&self.state)
    }

    pub fn fan_target_state(&self) -> TargetFanState {
        self.state.fan_target_state
    }

    pub fn fan_timeout_minutes(&self) -> u8 {
        self.state.fan_timeout_minutes
    }

    pub fn fan_duty_cycle(&self) -> u8 {
        self.state.fan_duty_cycle
    }

    /// Effective HRV state, as read by controllers.
    pub fn hrv_active(&self) -> bool {
        resolver::hrv_effective(&self.state)
    }

    pub fn hrv_target_state(&self) -> TargetFanState {
        self.state.hrv_target_state
    }

    /// Read-back for a characteristic as its UInt8 protocol value.
    pub fn read(&self, characteristic: Characteristic) -> u8 {
        match characteristic {
            Characteristic::FanActive => u8::from(self.fan_active()),
            Characteristic::FanTargetState => self.fan_target_state().into(),
            Characteristic::FanTimeout => self.fan_timeout_minutes(),
            Characteristic::FanDutyCycle => self.fan_duty_cycle(),
            Characteristic::HrvActive => u8::from(self.hrv_active()),
            Characteristic::HrvTargetState => self.hrv_target_state().into(),
        }
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    /// Values most recently driven to the relays.
    pub fn outputs(&self) -> Resolved {
        self.latch.last()
    }

    pub fn duty_cycle_phase(&self) -> Phase {
        self.duty_cycle.phase()
    }

    pub fn auto_off_deadline(&self) -> Option<u64> {
        self.auto_off.deadline()
    }

    pub fn duty_cycle_deadline(&self) -> Option<u64> {
        self.duty_cycle.deadline()
    }
}

fn parse_target(characteristic: Characteristic, value: u8) -> Result<TargetFanState> {
    TargetFanState::try_from(value).map_err(|value| Error::InvalidValue {
        characteristic,
        value,
    })
}
