//! Persisted accessory state and compiled-in accessory parameters.
//!
//! [`PersistedState`] is the single versioned record kept in NVS.  It holds
//! both durable configuration (modes, timeout, duty cycle) and the transient
//! demand bits, which are cleared on every boot.

use serde::{Deserialize, Serialize};

/// Schema version of [`PersistedState`].  A stored record carrying any
/// other version is discarded and replaced with defaults.
pub const STATE_VERSION: u8 = 1;

/// Default duty cycle (percent of each hour) for a fresh record.
pub const DEFAULT_DUTY_CYCLE: u8 = 10;
/// Default auto-off countdown (minutes) for a fresh record.
pub const DEFAULT_TIMEOUT_MINUTES: u8 = 60;
/// Upper bound of the duty-cycle characteristic.
pub const MAX_DUTY_CYCLE: u8 = 100;

/// Target fan state as carried by the accessory protocol (UInt8 0/1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TargetFanState {
    /// Only manual demand drives the output.
    #[default]
    Manual = 0,
    /// Duty-cycle demand participates as well.
    Auto = 1,
}

impl TryFrom<u8> for TargetFanState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Manual),
            1 => Ok(Self::Auto),
            other => Err(other),
        }
    }
}

impl From<TargetFanState> for u8 {
    fn from(state: TargetFanState) -> Self {
        state as u8
    }
}

/// The accessory's persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u8,

    // --- Furnace fan ---
    /// User-commanded fan demand.
    pub fan_active_manual: bool,
    /// Duty-cycle-commanded fan demand.
    pub fan_active_auto: bool,
    pub fan_target_state: TargetFanState,
    /// Auto-off countdown length in minutes.
    pub fan_timeout_minutes: u8,
    /// Percent of each hour the fan runs in auto mode (0–100).
    pub fan_duty_cycle: u8,

    // --- Heat-recovery ventilator ---
    /// User-commanded ventilator demand.
    pub hrv_active: bool,
    pub hrv_target_state: TargetFanState,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            fan_active_manual: false,
            fan_active_auto: false,
            fan_target_state: TargetFanState::Manual,
            fan_timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            fan_duty_cycle: DEFAULT_DUTY_CYCLE,
            hrv_active: false,
            hrv_target_state: TargetFanState::Manual,
        }
    }
}

impl PersistedState {
    /// Drop the session-only demand bits.  Called once per boot.
    pub fn clear_transient(&mut self) {
        self.fan_active_manual = false;
        self.fan_active_auto = false;
        self.hrv_active = false;
    }

    /// Whether a loaded record can be used as-is.
    pub fn is_current(&self) -> bool {
        self.version == STATE_VERSION && self.fan_duty_cycle <= MAX_DUTY_CYCLE
    }
}

/// Static accessory information published by the protocol binding.
#[derive(Debug, Clone, Copy)]
pub struct AccessoryInfo {
    pub aid: u64,
    pub name: &'static str,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub serial_number: &'static str,
    pub firmware_version: &'static str,
    pub hardware_version: &'static str,
    /// Accessory category (Fans).
    pub category: u8,
}

pub const ACCESSORY_INFO: AccessoryInfo = AccessoryInfo {
    aid: 1,
    name: "ESP32 Thermostat",
    manufacturer: "Cleobis",
    model: "Thermostat1,1",
    serial_number: "0001",
    firmware_version: "5",
    hardware_version: "1",
    category: 3,
};

/// SNTP pool queried once the network is up.
pub const SNTP_SERVER: &str = "pool.ntp.org";
