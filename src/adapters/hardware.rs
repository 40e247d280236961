//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the clock, the esp_timer pool, both relay drivers, the NVS store
//! and the log sink, and exposes them through every port the service
//! needs, so one `&mut HardwareAdapter` satisfies [`AccessoryPlatform`].
//! This is the only module in the system that touches actual hardware.
//! On non-espidf targets the underlying drivers use simulation backends.
//!
//! [`AccessoryPlatform`]: crate::app::ports::AccessoryPlatform

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::adapters::log_sink::LogEventSink;
use crate::adapters::nvs::NvsAdapter;
use crate::adapters::time::Esp32TimeAdapter;
use crate::app::events::{AppEvent, Characteristic};
use crate::app::ports::{
    ClockPort, ConfigError, ConfigPort, EventSink, OutputChannel, OutputPort, Ticks, TimerError,
    TimerHandle, TimerId, TimerPort, WallClockPort, WallTime,
};
use crate::config::PersistedState;
use crate::drivers::hw_timer::HwTimerPool;
use crate::drivers::relay::RelayDriver;

/// Characteristics awaiting a protocol notification.
const NOTIFY_QUEUE_LEN: usize = 8;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<F, H> {
    clock: Esp32TimeAdapter,
    timers: HwTimerPool,
    fan: RelayDriver<F>,
    hrv: RelayDriver<H>,
    nvs: NvsAdapter,
    log: LogEventSink,
    notify: heapless::Vec<Characteristic, NOTIFY_QUEUE_LEN>,
}

impl<F: OutputPin, H: OutputPin> HardwareAdapter<F, H> {
    pub fn new(
        clock: Esp32TimeAdapter,
        timers: HwTimerPool,
        fan: RelayDriver<F>,
        hrv: RelayDriver<H>,
        nvs: NvsAdapter,
    ) -> Self {
        Self {
            clock,
            timers,
            fan,
            hrv,
            nvs,
            log: LogEventSink::new(),
            notify: heapless::Vec::new(),
        }
    }

    /// Drain characteristics whose subscribers must be notified, in the
    /// order they changed.  Duplicates are coalesced.
    pub fn take_notifications(&mut self) -> heapless::Vec<Characteristic, NOTIFY_QUEUE_LEN> {
        core::mem::take(&mut self.notify)
    }

    pub fn fan_relay(&self) -> &RelayDriver<F> {
        &self.fan
    }

    pub fn hrv_relay(&self) -> &RelayDriver<H> {
        &self.hrv
    }

    pub fn timers(&self) -> &HwTimerPool {
        &self.timers
    }

    pub fn clock(&self) -> &Esp32TimeAdapter {
        &self.clock
    }
}

// ── Clock ports ───────────────────────────────────────────────

impl<F, H> ClockPort for HardwareAdapter<F, H> {
    fn now(&self) -> Ticks {
        self.clock.now()
    }
}

impl<F, H> WallClockPort for HardwareAdapter<F, H> {
    fn wall_time(&self) -> WallTime {
        self.clock.wall_time()
    }
}

// ── TimerPort implementation ──────────────────────────────────

impl<F, H> TimerPort for HardwareAdapter<F, H> {
    fn register(&mut self, owner: TimerId, deadline: Ticks) -> Result<TimerHandle, TimerError> {
        self.timers.register(owner, deadline)
    }

    fn deregister(&mut self, handle: TimerHandle) {
        self.timers.deregister(handle);
    }
}

// ── OutputPort implementation ─────────────────────────────────

impl<F: OutputPin, H: OutputPin> OutputPort for HardwareAdapter<F, H> {
    fn set_output(&mut self, channel: OutputChannel, energized: bool) {
        match channel {
            OutputChannel::FurnaceFan => self.fan.set(energized),
            OutputChannel::Hrv => self.hrv.set(energized),
        }
    }
}

// ── EventSink implementation ──────────────────────────────────

impl<F, H> EventSink for HardwareAdapter<F, H> {
    fn emit(&mut self, event: &AppEvent) {
        self.log.emit(event);
        if let Some(c) = event.characteristic() {
            if !self.notify.contains(&c) && self.notify.push(c).is_err() {
                warn!("Notification queue full, dropping {:?}", c);
            }
        }
    }
}

// ── ConfigPort implementation ─────────────────────────────────

impl<F, H> ConfigPort for HardwareAdapter<F, H> {
    fn load(&self) -> Result<Option<PersistedState>, ConfigError> {
        self.nvs.load()
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), ConfigError> {
        self.nvs.save(state)
    }

    fn erase(&mut self) -> Result<(), ConfigError> {
        self.nvs.erase()
    }
}
