//! Simulated board for integration tests.
//!
//! Implements every port the service needs on top of a virtual monotonic
//! clock.  Timer registrations go into the host [`HwTimerPool`], and
//! [`SimBoard::advance_to`] delivers due expiries in deadline order through
//! the same `handle_command` entry point the firmware loop uses.  The
//! persisted record lives in the host [`NvsAdapter`].

#![allow(dead_code)]

use hvac_accessory::adapters::nvs::NvsAdapter;
use hvac_accessory::app::commands::AppCommand;
use hvac_accessory::app::events::AppEvent;
use hvac_accessory::app::ports::{
    ClockPort, ConfigError, ConfigPort, EventSink, OutputChannel, OutputPort, StoragePort, Ticks,
    TimerError, TimerHandle, TimerId, TimerPort, WallClockPort, WallTime,
};
use hvac_accessory::app::service::AccessoryService;
use hvac_accessory::config::PersistedState;
use hvac_accessory::drivers::hw_timer::HwTimerPool;

pub const SEC: Ticks = 1_000;
pub const MIN: Ticks = 60 * SEC;
pub const HOUR: Ticks = 60 * MIN;

pub struct SimBoard {
    pub now: Ticks,
    /// Wall-clock seconds (within the hour) at tick 0.
    pub wall_base_secs: u64,
    pub timers: HwTimerPool,
    pub nvs: NvsAdapter,
    pub fan: bool,
    pub hrv: bool,
    pub pin_writes: Vec<(OutputChannel, bool)>,
    pub events: Vec<AppEvent>,
    pub saves: usize,
    pub fail_load: Option<ConfigError>,
    pub fail_save: Option<ConfigError>,
    pub fail_register: bool,
}

impl SimBoard {
    pub fn new() -> Self {
        Self {
            now: 0,
            wall_base_secs: 0,
            timers: HwTimerPool::new(),
            nvs: NvsAdapter::new().unwrap(),
            fan: false,
            hrv: false,
            pin_writes: Vec::new(),
            events: Vec::new(),
            saves: 0,
            fail_load: None,
            fail_save: None,
            fail_register: false,
        }
    }

    /// Board whose wall clock reads `minute:second` at tick 0.
    pub fn at_wall(minute: u64, second: u64) -> Self {
        Self {
            wall_base_secs: minute * 60 + second,
            ..Self::new()
        }
    }

    /// Store a raw blob as the persisted record.
    pub fn store_raw(&mut self, bytes: &[u8]) {
        self.nvs.write("hvac", "state", bytes).unwrap();
    }

    pub fn store_state(&mut self, state: &PersistedState) {
        self.store_raw(&postcard::to_allocvec(state).unwrap());
    }

    /// Step the clock to `until`, delivering every expiry due on the way.
    pub fn advance_to(&mut self, until: Ticks, svc: &mut AccessoryService) {
        while let Some((owner, handle, deadline)) = self.timers.next_due(until) {
            self.now = self.now.max(deadline);
            svc.handle_command(AppCommand::TimerExpired { owner, handle }, self)
                .unwrap();
        }
        self.now = self.now.max(until);
    }

    pub fn advance_by(&mut self, dt: Ticks, svc: &mut AccessoryService) {
        self.advance_to(self.now + dt, svc);
    }

    /// Correct the wall clock so it reads `minute:second` right now.
    pub fn set_wall(&mut self, minute: u64, second: u64) {
        let target = minute * 60 + second;
        let elapsed = (self.now / SEC) % 3600;
        self.wall_base_secs = (target + 3600 - elapsed) % 3600;
    }

    pub fn deadline_of(&self, owner: TimerId) -> Option<Ticks> {
        self.timers.deadline_of(owner)
    }

    /// `OutputChanged` events for one channel, as their `active` values.
    pub fn transitions(&self, channel: OutputChannel) -> Vec<bool> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::OutputChanged {
                    channel: c, active, ..
                } if *c == channel => Some(*active),
                _ => None,
            })
            .collect()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for SimBoard {
    fn now(&self) -> Ticks {
        self.now
    }
}

impl WallClockPort for SimBoard {
    fn wall_time(&self) -> WallTime {
        let secs = self.wall_base_secs + self.now / SEC;
        WallTime {
            minute: ((secs / 60) % 60) as u8,
            second: (secs % 60) as u8,
        }
    }
}

impl TimerPort for SimBoard {
    fn register(&mut self, owner: TimerId, deadline: Ticks) -> Result<TimerHandle, TimerError> {
        if self.fail_register {
            return Err(TimerError::Exhausted);
        }
        self.timers.register(owner, deadline)
    }

    fn deregister(&mut self, handle: TimerHandle) {
        self.timers.deregister(handle);
    }
}

impl OutputPort for SimBoard {
    fn set_output(&mut self, channel: OutputChannel, energized: bool) {
        match channel {
            OutputChannel::FurnaceFan => self.fan = energized,
            OutputChannel::Hrv => self.hrv = energized,
        }
        self.pin_writes.push((channel, energized));
    }
}

impl EventSink for SimBoard {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

impl ConfigPort for SimBoard {
    fn load(&self) -> Result<Option<PersistedState>, ConfigError> {
        match self.fail_load {
            Some(e) => Err(e),
            None => self.nvs.load(),
        }
    }

    fn save(&mut self, state: &PersistedState) -> Result<(), ConfigError> {
        if let Some(e) = self.fail_save {
            return Err(e);
        }
        self.saves += 1;
        self.nvs.save(state)
    }

    fn erase(&mut self) -> Result<(), ConfigError> {
        self.nvs.erase()
    }
}

/// Boot a fresh service on `board`.
pub fn booted(board: &mut SimBoard) -> AccessoryService {
    let mut svc = AccessoryService::new();
    svc.boot(board).unwrap();
    board.clear_events();
    board.saves = 0;
    svc
}
