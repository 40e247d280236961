//! One-shot timer pool using ESP-IDF's esp_timer API.
//!
//! [`HwTimerPool`] implements [`TimerPort`]: each [`TimerId`] owns one
//! esp_timer slot, created lazily on first registration.  When a slot
//! fires, its callback pushes [`AppCommand::TimerExpired`] into the command
//! queue carrying the handle of the registration that fired.
//!
//! A handle is `(slot << 24) | generation`.  Every register and deregister
//! bumps the slot generation, so a callback that raced a cancel posts a
//! handle the service no longer recognises.  Each arming records its own
//! generation and deadline before the timer starts; the callback posts
//! that armed generation, and drops a fire that arrives before the armed
//! deadline (a dispatch left over from an arming that was since replaced).
//!
//! Timer callbacks execute in the esp_timer task context (not ISR), so
//! they can safely call `push_command()`, which only touches atomics.
//!
//! On host targets the pool keeps registrations in memory and the test
//! harness pulls due expiries with [`HwTimerPool::next_due`].

use log::debug;

use crate::app::ports::{Ticks, TimerError, TimerHandle, TimerId, TimerPort};

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use crate::app::commands::AppCommand;
#[cfg(target_os = "espidf")]
use crate::events::push_command;

const SLOT_SHIFT: u32 = 24;
const GENERATION_MASK: u32 = (1 << SLOT_SHIFT) - 1;
const SLOTS: usize = TimerId::ALL.len();

fn make_handle(slot: usize, generation: u32) -> TimerHandle {
    TimerHandle::new(((slot as u32) << SLOT_SHIFT) | (generation & GENERATION_MASK))
}

fn slot_of(handle: TimerHandle) -> usize {
    (handle.raw() >> SLOT_SHIFT) as usize
}

// ── ESP-IDF ───────────────────────────────────────────────────

/// Whether a fire observed at `now_ms` is at or past `deadline_ms`.
/// Both are the low 32 bits of millisecond ticks; the comparison is
/// wrap-safe for deadlines within 24 days.
#[cfg(any(target_os = "espidf", test))]
fn fire_is_due(now_ms: u32, deadline_ms: u32) -> bool {
    (now_ms.wrapping_sub(deadline_ms) as i32) >= 0
}

#[cfg(target_os = "espidf")]
static GENERATIONS: [AtomicU32; SLOTS] = [AtomicU32::new(0), AtomicU32::new(0)];

/// Generation of the arming currently started on each slot.
#[cfg(target_os = "espidf")]
static ARMED_GENERATION: [AtomicU32; SLOTS] = [AtomicU32::new(0), AtomicU32::new(0)];

/// Low 32 bits of the deadline tick of that arming.
#[cfg(target_os = "espidf")]
static ARMED_DEADLINE_MS: [AtomicU32; SLOTS] = [AtomicU32::new(0), AtomicU32::new(0)];

#[cfg(target_os = "espidf")]
unsafe extern "C" fn expiry_cb(arg: *mut core::ffi::c_void) {
    let slot = arg as usize;
    let Some(owner) = TimerId::from_index(slot) else {
        return;
    };
    let generation = ARMED_GENERATION[slot].load(Ordering::Acquire);
    let deadline_ms = ARMED_DEADLINE_MS[slot].load(Ordering::Relaxed);
    // SAFETY: plain FFI read of the monotonic clock.
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    if !fire_is_due(now_ms, deadline_ms) {
        return;
    }
    push_command(AppCommand::TimerExpired {
        owner,
        handle: make_handle(slot, generation),
    });
}

#[cfg(target_os = "espidf")]
pub struct HwTimerPool {
    timers: [esp_timer_handle_t; SLOTS],
}

#[cfg(target_os = "espidf")]
impl HwTimerPool {
    pub fn new() -> Self {
        Self {
            timers: [core::ptr::null_mut(); SLOTS],
        }
    }

    fn slot_timer(&mut self, owner: TimerId) -> Result<esp_timer_handle_t, TimerError> {
        let slot = owner.index();
        if !self.timers[slot].is_null() {
            return Ok(self.timers[slot]);
        }
        let name: &'static [u8] = match owner {
            TimerId::AutoOff => b"auto_off\0",
            TimerId::DutyCycle => b"duty_cycle\0",
        };
        let args = esp_timer_create_args_t {
            callback: Some(expiry_cb),
            arg: slot as *mut core::ffi::c_void,
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: name.as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        // SAFETY: `args` outlives the call and `name` is 'static; the
        // handle is written once and owned by this pool afterwards.
        let ret = unsafe { esp_timer_create(&args, &mut self.timers[slot]) };
        if ret == ESP_ERR_NO_MEM as i32 {
            return Err(TimerError::Exhausted);
        }
        if ret != ESP_OK as i32 {
            return Err(TimerError::Platform(ret));
        }
        Ok(self.timers[slot])
    }
}

#[cfg(target_os = "espidf")]
impl TimerPort for HwTimerPool {
    fn register(&mut self, owner: TimerId, deadline: Ticks) -> Result<TimerHandle, TimerError> {
        let timer = self.slot_timer(owner)?;
        let slot = owner.index();
        // SAFETY: `timer` is a live handle created by `slot_timer`.
        unsafe {
            // Not running is fine.
            esp_timer_stop(timer);
        }
        let generation = GENERATIONS[slot].fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        ARMED_DEADLINE_MS[slot].store(deadline as u32, Ordering::Relaxed);
        ARMED_GENERATION[slot].store(generation, Ordering::Release);

        // SAFETY: plain FFI read of the monotonic clock.
        let now_us = unsafe { esp_timer_get_time() } as u64;
        let delay_us = deadline.saturating_mul(1_000).saturating_sub(now_us);
        // SAFETY: `timer` is a live handle created by `slot_timer`.
        let ret = unsafe { esp_timer_start_once(timer, delay_us) };
        if ret != ESP_OK as i32 {
            return Err(TimerError::Platform(ret));
        }
        debug!("hw_timer: {:?} armed for {} ms", owner, delay_us / 1_000);
        Ok(make_handle(slot, generation))
    }

    fn deregister(&mut self, handle: TimerHandle) {
        let slot = slot_of(handle);
        if slot >= SLOTS || self.timers[slot].is_null() {
            return;
        }
        let live = GENERATIONS[slot].load(Ordering::Acquire) & GENERATION_MASK;
        if live != handle.raw() & GENERATION_MASK {
            return;
        }
        // SAFETY: live handle owned by this pool.
        unsafe {
            esp_timer_stop(self.timers[slot]);
        }
        GENERATIONS[slot].fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(target_os = "espidf")]
impl Drop for HwTimerPool {
    fn drop(&mut self) {
        for timer in self.timers {
            if !timer.is_null() {
                // SAFETY: each non-null handle was created by this pool and
                // is deleted exactly once here.
                unsafe {
                    esp_timer_stop(timer);
                    esp_timer_delete(timer);
                }
            }
        }
    }
}

// ── Host simulation ───────────────────────────────────────────

/// In-memory timer pool.  Capacity mirrors the two esp_timer slots plus
/// headroom so a leaked registration shows up as `Exhausted` in tests.
#[cfg(not(target_os = "espidf"))]
pub struct HwTimerPool {
    live: heapless::Vec<(TimerHandle, TimerId, Ticks), 4>,
    generations: [u32; SLOTS],
}

#[cfg(not(target_os = "espidf"))]
impl HwTimerPool {
    pub fn new() -> Self {
        Self {
            live: heapless::Vec::new(),
            generations: [0; SLOTS],
        }
    }

    /// Remove and return the earliest registration due at or before `now`.
    pub fn next_due(&mut self, now: Ticks) -> Option<(TimerId, TimerHandle, Ticks)> {
        let idx = self
            .live
            .iter()
            .enumerate()
            .filter(|(_, (_, _, deadline))| *deadline <= now)
            .min_by_key(|(_, (_, _, deadline))| *deadline)
            .map(|(i, _)| i)?;
        let (handle, owner, deadline) = self.live.swap_remove(idx);
        Some((owner, handle, deadline))
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Ticks> {
        self.live.iter().map(|(_, _, deadline)| *deadline).min()
    }

    pub fn pending(&self) -> usize {
        self.live.len()
    }

    pub fn deadline_of(&self, owner: TimerId) -> Option<Ticks> {
        self.live
            .iter()
            .find(|(_, o, _)| *o == owner)
            .map(|(_, _, deadline)| *deadline)
    }
}

#[cfg(not(target_os = "espidf"))]
impl TimerPort for HwTimerPool {
    fn register(&mut self, owner: TimerId, deadline: Ticks) -> Result<TimerHandle, TimerError> {
        let slot = owner.index();
        self.generations[slot] = self.generations[slot].wrapping_add(1) & GENERATION_MASK;
        let handle = make_handle(slot, self.generations[slot]);
        self.live
            .push((handle, owner, deadline))
            .map_err(|_| TimerError::Exhausted)?;
        debug!("hw_timer(sim): {:?} armed until tick {}", owner, deadline);
        Ok(handle)
    }

    fn deregister(&mut self, handle: TimerHandle) {
        if slot_of(handle) >= SLOTS {
            return;
        }
        self.live.retain(|(h, _, _)| *h != handle);
    }
}

impl Default for HwTimerPool {
    fn default() -> Self {
        Self::new()
    }
}
