//! Serialized command queue.
//!
//! Commands are produced by:
//! - esp_timer callbacks (timer expirations)
//! - the SNTP sync callback (wall clock corrected)
//! - accessory-server handlers (characteristic writes, identify, factory
//!   reset)
//!
//! They are consumed by the main control loop, which hands them to the
//! service one at a time in FIFO order.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ esp_timer    │────▶│              │     │              │
//! │ SNTP         │────▶│ Command ring │────▶│  Main Loop   │
//! │ HAP handlers │────▶│  (lock-free) │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Each slot holds one [`AppCommand`] packed into a `u64`: the command kind
//! in bits 32..40 and a 32-bit payload below it.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::app::commands::AppCommand;
use crate::app::events::Characteristic;
use crate::app::ports::{TimerHandle, TimerId};

/// Maximum number of pending commands.
/// Power of 2 for efficient ring buffer modulo.
const COMMAND_QUEUE_CAP: usize = 32;

const KIND_SHIFT: u32 = 32;

const KIND_WRITE: u8 = 1;
const KIND_TIMER_AUTO_OFF: u8 = 2;
const KIND_TIMER_DUTY_CYCLE: u8 = 3;
const KIND_TIME_SYNCED: u8 = 4;
const KIND_IDENTIFY: u8 = 5;
const KIND_FACTORY_RESET: u8 = 6;

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// Callbacks write (produce), main loop reads (consume).

static COMMAND_HEAD: AtomicU8 = AtomicU8::new(0);
static COMMAND_TAIL: AtomicU8 = AtomicU8::new(0);
// SAFETY: a slot is written only by the producer before it publishes the
// new head (Release) and read only by the consumer after observing that
// head (Acquire).  The slot is not reused until the consumer publishes the
// tail past it.
static mut COMMAND_BUFFER: [u64; COMMAND_QUEUE_CAP] = [0; COMMAND_QUEUE_CAP];

/// Push a command into the queue.
/// Returns `false` if the queue is full (command dropped).
pub fn push_command(cmd: AppCommand) -> bool {
    let head = COMMAND_HEAD.load(Ordering::Relaxed);
    let tail = COMMAND_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % COMMAND_QUEUE_CAP as u8;

    if next_head == tail {
        log::warn!("Command queue full, dropping {:?}", cmd);
        return false;
    }

    // SAFETY: see COMMAND_BUFFER.
    unsafe {
        let slot = &raw mut COMMAND_BUFFER[head as usize];
        slot.write(encode(cmd));
    }

    COMMAND_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next command from the queue.
/// Called from the main loop (single consumer).
pub fn pop_command() -> Option<AppCommand> {
    loop {
        let tail = COMMAND_TAIL.load(Ordering::Relaxed);
        let head = COMMAND_HEAD.load(Ordering::Acquire);

        if tail == head {
            return None;
        }

        // SAFETY: see COMMAND_BUFFER.
        let raw = unsafe { (&raw const COMMAND_BUFFER[tail as usize]).read() };
        COMMAND_TAIL.store((tail + 1) % COMMAND_QUEUE_CAP as u8, Ordering::Release);

        match decode(raw) {
            Some(cmd) => return Some(cmd),
            None => log::warn!("Dropping malformed command word {raw:#x}"),
        }
    }
}

/// Drain all pending commands into a callback, in FIFO order.
pub fn drain_commands(mut handler: impl FnMut(AppCommand)) {
    while let Some(cmd) = pop_command() {
        handler(cmd);
    }
}

/// Check if the command queue is empty.
pub fn queue_is_empty() -> bool {
    let tail = COMMAND_TAIL.load(Ordering::Relaxed);
    let head = COMMAND_HEAD.load(Ordering::Acquire);
    tail == head
}

// ── Encoding ──────────────────────────────────────────────────

/// Pack a command into one queue word.
pub fn encode(cmd: AppCommand) -> u64 {
    let (kind, payload): (u8, u32) = match cmd {
        AppCommand::Write {
            characteristic,
            value,
        } => (
            KIND_WRITE,
            (u32::from(characteristic as u8) << 8) | u32::from(value),
        ),
        AppCommand::TimerExpired { owner, handle } => match owner {
            TimerId::AutoOff => (KIND_TIMER_AUTO_OFF, handle.raw()),
            TimerId::DutyCycle => (KIND_TIMER_DUTY_CYCLE, handle.raw()),
        },
        AppCommand::TimeSynced => (KIND_TIME_SYNCED, 0),
        AppCommand::Identify => (KIND_IDENTIFY, 0),
        AppCommand::FactoryReset => (KIND_FACTORY_RESET, 0),
    };
    (u64::from(kind) << KIND_SHIFT) | u64::from(payload)
}

/// Unpack a queue word.  `None` for an unknown kind or characteristic.
pub fn decode(raw: u64) -> Option<AppCommand> {
    let kind = (raw >> KIND_SHIFT) as u8;
    let payload = raw as u32;
    match kind {
        KIND_WRITE => Some(AppCommand::Write {
            characteristic: Characteristic::from_u8((payload >> 8) as u8)?,
            value: payload as u8,
        }),
        KIND_TIMER_AUTO_OFF => Some(AppCommand::TimerExpired {
            owner: TimerId::AutoOff,
            handle: TimerHandle::new(payload),
        }),
        KIND_TIMER_DUTY_CYCLE => Some(AppCommand::TimerExpired {
            owner: TimerId::DutyCycle,
            handle: TimerHandle::new(payload),
        }),
        KIND_TIME_SYNCED => Some(AppCommand::TimeSynced),
        KIND_IDENTIFY => Some(AppCommand::Identify),
        KIND_FACTORY_RESET => Some(AppCommand::FactoryReset),
        _ => None,
    }
}
