//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AccessoryService (domain)
//! ```
//!
//! Driven adapters (clocks, timer service, relays, event sinks, storage)
//! implement these traits.  The [`AccessoryService`](super::service::AccessoryService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.

use crate::config::PersistedState;

use super::events::AppEvent;

/// Monotonic clock ticks.  One tick is one millisecond.
pub type Ticks = u64;

// ───────────────────────────────────────────────────────────────
// Clock ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Monotonic tick source used for every timer deadline.
pub trait ClockPort {
    fn now(&self) -> Ticks;
}

/// Local wall-clock position within the current hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    /// 0–59
    pub minute: u8,
    /// 0–59
    pub second: u8,
}

/// Wall-clock reader.  The value may jump whenever the time-sync service
/// corrects the clock; the domain is told through `TimeSynced`.
pub trait WallClockPort {
    fn wall_time(&self) -> WallTime;
}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: domain ↔ host timer service)
// ───────────────────────────────────────────────────────────────

/// Which timer policy owns a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerId {
    AutoOff = 0,
    DutyCycle = 1,
}

impl TimerId {
    pub const ALL: [TimerId; 2] = [TimerId::AutoOff, TimerId::DutyCycle];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Opaque handle of one timer registration.
///
/// Adapters mint a fresh handle for every `register` call; an expiry is
/// delivered back carrying the handle it was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u32);

impl TimerHandle {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Host timer service.
///
/// Expirations are not delivered through this trait: the adapter posts
/// them into the serialized command queue, and the control loop hands
/// them to the service as [`AppCommand::TimerExpired`](super::commands::AppCommand).
pub trait TimerPort {
    /// Register a one-shot firing at the absolute tick `deadline`.
    fn register(&mut self, owner: TimerId, deadline: Ticks) -> Result<TimerHandle, TimerError>;

    /// Cancel a registration.  Unknown or already-fired handles are ignored.
    fn deregister(&mut self, handle: TimerHandle);
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: domain → relays)
// ───────────────────────────────────────────────────────────────

/// The two physical outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    FurnaceFan,
    Hrv,
}

/// Drives relay outputs.  Polarity inversion is the adapter's concern.
pub trait OutputPort {
    fn set_output(&mut self, channel: OutputChannel, energized: bool);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → protocol / logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.  The
/// accessory-server binding turns characteristic events into protocol
/// notifications; the log adapter writes them to the console.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent record)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the accessory's state record.
pub trait ConfigPort {
    /// Load the record.  `Ok(None)` means nothing has been stored yet.
    /// A record of the wrong size or schema version is reported as
    /// [`ConfigError::Corrupted`] / [`ConfigError::VersionMismatch`].
    fn load(&self) -> Result<Option<PersistedState>, ConfigError>;

    fn save(&mut self, state: &PersistedState) -> Result<(), ConfigError>;

    /// Remove the record (factory reset).
    fn erase(&mut self) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value blob storage.
///
/// Write operations MUST be atomic; no partial writes on power loss.
/// The ESP-IDF NVS API guarantees this natively; in-memory simulation
/// achieves it trivially.
pub trait StoragePort {
    /// Read a value into `buf`.  Returns the stored length, which may
    /// exceed `buf.len()` when the value was truncated.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Everything the service needs from the board, in one bound.
///
/// Passing a single `&mut impl AccessoryPlatform` avoids juggling six
/// mutable borrows at every call site while keeping each port explicit.
pub trait AccessoryPlatform:
    ClockPort + WallClockPort + TimerPort + OutputPort + EventSink + ConfigPort
{
}

impl<T> AccessoryPlatform for T where
    T: ClockPort + WallClockPort + TimerPort + OutputPort + EventSink + ConfigPort
{
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`TimerPort::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// No timer slot could be allocated.
    Exhausted,
    /// The platform timer service rejected the request (ESP-IDF error code).
    Platform(i32),
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored record failed deserialization or has the wrong size.
    Corrupted,
    /// Stored record carries a different schema version.
    VersionMismatch { found: u8 },
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl ConfigError {
    /// Whether the caller may recover by substituting defaults.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::Corrupted | Self::VersionMismatch { .. })
    }
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for TimerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no timer slot available"),
            Self::Platform(rc) => write!(f, "timer service error (rc={})", rc),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "state record corrupted"),
            Self::VersionMismatch { found } => {
                write!(f, "state record version {} unsupported", found)
            }
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
