//! Unified error type for the accessory firmware.
//!
//! Every fallible domain operation returns [`Result`].  Variants are
//! `Copy` so they pass through the control loop without allocation, and
//! [`Error::is_fatal`] tells the loop whether to restart or carry on.

use core::fmt;

use crate::app::events::Characteristic;
use crate::app::ports::{ConfigError, TimerError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The timer service could not register a deadline.
    Timer(TimerError),
    /// The configuration store failed in a way defaults cannot paper over.
    Config(ConfigError),
    /// A protocol write carried a value outside the characteristic's range.
    InvalidValue {
        characteristic: Characteristic,
        value: u8,
    },
}

impl Error {
    /// Fatal errors leave the accessory without scheduling or without a
    /// consistent persisted state; the firmware restarts on them.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Timer(_) => true,
            Self::Config(e) => !e.is_recoverable(),
            Self::InvalidValue { .. } => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer(e) => write!(f, "timer: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::InvalidValue {
                characteristic,
                value,
            } => write!(f, "invalid value {value} for {characteristic:?}"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
