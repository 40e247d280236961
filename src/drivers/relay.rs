//! Relay driver.
//!
//! Wraps any `embedded_hal` [`OutputPin`] and hides board polarity, so
//! callers only ever say "energized" or "released".
//!
//! ## Dual-target design
//!
//! On ESP-IDF: wraps an `esp_idf_hal` `PinDriver` in output mode.
//! On host/test: wraps [`SimPin`], which records its level in memory.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use log::warn;

pub struct RelayDriver<P> {
    pin: P,
    /// Drive LOW to energize.
    invert: bool,
    energized: bool,
    label: &'static str,
}

impl<P: OutputPin> RelayDriver<P> {
    pub fn new(pin: P, invert: bool, label: &'static str) -> Self {
        Self {
            pin,
            invert,
            energized: false,
            label,
        }
    }

    /// Drive the relay.  A pin error is logged and the previous state kept.
    pub fn set(&mut self, energized: bool) {
        let high = energized != self.invert;
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.energized = energized,
            Err(e) => warn!("{} relay: pin write failed: {:?}", self.label, e),
        }
    }

    pub fn is_energized(&self) -> bool {
        self.energized
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }
}

/// In-memory output pin.
#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
    writes: usize,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Number of level writes, including redundant ones.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}
