//! Furnace-fan and HRV relay controller library.
//!
//! Exposes the pure-logic modules for integration testing and the adapters
//! used by the firmware binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod outputs;
pub mod pins;
pub mod resolver;
pub mod timer;

pub mod adapters;
pub mod drivers;
