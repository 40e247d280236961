//! Relay drivers and the esp_timer pool.

pub mod hw_timer;
pub mod relay;
