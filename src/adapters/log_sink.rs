//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production).  The accessory-server binding
//! implements the same trait to raise protocol notifications.

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, OutputChannel};

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged since boot.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started { restored } => {
                info!(
                    "START | state={}",
                    if *restored { "restored" } else { "defaults" }
                );
            }
            AppEvent::OutputChanged {
                channel,
                active,
                manual_demand,
                auto_demand,
            } => {
                let name = match channel {
                    OutputChannel::FurnaceFan => "fan",
                    OutputChannel::Hrv => "hrv",
                };
                info!(
                    "OUTPUT | {}={} | manual={} auto={}",
                    name,
                    if *active { "ON" } else { "OFF" },
                    manual_demand,
                    auto_demand
                );
            }
            AppEvent::CharacteristicChanged(c) => {
                info!("NOTIFY | {:?}", c);
            }
            AppEvent::Identified => {
                info!("IDENTIFY");
            }
        }
    }
}
