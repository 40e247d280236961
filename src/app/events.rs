//! Outbound application events.
//!
//! The [`AccessoryService`](super::service::AccessoryService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: raise an accessory-protocol
//! notification, log to serial, etc.

use super::ports::OutputChannel;

/// Characteristics exposed by the furnace-fan and HRV services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Characteristic {
    FanActive = 0,
    FanTargetState = 1,
    FanTimeout = 2,
    FanDutyCycle = 3,
    HrvActive = 4,
    HrvTargetState = 5,
}

impl Characteristic {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::FanActive),
            1 => Some(Self::FanTargetState),
            2 => Some(Self::FanTimeout),
            3 => Some(Self::FanDutyCycle),
            4 => Some(Self::HrvActive),
            5 => Some(Self::HrvTargetState),
            _ => None,
        }
    }

    /// The "active" characteristic reflecting an output.
    pub fn for_output(channel: OutputChannel) -> Self {
        match channel {
            OutputChannel::FurnaceFan => Self::FanActive,
            OutputChannel::Hrv => Self::HrvActive,
        }
    }
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has booted.  `restored` is false when defaults were used.
    Started { restored: bool },

    /// An output's effective state changed.
    OutputChanged {
        channel: OutputChannel,
        active: bool,
        manual_demand: bool,
        auto_demand: bool,
    },

    /// A configuration characteristic changed value through a write.
    CharacteristicChanged(Characteristic),

    /// The accessory was asked to identify itself.
    Identified,
}

impl AppEvent {
    /// The characteristic whose subscribers must be notified, if any.
    pub fn characteristic(&self) -> Option<Characteristic> {
        match self {
            Self::OutputChanged { channel, .. } => Some(Characteristic::for_output(*channel)),
            Self::CharacteristicChanged(c) => Some(*c),
            Self::Started { .. } | Self::Identified => None,
        }
    }
}
