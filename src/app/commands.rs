//! Inbound commands to the application service.
//!
//! These represent everything the outside world can ask of the
//! [`AccessoryService`](super::service::AccessoryService): characteristic
//! writes from the accessory server, timer expirations from the host timer
//! service, time-sync notifications, identify and factory reset.  All of them travel through the
//! same serialized queue, so the service sees them one at a time.

use super::events::Characteristic;
use super::ports::{TimerHandle, TimerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// A controller wrote `value` to a characteristic (all are UInt8).
    Write {
        characteristic: Characteristic,
        value: u8,
    },

    /// A registered deadline elapsed.
    TimerExpired { owner: TimerId, handle: TimerHandle },

    /// The wall clock was re-synchronized.
    TimeSynced,

    /// Identify routine requested by a controller.
    Identify,

    /// Erase the stored record and return to defaults.
    FactoryReset,
}
