//! GPIO pin assignments for the relay board.
//!
//! Single source of truth: the firmware binary and the relay drivers
//! reference this module rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relay outputs
// ---------------------------------------------------------------------------

/// Furnace blower relay.
pub const FURNACE_FAN_GPIO: i32 = 32;
/// Heat-recovery ventilator relay.
pub const HRV_GPIO: i32 = 33;

/// The relay board switches on a LOW input, so an energized output is
/// driven low.
pub const INVERT_OUTPUTS: bool = true;
