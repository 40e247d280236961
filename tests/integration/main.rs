//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulated board.  All tests run on the host with no real
//! hardware required.

#![cfg(not(target_os = "espidf"))]

mod duty_cycle_tests;
mod mock_hw;
mod service_tests;
