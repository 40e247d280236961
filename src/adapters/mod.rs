//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                  | Connects to               |
//! |------------|-----------------------------|---------------------------|
//! | `hardware` | all of `AccessoryPlatform`  | composes the ones below   |
//! | `log_sink` | EventSink                   | Serial log output         |
//! | `nvs`      | ConfigPort                  | NVS / in-memory store     |
//! |            | StoragePort                 |                           |
//! | `time`     | ClockPort, WallClockPort    | esp_timer, newlib clock   |
//! | `sntp`     | (command producer)          | SNTP client               |
//! | `wifi`     | (network bring-up)          | Wi-Fi station netif       |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod sntp;
pub mod time;
pub mod wifi;
