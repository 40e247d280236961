//! ESP32 time adapter.
//!
//! Implements [`ClockPort`] (monotonic milliseconds) and [`WallClockPort`]
//! (minute and second of the local hour).
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for ticks, the
//!   newlib clock (set by SNTP) through `localtime_r` for wall time.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `SystemTime` for host-side simulation.

use crate::app::ports::{ClockPort, Ticks, WallClockPort, WallTime};

pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Whether the wall clock looks synchronized (past 2020-01-01).
    #[cfg(target_os = "espidf")]
    pub fn is_synced(&self) -> bool {
        const EPOCH_2020: i64 = 1_577_836_800;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: plain FFI call writing into a local.
        let ok = unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } == 0;
        ok && i64::from(tv.tv_sec) >= EPOCH_2020
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn is_synced(&self) -> bool {
        true
    }
}

impl ClockPort for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn now(&self) -> Ticks {
        // SAFETY: plain FFI read of the monotonic clock.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as Ticks / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn now(&self) -> Ticks {
        self.start.elapsed().as_millis() as Ticks
    }
}

impl WallClockPort for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn wall_time(&self) -> WallTime {
        let mut secs: esp_idf_svc::sys::time_t = 0;
        // SAFETY: `time` and `localtime_r` only write into locals.
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        unsafe {
            esp_idf_svc::sys::time(&mut secs);
            if esp_idf_svc::sys::localtime_r(&secs, &mut tm).is_null() {
                log::warn!("localtime_r failed, assuming top of the hour");
                return WallTime {
                    minute: 0,
                    second: 0,
                };
            }
        }
        WallTime {
            minute: tm.tm_min.clamp(0, 59) as u8,
            // tm_sec may read 60 on a leap second.
            second: tm.tm_sec.clamp(0, 59) as u8,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn wall_time(&self) -> WallTime {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        WallTime {
            minute: ((secs / 60) % 60) as u8,
            second: (secs % 60) as u8,
        }
    }
}
