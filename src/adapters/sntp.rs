//! SNTP time synchronisation.
//!
//! Polls [`SNTP_SERVER`] and posts [`AppCommand::TimeSynced`] into the
//! command queue after every successful sync, so the duty-cycle oscillator
//! can re-anchor its off-phase against the corrected wall clock.
//!
//! The returned guard must be kept alive; dropping it stops SNTP.

use log::info;

use crate::app::commands::AppCommand;
use crate::config::SNTP_SERVER;
use crate::events::push_command;

/// Post a sync notification.  Runs on the SNTP callback context.
fn on_synced() {
    if !push_command(AppCommand::TimeSynced) {
        log::warn!("SNTP: sync notification dropped");
    }
}

#[cfg(target_os = "espidf")]
pub struct SntpClient {
    _sntp: esp_idf_svc::sntp::EspSntp<'static>,
}

#[cfg(target_os = "espidf")]
impl SntpClient {
    pub fn start() -> Result<Self, esp_idf_svc::sys::EspError> {
        use esp_idf_svc::sntp::{EspSntp, OperatingMode, SntpConf, SyncMode};

        let mut conf = SntpConf {
            operating_mode: OperatingMode::Poll,
            sync_mode: SyncMode::Immediate,
            ..Default::default()
        };
        conf.servers[0] = SNTP_SERVER;

        let sntp = EspSntp::new_with_callback(&conf, |synced| {
            log::debug!("SNTP: synced to {} s", synced.as_secs());
            on_synced();
        })?;
        info!("SNTP: polling {}", SNTP_SERVER);
        Ok(Self { _sntp: sntp })
    }
}

/// Host stand-in: the host clock is already correct, so one sync is
/// reported immediately.
#[cfg(not(target_os = "espidf"))]
pub struct SntpClient;

#[cfg(not(target_os = "espidf"))]
impl SntpClient {
    pub fn start() -> Result<Self, core::convert::Infallible> {
        info!("SNTP(sim): using host clock ({})", SNTP_SERVER);
        on_synced();
        Ok(Self)
    }
}
