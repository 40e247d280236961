//! Wi-Fi station adapter.
//!
//! Brings up the station network interface that SNTP syncs over, joins the
//! configured access point and keeps the link alive from the control loop.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi` (`EspWifi` wrapped in
//!   `BlockingWifi`).  Creating the driver also creates the default station
//!   netif, so the TCP/IP stack exists before SNTP starts.
//! - **all other targets**: an in-memory link for host-side tests.
//!
//! ## Reconnection policy
//!
//! After a failed join or a lost link the adapter waits an exponential
//! backoff (2 s → 4 s → 8 s … capped at 60 s) before retrying.

use core::fmt;

use log::{info, warn};

use crate::app::ports::Ticks;

#[cfg(target_os = "espidf")]
use esp_idf_hal::modem::Modem;
#[cfg(target_os = "espidf")]
use esp_idf_svc::eventloop::EspSystemEventLoop;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;
#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

const INITIAL_BACKOFF_MS: Ticks = 2_000;
const MAX_BACKOFF_MS: Ticks = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no Wi-Fi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "Wi-Fi connection failed"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

/// Validated station credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, WifiError> {
        if ssid.is_empty() || !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
            return Err(WifiError::InvalidSsid);
        }
        if !password.is_empty() && password.len() < 8 {
            return Err(WifiError::InvalidPassword);
        }
        Ok(Self {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: password.try_into().map_err(|_| WifiError::InvalidPassword)?,
        })
    }

    /// Credentials baked in at build time from `WIFI_SSID` and
    /// `WIFI_PASSWORD` (the password may be omitted for an open network).
    pub fn from_build_env() -> Result<Self, WifiError> {
        match option_env!("WIFI_SSID") {
            Some(ssid) => Self::new(ssid, option_env!("WIFI_PASSWORD").unwrap_or("")),
            None => Err(WifiError::NoCredentials),
        }
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32 },
}

pub struct WifiAdapter {
    credentials: WifiCredentials,
    state: WifiState,
    backoff_ms: Ticks,
    next_attempt: Ticks,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: joins still to be refused.
    #[cfg(not(target_os = "espidf"))]
    refuse_joins: u32,
    #[cfg(not(target_os = "espidf"))]
    link_up: bool,
    #[cfg(not(target_os = "espidf"))]
    join_attempts: u32,
}

impl WifiAdapter {
    /// Create the station driver and its netif, and start the radio.
    /// Does not join yet; call [`connect`](Self::connect).
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        credentials: WifiCredentials,
    ) -> Result<Self, EspError> {
        // NVS is owned by the state store; the driver keeps its settings in RAM.
        let driver = EspWifi::new(modem, sysloop.clone(), None)?;
        let mut wifi = BlockingWifi::wrap(driver, sysloop)?;
        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: credentials.ssid.clone(),
            password: credentials.password.clone(),
            auth_method: if credentials.is_open() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        }))?;
        wifi.start()?;
        info!("Wi-Fi: station started for '{}'", credentials.ssid());
        Ok(Self {
            credentials,
            state: WifiState::Disconnected,
            backoff_ms: INITIAL_BACKOFF_MS,
            next_attempt: 0,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(credentials: WifiCredentials) -> Self {
        info!("Wi-Fi(sim): station for '{}'", credentials.ssid());
        Self {
            credentials,
            state: WifiState::Disconnected,
            backoff_ms: INITIAL_BACKOFF_MS,
            next_attempt: 0,
            refuse_joins: 0,
            link_up: false,
            join_attempts: 0,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }

    /// First join attempt.  A failure is not final: the adapter moves to
    /// `Reconnecting` and [`poll`](Self::poll) keeps trying.
    pub fn connect(&mut self, now: Ticks) -> Result<(), WifiError> {
        info!("Wi-Fi: joining '{}'", self.credentials.ssid());
        match self.platform_connect() {
            Ok(()) => {
                self.on_joined();
                Ok(())
            }
            Err(e) => {
                warn!("Wi-Fi: join failed ({}), retrying in {} s", e, self.backoff_ms / 1_000);
                self.state = WifiState::Reconnecting { attempt: 0 };
                self.next_attempt = now.saturating_add(self.backoff_ms);
                Err(e)
            }
        }
    }

    /// Drive reconnection.  Returns `true` when the link has just come
    /// (back) up.
    pub fn poll(&mut self, now: Ticks) -> bool {
        match self.state {
            WifiState::Disconnected => false,
            WifiState::Connected => {
                if !self.platform_is_connected() {
                    warn!("Wi-Fi: link lost, reconnecting");
                    self.state = WifiState::Reconnecting { attempt: 0 };
                    self.next_attempt = now.saturating_add(self.backoff_ms);
                }
                false
            }
            WifiState::Reconnecting { attempt } => {
                if now < self.next_attempt {
                    return false;
                }
                info!("Wi-Fi: reconnect attempt {} (backoff {} s)", attempt, self.backoff_ms / 1_000);
                match self.platform_connect() {
                    Ok(()) => {
                        self.on_joined();
                        true
                    }
                    Err(_) => {
                        self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
                        self.state = WifiState::Reconnecting {
                            attempt: attempt + 1,
                        };
                        self.next_attempt = now.saturating_add(self.backoff_ms);
                        false
                    }
                }
            }
        }
    }

    fn on_joined(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_ms = INITIAL_BACKOFF_MS;
        info!("Wi-Fi: connected to '{}'", self.credentials.ssid());
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        self.wifi
            .connect()
            .and_then(|()| self.wifi.wait_netif_up())
            .map_err(|e| {
                warn!("Wi-Fi: {}", e);
                WifiError::ConnectionFailed
            })
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        self.join_attempts += 1;
        if self.refuse_joins > 0 {
            self.refuse_joins -= 1;
            return Err(WifiError::ConnectionFailed);
        }
        self.link_up = true;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.link_up
    }
}
