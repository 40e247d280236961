//! Furnace-fan / HRV accessory firmware, main entry point.
//!
//! Hexagonal architecture with a single serialized command queue.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter: RelayDriver ×2 · HwTimerPool · NvsAdapter    │
//! │                   Esp32TimeAdapter · LogEventSink              │
//! │  WifiAdapter (station netif) ─▶ SntpClient                     │
//! │  SntpClient ──┐   esp_timer callbacks ──┐   protocol binding ─┐│
//! │               └──────────▶ command queue ◀───────────────────┘│
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │         AccessoryService (pure logic)                  │    │
//! │  │  write handlers · AutoOffTimer · DutyCycleTimer        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use log::{debug, error, info, warn};

use hvac_accessory::adapters::hardware::HardwareAdapter;
use hvac_accessory::adapters::nvs::NvsAdapter;
use hvac_accessory::adapters::sntp::SntpClient;
use hvac_accessory::adapters::time::Esp32TimeAdapter;
use hvac_accessory::adapters::wifi::{WifiAdapter, WifiCredentials};
use hvac_accessory::app::ports::ClockPort;
use hvac_accessory::app::service::AccessoryService;
use hvac_accessory::config::ACCESSORY_INFO;
use hvac_accessory::drivers::hw_timer::HwTimerPool;
use hvac_accessory::drivers::relay::RelayDriver;
use hvac_accessory::error::Error;
use hvac_accessory::events;
use hvac_accessory::pins;

/// Idle time between queue drains.
const LOOP_INTERVAL_MS: u32 = 50;

fn restart(reason: &Error) -> ! {
    error!("Fatal: {}, restarting", reason);
    FreeRtos::delay_ms(100);
    esp_idf_hal::reset::restart()
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  {} v{}", ACCESSORY_INFO.name, env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    info!(
        "{} {} s/n {} fw {} hw {}",
        ACCESSORY_INFO.manufacturer,
        ACCESSORY_INFO.model,
        ACCESSORY_INFO.serial_number,
        ACCESSORY_INFO.firmware_version,
        ACCESSORY_INFO.hardware_version
    );

    // ── 2. Relays (driven released by boot below) ─────────────
    let peripherals = Peripherals::take()?;
    let fan_pin = PinDriver::output(peripherals.pins.gpio32)?;
    let hrv_pin = PinDriver::output(peripherals.pins.gpio33)?;
    info!(
        "Relays: fan GPIO{}, HRV GPIO{}, inverted={}",
        pins::FURNACE_FAN_GPIO,
        pins::HRV_GPIO,
        pins::INVERT_OUTPUTS
    );

    // ── 3. Adapters ───────────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {e}"))?;
    let mut hw = HardwareAdapter::new(
        Esp32TimeAdapter::new(),
        HwTimerPool::new(),
        RelayDriver::new(fan_pin, pins::INVERT_OUTPUTS, "fan"),
        RelayDriver::new(hrv_pin, pins::INVERT_OUTPUTS, "hrv"),
        nvs,
    );

    // ── 4. Service ────────────────────────────────────────────
    let mut service = AccessoryService::new();
    if let Err(e) = service.boot(&mut hw) {
        restart(&e);
    }

    // ── 5. Network ────────────────────────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let mut wifi = match WifiCredentials::from_build_env() {
        Ok(creds) => match WifiAdapter::new(peripherals.modem, sysloop, creds) {
            Ok(wifi) => Some(wifi),
            Err(e) => {
                warn!("Wi-Fi init failed ({}), running offline", e);
                None
            }
        },
        Err(e) => {
            warn!("{}, running offline", e);
            None
        }
    };
    if let Some(wifi) = wifi.as_mut() {
        // A failed first join is retried from the command loop.
        let _ = wifi.connect(hw.now());
    }

    // ── 6. Time sync ──────────────────────────────────────────
    if !hw.clock().is_synced() {
        warn!("Wall clock not set yet; first off-phase may be misaligned");
    }
    // SNTP needs the station netif, which only exists with Wi-Fi.
    let _sntp = if wifi.is_some() {
        match SntpClient::start() {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("SNTP start failed ({}), duty cycle follows the unsynced clock", e);
                None
            }
        }
    } else {
        None
    };

    info!("System ready. Entering command loop.");

    // ── 7. Command loop ───────────────────────────────────────
    loop {
        let mut fatal = None;
        events::drain_commands(|cmd| {
            if fatal.is_some() {
                return;
            }
            debug!("Command: {:?}", cmd);
            if let Err(e) = service.handle_command(cmd, &mut hw) {
                if e.is_fatal() {
                    fatal = Some(e);
                } else {
                    warn!("Command {:?} rejected: {}", cmd, e);
                }
            }
        });
        if let Some(e) = fatal {
            restart(&e);
        }

        // Hand changed characteristics to the protocol binding.
        for c in hw.take_notifications() {
            info!("Notify {:?} = {}", c, service.read(c));
        }

        if let Some(wifi) = wifi.as_mut() {
            wifi.poll(hw.now());
        }

        FreeRtos::delay_ms(LOOP_INTERVAL_MS);
    }
}
