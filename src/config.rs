//! Configuration loader for the `ssr-charger` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Initial thresholds go through the same validation
//! as runtime updates, so a bad value fails startup instead of the first tick.
//!
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};

use crate::{
    link::LinkSettings,
    models::{Mode, ThresholdUpdate, Thresholds},
    state::validate_update,
};

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional, non-empty string environment variable.
macro_rules! optional_env {
    ($var_name:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
}

/// Strongly typed application configuration.
///
/// Thresholds here are only the starting values; the live ones sit in
/// [`crate::ControlState`] and can be changed over HTTP.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// HTTP listen address.
    pub bind_addr: SocketAddr,

    /// Serial port to open at startup; auto-discovered when unset.
    pub serial_port: Option<String>,

    pub baud_rate: u32,

    /// Read/write timeout on the serial port.
    pub serial_timeout: Duration,

    /// Delay after opening the port while the board resets.
    pub settle_delay: Duration,

    pub initial_mode: Mode,

    pub thresholds: Thresholds,

    /// How often the reader task drains the link.
    pub device_poll: Duration,

    /// How long a manual command waits before collecting device replies.
    pub response_wait: Duration,

    /// Root of the host's power-supply class.
    pub battery_root: PathBuf,

    /// SQLite URL for the logging sink; logging is off when unset.
    pub db_url: Option<String>,
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `BIND_ADDR` – listen address (default: 0.0.0.0:5000)
/// - `SERIAL_PORT` – serial device (default: auto-detect)
/// - `SERIAL_BAUD` – baud rate (default: 115200)
/// - `SERIAL_TIMEOUT_MS` – I/O timeout (default: 1000)
/// - `SERIAL_SETTLE_MS` – board reset delay (default: 2000)
/// - `CONTROL_MODE` – MANUAL or AUTO (default: MANUAL)
/// - `LOW_THRESHOLD` / `HIGH_THRESHOLD` – percent (default: 20 / 80)
/// - `CHECK_INTERVAL` – seconds between ticks (default: 5)
/// - `DEVICE_POLL_MS` – reader task period (default: 500)
/// - `RESPONSE_WAIT_MS` – manual command reply wait (default: 200)
/// - `BATTERY_SYSFS_ROOT` – (default: /sys/class/power_supply)
/// - `DATABASE_URL` – SQLite URL for battery logs (default: disabled)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let bind_addr = parse_env!("BIND_ADDR", SocketAddr, SocketAddr::from(([0, 0, 0, 0], 5000)));
    let serial_port = optional_env!("SERIAL_PORT");
    let baud_rate = parse_env!("SERIAL_BAUD", u32, 115_200);
    let serial_timeout = Duration::from_millis(parse_env!("SERIAL_TIMEOUT_MS", u64, 1000));
    let settle_delay = Duration::from_millis(parse_env!("SERIAL_SETTLE_MS", u64, 2000));

    let initial_mode = match optional_env!("CONTROL_MODE") {
        Some(m) => m.parse::<Mode>().map_err(|e| anyhow!("Invalid CONTROL_MODE: {}", e))?,
        None => Mode::Manual,
    };

    let thresholds = Thresholds {
        low: parse_env!("LOW_THRESHOLD", f64, 20.0),
        high: parse_env!("HIGH_THRESHOLD", f64, 80.0),
        interval: parse_env!("CHECK_INTERVAL", f64, 5.0),
    };
    validate_update(&ThresholdUpdate {
        low: Some(thresholds.low),
        high: Some(thresholds.high),
        interval: Some(thresholds.interval),
    })
    .map_err(|e| anyhow!("Invalid threshold configuration: {}", e))?;

    let device_poll = Duration::from_millis(parse_env!("DEVICE_POLL_MS", u64, 500).max(10));
    let response_wait = Duration::from_millis(parse_env!("RESPONSE_WAIT_MS", u64, 200));
    let battery_root = optional_env!("BATTERY_SYSFS_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/sys/class/power_supply"));
    let db_url = optional_env!("DATABASE_URL");

    Ok(Config {
        bind_addr,
        serial_port,
        baud_rate,
        serial_timeout,
        settle_delay,
        initial_mode,
        thresholds,
        device_poll,
        response_wait,
        battery_root,
        db_url,
    })
}

impl Config {
    // ---
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            baud_rate: self.baud_rate,
            timeout: self.serial_timeout,
            settle: self.settle_delay,
        }
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks any password embedded in the database URL.
    pub fn log_config(&self) {
        // ---
        let masked_db_url = self.db_url.as_deref().map(mask_password);

        tracing::info!("Configuration loaded:");
        tracing::info!("  BIND_ADDR          : {}", self.bind_addr);
        tracing::info!(
            "  SERIAL_PORT        : {}",
            self.serial_port.as_deref().unwrap_or("(auto-detect)")
        );
        tracing::info!("  SERIAL_BAUD        : {}", self.baud_rate);
        tracing::info!("  SERIAL_TIMEOUT_MS  : {}", self.serial_timeout.as_millis());
        tracing::info!("  SERIAL_SETTLE_MS   : {}", self.settle_delay.as_millis());
        tracing::info!("  CONTROL_MODE       : {}", self.initial_mode);
        tracing::info!("  LOW_THRESHOLD      : {}", self.thresholds.low);
        tracing::info!("  HIGH_THRESHOLD     : {}", self.thresholds.high);
        tracing::info!("  CHECK_INTERVAL     : {}", self.thresholds.interval);
        tracing::info!("  DEVICE_POLL_MS     : {}", self.device_poll.as_millis());
        tracing::info!("  RESPONSE_WAIT_MS   : {}", self.response_wait.as_millis());
        tracing::info!("  BATTERY_SYSFS_ROOT : {}", self.battery_root.display());
        tracing::info!(
            "  DATABASE_URL       : {}",
            masked_db_url.as_deref().unwrap_or("(disabled)")
        );
    }
}

fn mask_password(url: &str) -> String {
    // ---
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
