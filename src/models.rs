//! Data models shared by the controller, the registry and the HTTP routes.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ControlError;

// ---

/// Seconds-remaining marker reported while the host is charging.
pub const SECS_CHARGING: i64 = -2;

/// Seconds-remaining marker reported when the host cannot estimate runtime.
pub const SECS_UNKNOWN: i64 = -1;

/// Operating mode of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Manual,
    Auto,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Manual => "MANUAL",
            Mode::Auto => "AUTO",
        }
    }

    /// Informational command announcing this mode to the device.
    pub fn command(&self) -> String {
        format!("MODE:{}", self.as_str())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_uppercase().as_str() {
            "MANUAL" => Ok(Mode::Manual),
            "AUTO" => Ok(Mode::Auto),
            other => Err(ControlError::validation(format!(
                "invalid mode '{other}', expected MANUAL or AUTO"
            ))),
        }
    }
}

/// The loop's memory of the last relay command it issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayState {
    On,
    Off,
    Unknown,
}

impl RelayState {
    /// Wire command that drives the relay into this state.
    pub fn command(&self) -> Option<&'static str> {
        match self {
            RelayState::On => Some("ON"),
            RelayState::Off => Some("OFF"),
            RelayState::Unknown => None,
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelayState::On => "ON",
            RelayState::Off => "OFF",
            RelayState::Unknown => "UNKNOWN",
        })
    }
}

/// Hysteresis thresholds and the poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    // ---
    #[serde(rename = "low_threshold")]
    pub low: f64,
    #[serde(rename = "high_threshold")]
    pub high: f64,
    /// Poll interval in seconds.
    #[serde(rename = "check_interval")]
    pub interval: f64,
}

/// Partial update of [`Thresholds`]; absent fields stay unchanged.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ThresholdUpdate {
    #[serde(rename = "low_threshold")]
    pub low: Option<f64>,
    #[serde(rename = "high_threshold")]
    pub high: Option<f64>,
    #[serde(rename = "check_interval")]
    pub interval: Option<f64>,
}

/// A battery reading pushed by an external device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSource {
    // ---
    pub name: String,
    pub percentage: f64,
    pub device_type: String,
    pub updated_at: DateTime<Utc>,
}

/// Which reading the controller treats as authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveSource {
    #[default]
    Local,
    Named(String),
}

impl ActiveSource {
    pub fn name(&self) -> Option<&str> {
        match self {
            ActiveSource::Local => None,
            ActiveSource::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for ActiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveSource::Local => f.write_str("local"),
            ActiveSource::Named(name) => f.write_str(name),
        }
    }
}

/// Snapshot of the host's own battery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalBattery {
    pub percentage: f64,
    pub plugged_in: bool,
    /// Positive: time to empty. [`SECS_CHARGING`] or [`SECS_UNKNOWN`] otherwise.
    pub seconds_remaining: i64,
}

impl LocalBattery {
    pub fn time_left(&self) -> TimeLeft {
        TimeLeft::from_secs(self.seconds_remaining)
    }
}

/// Remaining runtime, with charging and unknown kept apart from a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLeft {
    Charging,
    Unknown,
    Seconds(u64),
}

impl TimeLeft {
    pub fn from_secs(secs: i64) -> Self {
        // ---
        match secs {
            SECS_CHARGING => TimeLeft::Charging,
            s if s > 0 => TimeLeft::Seconds(s as u64),
            _ => TimeLeft::Unknown,
        }
    }
}

impl fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            TimeLeft::Charging => f.write_str("charging"),
            TimeLeft::Unknown => f.write_str("unknown"),
            TimeLeft::Seconds(secs) => {
                let hours = secs / 3600;
                let minutes = (secs % 3600) / 60;
                if hours > 0 {
                    write!(f, "{hours}h {minutes}m")
                } else {
                    write!(f, "{minutes}m")
                }
            }
        }
    }
}

/// Telemetry line emitted by the charger firmware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReading {
    // ---
    pub percentage: f64,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub is_charging: Option<bool>,
    #[serde(default)]
    pub ssr_status: Option<bool>,
    #[serde(default)]
    pub auto_charge: Option<bool>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_mode_parsing_is_case_normalized() {
        // ---
        assert_eq!("auto".parse::<Mode>().unwrap(), Mode::Auto);
        assert_eq!(" Manual ".parse::<Mode>().unwrap(), Mode::Manual);
        assert!("AUTOMATIC".parse::<Mode>().is_err());
        assert!("".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_command() {
        // ---
        assert_eq!(Mode::Auto.command(), "MODE:AUTO");
        assert_eq!(Mode::Manual.command(), "MODE:MANUAL");
    }

    #[test]
    fn test_time_left_rendering() {
        // ---
        assert_eq!(TimeLeft::from_secs(SECS_CHARGING).to_string(), "charging");
        assert_eq!(TimeLeft::from_secs(SECS_UNKNOWN).to_string(), "unknown");
        assert_eq!(TimeLeft::from_secs(0).to_string(), "unknown");
        assert_eq!(TimeLeft::from_secs(5_400).to_string(), "1h 30m");
        assert_eq!(TimeLeft::from_secs(600).to_string(), "10m");
    }

    #[test]
    fn test_device_reading_from_firmware_json() {
        // ---
        let line = r#"{"percentage":73,"voltage":3.98,"temperature":31.5,"isCharging":true,"ssrStatus":true,"autoCharge":false}"#;
        let reading: DeviceReading = serde_json::from_str(line).unwrap();

        assert_eq!(reading.percentage, 73.0);
        assert_eq!(reading.voltage, Some(3.98));
        assert_eq!(reading.is_charging, Some(true));
        assert_eq!(reading.auto_charge, Some(false));
    }

    #[test]
    fn test_thresholds_serialize_with_wire_names() {
        // ---
        let t = Thresholds {
            low: 20.0,
            high: 80.0,
            interval: 5.0,
        };
        let value = serde_json::to_value(t).unwrap();
        assert_eq!(value["low_threshold"], 20.0);
        assert_eq!(value["high_threshold"], 80.0);
        assert_eq!(value["check_interval"], 5.0);
    }
}
