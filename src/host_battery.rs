//! Host battery sensor.
//!
//! Reads the Linux power-supply class (`/sys/class/power_supply`). Each supply
//! is a directory of small text attributes; batteries have `type == Battery`
//! and mains adapters have `type == Mains`.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::trace;

use crate::models::{LocalBattery, SECS_CHARGING, SECS_UNKNOWN};

// ---

/// Source of the host's own battery reading.
pub trait HostBattery: Send + Sync {
    /// `None` when no battery is present.
    fn read(&self) -> Option<LocalBattery>;

    /// Best-effort wear estimate, informational only.
    fn health_percent(&self) -> Option<f64>;
}

/// Battery sensor backed by the sysfs power-supply class.
#[derive(Debug, Clone)]
pub struct SysfsBattery {
    root: PathBuf,
}

impl SysfsBattery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn supplies(&self, kind: &str) -> Vec<PathBuf> {
        // ---
        let Ok(entries) = fs::read_dir(&self.root) else {
            trace!(root = %self.root.display(), "power_supply root not readable");
            return Vec::new();
        };

        let mut found: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| read_attr(p, "type").as_deref() == Some(kind))
            .collect();
        found.sort();
        found
    }

    fn battery_dir(&self) -> Option<PathBuf> {
        self.supplies("Battery").into_iter().next()
    }

    fn mains_online(&self) -> bool {
        self.supplies("Mains")
            .iter()
            .any(|p| read_attr(p, "online").as_deref() == Some("1"))
    }
}

impl HostBattery for SysfsBattery {
    fn read(&self) -> Option<LocalBattery> {
        // ---
        let dir = self.battery_dir()?;
        let percentage = read_num(&dir, "capacity")?.clamp(0.0, 100.0);
        let status = read_attr(&dir, "status").unwrap_or_default();

        let charging = status == "Charging";
        let plugged_in = charging || status == "Full" || self.mains_online();

        let seconds_remaining = if charging {
            SECS_CHARGING
        } else if plugged_in {
            SECS_UNKNOWN
        } else {
            seconds_to_empty(&dir).unwrap_or(SECS_UNKNOWN)
        };

        Some(LocalBattery {
            percentage,
            plugged_in,
            seconds_remaining,
        })
    }

    fn health_percent(&self) -> Option<f64> {
        // ---
        let dir = self.battery_dir()?;
        let ratio = |full: &str, design: &str| {
            let full = read_num(&dir, full)?;
            let design = read_num(&dir, design)?;
            (design > 0.0).then(|| full / design * 100.0)
        };

        ratio("energy_full", "energy_full_design")
            .or_else(|| ratio("charge_full", "charge_full_design"))
            .map(|h| h.clamp(0.0, 100.0))
    }
}

/// Time to empty from either energy/power or charge/current counters.
fn seconds_to_empty(dir: &Path) -> Option<i64> {
    // ---
    let pairs = [("energy_now", "power_now"), ("charge_now", "current_now")];
    pairs.iter().find_map(|(stock, rate)| {
        let stock = read_num(dir, stock)?;
        let rate = read_num(dir, rate)?.abs();
        (rate > 0.0).then(|| (stock / rate * 3600.0) as i64)
    })
}

fn read_attr(dir: &Path, name: &str) -> Option<String> {
    fs::read_to_string(dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
}

fn read_num(dir: &Path, name: &str) -> Option<f64> {
    read_attr(dir, name)?.parse().ok()
}
