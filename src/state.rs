//! Mode, relay memory and thresholds shared by the facade and the loop.
//!
//! Every accessor takes the lock for exactly one read or write; callers never
//! hold a snapshot across a tick.

use tokio::sync::Mutex;

use crate::{
    error::{ControlError, Result},
    models::{Mode, RelayState, ThresholdUpdate, Thresholds},
    registry::validate_percentage,
};

// ---

/// Smallest accepted poll interval, in seconds.
pub const MIN_INTERVAL_SECS: f64 = 1.0;

struct Inner {
    mode: Mode,
    relay: RelayState,
    thresholds: Thresholds,
}

pub struct ControlState {
    inner: Mutex<Inner>,
}

/// Validate a partial update without applying it.
pub fn validate_update(update: &ThresholdUpdate) -> Result<()> {
    // ---
    if let Some(low) = update.low {
        validate_percentage("low_threshold", low)?;
    }
    if let Some(high) = update.high {
        validate_percentage("high_threshold", high)?;
    }
    if let Some(interval) = update.interval {
        if !interval.is_finite() || interval < MIN_INTERVAL_SECS {
            return Err(ControlError::validation(format!(
                "check_interval must be at least {MIN_INTERVAL_SECS} second, got {interval}"
            )));
        }
    }
    Ok(())
}

impl ControlState {
    // ---
    pub fn new(mode: Mode, thresholds: Thresholds) -> Self {
        Self {
            inner: Mutex::new(Inner {
                mode,
                relay: RelayState::Unknown,
                thresholds,
            }),
        }
    }

    pub async fn mode(&self) -> Mode {
        self.inner.lock().await.mode
    }

    /// Store the new mode and return the previous one.
    ///
    /// Entering MANUAL drops the loop's relay memory.
    pub async fn replace_mode(&self, mode: Mode) -> Mode {
        // ---
        let mut inner = self.inner.lock().await;
        let previous = std::mem::replace(&mut inner.mode, mode);
        if mode == Mode::Manual {
            inner.relay = RelayState::Unknown;
        }
        previous
    }

    pub async fn relay(&self) -> RelayState {
        self.inner.lock().await.relay
    }

    pub async fn set_relay(&self, relay: RelayState) {
        self.inner.lock().await.relay = relay;
    }

    /// Store relay memory only while the mode is still AUTO.
    ///
    /// Returns false, leaving memory untouched, if the mode changed since the
    /// caller last looked.
    pub async fn set_relay_if_auto(&self, relay: RelayState) -> bool {
        // ---
        let mut inner = self.inner.lock().await;
        if inner.mode != Mode::Auto {
            return false;
        }
        inner.relay = relay;
        true
    }

    /// Forget the relay memory. Returns true if it was not already unknown.
    pub async fn forget_relay(&self) -> bool {
        // ---
        let mut inner = self.inner.lock().await;
        let changed = inner.relay != RelayState::Unknown;
        inner.relay = RelayState::Unknown;
        changed
    }

    pub async fn thresholds(&self) -> Thresholds {
        self.inner.lock().await.thresholds
    }

    /// Apply a partial update. Nothing changes if any provided field is invalid.
    pub async fn update_thresholds(&self, update: ThresholdUpdate) -> Result<Thresholds> {
        // ---
        validate_update(&update)?;

        let mut inner = self.inner.lock().await;
        let t = &mut inner.thresholds;
        if let Some(low) = update.low {
            t.low = low;
        }
        if let Some(high) = update.high {
            t.high = high;
        }
        if let Some(interval) = update.interval {
            t.interval = interval;
        }
        Ok(*t)
    }
}
