//! Hysteresis charging controller.
//!
//! Owns the mode switch and the background loop that turns the relay ON when
//! the authoritative battery percentage falls to the low threshold and OFF when
//! it reaches the high threshold. Between the two thresholds nothing is sent.
//!
//! Relay memory is the loop's own record of its last command; the device is
//! never asked to confirm it.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{ControlError, Result},
    events::{EventKind, EventLog},
    link::SerialLink,
    models::{Mode, RelayState, ThresholdUpdate, Thresholds},
    registry::SourceRegistry,
    state::ControlState,
};

// ---

/// Relay command warranted by `percentage`, if any.
///
/// The ON check runs first, so it wins when `low >= high`.
pub fn decide(percentage: f64, thresholds: &Thresholds, relay: RelayState) -> Option<RelayState> {
    // ---
    if percentage <= thresholds.low && relay != RelayState::On {
        Some(RelayState::On)
    } else if percentage >= thresholds.high && relay != RelayState::Off {
        Some(RelayState::Off)
    } else {
        None
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// MANUAL mode; `forgot` is true if relay memory was cleared this tick.
    Manual { forgot: bool },
    /// No usable percentage this tick.
    Unavailable,
    /// Inside the hysteresis band, or already in the wanted state.
    Held { percentage: f64 },
    Switched { percentage: f64, relay: RelayState },
    /// The command could not be written; memory is unchanged.
    SendFailed { percentage: f64, relay: RelayState },
}

/// Result of a mode switch. The switch itself always succeeds.
#[derive(Debug, Clone, Serialize)]
pub struct ModeSwitch {
    pub mode: Mode,
    pub previous: Mode,
    /// Whether every command announcing the switch reached the link.
    pub link_ok: bool,
}

pub struct ChargeController {
    state: Arc<ControlState>,
    registry: Arc<SourceRegistry>,
    link: Arc<SerialLink>,
    events: Arc<EventLog>,
}

impl ChargeController {
    // ---
    pub fn new(
        state: Arc<ControlState>,
        registry: Arc<SourceRegistry>,
        link: Arc<SerialLink>,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            state,
            registry,
            link,
            events,
        }
    }

    pub fn state(&self) -> &Arc<ControlState> {
        &self.state
    }

    pub async fn mode(&self) -> Mode {
        self.state.mode().await
    }

    pub async fn relay(&self) -> RelayState {
        self.state.relay().await
    }

    pub async fn thresholds(&self) -> Thresholds {
        self.state.thresholds().await
    }

    pub async fn set_thresholds(&self, update: ThresholdUpdate) -> Result<Thresholds> {
        // ---
        let t = self.state.update_thresholds(update).await?;
        info!(low = t.low, high = t.high, interval = t.interval, "Thresholds updated");
        self.events
            .record(
                EventKind::Info,
                "thresholds",
                format!("low={} high={} interval={}s", t.low, t.high, t.interval),
            )
            .await;
        Ok(t)
    }

    /// Switch mode.
    ///
    /// Entering AUTO energizes the relay straight away without touching relay
    /// memory, so the next tick still evaluates the real thresholds. Every
    /// switch announces the mode to the device. Link failures are logged but
    /// do not fail the switch.
    pub async fn set_mode(&self, mode: Mode) -> ModeSwitch {
        // ---
        let previous = self.state.replace_mode(mode).await;
        let mut link_ok = true;

        if mode == Mode::Auto && previous != Mode::Auto {
            link_ok &= self.send_logged("ON").await;
        }
        link_ok &= self.send_logged(&mode.command()).await;

        info!(%previous, %mode, link_ok, "MODE SET");
        self.events
            .record(
                if link_ok { EventKind::Success } else { EventKind::Warning },
                "mode",
                format!("{previous} -> {mode}"),
            )
            .await;

        ModeSwitch {
            mode,
            previous,
            link_ok,
        }
    }

    async fn send_logged(&self, command: &str) -> bool {
        // ---
        match self.link.send(command).await {
            Ok(()) => true,
            Err(e) => {
                warn!(command, error = %e, "Command not delivered");
                false
            }
        }
    }

    /// Evaluate the controller once.
    #[instrument(level = "debug", skip(self))]
    pub async fn tick(&self) -> TickOutcome {
        // ---
        if self.state.mode().await == Mode::Manual {
            let forgot = self.state.forget_relay().await;
            if forgot {
                debug!("MANUAL mode, relay memory cleared");
            }
            return TickOutcome::Manual { forgot };
        }

        let percentage = match self.registry.resolve_active().await {
            Ok(p) => p,
            Err(e) => {
                self.report_unavailable(&e).await;
                return TickOutcome::Unavailable;
            }
        };

        let thresholds = self.state.thresholds().await;
        let relay = self.state.relay().await;
        debug!(percentage, relay = %relay, "[AUTO] tick");

        let Some(target) = decide(percentage, &thresholds, relay) else {
            return TickOutcome::Held { percentage };
        };
        let Some(command) = target.command() else {
            return TickOutcome::Held { percentage };
        };

        match self.link.send(command).await {
            Ok(()) => {
                if !self.state.set_relay_if_auto(target).await {
                    info!(relay = %target, "Mode left AUTO mid-tick, relay memory not stored");
                    return TickOutcome::Manual { forgot: false };
                }
                info!(percentage, low = thresholds.low, high = thresholds.high, relay = %target, "Relay switched");
                self.events
                    .record(
                        EventKind::Success,
                        "relay",
                        format!("battery {percentage}% -> CHARGE {target}"),
                    )
                    .await;
                TickOutcome::Switched {
                    percentage,
                    relay: target,
                }
            }
            Err(e) => {
                warn!(percentage, command, error = %e, "Relay command failed, will retry next tick");
                self.events
                    .record(EventKind::Error, "relay", format!("{command} failed: {e}"))
                    .await;
                TickOutcome::SendFailed {
                    percentage,
                    relay: target,
                }
            }
        }
    }

    async fn report_unavailable(&self, err: &ControlError) {
        // ---
        match err {
            ControlError::SensorUnavailable => warn!("Battery not detected, skipping tick"),
            other => warn!(error = %other, "Active source unavailable, skipping tick"),
        }
        self.events
            .record(EventKind::Warning, "sensor", err.to_string())
            .await;
    }

    /// Run ticks until `shutdown` flips to true.
    ///
    /// The interval is re-read after every tick, so threshold updates take
    /// effect on the following cycle.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        // ---
        info!("Charging controller started");

        loop {
            let outcome = self.tick().await;
            debug!(?outcome, "Tick complete");

            let interval = self.state.thresholds().await.interval;
            let pause = Duration::try_from_secs_f64(interval).unwrap_or(Duration::MAX);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }
        info!("Charging controller stopped");
    }
}
