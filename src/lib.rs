//! Battery-driven SSR charging controller.
//!
//! A host process that gates a charger's solid-state relay through a
//! microcontroller on a serial link. In AUTO mode a hysteresis loop switches the
//! relay from the authoritative battery percentage (the host's own battery or
//! a value pushed by a phone or power bank); in MANUAL mode the operator drives
//! it directly over HTTP.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): each
//! module exposes a narrow surface, re-exported here, and `routes` only talks to
//! the crate root.

use std::{sync::Arc, time::Duration};

use sqlx::SqlitePool;

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod feed;
pub mod host_battery;
pub mod link;
pub mod models;
pub mod registry;
pub mod routes;
pub mod schema;
pub mod state;

pub use config::Config;
pub use controller::{ChargeController, ModeSwitch, TickOutcome};
pub use error::{ControlError, LinkError};
pub use events::{EventKind, EventLog};
pub use feed::DeviceFeed;
pub use host_battery::{HostBattery, SysfsBattery};
pub use link::{pick_port, SerialConnector, SerialLink};
pub use models::{Mode, RelayState, Thresholds};
pub use registry::SourceRegistry;
pub use state::ControlState;

// ---

/// Everything the HTTP facade and the background tasks share.
#[derive(Clone)]
pub struct AppState {
    // ---
    pub controller: Arc<ChargeController>,
    pub registry: Arc<SourceRegistry>,
    pub link: Arc<SerialLink>,
    pub feed: Arc<DeviceFeed>,
    pub events: Arc<EventLog>,
    /// How long a manual command waits before collecting device replies.
    pub response_wait: Duration,
}

impl AppState {
    // ---
    pub fn new(
        link: Arc<SerialLink>,
        host: Arc<dyn HostBattery>,
        pool: Option<SqlitePool>,
        mode: Mode,
        thresholds: Thresholds,
        response_wait: Duration,
    ) -> Self {
        // ---
        let events = Arc::new(EventLog::default());
        let registry = Arc::new(SourceRegistry::new(host));
        let state = Arc::new(ControlState::new(mode, thresholds));
        let controller = Arc::new(ChargeController::new(
            state,
            registry.clone(),
            link.clone(),
            events.clone(),
        ));
        let feed = Arc::new(DeviceFeed::new(link.clone(), pool));

        Self {
            controller,
            registry,
            link,
            feed,
            events,
            response_wait,
        }
    }
}
