//! Device feed: drains the serial link and sorts what the charger says.
//!
//! The firmware interleaves JSON telemetry with free-text replies to commands.
//! Telemetry becomes the latest [`DeviceReading`] (and a row in the logging
//! sink when one is configured); everything else is queued until a manual
//! command collects it.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::{error::LinkError, link::SerialLink, models::DeviceReading};

// ---

const RESPONSE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct ReceivedReading {
    #[serde(flatten)]
    pub reading: DeviceReading,
    pub received_at: DateTime<Utc>,
}

pub struct DeviceFeed {
    link: Arc<SerialLink>,
    pool: Option<SqlitePool>,
    latest: Mutex<Option<ReceivedReading>>,
    responses: Mutex<VecDeque<String>>,
    /// Held for a whole command exchange so replies are not split between callers.
    exchange_gate: Mutex<()>,
}

fn parse_telemetry(line: &str) -> Option<DeviceReading> {
    if !line.starts_with('{') {
        return None;
    }
    serde_json::from_str(line).ok()
}

impl DeviceFeed {
    // ---
    pub fn new(link: Arc<SerialLink>, pool: Option<SqlitePool>) -> Self {
        Self {
            link,
            pool,
            latest: Mutex::new(None),
            responses: Mutex::new(VecDeque::with_capacity(RESPONSE_CAPACITY)),
            exchange_gate: Mutex::new(()),
        }
    }

    /// Drain the link once and classify every complete line.
    ///
    /// Returns the number of lines consumed.
    pub async fn pump(&self) -> Result<usize, LinkError> {
        // ---
        let lines = self.link.drain_lines().await?;
        let count = lines.len();

        for line in lines {
            match parse_telemetry(&line) {
                Some(reading) => self.accept_reading(reading).await,
                None => {
                    debug!(line = %line, "<<");
                    let mut responses = self.responses.lock().await;
                    if responses.len() == RESPONSE_CAPACITY {
                        responses.pop_front();
                    }
                    responses.push_back(line);
                }
            }
        }
        Ok(count)
    }

    async fn accept_reading(&self, reading: DeviceReading) {
        // ---
        if let Some(pool) = &self.pool {
            if let Err(e) = store_reading(pool, &reading).await {
                warn!(error = %e, "Failed to store battery reading");
            }
        }

        *self.latest.lock().await = Some(ReceivedReading {
            reading,
            received_at: Utc::now(),
        });
    }

    /// Take and clear all queued device responses, oldest first.
    pub async fn take_responses(&self) -> Vec<String> {
        self.responses.lock().await.drain(..).collect()
    }

    /// Send `command`, wait `wait`, and return the replies that arrived.
    ///
    /// Exchanges run one at a time. Replies still queued from earlier traffic
    /// are discarded before the command goes out.
    pub async fn exchange(&self, command: &str, wait: Duration) -> Result<Vec<String>, LinkError> {
        // ---
        let _gate = self.exchange_gate.lock().await;

        if self.pump().await.is_ok() {
            let stale = self.take_responses().await;
            if !stale.is_empty() {
                debug!(count = stale.len(), "Discarding stale device responses");
            }
        }

        self.link.send(command).await?;

        tokio::time::sleep(wait).await;
        if let Err(e) = self.pump().await {
            warn!(error = %e, "Error reading serial");
        }
        Ok(self.take_responses().await)
    }

    pub async fn latest(&self) -> Option<ReceivedReading> {
        self.latest.lock().await.clone()
    }

    /// Pump the link every `period` until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        // ---
        info!(period_ms = period.as_millis() as u64, "Device reader started");
        let mut failing = false;

        loop {
            match self.pump().await {
                Ok(_) => failing = false,
                Err(e) if !failing => {
                    warn!(error = %e, "Error reading serial");
                    failing = true;
                }
                Err(_) => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
        }
        info!("Device reader stopped");
    }
}

/// Append one telemetry tuple to `battery_logs`.
async fn store_reading(pool: &SqlitePool, reading: &DeviceReading) -> Result<(), sqlx::Error> {
    // ---
    sqlx::query(
        r#"
        INSERT INTO battery_logs (percentage, voltage, temperature)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(reading.percentage)
    .bind(reading.voltage)
    .bind(reading.temperature)
    .execute(pool)
    .await?;

    Ok(())
}
