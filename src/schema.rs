//! Database schema management for the battery logging sink.
//!
//! Ensures the `battery_logs` table exists before the reader task writes to it.
//! Applied once on startup from `main.rs`, and only when `DATABASE_URL` is set.

use anyhow::Result;
use sqlx::SqlitePool;

// ---

/// Create the logging table (idempotent).
///
/// Safe to call on every startup; no-op if the objects already exist.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // One row per telemetry line received from the charger
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS battery_logs (
            id          INTEGER PRIMARY KEY,
            timestamp   DATETIME DEFAULT CURRENT_TIMESTAMP,
            percentage  REAL,
            voltage     REAL,
            temperature REAL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_battery_logs_timestamp
            ON battery_logs (timestamp);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
