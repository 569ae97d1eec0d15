//! Application entry point for the `ssr-charger` service.
//!
//! This binary orchestrates the full startup sequence for the charging
//! controller, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the optional SQLite logging sink and creating its schema
//! - Connecting the serial link (explicit port or auto-discovery)
//! - Spawning the hysteresis controller loop and the device reader task
//! - Binding the Axum HTTP server and serving requests until Ctrl-C
//!
//! # Environment Variables
//! See [`ssr_charger::config::load_from_env`] for the full list.
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! A missing serial device is not fatal: the service starts disconnected
//! and the operator can connect later through `POST /api/serial/connect`.
use std::{env, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use ssr_charger::{config, routes, schema, AppState, SerialConnector, SerialLink, SysfsBattery};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = match &cfg.db_url {
        Some(url) => {
            tracing::info!("Opening battery log database");
            let options = url
                .parse::<SqliteConnectOptions>()
                .map_err(|e| anyhow::anyhow!("Invalid DATABASE_URL: {}", e))?
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(2)
                .connect_with(options)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
            schema::create_schema(&pool).await?;
            Some(pool)
        }
        None => None,
    };

    let link = Arc::new(SerialLink::new(SerialConnector, cfg.link_settings()));
    if let Err(e) = link.connect(cfg.serial_port.as_deref()).await {
        tracing::warn!("Serial not connected at startup: {}", e);
    }

    let host = Arc::new(SysfsBattery::new(&cfg.battery_root));
    let state = AppState::new(
        link.clone(),
        host,
        pool,
        cfg.initial_mode,
        cfg.thresholds,
        cfg.response_wait,
    );
    if link.is_connected().await {
        state.controller.set_mode(cfg.initial_mode).await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_task = tokio::spawn(state.controller.clone().run(shutdown_rx.clone()));
    let reader_task = tokio::spawn(state.feed.clone().run(cfg.device_poll, shutdown_rx));

    let app: Router = routes::router(state);

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    shutdown_tx.send(true).ok();
    let _ = tokio::join!(controller_task, reader_task);
    link.disconnect().await;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `AXUM_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: no span events (the controller ticks every few
///     seconds and CLOSE events would drown the tick log)
/// - Log level controlled by the `AXUM_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::NONE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to AXUM_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("AXUM_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
