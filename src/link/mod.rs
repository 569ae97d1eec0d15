//! Serial link to the charger microcontroller.
//!
//! The device speaks a newline-delimited ASCII protocol. The link owns at most
//! one open port, serializes every I/O operation behind a single async mutex,
//! and splits inbound bytes into whole lines, carrying partial data over to the
//! next drain.
//!
//! Port access goes through the [`Connector`] and [`Transport`] traits so the
//! same link logic drives a real `serialport` device or an in-memory mock.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::LinkError;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod serial;

pub use serial::SerialConnector;

// ---

/// Description substrings identifying the charger's USB bridge.
const VENDOR_SIGNATURES: [&str; 2] = ["arduino", "ch340"];

/// Longest unterminated line kept between drains, in bytes.
pub const MAX_LINE_LEN: usize = 4096;

/// An enumerated serial device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// Fixed open parameters for the link.
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub timeout: Duration,
    /// Time the device needs to reset after the port opens.
    pub settle: Duration,
}

/// An open byte stream to the device.
pub trait Transport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Append whatever is currently buffered to `out` without waiting.
    fn read_available(&mut self, out: &mut Vec<u8>) -> std::io::Result<()>;
}

/// Enumerates and opens ports.
pub trait Connector: Send + Sync {
    fn list_ports(&self) -> Vec<PortInfo>;

    fn open(&self, port: &str, settings: &LinkSettings) -> Result<Box<dyn Transport>, LinkError>;
}

/// Pick the preferred port: a known vendor signature first, else the first one.
pub fn pick_port(ports: &[PortInfo]) -> Option<String> {
    // ---
    ports
        .iter()
        .find(|p| {
            let desc = p.description.to_lowercase();
            VENDOR_SIGNATURES.iter().any(|sig| desc.contains(sig))
        })
        .or_else(|| ports.first())
        .map(|p| p.name.clone())
}

#[derive(Default)]
struct Inner {
    port: Option<String>,
    transport: Option<Box<dyn Transport>>,
    pending: Vec<u8>,
}

/// The single, exclusively owned connection to the device.
pub struct SerialLink {
    connector: Box<dyn Connector>,
    settings: LinkSettings,
    inner: Mutex<Inner>,
}

impl SerialLink {
    // ---
    pub fn new(connector: impl Connector + 'static, settings: LinkSettings) -> Self {
        Self {
            connector: Box::new(connector),
            settings,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn list_ports(&self) -> Vec<PortInfo> {
        self.connector.list_ports()
    }

    pub fn discover(&self) -> Option<String> {
        pick_port(&self.connector.list_ports())
    }

    /// Open `port` (or the discovered one), replacing any existing connection.
    ///
    /// Returns the name of the port that was opened once the settle delay has
    /// elapsed.
    pub async fn connect(&self, port: Option<&str>) -> Result<String, LinkError> {
        // ---
        let port = match port.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => {
                let found = self.discover().ok_or(LinkError::NoDevice)?;
                info!(port = %found, "Auto-detected serial port");
                found
            }
        };

        let mut inner = self.inner.lock().await;
        if let Some(old) = inner.port.take() {
            debug!(port = %old, "Closing previous serial connection");
        }
        inner.transport = None;
        inner.pending.clear();

        let transport = self.connector.open(&port, &self.settings)?;
        tokio::time::sleep(self.settings.settle).await;

        inner.transport = Some(transport);
        inner.port = Some(port.clone());
        info!(port = %port, baud = self.settings.baud_rate, "Serial connected");
        Ok(port)
    }

    pub async fn disconnect(&self) {
        // ---
        let mut inner = self.inner.lock().await;
        inner.transport = None;
        inner.pending.clear();
        if let Some(port) = inner.port.take() {
            info!(port = %port, "Serial disconnected");
        }
    }

    /// Write `command` followed by a newline. Never waits for a reply.
    pub async fn send(&self, command: &str) -> Result<(), LinkError> {
        // ---
        let mut inner = self.inner.lock().await;
        let transport = inner.transport.as_mut().ok_or(LinkError::NotConnected)?;

        let mut frame = Vec::with_capacity(command.len() + 1);
        frame.extend_from_slice(command.as_bytes());
        frame.push(b'\n');

        transport.write_all(&frame).map_err(|e| {
            warn!(command, error = %e, "Failed to send command");
            LinkError::Write(e)
        })?;
        debug!(command, "SENT");
        Ok(())
    }

    /// Return the complete lines buffered so far, keeping any partial line.
    pub async fn drain_lines(&self) -> Result<Vec<String>, LinkError> {
        // ---
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let Some(transport) = inner.transport.as_mut() else {
            return Ok(Vec::new());
        };

        transport
            .read_available(&mut inner.pending)
            .map_err(LinkError::Read)?;

        let lines = split_lines(&mut inner.pending);
        if inner.pending.len() > MAX_LINE_LEN {
            warn!(
                bytes = inner.pending.len(),
                "Discarding unterminated serial input"
            );
            inner.pending.clear();
        }
        Ok(lines)
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.transport.is_some()
    }

    pub async fn current_port(&self) -> Option<String> {
        self.inner.lock().await.port.clone()
    }
}

/// Remove every newline-terminated line from `buf`, leaving the tail in place.
fn split_lines(buf: &mut Vec<u8>) -> Vec<String> {
    // ---
    let Some(last_nl) = buf.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };

    let complete: Vec<u8> = buf.drain(..=last_nl).collect();
    complete
        .split(|&b| b == b'\n')
        .map(|line| String::from_utf8_lossy(line).trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
