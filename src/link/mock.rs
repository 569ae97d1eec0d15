//! In-memory connector standing in for the charger during tests.
//!
//! Every port opened through a [`MockConnector`] shares one [`MockWire`], so a
//! test can inspect the bytes written and inject device output.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{Connector, LinkSettings, PortInfo, Transport};
use crate::error::LinkError;

// ---

#[derive(Default)]
struct WireState {
    written: Vec<u8>,
    inbound: Vec<u8>,
    opened: Vec<String>,
    replies: Vec<(String, String)>,
    fail_open: bool,
    fail_writes: bool,
}

/// Shared handle onto the mock device's wire.
#[derive(Clone, Default)]
pub struct MockWire {
    state: Arc<Mutex<WireState>>,
}

impl MockWire {
    // ---
    fn lock(&self) -> MutexGuard<'_, WireState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn raw_written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Commands written so far, one per newline-terminated frame.
    pub fn commands(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.lock().written)
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    /// Queue bytes as if the device had sent them.
    pub fn push_inbound(&self, data: &str) {
        self.lock().inbound.extend_from_slice(data.as_bytes());
    }

    /// Queue `reply` as device output whenever `command` is written.
    pub fn respond_to(&self, command: &str, reply: &str) {
        self.lock()
            .replies
            .push((command.to_string(), reply.to_string()));
    }

    pub fn opened(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

struct MockTransport {
    wire: MockWire,
}

impl Transport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        // ---
        let mut state = self.wire.lock();
        if state.fail_writes {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            ));
        }
        state.written.extend_from_slice(bytes);

        let frame = String::from_utf8_lossy(bytes);
        let command = frame.trim_end();
        let replies: Vec<String> = state
            .replies
            .iter()
            .filter(|(cmd, _)| cmd == command)
            .map(|(_, reply)| reply.clone())
            .collect();
        for reply in replies {
            state.inbound.extend_from_slice(reply.as_bytes());
        }
        Ok(())
    }

    fn read_available(&mut self, out: &mut Vec<u8>) -> std::io::Result<()> {
        out.append(&mut self.wire.lock().inbound);
        Ok(())
    }
}

/// Connector whose ports all lead to the same [`MockWire`].
pub struct MockConnector {
    ports: Vec<PortInfo>,
    wire: MockWire,
}

impl MockConnector {
    // ---
    pub fn new() -> Self {
        Self::with_ports(vec![PortInfo {
            name: "/dev/ttyMOCK0".to_string(),
            description: "Arduino Mock".to_string(),
        }])
    }

    pub fn with_ports(ports: Vec<PortInfo>) -> Self {
        Self {
            ports,
            wire: MockWire::default(),
        }
    }

    pub fn wire(&self) -> MockWire {
        self.wire.clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockConnector {
    fn list_ports(&self) -> Vec<PortInfo> {
        self.ports.clone()
    }

    fn open(&self, port: &str, _settings: &LinkSettings) -> Result<Box<dyn Transport>, LinkError> {
        // ---
        let mut state = self.wire.lock();
        if state.fail_open {
            return Err(LinkError::Open {
                port: port.to_string(),
                reason: "port busy".to_string(),
            });
        }
        state.opened.push(port.to_string());
        state.inbound.clear();
        drop(state);

        Ok(Box::new(MockTransport {
            wire: self.wire.clone(),
        }))
    }
}
