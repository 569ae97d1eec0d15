//! `serialport`-backed connector for real hardware.

use std::io::{Read, Write};

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tracing::warn;

use super::{Connector, LinkSettings, PortInfo, Transport};
use crate::error::LinkError;

// ---

#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_available(&mut self, out: &mut Vec<u8>) -> std::io::Result<()> {
        // ---
        let waiting = self.port.bytes_to_read().map_err(std::io::Error::from)? as usize;
        if waiting == 0 {
            return Ok(());
        }

        let mut buf = vec![0u8; waiting];
        let n = self.port.read(&mut buf)?;
        out.extend_from_slice(&buf[..n]);
        Ok(())
    }
}

fn describe(info: &SerialPortInfo) -> String {
    // ---
    match &info.port_type {
        SerialPortType::UsbPort(usb) => [usb.product.as_deref(), usb.manufacturer.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => String::new(),
    }
}

impl Connector for SerialConnector {
    fn list_ports(&self) -> Vec<PortInfo> {
        // ---
        match serialport::available_ports() {
            Ok(ports) => ports
                .iter()
                .map(|p| PortInfo {
                    name: p.port_name.clone(),
                    description: describe(p),
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to enumerate serial ports");
                Vec::new()
            }
        }
    }

    fn open(&self, port: &str, settings: &LinkSettings) -> Result<Box<dyn Transport>, LinkError> {
        // ---
        let port_handle = serialport::new(port, settings.baud_rate)
            .timeout(settings.timeout)
            .open()
            .map_err(|e| LinkError::Open {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(SerialTransport { port: port_handle }))
    }
}
