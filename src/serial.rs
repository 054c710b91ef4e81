// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::io::{self, Read, Write};
use std::time::Duration;
use serialport::{SerialPort as SerialPortTrait, DataBits, FlowControl, Parity, StopBits};

/// Read and write timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Transport Traits
// ============================================================================

/// Byte-stream link to the peer. Dropping the transport closes it.
pub trait Transport: Send {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Reads one byte, failing with `ErrorKind::TimedOut` once `timeout` elapses.
    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8>;
}

/// Opens a fresh transport for one transfer
pub trait Connector {
    fn connect(&self) -> io::Result<Box<dyn Transport>>;

    /// How long to wait for the acknowledgment of a frame
    fn read_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}

// ============================================================================
// Port Settings
// ============================================================================

/// Serial line configuration for [`RealSerialPort`]
#[derive(Debug, Clone)]
pub struct PortSettings {
    pub path: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl PortSettings {
    /// 8N1 with the default timeouts
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        PortSettings {
            path: path.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Connector for PortSettings {
    fn connect(&self) -> io::Result<Box<dyn Transport>> {
        let port = RealSerialPort::open(self).map_err(io::Error::from)?;
        Ok(Box::new(port))
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Serial port backed by the serialport crate
pub struct RealSerialPort {
    port: Box<dyn SerialPortTrait>,
    write_timeout: Duration,
}

impl RealSerialPort {
    pub fn open(settings: &PortSettings) -> Result<Self, serialport::Error> {
        let port = serialport::new(&settings.path, settings.baud_rate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits)
            .flow_control(FlowControl::None)
            .timeout(settings.write_timeout)
            .open()?;

        Ok(RealSerialPort { port, write_timeout: settings.write_timeout })
    }
}

impl Transport for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // serialport keeps one timeout for both directions
        self.port.set_timeout(self.write_timeout).map_err(io::Error::from)?;
        self.port.write_all(buf)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8> {
        self.port.set_timeout(timeout).map_err(io::Error::from)?;

        let mut buf = [0u8; 1];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::TimedOut, "no acknowledgment received")),
                Ok(_) => return Ok(buf[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// Mock Serial Port for Testing
// ============================================================================

#[cfg(test)]
pub struct MockSerialPort {
    // Ack bytes to return on reads (None = timeout)
    responses: Vec<Option<u8>>,
    read_pos: usize,
    // One entry per write_all call
    write_log: Vec<Vec<u8>>,
    expected_writes: Vec<Vec<u8>>,
    closed: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl MockSerialPort {
    pub fn new(responses: Vec<Option<u8>>, expected_writes: Vec<Vec<u8>>) -> Self {
        MockSerialPort {
            responses,
            read_pos: 0,
            write_log: Vec::new(),
            expected_writes,
            closed: Default::default(),
        }
    }

    /// Flag raised when the port is dropped
    pub fn closed_flag(&self) -> std::sync::Arc<std::sync::atomic::AtomicBool> {
        self.closed.clone()
    }
}

#[cfg(test)]
impl Transport for MockSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_log.push(buf.to_vec());
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<u8> {
        let response = self.responses.get(self.read_pos).copied().flatten();
        if self.read_pos < self.responses.len() {
            self.read_pos += 1;
        }

        response.ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "Mock timeout"))
    }
}

#[cfg(test)]
impl Drop for MockSerialPort {
    fn drop(&mut self) {
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);

        if std::thread::panicking() {
            return;
        }

        assert_eq!(
            self.read_pos,
            self.responses.len(),
            "MockSerialPort dropped with {} unconsumed responses",
            self.responses.len() - self.read_pos
        );

        assert_eq!(
            self.write_log.len(),
            self.expected_writes.len(),
            "MockSerialPort write count mismatch!\nExpected {} frames, got {}",
            self.expected_writes.len(),
            self.write_log.len()
        );

        for (i, (got, expected)) in self.write_log.iter().zip(&self.expected_writes).enumerate() {
            assert_eq!(
                got, expected,
                "MockSerialPort frame {} mismatch!\nExpected {} bytes:\n{:02X?}\nGot {} bytes:\n{:02X?}",
                i, expected.len(), expected, got.len(), got
            );
        }
    }
}

/// Hands out a single prepared [`MockSerialPort`]
#[cfg(test)]
pub struct MockConnector {
    port: std::sync::Mutex<Option<MockSerialPort>>,
}

#[cfg(test)]
impl MockConnector {
    pub fn new(port: MockSerialPort) -> Self {
        MockConnector { port: std::sync::Mutex::new(Some(port)) }
    }
}

#[cfg(test)]
impl Connector for MockConnector {
    fn connect(&self) -> io::Result<Box<dyn Transport>> {
        let port = self.port.lock().unwrap().take();
        port.map(|p| Box::new(p) as Box<dyn Transport>)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Mock port already taken"))
    }
}

/// Connector for transfers that must fail before any port I/O
#[cfg(test)]
pub struct NoPortConnector;

#[cfg(test)]
impl Connector for NoPortConnector {
    fn connect(&self) -> io::Result<Box<dyn Transport>> {
        panic!("transport opened for a transfer that should have been rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_timeout_marker() {
        let mut port = MockSerialPort::new(vec![Some(0), None], vec![b"abc".to_vec()]);
        port.write_all(b"abc").unwrap();
        assert_eq!(port.read_byte(DEFAULT_TIMEOUT).unwrap(), 0);
        let err = port.read_byte(DEFAULT_TIMEOUT).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_port_settings_defaults() {
        let settings = PortSettings::new("/dev/ttyUSB0", 9600);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.read_timeout, DEFAULT_TIMEOUT);
        assert_eq!(settings.write_timeout, DEFAULT_TIMEOUT);
    }
}
