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

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use serialport::{FlowControl as PortFlowControl, SerialPort as SerialPortTrait};
use tracing::debug;
use crate::config::{HandshakeMode, TransportConfig};
use crate::error::TransportError;

// ============================================================================
// Transport Trait
// ============================================================================

/// Non-blocking byte channel to the device.
///
/// Neither direction may suspend the caller: the shell interleaves
/// draining received bytes with timed writes from a single loop.
pub trait Transport: Send {
    /// Read whatever is already buffered, returning 0 when nothing is available
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write as much as the driver accepts right now, returning 0 when it would block
    fn write_nonblocking(&mut self, buf: &[u8]) -> Result<usize, TransportError>;

    fn flush(&mut self) -> Result<(), TransportError>;

    /// Release the device; every later call fails with `TransportError::Closed`
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

fn would_block(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted)
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Serial transport backed by the serialport crate
pub struct SerialTransport {
    port: Option<Box<dyn SerialPortTrait>>,
}

impl SerialTransport {
    pub fn open(config: &TransportConfig) -> Result<Self, TransportError> {
        let flow_control = match config.handshake() {
            HandshakeMode::None => PortFlowControl::None,
            HandshakeMode::Hardware => PortFlowControl::Hardware,
            HandshakeMode::Software => PortFlowControl::Software,
        };

        let port = serialport::new(&config.port, config.baud)
            .data_bits(config.data_bits)
            .parity(config.parity)
            .stop_bits(config.stop_bits)
            .flow_control(flow_control)
            .timeout(Duration::ZERO)
            .open()
            .map_err(|source| TransportError::Open { port: config.port.clone(), source })?;

        debug!(port = %config.port, baud = config.baud, "serial port open");
        Ok(SerialTransport { port: Some(port) })
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPortTrait>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let port = self.port()?;
        let pending = port
            .bytes_to_read()
            .map_err(|e| TransportError::Io(e.into()))? as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let len = pending.min(buf.len());
        match port.read(&mut buf[..len]) {
            Ok(n) => Ok(n),
            Err(e) if would_block(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        match self.port()?.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if would_block(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        match self.port()?.flush() {
            Ok(()) => Ok(()),
            Err(e) if would_block(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("serial port closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.port.is_none()
    }
}

// ============================================================================
// Mock Serial Port for Testing
// ============================================================================

/// Scripted device. Incoming bytes become readable after a number of
/// read polls, which lets tests model a device that echoes late.
#[cfg(test)]
pub struct MockSerialPort {
    // (poll at which the byte becomes readable, byte)
    incoming: std::collections::VecDeque<(usize, u8)>,
    polls: usize,
    write_log: Vec<u8>,
    // Poll count at each accepted write
    write_polls: Vec<usize>,
    // (poll at which the byte was handed out, byte)
    read_log: Vec<(usize, u8)>,
    echo: bool,
    // Echo delays in read polls, applied cyclically per written byte
    echo_jitter: Vec<usize>,
    echo_idx: usize,
    // Sent back after every line terminator written
    line_reply: Vec<u8>,
    stalled_writes: usize,
    flushes: usize,
    closed: bool,
}

#[cfg(test)]
impl MockSerialPort {
    pub fn new() -> Self {
        MockSerialPort {
            incoming: std::collections::VecDeque::new(),
            polls: 0,
            write_log: Vec::new(),
            write_polls: Vec::new(),
            read_log: Vec::new(),
            echo: false,
            echo_jitter: vec![0],
            echo_idx: 0,
            line_reply: Vec::new(),
            stalled_writes: 0,
            flushes: 0,
            closed: false,
        }
    }

    /// Echo every written byte back, like the interpreter's console does
    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn with_echo_jitter(mut self, delays: Vec<usize>) -> Self {
        assert!(!delays.is_empty());
        self.echo = true;
        self.echo_jitter = delays;
        self
    }

    pub fn with_incoming(mut self, bytes: &[u8]) -> Self {
        self.push_incoming(bytes);
        self
    }

    pub fn replying_to_lines(mut self, reply: &[u8]) -> Self {
        self.line_reply = reply.to_vec();
        self
    }

    /// The next `count` writes are refused as if the driver buffer were full
    pub fn with_stalled_writes(mut self, count: usize) -> Self {
        self.stalled_writes = count;
        self
    }

    pub fn push_incoming(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.enqueue(0, b);
        }
    }

    pub fn written(&self) -> &[u8] {
        &self.write_log
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn write_polls(&self) -> &[usize] {
        &self.write_polls
    }

    pub fn read_log(&self) -> &[(usize, u8)] {
        &self.read_log
    }

    fn enqueue(&mut self, delay: usize, byte: u8) {
        // A serial line never reorders bytes, so a late byte holds back the rest
        let earliest = self.incoming.back().map_or(0, |&(at, _)| at);
        self.incoming.push_back(((self.polls + delay).max(earliest), byte));
    }
}

#[cfg(test)]
impl Transport for MockSerialPort {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.polls += 1;

        let mut n = 0;
        while n < buf.len() {
            match self.incoming.front() {
                Some(&(at, byte)) if at <= self.polls => {
                    buf[n] = byte;
                    n += 1;
                    self.read_log.push((self.polls, byte));
                    self.incoming.pop_front();
                }
                _ => break,
            }
        }
        Ok(n)
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.stalled_writes > 0 {
            self.stalled_writes -= 1;
            return Ok(0);
        }

        // One byte per call, like a nearly full UART buffer
        let Some(&byte) = buf.first() else {
            return Ok(0);
        };
        self.write_log.push(byte);
        self.write_polls.push(self.polls);
        if self.echo {
            let delay = self.echo_jitter[self.echo_idx % self.echo_jitter.len()];
            self.echo_idx += 1;
            self.enqueue(delay, byte);
        }
        if byte == b'\n' {
            for b in self.line_reply.clone() {
                self.enqueue(0, b);
            }
        }
        Ok(1)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.flushes += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_delays_echo_without_reordering() {
        let mut port = MockSerialPort::new().with_echo_jitter(vec![3, 0]);
        assert_eq!(port.write_nonblocking(b"a").unwrap(), 1);
        assert_eq!(port.write_nonblocking(b"b").unwrap(), 1);

        let mut buf = [0u8; 8];
        assert_eq!(port.read_available(&mut buf).unwrap(), 0);
        assert_eq!(port.read_available(&mut buf).unwrap(), 0);
        assert_eq!(port.read_available(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ab");
    }

    #[test]
    fn test_mock_stalled_writes() {
        let mut port = MockSerialPort::new().with_stalled_writes(2);
        assert_eq!(port.write_nonblocking(b"x").unwrap(), 0);
        assert_eq!(port.write_nonblocking(b"x").unwrap(), 0);
        assert_eq!(port.write_nonblocking(b"x").unwrap(), 1);
        assert_eq!(port.written(), b"x");
    }

    #[test]
    fn test_closed_transport_rejects_io() {
        let mut port = MockSerialPort::new().with_incoming(b"ok");
        port.close();
        assert!(port.is_closed());

        let mut buf = [0u8; 4];
        assert!(matches!(port.read_available(&mut buf), Err(TransportError::Closed)));
        assert!(matches!(port.write_nonblocking(b"x"), Err(TransportError::Closed)));
        assert!(matches!(port.flush(), Err(TransportError::Closed)));
    }

    #[test]
    fn test_open_missing_port_fails_fast() {
        let config = TransportConfig::new("/dev/does-not-exist-ffshell", 38400);
        match SerialTransport::open(&config) {
            Err(TransportError::Open { port, .. }) => assert_eq!(port, "/dev/does-not-exist-ffshell"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("opened a missing port"),
        }
    }
}
