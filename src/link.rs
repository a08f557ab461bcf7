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

use std::io::Write;
use std::time::Duration;
use crate::error::{Result, ShellError};
use crate::monitor::Monitor;
use crate::pacing::{Backoff, PacingState};
use crate::serial::Transport;

/// The transport together with everything that sees its received bytes:
/// the echo monitor, the shared pacing state and the display sink.
pub struct Link<T: Transport, W: Write> {
    port: T,
    sink: W,
    monitor: Monitor,
    pub state: PacingState,
    uploading: bool,
    abort_pending: bool,
}

impl<T: Transport, W: Write> Link<T, W> {
    pub fn new(port: T, sink: W, monitor: Monitor) -> Self {
        Link {
            port,
            sink,
            monitor,
            state: PacingState::default(),
            uploading: false,
            abort_pending: false,
        }
    }

    pub fn set_uploading(&mut self, uploading: bool) {
        self.uploading = uploading;
        if !uploading {
            self.state.error_count = 0;
            self.abort_pending = false;
        }
    }

    /// Returns true once after the monitor decided the upload must stop
    pub fn take_abort(&mut self) -> bool {
        std::mem::take(&mut self.abort_pending)
    }

    /// Run every byte already received through the monitor
    pub fn drain(&mut self) -> Result<usize> {
        let mut buf = [0u8; 256];
        let mut total = 0;
        loop {
            let n = self.port.read_available(&mut buf)?;
            if n == 0 {
                return Ok(total);
            }
            self.process(&buf[..n])?;
            total += n;
        }
    }

    /// Run at most one received byte through the monitor
    pub fn receive_one(&mut self) -> Result<bool> {
        let mut buf = [0u8; 1];
        if self.port.read_available(&mut buf)? == 0 {
            return Ok(false);
        }
        self.process(&buf)?;
        Ok(true)
    }

    fn process(&mut self, bytes: &[u8]) -> Result<()> {
        let mut shown = Vec::with_capacity(bytes.len());
        for &b in bytes {
            let verdict = self.monitor.inspect(&mut self.state, b, self.uploading);
            if verdict.display {
                shown.push(b);
            }
            if verdict.abort_upload {
                self.abort_pending = true;
            }
        }
        if !shown.is_empty() {
            self.sink.write_all(&shown).map_err(ShellError::Display)?;
            self.sink.flush().map_err(ShellError::Display)?;
        }
        Ok(())
    }

    /// Write one byte, retrying until the driver accepts it. Received
    /// bytes keep being drained while the write is refused.
    pub fn write_byte(&mut self, byte: u8, poll: Duration) -> Result<()> {
        let mut backoff = Backoff::new(poll);
        while self.port.write_nonblocking(&[byte])? == 0 {
            self.drain()?;
            backoff.snooze();
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.port.flush()?;
        Ok(())
    }

    /// Print a status line for the user between device output
    pub fn notify(&mut self, message: &str) -> Result<()> {
        writeln!(self.sink, "\n{}", message).map_err(ShellError::Display)?;
        self.sink.flush().map_err(ShellError::Display)
    }

    pub fn close(&mut self) {
        self.port.close();
    }

    #[cfg(test)]
    pub fn port(&self) -> &T {
        &self.port
    }

    #[cfg(test)]
    pub fn port_mut(&mut self) -> &mut T {
        &mut self.port
    }

    #[cfg(test)]
    pub fn sink(&self) -> &W {
        &self.sink
    }
}
