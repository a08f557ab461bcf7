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
use tracing::{debug, warn};
use crate::config::PacingConfig;
use crate::error::Result;
use crate::link::Link;
use crate::protocol::LF;
use crate::serial::Transport;

// ============================================================================
// Pacing State
// ============================================================================

/// Echo expectations shared by the write path, which sets them, and the
/// receive path, which clears them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PacingState {
    /// Poll ticks left to wait for the echoed line terminator
    pub newline_wait: u32,
    /// Character whose echo must arrive before the next one is sent
    pub expected_echo: Option<u8>,
    /// Received bytes still attributed to the echo of the current line
    pub echo_remaining: usize,
    /// Consecutive NAKs seen during an upload
    pub error_count: u32,
    /// Device sent XOFF
    pub paused: bool,
}

impl PacingState {
    pub fn begin_line(&mut self, len: usize) {
        self.newline_wait = 0;
        self.expected_echo = None;
        self.echo_remaining = len;
    }

    pub fn line_in_flight(&self) -> bool {
        self.echo_remaining > 0
    }

    /// Forget every outstanding expectation
    pub fn clear(&mut self) {
        self.newline_wait = 0;
        self.expected_echo = None;
        self.echo_remaining = 0;
        self.error_count = 0;
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Sleep that doubles on every retry, up to eight times the base interval
pub struct Backoff {
    base: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration) -> Self {
        Backoff { base, current: base }
    }

    pub fn snooze(&mut self) {
        if !self.current.is_zero() {
            std::thread::sleep(self.current);
        }
        self.current = (self.current * 2).min(self.base * 8);
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}

// ============================================================================
// Pacing Engine
// ============================================================================

/// Sends lines one character at a time at a rate the device can follow
pub struct PacingEngine {
    config: PacingConfig,
}

impl PacingEngine {
    pub fn new(config: PacingConfig) -> Self {
        PacingEngine { config }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Transmit `line` followed by a line terminator.
    ///
    /// Once started, every character of the line is written even if the
    /// monitor requests an upload abort meanwhile.
    pub fn transmit_line<T: Transport, W: Write>(&self, link: &mut Link<T, W>, line: &[u8]) -> Result<()> {
        debug!(line = %String::from_utf8_lossy(line), "transmit");
        link.state.begin_line(line.len());
        let char_echo = self.config.char_echo();

        for &c in line {
            pause(self.config.char_delay);
            self.wait_for_xon(link)?;
            if char_echo {
                link.receive_one()?;
                self.wait_for_char_echo(link)?;
                link.state.expected_echo = Some(c);
            }
            link.write_byte(c, self.config.poll_interval)?;
            if char_echo {
                link.flush()?;
            }
        }

        self.wait_for_xon(link)?;
        link.write_byte(LF, self.config.poll_interval)?;
        link.flush()?;
        if self.config.line_echo {
            link.state.newline_wait = self.config.newline_echo_ticks;
        }
        pause(self.config.line_delay);
        Ok(())
    }

    /// Spend one poll tick of the line echo budget. Returns false once
    /// the echo arrived or the budget is exhausted.
    pub fn newline_wait_tick<T: Transport, W: Write>(&self, link: &mut Link<T, W>) -> bool {
        if link.state.newline_wait == 0 {
            return false;
        }
        link.state.newline_wait -= 1;
        if link.state.newline_wait == 0 {
            debug!("line echo timed out");
        }
        pause(self.config.poll_interval);
        true
    }

    fn wait_for_char_echo<T: Transport, W: Write>(&self, link: &mut Link<T, W>) -> Result<()> {
        let mut ticks = 0;
        while let Some(expected) = link.state.expected_echo {
            if ticks >= self.config.char_echo_ticks {
                warn!(expected = expected, "no echo for character, continuing");
                link.state.expected_echo = None;
                break;
            }
            if !link.receive_one()? {
                pause(self.config.poll_interval);
                ticks += 1;
            }
        }
        Ok(())
    }

    fn wait_for_xon<T: Transport, W: Write>(&self, link: &mut Link<T, W>) -> Result<()> {
        if !link.state.paused {
            return Ok(());
        }
        debug!("device sent XOFF, holding output");
        let mut backoff = Backoff::new(self.config.poll_interval);
        while link.state.paused {
            if link.drain()? > 0 {
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
        debug!("device sent XON, resuming");
        Ok(())
    }
}
