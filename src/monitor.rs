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

//! Classification of every byte received from the device.
//!
//! Display suppression is a heuristic: while an interactive line is in
//! flight, the next `len(line)` received bytes are assumed to be the
//! device's echo of what the user already sees on the local terminal.
//! Late or missing echo shifts which bytes are hidden.

use tracing::{debug, warn};
use crate::pacing::PacingState;
use crate::protocol::*;

/// What to do with one received byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    pub display: bool,
    /// The consecutive NAK limit was reached; the active upload must stop
    pub abort_upload: bool,
}

#[derive(Debug, Clone)]
pub struct Monitor {
    software_flow: bool,
    char_echo: bool,
}

impl Monitor {
    pub fn new(software_flow: bool, char_echo: bool) -> Self {
        Monitor { software_flow, char_echo }
    }

    pub fn inspect(&self, state: &mut PacingState, byte: u8, uploading: bool) -> Verdict {
        if self.software_flow && (byte == XON || byte == XOFF) {
            state.paused = byte == XOFF;
            debug!(paused = state.paused, "software flow control");
            return Verdict::default();
        }

        let mut verdict = Verdict {
            display: !(state.line_in_flight() && !uploading),
            abort_upload: false,
        };
        state.echo_remaining = state.echo_remaining.saturating_sub(1);

        if byte == NAK && uploading {
            state.error_count += 1;
            warn!(count = state.error_count, "device reported overrun");
            if state.error_count >= NAK_ABORT_THRESHOLD {
                state.clear();
                verdict.abort_upload = true;
            }
        } else {
            state.error_count = 0;
        }

        if byte == LF {
            state.newline_wait = 0;
        }
        if self.char_echo && state.expected_echo == Some(byte) {
            state.expected_echo = None;
        }

        verdict
    }
}
