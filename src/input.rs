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

use std::io::Read;
use std::thread;
use crossbeam_channel::{Receiver, TryRecvError, bounded};
use tracing::debug;
use crate::upload::trim_line_end;

/// Typed text, released to the shell one complete line at a time
pub struct InteractiveInput {
    rx: Option<Receiver<Vec<u8>>>,
    pending: Vec<u8>,
}

impl InteractiveInput {
    pub fn new(rx: Receiver<Vec<u8>>) -> Self {
        InteractiveInput { rx: Some(rx), pending: Vec::new() }
    }

    /// Read stdin on a background thread
    pub fn stdin() -> Self {
        let (tx, rx) = bounded(64);
        thread::spawn(move || {
            let mut stdin = std::io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("stdin closed");
        });
        Self::new(rx)
    }

    /// Input that is already complete, with nothing more to come
    #[cfg(test)]
    pub fn scripted(text: &str) -> Self {
        InteractiveInput { rx: None, pending: text.as_bytes().to_vec() }
    }

    fn pump(&mut self) {
        let Some(rx) = &self.rx else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    self.rx = None;
                    return;
                }
            }
        }
    }

    fn remove_line(&mut self, start: usize, end: usize) -> Vec<u8> {
        let raw: Vec<u8> = self.pending.drain(start..=end).collect();
        trim_line_end(&raw).to_vec()
    }

    fn split_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        Some(self.remove_line(0, end))
    }

    /// Next complete line as typed, if there is one
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        self.pump();
        if let Some(line) = self.split_line() {
            return Some(line);
        }
        // A final unterminated line still counts once input is over
        if self.rx.is_none() && !self.pending.is_empty() {
            self.pending.push(b'\n');
            return self.split_line();
        }
        None
    }

    /// Remove the first complete line satisfying `pred`, wherever it is
    /// queued. Lines around it keep their order.
    pub fn take_line_if(&mut self, pred: impl Fn(&str) -> bool) -> Option<Vec<u8>> {
        self.pump();
        let mut start = 0;
        while let Some(len) = self.pending[start..].iter().position(|&b| b == b'\n') {
            let end = start + len;
            let matched = pred(&String::from_utf8_lossy(trim_line_end(&self.pending[start..end])));
            if matched {
                return Some(self.remove_line(start, end));
            }
            start = end + 1;
        }
        None
    }

    /// Input closed and every line handed out
    pub fn is_exhausted(&mut self) -> bool {
        self.pump();
        self.rx.is_none() && self.pending.is_empty()
    }
}
