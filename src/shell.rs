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
use tracing::{debug, info, warn};
use crate::config::{PacingConfig, TransportConfig};
use crate::directive::Directive;
use crate::error::{Result, ShellError, UploadError};
use crate::input::InteractiveInput;
use crate::link::Link;
use crate::monitor::Monitor;
use crate::pacing::PacingEngine;
use crate::protocol::{ESC, WARM};
use crate::serial::Transport;
use crate::upload::UploadJob;

/// What one pass of the control loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Nothing to send
    Idle,
    /// Holding the next upload line until the device echoes the last one
    Waiting,
    Transmitted,
    /// Directive or upload bookkeeping, nothing sent
    Handled,
}

/// The line dispatcher: owns the session and decides, tick by tick,
/// which line goes to the device next.
pub struct Shell<T: Transport, W: Write> {
    link: Link<T, W>,
    engine: PacingEngine,
    upload: Option<UploadJob>,
}

impl<T: Transport, W: Write> Shell<T, W> {
    pub fn new(port: T, sink: W, transport: &TransportConfig, pacing: PacingConfig) -> Self {
        let monitor = Monitor::new(transport.software_flow, pacing.char_echo());
        Shell {
            link: Link::new(port, sink, monitor),
            engine: PacingEngine::new(pacing),
            upload: None,
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.upload.is_some()
    }

    /// Begin uploading `job`. Only one upload may run at a time.
    pub fn start_upload(&mut self, job: UploadJob) -> std::result::Result<(), UploadError> {
        if self.upload.is_some() {
            return Err(UploadError::Busy);
        }
        if let Some(path) = job.current_path() {
            debug!(first = %path.display(), "upload queued");
        }
        self.link.state.clear();
        self.link.set_uploading(true);
        self.upload = Some(job);
        Ok(())
    }

    /// Stop the active upload, closing its files. Returns false when idle.
    pub fn abort_upload(&mut self, notice: &str) -> Result<bool> {
        if self.upload.is_none() {
            return Ok(false);
        }
        warn!("{}", notice);
        self.end_upload();
        self.link.notify(notice)?;
        Ok(true)
    }

    fn end_upload(&mut self) {
        if let Some(mut job) = self.upload.take() {
            debug!(phase = ?job.phase(), lines = job.lines_sent(), "upload closed");
            job.finish();
        }
        self.link.set_uploading(false);
        self.link.state.clear();
    }

    pub fn transmit_line(&mut self, line: &[u8]) -> Result<()> {
        self.engine.transmit_line(&mut self.link, line)
    }

    fn check_overrun(&mut self) -> Result<()> {
        if self.link.take_abort() {
            self.abort_upload("CODE UPLOAD INTERRUPTED")?;
        }
        Ok(())
    }

    /// Report a non-fatal error to the user and carry on
    fn report(&mut self, err: ShellError) -> Result<()> {
        if err.is_fatal() {
            return Err(err);
        }
        warn!("{}", err);
        self.link.notify(&err.to_string())
    }

    /// One pass of the control loop
    pub fn tick(&mut self, input: &mut InteractiveInput) -> Result<Activity> {
        self.link.drain()?;
        self.check_overrun()?;

        if self.upload.is_some() {
            self.upload_tick(input)
        } else {
            self.interactive_tick(input)
        }
    }

    fn upload_tick(&mut self, input: &mut InteractiveInput) -> Result<Activity> {
        if input.take_line_if(|l| Directive::parse(l) == Some(Directive::Abort)).is_some() {
            self.abort_upload("CODE UPLOAD ABORTED")?;
            return Ok(Activity::Handled);
        }
        if self.engine.newline_wait_tick(&mut self.link) {
            return Ok(Activity::Waiting);
        }

        let Some(job) = self.upload.as_mut() else {
            return Ok(Activity::Idle);
        };
        match job.next_line() {
            Ok(Some(line)) => {
                self.transmit_line(&line)?;
                self.check_overrun()?;
                Ok(Activity::Transmitted)
            }
            Ok(None) => {
                self.end_upload();
                Ok(Activity::Handled)
            }
            Err(e) => {
                self.end_upload();
                self.report(e.into())?;
                Ok(Activity::Handled)
            }
        }
    }

    fn interactive_tick(&mut self, input: &mut InteractiveInput) -> Result<Activity> {
        let Some(line) = input.next_line() else {
            return Ok(Activity::Idle);
        };

        match Directive::parse(&String::from_utf8_lossy(&line)) {
            None => {
                self.transmit_line(&line)?;
                Ok(Activity::Transmitted)
            }
            Some(directive) => self.dispatch(directive),
        }
    }

    fn dispatch(&mut self, directive: Directive) -> Result<Activity> {
        debug!(?directive, "directive");
        let opened = match directive {
            Directive::Send { path, start, stop } => {
                info!(file = %path.display(), "send");
                UploadJob::open_single(&path, start.as_deref(), stop.as_deref())
            }
            Directive::SendMany(paths) => {
                info!(files = paths.len(), "send many");
                UploadJob::open_many(&paths)
            }
            Directive::Warm => {
                self.transmit_line(&[WARM])?;
                return Ok(Activity::Transmitted);
            }
            Directive::Escape => {
                self.transmit_line(&[ESC])?;
                return Ok(Activity::Transmitted);
            }
            Directive::Abort => {
                self.link.notify("no upload in progress")?;
                return Ok(Activity::Handled);
            }
        };

        match opened.and_then(|job| self.start_upload(job)) {
            Ok(()) => {}
            Err(e) => self.report(e.into())?,
        }
        Ok(Activity::Handled)
    }

    /// Run until input is closed and no upload remains
    pub fn run(&mut self, input: &mut InteractiveInput) -> Result<()> {
        let poll = self.engine.config().poll_interval;
        loop {
            if self.tick(input)? == Activity::Idle {
                if input.is_exhausted() {
                    self.link.drain()?;
                    return Ok(());
                }
                if !poll.is_zero() {
                    std::thread::sleep(poll);
                }
            }
        }
    }

    /// Release the serial port
    pub fn close(&mut self) {
        self.end_upload();
        self.link.close();
    }
}
