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

use std::path::PathBuf;
use thiserror::Error;

/// Rejected startup configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("serial port name is empty")]
    EmptyPort,

    #[error("invalid baud rate: {0}")]
    InvalidBaud(u32),

    #[error("invalid {setting}: {value}")]
    InvalidValue { setting: &'static str, value: String },
}

/// Failures of the serial channel itself
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("cannot open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port is closed")]
    Closed,
}

/// Failures of an upload request; these never end the session
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("an upload is already in progress")]
    Busy,

    #[error("no files given")]
    NoFiles,

    #[error("{}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ShellError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("display error: {0}")]
    Display(std::io::Error),
}

impl ShellError {
    /// Whether the error must end the session
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ShellError::Upload(_))
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
