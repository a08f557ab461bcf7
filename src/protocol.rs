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

//! Bytes and limits of the interpreter's serial console

/// Negative acknowledge - the device could not keep up with incoming characters
pub const NAK: u8 = 0x15;

/// Transmit on - device is ready for more characters
pub const XON: u8 = 0x11;

/// Transmit off - device asks us to stop sending
pub const XOFF: u8 = 0x13;

/// Line terminator sent after every line and echoed back by the device
pub const LF: u8 = b'\n';

/// Ctrl-O - warm restart of the interpreter
pub const WARM: u8 = 0x0F;

/// Escape - prevents the turnkey word from running after a restart
pub const ESC: u8 = 0x1B;

/// Lines starting with this prefix are never uploaded
pub const COMMENT_PREFIX: &str = "\\ ";

/// Extension appended to upload paths given without one
pub const DEFAULT_SUFFIX: &str = "fs";

/// Consecutive NAKs that abort an upload
pub const NAK_ABORT_THRESHOLD: u32 = 3;

/// Poll ticks to wait for the device to echo a line terminator
pub const NEWLINE_ECHO_TICKS: u32 = 2000;

/// Poll ticks to wait for the device to echo a single character
pub const CHAR_ECHO_TICKS: u32 = 2000;
