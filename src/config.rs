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

use std::fmt;
use std::time::Duration;
use serialport::{DataBits, Parity, StopBits};
use crate::error::ConfigError;
use crate::protocol::{CHAR_ECHO_TICKS, NEWLINE_ECHO_TICKS};

/// Flow control handled by the serial driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeMode {
    None,
    /// RTS/CTS
    Hardware,
    /// XON/XOFF
    Software,
}

/// Flow control handled by the pacing engine, per character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    CharEcho,
}

/// Settings of the serial channel, fixed once the port is open
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub port: String,
    pub baud: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// RTS/CTS
    pub hardware_flow: bool,
    /// XON/XOFF, intercepted by the echo monitor
    pub software_flow: bool,
}

impl TransportConfig {
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        TransportConfig {
            port: port.into(),
            baud,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            hardware_flow: false,
            software_flow: false,
        }
    }

    pub fn with_flow_control(mut self, hw: bool, sw: bool) -> Self {
        self.hardware_flow = hw;
        self.software_flow = sw;
        self
    }

    /// The mode the driver is opened with. The driver takes a single mode,
    /// so RTS/CTS wins when both are asked for and XON/XOFF is then left
    /// to the echo monitor.
    pub fn handshake(&self) -> HandshakeMode {
        match (self.hardware_flow, self.software_flow) {
            (true, _) => HandshakeMode::Hardware,
            (false, true) => HandshakeMode::Software,
            (false, false) => HandshakeMode::None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::EmptyPort);
        }
        if self.baud == 0 {
            return Err(ConfigError::InvalidBaud(self.baud));
        }
        Ok(())
    }
}

/// Timing and echo handshake applied to every transmitted line
#[derive(Debug, Clone)]
pub struct PacingConfig {
    pub char_delay: Duration,
    pub line_delay: Duration,
    pub flow_control: FlowControl,
    /// Wait for the device to echo each line terminator
    pub line_echo: bool,
    pub newline_echo_ticks: u32,
    pub char_echo_ticks: u32,
    /// Length of one poll tick
    pub poll_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            char_delay: Duration::ZERO,
            line_delay: Duration::ZERO,
            flow_control: FlowControl::None,
            line_echo: true,
            newline_echo_ticks: NEWLINE_ECHO_TICKS,
            char_echo_ticks: CHAR_ECHO_TICKS,
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl PacingConfig {
    pub fn char_echo(&self) -> bool {
        self.flow_control == FlowControl::CharEcho
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "port:{} speed:{} {:?} {:?} {:?} hw:{} sw:{}",
            self.port,
            self.baud,
            self.data_bits,
            self.parity,
            self.stop_bits,
            self.hardware_flow,
            self.software_flow,
        )
    }
}

impl fmt::Display for PacingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "newlinedelay:{} chardelay:{} cc:{} nl:{}",
            self.line_delay.as_millis(),
            self.char_delay.as_millis(),
            self.char_echo(),
            self.line_echo,
        )
    }
}

pub fn parse_data_bits(bits: u8) -> Result<DataBits, ConfigError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(ConfigError::InvalidValue { setting: "data bits", value: bits.to_string() }),
    }
}

pub fn parse_parity(parity: &str) -> Result<Parity, ConfigError> {
    match parity.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(ConfigError::InvalidValue { setting: "parity", value: parity.to_string() }),
    }
}

pub fn parse_stop_bits(bits: u8) -> Result<StopBits, ConfigError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(ConfigError::InvalidValue { setting: "stop bits", value: bits.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_selection() {
        let cfg = TransportConfig::new("/dev/ttyACM0", 38400);
        assert_eq!(cfg.handshake(), HandshakeMode::None);

        let cfg = TransportConfig::new("/dev/ttyACM0", 38400).with_flow_control(false, true);
        assert_eq!(cfg.handshake(), HandshakeMode::Software);
        assert!(cfg.software_flow);

        let cfg = TransportConfig::new("/dev/ttyACM0", 38400).with_flow_control(true, false);
        assert_eq!(cfg.handshake(), HandshakeMode::Hardware);
        assert!(!cfg.software_flow);
    }

    #[test]
    fn test_hardware_and_software_flow_together() {
        let cfg = TransportConfig::new("/dev/ttyACM0", 38400).with_flow_control(true, true);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.handshake(), HandshakeMode::Hardware);
        assert!(cfg.software_flow);
        assert!(cfg.to_string().ends_with("hw:true sw:true"));
    }

    #[test]
    fn test_validate() {
        assert!(TransportConfig::new("/dev/ttyACM0", 38400).validate().is_ok());
        assert!(matches!(TransportConfig::new("  ", 38400).validate(), Err(ConfigError::EmptyPort)));
        assert!(matches!(TransportConfig::new("COM3", 0).validate(), Err(ConfigError::InvalidBaud(0))));
    }

    #[test]
    fn test_pacing_defaults() {
        let pacing = PacingConfig::default();
        assert!(pacing.line_echo);
        assert!(!pacing.char_echo());
        assert_eq!(pacing.newline_echo_ticks, 2000);
        assert_eq!(pacing.to_string(), "newlinedelay:0 chardelay:0 cc:false nl:true");
    }

    #[test]
    fn test_framing_parsers() {
        assert_eq!(parse_data_bits(7).unwrap(), DataBits::Seven);
        assert!(parse_data_bits(9).is_err());
        assert_eq!(parse_parity("EVEN").unwrap(), Parity::Even);
        assert!(parse_parity("mark").is_err());
        assert_eq!(parse_stop_bits(2).unwrap(), StopBits::Two);
        assert!(parse_stop_bits(3).is_err());
    }
}
