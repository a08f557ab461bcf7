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

// Upload shell for line-oriented microcontroller interpreters
mod config;
mod directive;
mod error;
mod input;
mod link;
mod monitor;
mod pacing;
mod protocol;
mod serial;
mod shell;
mod upload;

use std::time::Duration;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use config::{FlowControl, PacingConfig, TransportConfig};
use error::ShellError;
use input::InteractiveInput;
use serial::SerialTransport;
use shell::Shell;

#[derive(Parser)]
#[command(name = "ffshell")]
#[command(about = "Paced upload shell for serial-attached interpreters", long_about = None)]
struct Cli {
    /// Serial port to use (e.g., /dev/ttyACM0 or COM1)
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "38400")]
    speed: u32,

    /// Enable RTS/CTS flow control
    #[arg(long)]
    hw: bool,

    /// Enable XON/XOFF flow control
    #[arg(long)]
    sw: bool,

    /// Delay in milliseconds before each character
    #[arg(short = 'd', long, default_value = "0", value_name = "MS")]
    chardelay: u64,

    /// Delay in milliseconds after each line
    #[arg(short = 'n', long, default_value = "0", value_name = "MS")]
    newlinedelay: u64,

    /// Wait for each character to be echoed before sending the next
    #[arg(short = 'c', long)]
    cc: bool,

    /// Disable waiting for the echo of each line terminator
    #[arg(long)]
    nl: bool,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name = "BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name = "BITS")]
    stop_bits: u8,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn transport_config(&self) -> Result<TransportConfig, ShellError> {
        let mut transport = TransportConfig::new(&self.port, self.speed).with_flow_control(self.hw, self.sw);
        transport.data_bits = config::parse_data_bits(self.data_bits)?;
        transport.parity = config::parse_parity(&self.parity)?;
        transport.stop_bits = config::parse_stop_bits(self.stop_bits)?;
        transport.validate()?;
        Ok(transport)
    }

    fn pacing_config(&self) -> PacingConfig {
        PacingConfig {
            char_delay: Duration::from_millis(self.chardelay),
            line_delay: Duration::from_millis(self.newlinedelay),
            flow_control: if self.cc { FlowControl::CharEcho } else { FlowControl::None },
            line_echo: !self.nl,
            ..PacingConfig::default()
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let transport = match cli.transport_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let pacing = cli.pacing_config();

    println!("{} {}", transport, pacing);

    let serial_port = match SerialTransport::open(&transport) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("Failed to open serial port: {}", e);
            std::process::exit(1);
        }
    };

    println!("Shell directives:");
    println!("#send file {{start {{stop}}}}\tSend a file, optionally from the line containing start up to the line containing stop");
    println!("#sendm file1..fileN\tSend multiple files");
    println!("#abort\t\t\tStop the running upload");
    println!("#warm\t\t\tSend ctrl-o to the device");
    println!("##\t\t\tSend ESC to disable the turnkey");
    println!("Ctrl+c\t\t\tQuits the terminal\n");

    let mut shell = Shell::new(serial_port, std::io::stdout(), &transport, pacing);
    let mut input = InteractiveInput::stdin();

    let result = shell.run(&mut input);
    shell.close();

    if let Err(e) = result {
        eprintln!("{}: {}", transport.port, e);
        std::process::exit(1);
    }
    println!("Exiting ffshell, goodbye...");
}
