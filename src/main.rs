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

// Serial file sender for the joystick-port receiver
mod crc;
mod protocol;
mod sender;
mod serial;
mod source;

use clap::Parser;
use serialport::{DataBits, Parity, StopBits};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use sender::{Observer, Sender};
use serial::PortSettings;

#[derive(Parser)]
#[command(name = "jsend")]
#[command(about = "Send a file over a serial link to a joystick-port receiver", long_about = None)]
struct Cli {
    /// File to send
    file: PathBuf,

    /// Serial port to use (e.g., /dev/ttyUSB0 or COM1)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value = "9600")]
    baud: u32,

    /// Name to send the file as, in 8.3 format (default: the file's own name, upper-cased)
    #[arg(short, long)]
    name: Option<String>,

    /// Data bits (5, 6, 7, or 8)
    #[arg(long, default_value = "8", value_name = "BITS")]
    data_bits: u8,

    /// Parity (none, odd, or even)
    #[arg(long, default_value = "none")]
    parity: String,

    /// Stop bits (1 or 2)
    #[arg(long, default_value = "1", value_name = "BITS")]
    stop_bits: u8,

    /// Read and write timeout in milliseconds
    #[arg(long, default_value = "5000", value_name = "MS")]
    timeout: u64,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

fn parse_data_bits(bits: u8) -> Result<DataBits, String> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        _ => Err(format!("Invalid data bits: {}. Must be 5, 6, 7, or 8", bits)),
    }
}

fn parse_parity(parity: &str) -> Result<Parity, String> {
    match parity.to_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        _ => Err(format!("Invalid parity: {}. Must be 'none', 'odd', or 'even'", parity)),
    }
}

fn parse_stop_bits(bits: u8) -> Result<StopBits, String> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        _ => Err(format!("Invalid stop bits: {}. Must be 1 or 2", bits)),
    }
}

fn port_settings(cli: &Cli) -> Result<PortSettings, String> {
    let timeout = Duration::from_millis(cli.timeout);
    Ok(PortSettings {
        data_bits: parse_data_bits(cli.data_bits)?,
        parity: parse_parity(&cli.parity)?,
        stop_bits: parse_stop_bits(cli.stop_bits)?,
        read_timeout: timeout,
        write_timeout: timeout,
        ..PortSettings::new(cli.port.clone(), cli.baud)
    })
}

/// Logs go to stderr so they don't interleave with the progress line
fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jsend={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ============================================================================
// Console Progress
// ============================================================================

#[derive(Default)]
struct ConsoleProgress {
    length: u64,
    sent: u64,
}

impl ConsoleProgress {
    fn percent(&self) -> f64 {
        if self.length == 0 {
            100.0
        } else {
            self.sent as f64 * 100.0 / self.length as f64
        }
    }
}

impl Observer for ConsoleProgress {
    fn header_sent(&mut self, length: u32, name: &str) {
        self.length = length as u64;
        print!("Sending file as {}, size is {}K... ", name, (self.length + 512) / 1024);
        std::io::stdout().flush().ok();
    }

    fn chunk_sent(&mut self, frame_len: usize) {
        self.sent += (frame_len - protocol::CHECKSUM_LEN) as u64;
        // Rewrite the percentage in place
        let text = format!("{:.1}%", self.percent());
        print!("{}{}", text, "\x08".repeat(text.len()));
        std::io::stdout().flush().ok();
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let settings = match port_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("Opening serial port: {}", settings.path);
    println!("Settings: {} baud, {:?}, {:?}, {:?}", settings.baud_rate, settings.data_bits, settings.parity, settings.stop_bits);

    let sender = Sender::new(settings);
    let mut progress = ConsoleProgress::default();

    match sender.send_file(&cli.file, cli.name.as_deref(), &mut progress) {
        Ok(()) => {
            println!("100%  ");
            println!("Done!");
        }
        Err(e) => {
            if progress.length > 0 {
                println!();
            }
            eprintln!("*** {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial_settings() {
        assert_eq!(parse_data_bits(7).unwrap(), DataBits::Seven);
        assert!(parse_data_bits(9).is_err());
        assert_eq!(parse_parity("EVEN").unwrap(), Parity::Even);
        assert!(parse_parity("mark").is_err());
        assert_eq!(parse_stop_bits(2).unwrap(), StopBits::Two);
        assert!(parse_stop_bits(3).is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["jsend", "-p", "/dev/ttyUSB0", "game.rom"]).unwrap();
        let settings = port_settings(&cli).unwrap();

        assert_eq!(cli.file, PathBuf::from("game.rom"));
        assert_eq!(cli.name, None);
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.read_timeout, serial::DEFAULT_TIMEOUT);
        assert_eq!(settings.data_bits, DataBits::Eight);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "jsend", "-p", "COM3", "-b", "57600", "-n", "GAME.ROM", "--timeout", "250", "--parity", "odd", "game.rom",
        ]).unwrap();
        let settings = port_settings(&cli).unwrap();

        assert_eq!(cli.name.as_deref(), Some("GAME.ROM"));
        assert_eq!(settings.path, "COM3");
        assert_eq!(settings.baud_rate, 57600);
        assert_eq!(settings.parity, Parity::Odd);
        assert_eq!(settings.read_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_console_progress_counts_payload() {
        let mut progress = ConsoleProgress::default();
        progress.header_sent(2500, "DATA.BIN");
        progress.chunk_sent(1026);
        progress.chunk_sent(1026);
        progress.chunk_sent(454);

        assert_eq!(progress.sent, 2500);
        assert!((progress.percent() - 100.0).abs() < f64::EPSILON);
    }
}
