//! CLI argument parsing

use avrprog_core::device::MemoryType;
use avrprog_core::protocol::{BAUD_RATES, DEFAULT_BAUD_INDEX};
use avrprog_host::Options;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal byte
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let value = parse_hex_u32(s)?;
    u8::try_from(value).map_err(|_| format!("Value 0x{:X} does not fit in a byte", value))
}

/// Parse a baud table index
fn parse_baud_index(s: &str) -> Result<usize, String> {
    let index: usize = s.parse().map_err(|e| format!("Invalid index: {}", e))?;
    if index < BAUD_RATES.len() {
        Ok(index)
    } else {
        Err(format!(
            "Index must be below {} (rates: {:?})",
            BAUD_RATES.len(),
            BAUD_RATES
        ))
    }
}

#[derive(Parser)]
#[command(name = "avrprog")]
#[command(author, version, about = "AVR910 serial programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Extra device descriptors (RON file), searched after the built-in table
    #[arg(long, global = true)]
    pub device_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Serial connection options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Serial port of the programmer (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    pub port: String,

    /// Baud table index to start the search at (0=2400 .. 6=115200)
    #[arg(long, default_value_t = DEFAULT_BAUD_INDEX, value_parser = parse_baud_index)]
    pub baud_index: usize,

    /// Pause between block-write data bytes, in microseconds
    #[arg(long, default_value_t = 0)]
    pub char_delay_us: u32,

    /// Reply timeout for ordinary commands, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u32,

    /// Use single-byte commands even if the programmer supports blocks
    #[arg(long)]
    pub no_block: bool,

    /// Hand the serial line to the attached part when done
    #[arg(long)]
    pub exit: bool,
}

impl ConnectionArgs {
    /// Connection options for the host driver
    pub fn options(&self) -> Options {
        Options {
            initial_baud_index: self.baud_index,
            response_timeout_ms: self.timeout_ms,
            char_delay_us: self.char_delay_us,
            block_mode: !self.no_block,
            ..Options::default()
        }
    }
}

/// Memory space selected on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryArg {
    /// Program flash
    Flash,
    /// Data EEPROM
    Eeprom,
}

impl From<MemoryArg> for MemoryType {
    fn from(arg: MemoryArg) -> Self {
        match arg {
            MemoryArg::Flash => MemoryType::Flash,
            MemoryArg::Eeprom => MemoryType::Eeprom,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect and show programmer and part information
    Info {
        #[command(flatten)]
        conn: ConnectionArgs,
    },

    /// Write a binary image to flash or EEPROM
    Write {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Input file path (raw binary)
        #[arg(short, long)]
        input: PathBuf,

        /// Memory to write
        #[arg(short, long, value_enum, default_value = "flash")]
        memory: MemoryArg,

        /// Byte offset the image starts at (hex with 0x prefix, or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,

        /// Skip the chip erase before writing flash
        #[arg(long)]
        no_erase: bool,

        /// Skip reading back each page
        #[arg(long)]
        no_verify: bool,
    },

    /// Compare flash or EEPROM with a binary image
    Verify {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Input file path (raw binary)
        #[arg(short, long)]
        input: PathBuf,

        /// Memory to compare
        #[arg(short, long, value_enum, default_value = "flash")]
        memory: MemoryArg,

        /// Byte offset the image starts at (hex with 0x prefix, or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_hex_u32)]
        address: u32,
    },

    /// Read a byte range of flash or EEPROM to a file
    Read {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Memory to read
        #[arg(short, long, value_enum, default_value = "flash")]
        memory: MemoryArg,

        /// First byte to read (hex with 0x prefix, or decimal)
        #[arg(short, long, default_value = "0", value_parser = parse_hex_u32)]
        start: u32,

        /// Number of bytes to read (hex with 0x prefix, or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        length: u32,
    },

    /// Erase flash and EEPROM
    Erase {
        #[command(flatten)]
        conn: ConnectionArgs,
    },

    /// Show lock/fuse bytes, writing any that are given first
    Fuses {
        #[command(flatten)]
        conn: ConnectionArgs,

        /// New lock bits
        #[arg(long, value_parser = parse_hex_u8)]
        lock: Option<u8>,

        /// New fuse low byte
        #[arg(long, value_parser = parse_hex_u8)]
        low: Option<u8>,

        /// New fuse high byte
        #[arg(long, value_parser = parse_hex_u8)]
        high: Option<u8>,

        /// New extended fuse byte
        #[arg(long, value_parser = parse_hex_u8)]
        extended: Option<u8>,
    },

    /// List known parts
    ListDevices {
        /// Filter by name (case-insensitive, partial match)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Act as a programmer on a serial port with a simulated part attached
    Serve {
        /// Serial port to listen on
        #[arg(short, long)]
        port: String,

        /// Baud table index to listen at (0=2400 .. 6=115200)
        #[arg(long, default_value_t = DEFAULT_BAUD_INDEX, value_parser = parse_baud_index)]
        baud_index: usize,

        /// Simulated part (see list-devices)
        #[arg(long, default_value = "ATmega328")]
        part: String,

        /// Flash size of the simulated part in bytes
        #[arg(long, default_value = "0x8000", value_parser = parse_hex_u32)]
        flash_size: u32,

        /// EEPROM size of the simulated part in bytes
        #[arg(long, default_value = "0x400", value_parser = parse_hex_u32)]
        eeprom_size: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u32("0x1F00"), Ok(0x1F00));
        assert_eq!(parse_hex_u32("256"), Ok(256));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert_eq!(parse_hex_u8("0xDE"), Ok(0xDE));
        assert!(parse_hex_u8("0x100").is_err());
    }

    #[test]
    fn test_write_defaults() {
        let cli = Cli::parse_from(["avrprog", "write", "-p", "/dev/ttyUSB0", "-i", "fw.bin"]);
        match cli.command {
            Commands::Write {
                conn,
                memory,
                address,
                no_erase,
                no_verify,
                ..
            } => {
                assert_eq!(conn.baud_index, DEFAULT_BAUD_INDEX);
                assert!(conn.options().block_mode);
                assert_eq!(memory, MemoryArg::Flash);
                assert_eq!(address, 0);
                assert!(!no_erase && !no_verify);
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn test_baud_index_bounds() {
        assert_eq!(parse_baud_index("6"), Ok(6));
        assert!(parse_baud_index("7").is_err());
    }
}
