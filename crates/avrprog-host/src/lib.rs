//! avrprog-host - host side of the AVR910 serial programming protocol
//!
//! This crate drives an AVR910 programmer over a serial line: it finds the
//! programmer's baud rate, discovers the attached part and moves memory
//! images through the shared page transfer algorithm.
//!
//! # Connection Overview
//!
//! Connecting is a fixed sequence. The baud search probes each standard
//! rate with an idle byte and confirms with `a`; discovery then leaves and
//! re-enters programming mode, reads the signature and the lock/fuse bytes
//! the part allows, and asks for block support and the page size.
//!
//! # Example
//!
//! ```no_run
//! use avrprog_core::device::MemoryType;
//! use avrprog_core::transfer::{ImageRecords, NoProgress};
//! use avrprog_host::{open_serial, Options, ProgramOptions};
//!
//! let mut programmer = open_serial("/dev/ttyUSB0", Options::default())?;
//! println!("found {}", programmer.session().device_type);
//!
//! let image = std::fs::read("firmware.bin")?;
//! programmer.program(
//!     MemoryType::Flash,
//!     ImageRecords::new(0, &image),
//!     &ProgramOptions::default(),
//!     &mut NoProgress,
//! )?;
//! programmer.finish(false)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod device;
pub mod error;
pub mod memory;
pub mod options;
pub mod session;
pub mod sync;
pub mod transport;

// Re-exports
pub use device::Programmer;
pub use error::{DiscoveryStep, Error, Result};
pub use memory::{MemoryPages, ProgramOptions};
pub use options::Options;
pub use session::{DeviceType, Session};
pub use transport::serial::SerialTransport;
pub use transport::Transport;

use avrprog_core::device::DeviceDatabase;

/// Open a serial port and connect to the programmer behind it
pub fn open_serial(device: &str, options: Options) -> Result<Programmer<SerialTransport>> {
    open_serial_with_database(device, options, &DeviceDatabase::with_builtin())
}

/// Open a serial port and connect, identifying parts from `database`
pub fn open_serial_with_database(
    device: &str,
    options: Options,
    database: &DeviceDatabase,
) -> Result<Programmer<SerialTransport>> {
    let transport = SerialTransport::open(device, options.initial_baud())?;
    Programmer::connect_with_database(transport, options, database)
}
