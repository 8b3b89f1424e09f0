//! avrprog - AVR910 serial in-system programmer
//!
//! Talks to an AVR910 programmer over a serial port: finds its baud rate,
//! identifies the attached part and reads, writes, verifies and erases its
//! flash, EEPROM and lock/fuse bytes.
//!
//! # Architecture
//!
//! - **avrprog-core** holds what both ends share: the wire protocol, the
//!   device table and the page transfer algorithm.
//! - **avrprog-host** drives a programmer from the PC.
//! - **avrprog-target** is the programmer firmware's interpreter; the
//!   `serve` command runs it on a serial port against a simulated part.

mod cli;
mod commands;

use avrprog_core::device::{DeviceDatabase, FuseBytes};
use avrprog_core::protocol::BAUD_RATES;
use avrprog_dummy::DummyConfig;
use avrprog_host::{open_serial_with_database, ProgramOptions, Programmer, SerialTransport};
use clap::Parser;
use cli::{Cli, Commands, ConnectionArgs};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let db = match load_device_database(cli.device_db.as_deref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to load device database: {}", e);
            std::process::exit(1);
        }
    };

    log::debug!("Loaded {} device definitions", db.len());

    match cli.command {
        Commands::Info { conn } => {
            with_programmer(&conn, &db, commands::run_info)
        }
        Commands::Write {
            conn,
            input,
            memory,
            address,
            no_erase,
            no_verify,
        } => {
            let options = ProgramOptions {
                erase: !no_erase,
                verify: !no_verify,
            };
            with_programmer(&conn, &db, |p| {
                commands::run_write(p, &input, memory.into(), address, &options)
            })
        }
        Commands::Verify {
            conn,
            input,
            memory,
            address,
        } => with_programmer(&conn, &db, |p| {
            commands::run_verify(p, &input, memory.into(), address)
        }),
        Commands::Read {
            conn,
            output,
            memory,
            start,
            length,
        } => with_programmer(&conn, &db, |p| {
            commands::run_read(p, &output, memory.into(), start, length)
        }),
        Commands::Erase { conn } => with_programmer(&conn, &db, commands::run_erase),
        Commands::Fuses {
            conn,
            lock,
            low,
            high,
            extended,
        } => {
            let changes = FuseBytes {
                lock,
                low,
                high,
                extended,
            };
            with_programmer(&conn, &db, |p| commands::run_fuses(p, &changes))
        }
        Commands::ListDevices { name } => {
            commands::list_devices(&db, name.as_deref());
            Ok(())
        }
        Commands::Serve {
            port,
            baud_index,
            part,
            flash_size,
            eeprom_size,
        } => {
            let config = DummyConfig::from_part(&part, flash_size as usize, eeprom_size as usize)
                .ok_or_else(|| format!("Unknown part {:?} (see list-devices)", part))?;
            commands::run_serve(&port, BAUD_RATES[baud_index], config)
        }
    }
}

/// Connect, run `f`, then leave programming mode (and exit if asked)
///
/// Programming mode is left even when `f` fails.
fn with_programmer<F>(
    conn: &ConnectionArgs,
    db: &DeviceDatabase,
    f: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut Programmer<SerialTransport>) -> Result<(), Box<dyn std::error::Error>>,
{
    let mut programmer = open_serial_with_database(&conn.port, conn.options(), db)?;
    let session = programmer.session();
    println!(
        "Found: {} on \"{}\" at {} baud",
        session.device_type, session.identifier, session.baud_rate
    );

    let result = f(&mut programmer);
    match programmer.finish(conn.exit) {
        Ok(_) => result,
        Err(e) => {
            log::warn!("Failed to leave programming mode: {}", e);
            result.and(Err(e.into()))
        }
    }
}

/// Built-in table, followed by the entries of `path` if given
fn load_device_database(path: Option<&Path>) -> Result<DeviceDatabase, Box<dyn std::error::Error>> {
    let mut db = DeviceDatabase::with_builtin();

    if let Some(path) = path {
        if !path.is_file() {
            return Err(format!("Device database not found: {}", path.display()).into());
        }
        let count = db.load_file(path)?;
        log::info!("Loaded {} device definitions from {}", count, path.display());
    }

    Ok(db)
}
