//! AVR910 programmer implementation
//!
//! This module provides the `Programmer` struct: synchronization and
//! capability discovery on connect, and one method per wire command.

use std::time::Duration;

use avrprog_core::device::{
    DeviceDatabase, FuseKind, LockFuseAccess, MemoryType, Signature,
};
use avrprog_core::protocol::{
    Command, DEVICE_LIST_END, REPLY_NO, REPLY_OK, REPLY_UNKNOWN, REPLY_YES,
};
use avrprog_core::Error as CoreError;

use crate::error::{DiscoveryStep, Error, Result};
use crate::options::Options;
use crate::session::{DeviceType, Session};
use crate::sync;
use crate::transport::{read_exact_timeout, Transport};

/// Upper bound on the `t` device list
const MAX_DEVICE_CODES: usize = 64;

/// Connection to an AVR910 programmer
pub struct Programmer<T: Transport> {
    /// Transport layer
    transport: T,
    /// Timing and behaviour
    options: Options,
    /// What discovery found
    session: Session,
}

impl<T: Transport> Programmer<T> {
    /// Synchronize and run capability discovery with the built-in device table
    pub fn connect(transport: T, options: Options) -> Result<Self> {
        Self::connect_with_database(transport, options, &DeviceDatabase::with_builtin())
    }

    /// Synchronize and run capability discovery
    ///
    /// This performs, in order:
    /// 1. Baud rate search
    /// 2. Leave programming mode
    /// 3. Read identifier and version
    /// 4. Enter programming mode
    /// 5. Read the signature and look it up
    /// 6. Read the lock/fuse bytes the part allows
    /// 7. Query autoincrement and block support
    pub fn connect_with_database(
        mut transport: T,
        options: Options,
        database: &DeviceDatabase,
    ) -> Result<Self> {
        let index = sync::synchronize(&mut transport, &options)?;
        let baud = avrprog_core::protocol::BAUD_RATES[index];
        let mut programmer = Self {
            transport,
            options,
            session: Session::new(baud),
        };
        programmer.discover(database)?;
        Ok(programmer)
    }

    fn discover(&mut self, database: &DeviceDatabase) -> Result<()> {
        self.leave_programming_mode()
            .map_err(|e| Error::discovery(DiscoveryStep::LeaveProgramming, e))?;

        self.session.identifier = self
            .read_identifier()
            .map_err(|e| Error::discovery(DiscoveryStep::Identifier, e))?;
        log::info!("avr910: programmer is \"{}\"", self.session.identifier);

        self.enter_programming_mode()
            .map_err(|e| Error::discovery(DiscoveryStep::EnterProgramming, e))?;

        let signature = self
            .read_signature()
            .map_err(|e| Error::discovery(DiscoveryStep::Signature, e))?;
        self.session.signature = signature;

        match database.find_by_signature(signature) {
            Some(entry) => {
                log::info!("avr910: found {} (signature {})", entry.name, signature);
                self.session.device_type = DeviceType::Known(entry.name.clone());
                self.session.capabilities = Some(entry.descriptor);
            }
            None => {
                log::warn!("avr910: {} (signature {})", CoreError::UnsupportedDevice, signature);
                self.session.device_type = DeviceType::Unknown;
                self.session.capabilities = None;
            }
        }

        let access = self.session.lock_fuse();
        for kind in FuseKind::ALL {
            if !access.contains(LockFuseAccess::read_flag(kind)) {
                continue;
            }
            let value = self
                .read_fuse(kind)
                .map_err(|e| Error::discovery(DiscoveryStep::LockFuse, e))?;
            log::debug!("avr910: {} = 0x{:02X}", kind.name(), value);
            self.session.fuses.set(kind, Some(value));
        }

        self.session.autoincrement = self
            .autoincrement()
            .map_err(|e| Error::discovery(DiscoveryStep::AutoIncrement, e))?;

        let (supported, size) = self
            .block_support()
            .map_err(|e| Error::discovery(DiscoveryStep::BlockSupport, e))?;
        self.session.block_transfer_supported = supported && self.session.is_supported();
        self.session.page_size_bytes = if self.session.block_transfer_supported && size > 0 {
            size as u32
        } else {
            1
        };
        log::debug!(
            "avr910: autoincrement={}, block={}, page size {} bytes",
            self.session.autoincrement,
            self.session.block_transfer_supported,
            self.session.page_size_bytes
        );

        Ok(())
    }

    /// Session information
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Connection options
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Leave programming mode, optionally exit to passthrough, and return the transport
    pub fn finish(mut self, exit: bool) -> Result<T> {
        self.leave_programming_mode()?;
        if exit {
            self.exit()?;
        }
        Ok(self.transport)
    }

    /// Give up the transport without talking to the programmer
    pub fn into_transport(self) -> T {
        self.transport
    }

    // ---- Protocol implementation ----

    /// Send a command with its parameters
    fn send(&mut self, cmd: Command, params: &[u8]) -> Result<()> {
        log::debug!("avr910: sending {:?}", cmd);
        let mut frame = Vec::with_capacity(1 + params.len());
        frame.push(cmd.byte());
        frame.extend_from_slice(params);
        self.transport.write(&frame)
    }

    /// Read exactly `buf.len()` reply bytes
    fn receive(&mut self, cmd: Command, buf: &mut [u8], timeout_ms: u32) -> Result<()> {
        let n = read_exact_timeout(&mut self.transport, buf, timeout_ms)?;
        if n < buf.len() {
            log::debug!(
                "avr910: {:?} got {} of {} reply bytes",
                cmd,
                n,
                buf.len()
            );
            return Err(CoreError::LinkTimeout { command: cmd.byte() }.into());
        }
        Ok(())
    }

    /// Read a single-byte acknowledge
    fn expect_ok(&mut self, cmd: Command, timeout_ms: u32) -> Result<()> {
        let mut reply = [0u8; 1];
        self.receive(cmd, &mut reply, timeout_ms)?;
        match reply[0] {
            REPLY_OK => Ok(()),
            REPLY_UNKNOWN => Err(CoreError::ProtocolRejected { command: cmd.byte() }.into()),
            other => Err(CoreError::UnexpectedReply {
                command: cmd.byte(),
                reply: other,
            }
            .into()),
        }
    }

    /// Send a command and wait for `\r`
    fn do_command(&mut self, cmd: Command, params: &[u8], timeout_ms: u32) -> Result<()> {
        self.send(cmd, params)?;
        self.expect_ok(cmd, timeout_ms)
    }

    /// Send a command and read a fixed-size reply
    fn do_command_ret<const N: usize>(&mut self, cmd: Command) -> Result<[u8; N]> {
        self.send(cmd, &[])?;
        let mut reply = [0u8; N];
        self.receive(cmd, &mut reply, self.options.response_timeout_ms)?;
        Ok(reply)
    }

    /// Send a Y/N query
    fn query(&mut self, cmd: Command) -> Result<bool> {
        let [reply] = self.do_command_ret::<1>(cmd)?;
        match reply {
            REPLY_YES => Ok(true),
            REPLY_NO => Ok(false),
            REPLY_UNKNOWN => Err(CoreError::ProtocolRejected { command: cmd.byte() }.into()),
            other => Err(CoreError::UnexpectedReply {
                command: cmd.byte(),
                reply: other,
            }
            .into()),
        }
    }

    /// Flush a partially sent command and check the programmer answers again
    pub fn resync(&mut self) -> Result<()> {
        sync::resync(&mut self.transport, &self.options)
    }

    // ---- Identification ----

    /// `S` + `V`: identifier string such as `AVRSPRG version 00`
    pub fn read_identifier(&mut self) -> Result<String> {
        let id = self.do_command_ret::<7>(Command::ProgrammerId)?;
        let version = self.do_command_ret::<2>(Command::SoftwareVersion)?;
        Ok(format!(
            "{} version {}",
            String::from_utf8_lossy(&id).trim_end_matches('\0'),
            String::from_utf8_lossy(&version)
        ))
    }

    /// `p`: programmer type (`S` for serial)
    pub fn programmer_type(&mut self) -> Result<u8> {
        let [kind] = self.do_command_ret::<1>(Command::ProgrammerType)?;
        Ok(kind)
    }

    /// `t`: device codes the programmer claims to support
    pub fn device_codes(&mut self) -> Result<Vec<u8>> {
        self.send(Command::DeviceCodes, &[])?;
        let mut codes = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            self.receive(Command::DeviceCodes, &mut byte, self.options.response_timeout_ms)?;
            if byte[0] == DEVICE_LIST_END {
                return Ok(codes);
            }
            if codes.len() == MAX_DEVICE_CODES {
                return Err(CoreError::UnexpectedReply {
                    command: Command::DeviceCodes.byte(),
                    reply: byte[0],
                }
                .into());
            }
            codes.push(byte[0]);
        }
    }

    /// `a`: whether the cursor auto-increments
    pub fn autoincrement(&mut self) -> Result<bool> {
        self.query(Command::AutoIncrement)
    }

    /// `b`: block support and page size in bytes
    pub fn block_support(&mut self) -> Result<(bool, u16)> {
        let [flag, hi, lo] = self.do_command_ret::<3>(Command::BlockSupport)?;
        let supported = match flag {
            REPLY_YES => true,
            REPLY_NO => false,
            other => {
                return Err(CoreError::UnexpectedReply {
                    command: Command::BlockSupport.byte(),
                    reply: other,
                }
                .into())
            }
        };
        Ok((supported, u16::from_be_bytes([hi, lo])))
    }

    // ---- Session control ----

    /// `P`: enter programming mode
    pub fn enter_programming_mode(&mut self) -> Result<()> {
        self.do_command(Command::EnterProgramming, &[], self.options.write_timeout_ms)
    }

    /// `L`: leave programming mode
    pub fn leave_programming_mode(&mut self) -> Result<()> {
        self.do_command(Command::LeaveProgramming, &[], self.options.response_timeout_ms)
    }

    /// `s`: read the signature
    pub fn read_signature(&mut self) -> Result<Signature> {
        let reply = self.do_command_ret::<3>(Command::ReadSignature)?;
        Ok(Signature::from_wire(reply))
    }

    /// `e`: erase flash and EEPROM
    pub fn chip_erase(&mut self) -> Result<()> {
        log::info!("avr910: erasing chip");
        self.do_command(Command::ChipErase, &[], self.options.write_timeout_ms)
    }

    /// `x`/`y`: switch the programmer LED
    pub fn set_led(&mut self, on: bool) -> Result<()> {
        let cmd = if on { Command::SetLed } else { Command::ClearLed };
        self.do_command(cmd, &[0], self.options.response_timeout_ms)
    }

    /// `E`: hand the link over to the attached part
    pub fn exit(&mut self) -> Result<()> {
        log::info!("avr910: exiting to passthrough");
        self.do_command(Command::Exit, &[], self.options.response_timeout_ms)
    }

    /// `A`: place the cursor (word address for flash, byte address for EEPROM)
    ///
    /// A failed attempt is followed by a resync and one more try.
    pub fn set_address(&mut self, address: u32) -> Result<()> {
        let wire = u16::try_from(address)
            .map_err(|_| CoreError::InvalidParameter("address exceeds 16-bit cursor"))?;
        let params = wire.to_be_bytes();
        let timeout = self.options.response_timeout_ms;
        match self.do_command(Command::SetAddress, &params, timeout) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::warn!("avr910: set address 0x{:04X} failed: {}", wire, e);
                self.resync()?;
                self.do_command(Command::SetAddress, &params, timeout)
            }
        }
    }

    // ---- Lock and fuse bytes ----

    /// `r`/`F`/`N`/`Q`: read a lock/fuse byte
    pub fn read_fuse(&mut self, kind: FuseKind) -> Result<u8> {
        let cmd = match kind {
            FuseKind::Lock => Command::ReadLock,
            FuseKind::Low => Command::ReadFuse,
            FuseKind::High => Command::ReadHighFuse,
            FuseKind::Extended => Command::ReadExtFuse,
        };
        let [value] = self.do_command_ret::<1>(cmd)?;
        Ok(value)
    }

    /// `l`/`f`/`n`/`q`: write a lock/fuse byte
    ///
    /// Returns `false` without sending anything when the part does not
    /// allow writing this byte.
    pub fn write_fuse(&mut self, kind: FuseKind, value: u8) -> Result<bool> {
        if !self.session.lock_fuse().can_write(kind) {
            log::warn!("avr910: {} write not supported by {}", kind.name(), self.session.device_type);
            return Ok(false);
        }
        let cmd = match kind {
            FuseKind::Lock => Command::WriteLock,
            FuseKind::Low => Command::WriteFuse,
            FuseKind::High => Command::WriteHighFuse,
            FuseKind::Extended => Command::WriteExtFuse,
        };
        self.do_command(cmd, &[value], self.options.write_timeout_ms)?;
        log::info!("avr910: wrote {} 0x{:02X}", kind.name(), value);
        if self.session.lock_fuse().can_read(kind) {
            self.session.fuses.set(kind, Some(value));
        }
        Ok(true)
    }

    // ---- Memory access ----

    /// `R`: read the flash word at the cursor, returned as `[low, high]`
    pub fn read_flash_word(&mut self) -> Result<[u8; 2]> {
        let [hi, lo] = self.do_command_ret::<2>(Command::ReadFlashWord)?;
        Ok([lo, hi])
    }

    /// `c`: load the low byte of the word at the cursor
    pub fn write_flash_low(&mut self, data: u8) -> Result<()> {
        self.do_command(Command::WriteFlashLow, &[data], self.options.write_timeout_ms)
    }

    /// `C`: load the high byte of the word at the cursor and advance
    pub fn write_flash_high(&mut self, data: u8) -> Result<()> {
        self.do_command(Command::WriteFlashHigh, &[data], self.options.write_timeout_ms)
    }

    /// `m`: commit the flash page containing the cursor
    pub fn commit_page(&mut self) -> Result<()> {
        self.do_command(Command::CommitPage, &[], self.options.write_timeout_ms)
    }

    /// `D`: write the EEPROM byte at the cursor and advance
    pub fn write_eeprom_byte(&mut self, data: u8) -> Result<()> {
        self.do_command(Command::WriteEeprom, &[data], self.options.write_timeout_ms)
    }

    /// `d`: read the EEPROM byte at the cursor and advance
    pub fn read_eeprom_byte(&mut self) -> Result<u8> {
        let [data] = self.do_command_ret::<1>(Command::ReadEeprom)?;
        Ok(data)
    }

    /// `B`: write a block starting at the cursor
    pub fn block_write(&mut self, memory: MemoryType, data: &[u8]) -> Result<()> {
        let len = block_len(data.len())?;
        let [hi, lo] = len.to_be_bytes();
        self.send(Command::BlockWrite, &[hi, lo, memory.wire_byte()])?;

        if self.options.char_delay_us == 0 {
            self.transport.write(data)?;
        } else {
            let delay = Duration::from_micros(self.options.char_delay_us as u64);
            for byte in data {
                self.transport.write(core::slice::from_ref(byte))?;
                std::thread::sleep(delay);
            }
        }
        self.expect_ok(Command::BlockWrite, self.options.write_timeout_ms)
    }

    /// `g`: read a block starting at the cursor
    pub fn block_read(&mut self, memory: MemoryType, buf: &mut [u8]) -> Result<()> {
        let len = block_len(buf.len())?;
        let [hi, lo] = len.to_be_bytes();
        self.send(Command::BlockRead, &[hi, lo, memory.wire_byte()])?;
        self.receive(Command::BlockRead, buf, self.options.response_timeout_ms)
    }
}

fn block_len(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::InvalidParameter(format!("block of {} bytes", len)))
}
