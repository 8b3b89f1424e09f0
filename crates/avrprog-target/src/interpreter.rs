//! Command dispatch loop

use avrprog_core::device::{lookup, FuseKind, MemoryType};
use avrprog_core::programmer::IspBus;
use avrprog_core::protocol::{
    isp, Command, DEVICE_LIST_END, PROGRAMMER_ID, PROGRAMMER_TYPE, PROGRAMMER_VERSION, REPLY_NO,
    REPLY_OK, REPLY_UNKNOWN, REPLY_YES,
};
use embedded_io::{Read, Write};

use crate::error::TargetError;
use crate::isp::{DelayKind, Isp};
use crate::session::TargetSession;

/// Interpreter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for the next command
    Idle,
    /// Serial traffic belongs to the attached part; only a reset leaves this
    Passthrough,
}

pub(crate) type Result<T, E> = core::result::Result<T, TargetError<E>>;

/// AVR910 command interpreter
pub struct Interpreter<L, B> {
    pub(crate) link: L,
    pub(crate) isp: Isp<B>,
    pub(crate) session: TargetSession,
    state: State,
}

impl<L: Read + Write, B: IspBus> Interpreter<L, B> {
    /// Create an interpreter in the idle state with the bus released
    pub fn new(link: L, bus: B) -> Self {
        let mut isp = Isp::new(bus);
        isp.release();
        Self {
            link,
            isp,
            session: TargetSession::default(),
            state: State::Idle,
        }
    }

    /// Current state
    pub fn state(&self) -> State {
        self.state
    }

    /// Session state (cursor and selected part)
    pub fn session(&self) -> &TargetSession {
        &self.session
    }

    /// Borrow the ISP bus
    pub fn bus(&self) -> &B {
        self.isp.bus()
    }

    /// Mutably borrow the link, e.g. to relay passthrough traffic
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Take the interpreter apart
    pub fn into_parts(self) -> (L, B) {
        (self.link, self.isp.into_inner())
    }

    /// Serve commands until the host switches to passthrough
    pub fn run(&mut self) -> Result<(), L::Error> {
        log::info!("avr910: interpreter running");
        while self.step()? == State::Idle {}
        log::info!("avr910: entering passthrough");
        Ok(())
    }

    /// Read and execute one command
    ///
    /// In passthrough this returns immediately without touching the link.
    pub fn step(&mut self) -> Result<State, L::Error> {
        if self.state == State::Passthrough {
            return Ok(State::Passthrough);
        }
        let byte = self.read_byte()?;
        match Command::from_byte(byte) {
            Some(cmd) => {
                log::debug!("avr910: command {:?}", cmd);
                self.dispatch(cmd)?;
            }
            None => {
                log::debug!("avr910: unknown command 0x{:02X}", byte);
                self.reply(&[REPLY_UNKNOWN])?;
            }
        }
        Ok(self.state)
    }

    fn dispatch(&mut self, cmd: Command) -> Result<(), L::Error> {
        match cmd {
            // Canned replies
            Command::AutoIncrement => self.reply(&[REPLY_YES]),
            Command::ProgrammerType => self.reply(&[PROGRAMMER_TYPE]),
            Command::ProgrammerId => self.reply(PROGRAMMER_ID),
            Command::SoftwareVersion => self.reply(PROGRAMMER_VERSION),
            Command::DeviceCodes => self.reply(&[DEVICE_LIST_END]),
            Command::BlockSupport => self.block_support(),
            Command::SelectDevice => {
                self.read_byte()?;
                self.reply(&[REPLY_OK])
            }
            Command::SetLed | Command::ClearLed => {
                self.read_byte()?;
                self.isp.bus_mut().set_led(cmd == Command::SetLed);
                self.reply(&[REPLY_OK])
            }
            Command::Escape => Ok(()),

            // Session control
            Command::SetAddress => {
                self.session.cursor = self.read_u16()?;
                self.reply(&[REPLY_OK])
            }
            Command::EnterProgramming => self.enter_programming(),
            Command::LeaveProgramming => {
                self.isp.release();
                self.session.part = None;
                self.reply(&[REPLY_OK])
            }
            Command::ChipErase => self.chip_erase(),
            Command::ReadSignature => {
                let sig = self.isp.read_signature();
                self.reply(&sig.to_wire())
            }
            Command::Exit => {
                self.reply(&[REPLY_OK])?;
                self.isp.release();
                self.isp.bus_mut().enter_passthrough();
                self.state = State::Passthrough;
                Ok(())
            }

            // Single-unit memory access
            Command::ReadFlashWord => {
                let word = self.session.advance();
                let hi = self.isp.read(isp::read_flash(true, word));
                let lo = self.isp.read(isp::read_flash(false, word));
                self.reply(&[hi, lo])
            }
            Command::WriteFlashLow => self.write_flash_byte(false),
            Command::WriteFlashHigh => self.write_flash_byte(true),
            Command::CommitPage => self.commit_page(),
            Command::WriteEeprom => {
                let data = self.read_byte()?;
                if self.session.part.is_none() {
                    return self.reply(&[REPLY_UNKNOWN]);
                }
                let address = self.session.advance();
                self.isp.transaction(isp::write_eeprom(address, data));
                self.isp.poll_delay(self.session.descriptor(), DelayKind::Long);
                self.reply(&[REPLY_OK])
            }
            Command::ReadEeprom => {
                let address = self.session.advance();
                let data = self.isp.read(isp::read_eeprom(address));
                self.reply(&[data])
            }

            // Block access
            Command::BlockWrite => {
                let size = self.read_u16()?;
                let memory = self.read_byte()?;
                match MemoryType::from_wire(memory) {
                    Some(memory) => self.block_load(size, memory),
                    None => self.reply(&[REPLY_UNKNOWN]),
                }
            }
            Command::BlockRead => {
                let size = self.read_u16()?;
                let memory = self.read_byte()?;
                match MemoryType::from_wire(memory) {
                    Some(memory) => self.block_read(size, memory),
                    None => self.reply(&[REPLY_UNKNOWN]),
                }
            }

            // Lock and fuse bytes
            Command::ReadLock => self.read_fuse(FuseKind::Lock),
            Command::ReadFuse => self.read_fuse(FuseKind::Low),
            Command::ReadHighFuse => self.read_fuse(FuseKind::High),
            Command::ReadExtFuse => self.read_fuse(FuseKind::Extended),
            Command::WriteLock => self.write_fuse(FuseKind::Lock),
            Command::WriteFuse => self.write_fuse(FuseKind::Low),
            Command::WriteHighFuse => self.write_fuse(FuseKind::High),
            Command::WriteExtFuse => self.write_fuse(FuseKind::Extended),
        }
    }

    fn block_support(&mut self) -> Result<(), L::Error> {
        let [hi, lo] = match self.session.descriptor() {
            Some(d) if d.flash_paged() => d.flash_page_bytes().to_be_bytes(),
            _ => return self.reply(&[REPLY_NO, 0, 0]),
        };
        self.reply(&[REPLY_YES, hi, lo])
    }

    fn enter_programming(&mut self) -> Result<(), L::Error> {
        if !self.isp.enter_programming_mode() {
            log::warn!("avr910: attached part does not respond");
            self.isp.release();
            self.session.part = None;
            return self.reply(&[REPLY_UNKNOWN]);
        }

        let sig = self.isp.read_signature();
        match lookup(sig) {
            Some(part) => {
                log::info!("avr910: found {} ({})", part.name, sig);
                self.session.part = Some(part);
                self.reply(&[REPLY_OK])
            }
            None => {
                log::warn!("avr910: unsupported signature {}", sig);
                self.isp.release();
                self.session.part = None;
                self.reply(&[REPLY_UNKNOWN])
            }
        }
    }

    fn chip_erase(&mut self) -> Result<(), L::Error> {
        if self.session.part.is_none() {
            return self.reply(&[REPLY_UNKNOWN]);
        }
        self.isp.transaction(isp::chip_erase());
        self.isp.poll_delay(self.session.descriptor(), DelayKind::Long);
        self.reply(&[REPLY_OK])
    }

    fn write_flash_byte(&mut self, high: bool) -> Result<(), L::Error> {
        let data = self.read_byte()?;
        let Some(desc) = self.session.descriptor() else {
            return self.reply(&[REPLY_UNKNOWN]);
        };
        let word = if high {
            self.session.advance()
        } else {
            self.session.cursor
        };
        if desc.flash_paged() {
            let offset = (word & desc.flash_page_mask()) as u8;
            self.isp.transaction(isp::load_flash_page(high, offset, data));
        } else {
            self.isp.transaction(isp::write_flash(high, word, data));
            self.isp.poll_delay(Some(desc), DelayKind::Long);
        }
        self.reply(&[REPLY_OK])
    }

    fn commit_page(&mut self) -> Result<(), L::Error> {
        let Some(desc) = self.session.descriptor() else {
            return self.reply(&[REPLY_UNKNOWN]);
        };
        if desc.flash_paged() {
            let page = self.session.cursor & !desc.flash_page_mask();
            log::debug!("avr910: commit flash page 0x{:04X}", page);
            self.isp.transaction(isp::write_flash_page(page));
            self.isp.poll_delay(Some(desc), DelayKind::Short);
        }
        self.reply(&[REPLY_OK])
    }

    fn read_fuse(&mut self, kind: FuseKind) -> Result<(), L::Error> {
        let value = match self.session.descriptor() {
            Some(d) if d.lock_fuse.can_read(kind) => self.isp.read(isp::read_fuse(kind)),
            _ => 0x00,
        };
        self.reply(&[value])
    }

    fn write_fuse(&mut self, kind: FuseKind) -> Result<(), L::Error> {
        let value = self.read_byte()?;
        match self.session.descriptor() {
            Some(d) if d.lock_fuse.can_write(kind) => {
                log::debug!("avr910: write {} 0x{:02X}", kind.name(), value);
                self.isp.transaction(isp::write_fuse(kind, value));
                self.isp.poll_delay(Some(d), DelayKind::Long);
            }
            _ => log::debug!("avr910: {} write not supported, skipped", kind.name()),
        }
        self.reply(&[REPLY_OK])
    }

    pub(crate) fn read_byte(&mut self) -> Result<u8, L::Error> {
        let mut buf = [0u8; 1];
        match self.link.read(&mut buf).map_err(TargetError::Link)? {
            0 => Err(TargetError::LinkClosed),
            _ => Ok(buf[0]),
        }
    }

    fn read_u16(&mut self) -> Result<u16, L::Error> {
        let hi = self.read_byte()?;
        let lo = self.read_byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    pub(crate) fn reply(&mut self, bytes: &[u8]) -> Result<(), L::Error> {
        self.link.write_all(bytes).map_err(TargetError::Link)?;
        self.link.flush().map_err(TargetError::Link)
    }
}
