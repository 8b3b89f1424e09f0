//! Block transfer (`B` and `g`) with on-chip page buffering

use avrprog_core::device::MemoryType;
use avrprog_core::programmer::IspBus;
use avrprog_core::protocol::{isp, REPLY_OK, REPLY_UNKNOWN};
use avrprog_core::transfer::PAD_BYTE;
use embedded_io::{Read, Write};

use crate::interpreter::{Interpreter, Result};
use crate::isp::DelayKind;

impl<L: Read + Write, B: IspBus> Interpreter<L, B> {
    /// Receive `size` bytes and program them from the cursor onwards
    ///
    /// The page buffer is committed whenever the cursor crosses a page
    /// boundary and once more after the last byte. Without a selected part
    /// the data is still consumed so it is not taken for commands.
    pub(crate) fn block_load(&mut self, size: u16, memory: MemoryType) -> Result<(), L::Error> {
        let Some(desc) = self.session.descriptor() else {
            for _ in 0..size {
                self.read_byte()?;
            }
            return self.reply(&[REPLY_UNKNOWN]);
        };
        log::debug!(
            "avr910: block load {} bytes of {} at 0x{:04X}",
            size,
            memory,
            self.session.cursor
        );

        let mut remaining = size as usize;
        match memory {
            MemoryType::Flash => {
                let mask = desc.flash_page_mask();
                let mut page = self.session.cursor & !mask;
                while remaining > 0 {
                    let lo = self.read_byte()?;
                    remaining -= 1;
                    let hi = if remaining > 0 {
                        remaining -= 1;
                        self.read_byte()?
                    } else {
                        PAD_BYTE
                    };

                    let word = self.session.advance();
                    if desc.flash_paged() {
                        let offset = (word & mask) as u8;
                        self.isp.transaction(isp::load_flash_page(false, offset, lo));
                        self.isp.transaction(isp::load_flash_page(true, offset, hi));
                        if self.session.cursor & mask == 0 || remaining == 0 {
                            self.isp.transaction(isp::write_flash_page(page));
                            self.isp.poll_delay(Some(desc), DelayKind::Short);
                            page = self.session.cursor & !mask;
                        }
                    } else {
                        self.isp.transaction(isp::write_flash(false, word, lo));
                        self.isp.poll_delay(Some(desc), DelayKind::Long);
                        self.isp.transaction(isp::write_flash(true, word, hi));
                        self.isp.poll_delay(Some(desc), DelayKind::Long);
                    }
                }
            }
            MemoryType::Eeprom => {
                let mask = desc.eeprom_page_mask();
                let mut page = self.session.cursor & !mask;
                while remaining > 0 {
                    let data = self.read_byte()?;
                    remaining -= 1;

                    let address = self.session.advance();
                    if desc.eeprom_paged() {
                        let offset = (address & mask) as u8;
                        self.isp.transaction(isp::load_eeprom_page(offset, data));
                        if self.session.cursor & mask == 0 || remaining == 0 {
                            self.isp.transaction(isp::write_eeprom_page(page));
                            self.isp.poll_delay(Some(desc), DelayKind::Long);
                            page = self.session.cursor & !mask;
                        }
                    } else {
                        self.isp.transaction(isp::write_eeprom(address, data));
                        self.isp.poll_delay(Some(desc), DelayKind::Long);
                    }
                }
            }
        }

        self.reply(&[REPLY_OK])
    }

    /// Send `size` bytes starting at the cursor
    ///
    /// Flash words go out low byte first.
    pub(crate) fn block_read(&mut self, size: u16, memory: MemoryType) -> Result<(), L::Error> {
        log::debug!(
            "avr910: block read {} bytes of {} at 0x{:04X}",
            size,
            memory,
            self.session.cursor
        );

        let mut remaining = size as usize;
        while remaining > 0 {
            match memory {
                MemoryType::Flash => {
                    let word = self.session.advance();
                    let lo = self.isp.read(isp::read_flash(false, word));
                    self.reply(&[lo])?;
                    remaining -= 1;
                    if remaining > 0 {
                        let hi = self.isp.read(isp::read_flash(true, word));
                        self.reply(&[hi])?;
                        remaining -= 1;
                    }
                }
                MemoryType::Eeprom => {
                    let address = self.session.advance();
                    let data = self.isp.read(isp::read_eeprom(address));
                    self.reply(&[data])?;
                    remaining -= 1;
                }
            }
        }
        Ok(())
    }
}
