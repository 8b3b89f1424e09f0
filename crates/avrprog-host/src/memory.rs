//! Page access to flash and EEPROM, and the upload/verify/read operations built on it

use avrprog_core::device::MemoryType;
use avrprog_core::transfer::{
    transfer, PageAccess, Record, TransferOptions, TransferProgress, TransferStats, PAD_BYTE,
};
use avrprog_core::Error as CoreError;

use crate::device::Programmer;
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Largest span fetched by one read in [`Programmer::read_memory`]
const READ_CHUNK: usize = 256;

/// What an upload does besides writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramOptions {
    /// Chip-erase before writing flash
    pub erase: bool,
    /// Read back and compare every page
    pub verify: bool,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            erase: true,
            verify: true,
        }
    }
}

/// One memory of the attached part seen through the programmer
///
/// Addresses are byte offsets. Flash is word addressed on the wire, so
/// flash pages are widened to whole words with `0xFF`, which leaves the
/// neighbouring byte unchanged.
pub struct MemoryPages<'a, T: Transport> {
    programmer: &'a mut Programmer<T>,
    memory: MemoryType,
    /// Wire address the target cursor is known to hold
    cursor: Option<u32>,
}

impl<'a, T: Transport> MemoryPages<'a, T> {
    /// Access `memory` through `programmer`
    pub fn new(programmer: &'a mut Programmer<T>, memory: MemoryType) -> Self {
        Self {
            programmer,
            memory,
            cursor: None,
        }
    }

    fn block_mode(&self) -> bool {
        self.programmer.options().block_mode && self.programmer.session().block_transfer_supported
    }

    fn seek(&mut self, wire: u32) -> Result<()> {
        if self.cursor != Some(wire) {
            self.programmer.set_address(wire)?;
            self.cursor = Some(wire);
        }
        Ok(())
    }

    fn write_flash(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let (start, wide) = widen(address, data);
        let word = MemoryType::Flash.wire_address(start);
        self.seek(word)?;
        self.cursor = None;

        if self.block_mode() {
            self.programmer.block_write(MemoryType::Flash, &wide)?;
            self.cursor = Some(word + (wide.len() / 2) as u32);
        } else {
            for pair in wide.chunks_exact(2) {
                self.programmer.write_flash_low(pair[0])?;
                self.programmer.write_flash_high(pair[1])?;
            }
            // `m` commits the page holding the cursor, which may have moved on
            self.programmer.set_address(word)?;
            self.programmer.commit_page()?;
            self.cursor = Some(word);
        }
        Ok(())
    }

    fn write_eeprom(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.seek(address)?;
        self.cursor = None;
        if self.block_mode() {
            self.programmer.block_write(MemoryType::Eeprom, data)?;
        } else {
            for &byte in data {
                self.programmer.write_eeprom_byte(byte)?;
            }
        }
        self.cursor = Some(address + data.len() as u32);
        Ok(())
    }

    fn read_flash(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let start = address & !1;
        let skip = (address - start) as usize;
        let mut wide = vec![0u8; (skip + buf.len() + 1) & !1];
        let word = MemoryType::Flash.wire_address(start);
        self.seek(word)?;
        self.cursor = None;

        if self.block_mode() {
            self.programmer.block_read(MemoryType::Flash, &mut wide)?;
        } else {
            for pair in wide.chunks_exact_mut(2) {
                pair.copy_from_slice(&self.programmer.read_flash_word()?);
            }
        }
        self.cursor = Some(word + (wide.len() / 2) as u32);
        buf.copy_from_slice(&wide[skip..skip + buf.len()]);
        Ok(())
    }

    fn read_eeprom(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        self.seek(address)?;
        self.cursor = None;
        if self.block_mode() {
            self.programmer.block_read(MemoryType::Eeprom, buf)?;
        } else {
            for byte in buf.iter_mut() {
                *byte = self.programmer.read_eeprom_byte()?;
            }
        }
        self.cursor = Some(address + buf.len() as u32);
        Ok(())
    }
}

impl<T: Transport> PageAccess for MemoryPages<'_, T> {
    type Error = Error;

    fn set_address(&mut self, address: u32) -> Result<()> {
        self.seek(self.memory.wire_address(address))
    }

    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<()> {
        log::trace!(
            "avr910: write {} bytes of {} at 0x{:06X}",
            data.len(),
            self.memory,
            address
        );
        let result = match self.memory {
            MemoryType::Flash => self.write_flash(address, data),
            MemoryType::Eeprom => self.write_eeprom(address, data),
        };
        result.map_err(|e| match e.protocol() {
            Some(CoreError::ProtocolRejected { .. }) => {
                self.cursor = None;
                CoreError::WriteFailure { address }.into()
            }
            _ => e,
        })
    }

    fn read_page(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        match self.memory {
            MemoryType::Flash => self.read_flash(address, buf),
            MemoryType::Eeprom => self.read_eeprom(address, buf),
        }
    }
}

impl<T: Transport> Programmer<T> {
    fn transfer_options(&self, write: bool, verify: bool) -> TransferOptions {
        TransferOptions {
            page_size: self.session().page_size_bytes,
            write,
            verify,
            retries: self.options().retries,
        }
    }

    /// Upload a record stream into `memory`
    ///
    /// Flash is chip-erased first when `options.erase` is set; this also
    /// clears the EEPROM.
    pub fn program<'r, I, P>(
        &mut self,
        memory: MemoryType,
        records: I,
        options: &ProgramOptions,
        progress: &mut P,
    ) -> Result<TransferStats>
    where
        I: IntoIterator<Item = Record<'r>>,
        P: TransferProgress + ?Sized,
    {
        if options.erase && memory == MemoryType::Flash {
            self.chip_erase()?;
        }
        let transfer_options = self.transfer_options(true, options.verify);
        log::info!(
            "avr910: programming {} with {}-byte pages",
            memory,
            transfer_options.page_size
        );
        transfer(
            &mut MemoryPages::new(self, memory),
            records,
            &transfer_options,
            progress,
        )
    }

    /// Compare `memory` with a record stream without writing
    pub fn verify<'r, I, P>(
        &mut self,
        memory: MemoryType,
        records: I,
        progress: &mut P,
    ) -> Result<TransferStats>
    where
        I: IntoIterator<Item = Record<'r>>,
        P: TransferProgress + ?Sized,
    {
        let transfer_options = self.transfer_options(false, true);
        log::info!("avr910: verifying {}", memory);
        transfer(
            &mut MemoryPages::new(self, memory),
            records,
            &transfer_options,
            progress,
        )
    }

    /// Read `len` bytes of `memory` starting at byte offset `start`
    pub fn read_memory<P>(
        &mut self,
        memory: MemoryType,
        start: u32,
        len: usize,
        progress: &mut P,
    ) -> Result<Vec<u8>>
    where
        P: TransferProgress + ?Sized,
    {
        if len > 0 {
            let last = start as u64 + len as u64 - 1;
            if last > u32::MAX as u64 || memory.wire_address(last as u32) > u16::MAX as u32 {
                return Err(Error::InvalidParameter(format!(
                    "range 0x{:X}+{} exceeds the 16-bit cursor",
                    start, len
                )));
            }
        }

        let mut data = vec![0u8; len];
        let mut pages = MemoryPages::new(self, memory);
        let mut address = start;
        for chunk in data.chunks_mut(READ_CHUNK) {
            pages.read_page(address, chunk)?;
            progress.page_done(address, chunk.len());
            address += chunk.len() as u32;
        }
        Ok(data)
    }
}

/// Byte range widened to whole flash words: (start byte, padded data)
fn widen(address: u32, data: &[u8]) -> (u32, Vec<u8>) {
    let start = address & !1;
    let mut wide = Vec::with_capacity(data.len() + 2);
    if start != address {
        wide.push(PAD_BYTE);
    }
    wide.extend_from_slice(data);
    if wide.len() % 2 != 0 {
        wide.push(PAD_BYTE);
    }
    (start, wide)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_pads_to_words() {
        assert_eq!(widen(4, &[1, 2]), (4, vec![1, 2]));
        assert_eq!(widen(5, &[1]), (4, vec![0xFF, 1]));
        assert_eq!(widen(4, &[1]), (4, vec![1, 0xFF]));
        assert_eq!(widen(5, &[1, 2]), (4, vec![0xFF, 1, 2, 0xFF]));
    }
}
