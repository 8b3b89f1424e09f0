//! AVR serial programming instructions
//!
//! Each function returns the 4-byte instruction to clock into the part.

use crate::device::FuseKind;

/// Expected echo in response byte 3 of the programming enable instruction
pub const PROGRAMMING_ENABLE_ECHO: u8 = 0x53;

/// Programming enable
pub const fn programming_enable() -> [u8; 4] {
    [0xAC, 0x53, 0x00, 0x00]
}

/// Chip erase
pub const fn chip_erase() -> [u8; 4] {
    [0xAC, 0x80, 0x00, 0x00]
}

/// Poll RDY/BSY; bit 0 of response byte 4 is set while busy
pub const fn poll_busy() -> [u8; 4] {
    [0xF0, 0x00, 0x00, 0x00]
}

/// Read signature byte `index` (0..=2)
pub const fn read_signature(index: u8) -> [u8; 4] {
    [0x30, 0x00, index, 0x00]
}

/// Read the low or high byte of a flash word
pub const fn read_flash(high: bool, word: u16) -> [u8; 4] {
    let [hi, lo] = word.to_be_bytes();
    [if high { 0x28 } else { 0x20 }, hi, lo, 0x00]
}

/// Load the low or high byte of a word into the flash page buffer
pub const fn load_flash_page(high: bool, word_offset: u8, data: u8) -> [u8; 4] {
    [if high { 0x48 } else { 0x40 }, 0x00, word_offset, data]
}

/// Write the low or high byte of a word directly (parts without a page buffer)
pub const fn write_flash(high: bool, word: u16, data: u8) -> [u8; 4] {
    let [hi, lo] = word.to_be_bytes();
    [if high { 0x48 } else { 0x40 }, hi, lo, data]
}

/// Commit the flash page buffer to the page containing `word`
pub const fn write_flash_page(word: u16) -> [u8; 4] {
    let [hi, lo] = word.to_be_bytes();
    [0x4C, hi, lo, 0x00]
}

/// Read one EEPROM byte
pub const fn read_eeprom(address: u16) -> [u8; 4] {
    let [hi, lo] = address.to_be_bytes();
    [0xA0, hi, lo, 0x00]
}

/// Write one EEPROM byte directly
pub const fn write_eeprom(address: u16, data: u8) -> [u8; 4] {
    let [hi, lo] = address.to_be_bytes();
    [0xC0, hi, lo, data]
}

/// Load one byte into the EEPROM page buffer
pub const fn load_eeprom_page(byte_offset: u8, data: u8) -> [u8; 4] {
    [0xC1, 0x00, byte_offset, data]
}

/// Commit the EEPROM page buffer to the page containing `address`
pub const fn write_eeprom_page(address: u16) -> [u8; 4] {
    let [hi, lo] = address.to_be_bytes();
    [0xC2, hi, lo, 0x00]
}

/// Read a lock/fuse byte
pub const fn read_fuse(kind: FuseKind) -> [u8; 4] {
    match kind {
        FuseKind::Lock => [0x58, 0x00, 0x00, 0x00],
        FuseKind::Low => [0x50, 0x00, 0x00, 0x00],
        FuseKind::High => [0x58, 0x08, 0x00, 0x00],
        FuseKind::Extended => [0x50, 0x08, 0x00, 0x00],
    }
}

/// Write a lock/fuse byte
pub const fn write_fuse(kind: FuseKind, value: u8) -> [u8; 4] {
    let op = match kind {
        FuseKind::Lock => 0xE0,
        FuseKind::Low => 0xA0,
        FuseKind::High => 0xA8,
        FuseKind::Extended => 0xA4,
    };
    [0xAC, op, 0x00, value]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_bytes_are_big_endian() {
        assert_eq!(read_flash(true, 0x1234), [0x28, 0x12, 0x34, 0x00]);
        assert_eq!(write_flash_page(0x0340), [0x4C, 0x03, 0x40, 0x00]);
        assert_eq!(write_eeprom(0x01FF, 0xAA), [0xC0, 0x01, 0xFF, 0xAA]);
    }

    #[test]
    fn test_fuse_instructions() {
        assert_eq!(read_fuse(FuseKind::High), [0x58, 0x08, 0x00, 0x00]);
        assert_eq!(write_fuse(FuseKind::Extended, 0xFD), [0xAC, 0xA4, 0x00, 0xFD]);
    }
}
