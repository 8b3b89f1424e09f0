//! Emulated AVR part on the ISP bus
//!
//! The part shifts instructions in on the rising SCK edge and answers each
//! byte with the previous one, exactly like the real serial programming
//! interface. Memory programming only clears bits; erase sets them again.

use avrprog_core::device::{find_by_name, FuseKind, Signature};
use avrprog_core::programmer::{IspBus, ISP_TRANSACTION_LEN};
use avrprog_core::transfer::PAD_BYTE;

/// Configuration for the emulated part
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Signature reported by `0x30`
    pub signature: Signature,
    /// Flash size in bytes
    pub flash_size: usize,
    /// Flash page size in words (0 = each byte written directly)
    pub flash_page_words: u16,
    /// EEPROM size in bytes
    pub eeprom_size: usize,
    /// EEPROM page size in bytes (0 = byte writes only)
    pub eeprom_page_bytes: u8,
    /// Lock bits after power-up
    pub lock: u8,
    /// Fuse bytes after power-up: low, high, extended
    pub fuses: [u8; 3],
    /// Busy polls each write keeps RDY/BSY set for
    pub busy_polls: u8,
    /// Whether the part answers the programming-enable handshake at all
    pub responsive: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self::atmega328()
    }
}

impl DummyConfig {
    /// ATmega328: 32 KiB flash in 64-word pages, 1 KiB EEPROM in 4-byte pages
    pub fn atmega328() -> Self {
        Self {
            signature: Signature::new(0x1E, 0x95, 0x0F),
            flash_size: 32 * 1024,
            flash_page_words: 64,
            eeprom_size: 1024,
            eeprom_page_bytes: 4,
            lock: 0xFF,
            fuses: [0x62, 0xD9, 0xFF],
            busy_polls: 2,
            responsive: true,
        }
    }

    /// ATmega32: 32 KiB flash, EEPROM without page buffer, no busy flag
    pub fn atmega32() -> Self {
        Self {
            signature: Signature::new(0x1E, 0x95, 0x02),
            flash_size: 32 * 1024,
            flash_page_words: 64,
            eeprom_size: 1024,
            eeprom_page_bytes: 0,
            lock: 0xFF,
            fuses: [0xE1, 0x99, 0xFF],
            busy_polls: 0,
            responsive: true,
        }
    }

    /// A part from the built-in table with the given memory sizes
    pub fn from_part(name: &str, flash_size: usize, eeprom_size: usize) -> Option<Self> {
        let part = find_by_name(name)?;
        let d = part.descriptor;
        Some(Self {
            signature: d.signature(),
            flash_size,
            flash_page_words: d.flash_page_words,
            eeprom_size,
            eeprom_page_bytes: d.eeprom_page_bytes,
            lock: 0xFF,
            fuses: [0x62, 0xDF, 0xFF],
            busy_polls: if d.has_busy_flag { 2 } else { 0 },
            responsive: true,
        })
    }
}

/// Counters of what the programmer did to the part
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyStats {
    /// Accepted programming-enable handshakes
    pub enables: usize,
    /// Chip erases
    pub erases: usize,
    /// Flash page commits
    pub flash_pages: usize,
    /// Direct flash byte writes
    pub flash_bytes: usize,
    /// EEPROM byte writes and page commits
    pub eeprom_writes: usize,
    /// Lock/fuse writes
    pub fuse_writes: usize,
    /// Instructions ignored or not understood
    pub ignored: usize,
    /// RDY/BSY status reads
    pub busy_polls: usize,
    /// Times reset was asserted
    pub resets: usize,
}

impl DummyStats {
    /// Total number of memory-changing operations
    pub fn writes(&self) -> usize {
        self.erases + self.flash_pages + self.flash_bytes + self.eeprom_writes + self.fuse_writes
    }
}

/// Emulated AVR part
#[derive(Debug, Clone)]
pub struct DummyAvr {
    config: DummyConfig,
    flash: Vec<u8>,
    eeprom: Vec<u8>,
    flash_buffer: Vec<u8>,
    eeprom_buffer: Vec<Option<u8>>,
    lock: u8,
    fuses: [u8; 3],
    busy: u8,
    enabled: bool,
    corrupt_reads: usize,
    stats: DummyStats,
    led: bool,
    passthrough: bool,
    delays: Vec<u32>,

    // Serial interface
    reset: bool,
    sck: bool,
    mosi: bool,
    miso: bool,
    bit: u8,
    shift_in: u8,
    shift_out: u8,
    rx: [u8; ISP_TRANSACTION_LEN],
    index: usize,
}

impl DummyAvr {
    /// Create an erased part
    pub fn new(config: DummyConfig) -> Self {
        let flash_buffer = vec![PAD_BYTE; config.flash_page_words as usize * 2];
        let eeprom_buffer = vec![None; config.eeprom_page_bytes as usize];
        Self {
            flash: vec![PAD_BYTE; config.flash_size],
            eeprom: vec![PAD_BYTE; config.eeprom_size],
            flash_buffer,
            eeprom_buffer,
            lock: config.lock,
            fuses: config.fuses,
            busy: 0,
            enabled: false,
            corrupt_reads: 0,
            stats: DummyStats::default(),
            led: false,
            passthrough: false,
            delays: Vec::new(),
            reset: false,
            sck: false,
            mosi: false,
            miso: true,
            bit: 0,
            shift_in: 0,
            shift_out: 0,
            rx: [0; ISP_TRANSACTION_LEN],
            index: 0,
            config,
        }
    }

    /// Create an ATmega328
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a part with pre-filled flash
    pub fn with_flash(config: DummyConfig, initial: &[u8]) -> Self {
        let mut avr = Self::new(config);
        let len = initial.len().min(avr.flash.len());
        avr.flash[..len].copy_from_slice(&initial[..len]);
        avr
    }

    /// Configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Flash contents, low byte of each word first
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Mutable flash contents
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// EEPROM contents
    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    /// Mutable EEPROM contents
    pub fn eeprom_mut(&mut self) -> &mut [u8] {
        &mut self.eeprom
    }

    /// Current lock or fuse byte
    pub fn fuse(&self, kind: FuseKind) -> u8 {
        match kind {
            FuseKind::Lock => self.lock,
            FuseKind::Low => self.fuses[0],
            FuseKind::High => self.fuses[1],
            FuseKind::Extended => self.fuses[2],
        }
    }

    /// Operation counters
    pub fn stats(&self) -> DummyStats {
        self.stats
    }

    /// Every `delay_us` request the programmer made, in order
    pub fn delays(&self) -> &[u32] {
        &self.delays
    }

    /// Make the next `count` memory reads return a flipped bit
    pub fn corrupt_next_reads(&mut self, count: usize) {
        self.corrupt_reads = count;
    }

    /// Whether programming mode is active
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the programmer LED is lit
    pub fn led(&self) -> bool {
        self.led
    }

    /// Whether the programmer handed the serial line over
    pub fn in_passthrough(&self) -> bool {
        self.passthrough
    }

    fn flash_page_mask(&self) -> usize {
        (self.config.flash_page_words as usize).saturating_sub(1)
    }

    fn eeprom_page_mask(&self) -> usize {
        (self.config.eeprom_page_bytes as usize).saturating_sub(1)
    }

    fn finish_write(&mut self) {
        self.busy = self.config.busy_polls;
    }

    fn read_memory(&mut self, value: Option<u8>) -> u8 {
        let value = value.unwrap_or(PAD_BYTE);
        if self.corrupt_reads > 0 {
            self.corrupt_reads -= 1;
            return value ^ 0x01;
        }
        value
    }

    /// Output byte 4 of an instruction, computed once three bytes are in
    fn respond(&mut self) -> u8 {
        if !self.enabled {
            return 0;
        }
        let [op, a1, a2, _] = self.rx;
        let address = u16::from_be_bytes([a1, a2]) as usize;
        match (op, a1) {
            (0x20 | 0x28, _) => {
                let byte = address * 2 + (op == 0x28) as usize;
                let value = self.flash.get(byte).copied();
                self.read_memory(value)
            }
            (0xA0, _) => {
                let value = self.eeprom.get(address).copied();
                self.read_memory(value)
            }
            (0x30, _) => self.config.signature.0[(a2 & 0x03).min(2) as usize],
            (0x58, 0x00) => self.lock,
            (0x50, 0x00) => self.fuses[0],
            (0x58, 0x08) => self.fuses[1],
            (0x50, 0x08) => self.fuses[2],
            (0xF0, _) => {
                if self.busy > 0 {
                    self.busy -= 1;
                    0x01
                } else {
                    0x00
                }
            }
            _ => 0,
        }
    }

    /// Apply an instruction once all four bytes are in
    fn execute(&mut self) {
        let [op, a1, a2, data] = self.rx;
        if !self.enabled {
            if [op, a1] == [0xAC, 0x53] {
                self.enabled = true;
                self.stats.enables += 1;
            } else {
                self.stats.ignored += 1;
            }
            return;
        }

        let address = u16::from_be_bytes([a1, a2]) as usize;
        match (op, a1) {
            (0xAC, 0x53) => {}
            (0xAC, 0x80) => {
                log::debug!("dummy: chip erase");
                self.flash.fill(PAD_BYTE);
                self.eeprom.fill(PAD_BYTE);
                self.lock = PAD_BYTE;
                self.stats.erases += 1;
                self.finish_write();
            }
            (0xAC, 0xE0) => self.write_fuse(FuseKind::Lock, data),
            (0xAC, 0xA0) => self.write_fuse(FuseKind::Low, data),
            (0xAC, 0xA8) => self.write_fuse(FuseKind::High, data),
            (0xAC, 0xA4) => self.write_fuse(FuseKind::Extended, data),
            (0x40 | 0x48, _) => {
                let high = (op == 0x48) as usize;
                if self.config.flash_page_words > 0 {
                    let offset = (address & self.flash_page_mask()) * 2 + high;
                    self.flash_buffer[offset] = data;
                } else if let Some(byte) = self.flash.get_mut(address * 2 + high) {
                    *byte &= data;
                    self.stats.flash_bytes += 1;
                    self.finish_write();
                }
            }
            (0x4C, _) => {
                let base = (address & !self.flash_page_mask()) * 2;
                log::debug!("dummy: flash page write at byte 0x{:05X}", base);
                for (i, value) in self.flash_buffer.iter_mut().enumerate() {
                    if let Some(byte) = self.flash.get_mut(base + i) {
                        *byte &= *value;
                    }
                    *value = PAD_BYTE;
                }
                self.stats.flash_pages += 1;
                self.finish_write();
            }
            (0xC0, _) => {
                if let Some(byte) = self.eeprom.get_mut(address) {
                    *byte = data;
                }
                self.stats.eeprom_writes += 1;
                self.finish_write();
            }
            (0xC1, _) => {
                if !self.eeprom_buffer.is_empty() {
                    let offset = address & self.eeprom_page_mask();
                    self.eeprom_buffer[offset] = Some(data);
                }
            }
            (0xC2, _) => {
                let base = address & !self.eeprom_page_mask();
                for (i, value) in self.eeprom_buffer.iter_mut().enumerate() {
                    if let (Some(v), Some(byte)) = (value.take(), self.eeprom.get_mut(base + i)) {
                        *byte = v;
                    }
                }
                self.stats.eeprom_writes += 1;
                self.finish_write();
            }
            (0xF0, _) => self.stats.busy_polls += 1,
            (0x20 | 0x28 | 0xA0 | 0x30 | 0x50 | 0x58, _) => {}
            _ => {
                log::debug!("dummy: ignoring instruction {:02X?}", self.rx);
                self.stats.ignored += 1;
            }
        }
    }

    fn write_fuse(&mut self, kind: FuseKind, value: u8) {
        log::debug!("dummy: {} = 0x{:02X}", kind.name(), value);
        match kind {
            // Lock bits can only be cleared
            FuseKind::Lock => self.lock &= value,
            FuseKind::Low => self.fuses[0] = value,
            FuseKind::High => self.fuses[1] = value,
            FuseKind::Extended => self.fuses[2] = value,
        }
        self.stats.fuse_writes += 1;
        self.finish_write();
    }

    fn byte_complete(&mut self, byte: u8) {
        self.rx[self.index] = byte;
        self.shift_out = match self.index {
            0 => self.rx[0],
            1 => self.rx[1],
            2 => self.respond(),
            _ => 0,
        };
        self.index += 1;
        if self.index == ISP_TRANSACTION_LEN {
            self.execute();
            self.index = 0;
        }
    }

    fn restart_interface(&mut self) {
        self.enabled = false;
        self.bit = 0;
        self.index = 0;
        self.shift_out = 0;
        self.flash_buffer.fill(PAD_BYTE);
        self.eeprom_buffer.fill(None);
    }
}

impl IspBus for DummyAvr {
    fn set_reset(&mut self, active: bool) {
        if active != self.reset {
            self.restart_interface();
            if active {
                self.stats.resets += 1;
            }
        }
        self.reset = active;
    }

    fn set_sck(&mut self, high: bool) {
        let rising = high && !self.sck;
        self.sck = high;
        if !rising || !self.reset || !self.config.responsive {
            return;
        }

        self.miso = self.shift_out & (0x80 >> self.bit) != 0;
        self.shift_in = (self.shift_in << 1) | self.mosi as u8;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            let byte = self.shift_in;
            self.byte_complete(byte);
        }
    }

    fn set_mosi(&mut self, high: bool) {
        self.mosi = high;
    }

    fn get_miso(&self) -> bool {
        // Pulled up while the part is running or not answering
        if !self.reset || !self.config.responsive {
            return true;
        }
        self.miso
    }

    fn delay_us(&mut self, us: u32) {
        // Recorded, not waited for
        self.delays.push(us);
    }

    fn set_led(&mut self, on: bool) {
        self.led = on;
    }

    fn enter_passthrough(&mut self) {
        self.passthrough = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avrprog_core::programmer::bitbang::transaction;
    use avrprog_core::protocol::isp;

    fn enabled() -> DummyAvr {
        let mut avr = DummyAvr::new_default();
        avr.set_reset(true);
        let response = transaction(&mut avr, isp::programming_enable());
        assert_eq!(response[2], isp::PROGRAMMING_ENABLE_ECHO);
        avr
    }

    #[test]
    fn test_miso_high_while_running() {
        let mut avr = DummyAvr::new_default();
        assert_eq!(transaction(&mut avr, isp::read_signature(0)), [0xFF; 4]);
        assert!(!avr.is_enabled());
    }

    #[test]
    fn test_only_enable_accepted_before_enable() {
        let mut avr = DummyAvr::new_default();
        avr.set_reset(true);
        assert_eq!(transaction(&mut avr, isp::read_signature(0))[3], 0);
        assert_eq!(avr.stats().ignored, 1);
        transaction(&mut avr, isp::programming_enable());
        assert!(avr.is_enabled());
    }

    #[test]
    fn test_unresponsive_part_never_echoes() {
        let mut avr = DummyAvr::new(DummyConfig {
            responsive: false,
            ..DummyConfig::default()
        });
        avr.set_reset(true);
        assert_eq!(transaction(&mut avr, isp::programming_enable())[2], 0xFF);
        assert!(!avr.is_enabled());
    }

    #[test]
    fn test_read_signature() {
        let mut avr = enabled();
        let sig: Vec<u8> = (0..3)
            .map(|i| transaction(&mut avr, isp::read_signature(i))[3])
            .collect();
        assert_eq!(sig, [0x1E, 0x95, 0x0F]);
    }

    #[test]
    fn test_paged_flash_write() {
        let mut avr = enabled();
        transaction(&mut avr, isp::load_flash_page(false, 1, 0x34));
        transaction(&mut avr, isp::load_flash_page(true, 1, 0x12));
        assert_eq!(avr.flash()[2..4], [0xFF, 0xFF]);

        transaction(&mut avr, isp::write_flash_page(0x0040));
        assert_eq!(avr.flash()[0x82..0x84], [0x34, 0x12]);
        assert_eq!(transaction(&mut avr, isp::read_flash(true, 0x41))[3], 0x12);
        assert_eq!(avr.stats().flash_pages, 1);
    }

    #[test]
    fn test_programming_only_clears_bits() {
        let mut avr = enabled();
        avr.flash_mut()[0] = 0x0F;
        transaction(&mut avr, isp::load_flash_page(false, 0, 0xF5));
        transaction(&mut avr, isp::write_flash_page(0));
        assert_eq!(avr.flash()[0], 0x05);

        transaction(&mut avr, isp::chip_erase());
        assert_eq!(avr.flash()[0], 0xFF);
    }

    #[test]
    fn test_eeprom_page_write() {
        let mut avr = enabled();
        transaction(&mut avr, isp::load_eeprom_page(1, 0xAA));
        transaction(&mut avr, isp::write_eeprom_page(0x0010));
        assert_eq!(avr.eeprom()[0x10..0x13], [0xFF, 0xAA, 0xFF]);
        assert_eq!(transaction(&mut avr, isp::read_eeprom(0x11))[3], 0xAA);
    }

    #[test]
    fn test_busy_flag_clears() {
        let mut avr = enabled();
        transaction(&mut avr, isp::write_eeprom(0, 0x55));
        assert_eq!(transaction(&mut avr, isp::poll_busy())[3], 1);
        assert_eq!(transaction(&mut avr, isp::poll_busy())[3], 1);
        assert_eq!(transaction(&mut avr, isp::poll_busy())[3], 0);
        assert_eq!(avr.stats().busy_polls, 3);
    }

    #[test]
    fn test_fuses() {
        let mut avr = enabled();
        assert_eq!(transaction(&mut avr, isp::read_fuse(FuseKind::High))[3], 0xD9);
        transaction(&mut avr, isp::write_fuse(FuseKind::High, 0xDE));
        assert_eq!(transaction(&mut avr, isp::read_fuse(FuseKind::High))[3], 0xDE);
        transaction(&mut avr, isp::write_fuse(FuseKind::Lock, 0xFC));
        assert_eq!(avr.fuse(FuseKind::Lock), 0xFC);
    }

    #[test]
    fn test_corrupt_reads() {
        let mut avr = enabled();
        avr.corrupt_next_reads(1);
        assert_eq!(transaction(&mut avr, isp::read_flash(false, 0))[3], 0xFE);
        assert_eq!(transaction(&mut avr, isp::read_flash(false, 0))[3], 0xFF);
    }
}
