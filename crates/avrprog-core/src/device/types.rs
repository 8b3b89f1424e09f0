//! Device descriptor types

use core::fmt;

use super::LockFuseAccess;

/// Family byte every supported part reports as signature byte 1
pub const ATMEL_FAMILY: u8 = 0x1E;

/// The three signature bytes of a part, in memory order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 3]);

impl Signature {
    /// Build a signature from its three bytes
    pub const fn new(family: u8, sig2: u8, sig3: u8) -> Self {
        Self([family, sig2, sig3])
    }

    /// Build a signature from the `s` reply, which sends byte 3 first
    pub const fn from_wire(reply: [u8; 3]) -> Self {
        Self([reply[2], reply[1], reply[0]])
    }

    /// The `s` reply for this signature
    pub const fn to_wire(self) -> [u8; 3] {
        [self.0[2], self.0[1], self.0[0]]
    }

    /// Family byte (signature byte 1)
    pub const fn family(self) -> u8 {
        self.0[0]
    }

    /// Whether the family byte is the Atmel sentinel
    pub const fn is_atmel(self) -> bool {
        self.0[0] == ATMEL_FAMILY
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X} {:02X}", self.0[0], self.0[1], self.0[2])
    }
}

/// Programming parameters for one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceDescriptor {
    /// Signature byte 2
    pub sig2: u8,
    /// Signature byte 3
    pub sig3: u8,
    /// Flash page size in 16-bit words (0 = not paged)
    pub flash_page_words: u16,
    /// EEPROM page size in bytes (0 = byte writes only)
    pub eeprom_page_bytes: u8,
    /// Whether the RDY/BSY poll instruction is available
    pub has_busy_flag: bool,
    /// Which lock/fuse bytes may be accessed
    pub lock_fuse: LockFuseAccess,
}

impl DeviceDescriptor {
    /// Create a descriptor from the raw table columns
    pub const fn new(
        sig2: u8,
        sig3: u8,
        flash_page_words: u16,
        eeprom_page_bytes: u8,
        has_busy_flag: bool,
        lock_fuse: u8,
    ) -> Self {
        Self {
            sig2,
            sig3,
            flash_page_words,
            eeprom_page_bytes,
            has_busy_flag,
            lock_fuse: LockFuseAccess::from_bits_retain(lock_fuse),
        }
    }

    /// Whether this descriptor belongs to the given signature
    pub fn matches(&self, sig: Signature) -> bool {
        sig.is_atmel() && self.sig2 == sig.0[1] && self.sig3 == sig.0[2]
    }

    /// Full signature of the part
    pub const fn signature(&self) -> Signature {
        Signature::new(ATMEL_FAMILY, self.sig2, self.sig3)
    }

    /// Flash page size in bytes, as reported by the `b` command
    ///
    /// Saturates for descriptors built outside the device database.
    pub const fn flash_page_bytes(&self) -> u16 {
        self.flash_page_words.saturating_mul(2)
    }

    /// Mask selecting the word offset within a flash page
    pub const fn flash_page_mask(&self) -> u16 {
        self.flash_page_words.saturating_sub(1)
    }

    /// Mask selecting the byte offset within an EEPROM page
    pub const fn eeprom_page_mask(&self) -> u16 {
        (self.eeprom_page_bytes as u16).saturating_sub(1)
    }

    /// Whether flash is written through a page buffer
    pub const fn flash_paged(&self) -> bool {
        self.flash_page_words > 0
    }

    /// Whether EEPROM is written through a page buffer
    pub const fn eeprom_paged(&self) -> bool {
        self.eeprom_page_bytes > 0
    }
}

/// A named entry in the built-in descriptor table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    /// Part name
    pub name: &'static str,
    /// Programming parameters
    pub descriptor: DeviceDescriptor,
}

/// The four lock/fuse bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuseKind {
    /// Lock bits
    Lock,
    /// Fuse low byte
    Low,
    /// Fuse high byte
    High,
    /// Extended fuse byte
    Extended,
}

impl FuseKind {
    /// All kinds, in discovery order
    pub const ALL: [FuseKind; 4] = [Self::Lock, Self::Low, Self::High, Self::Extended];

    /// Short name used in logs and CLI output
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Low => "fuse",
            Self::High => "high fuse",
            Self::Extended => "extended fuse",
        }
    }
}

/// Lock/fuse values read during discovery
///
/// A byte is `None` when the descriptor does not allow reading it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuseBytes {
    /// Lock bits
    pub lock: Option<u8>,
    /// Fuse low byte
    pub low: Option<u8>,
    /// Fuse high byte
    pub high: Option<u8>,
    /// Extended fuse byte
    pub extended: Option<u8>,
}

impl FuseBytes {
    /// Value for one kind
    pub fn get(&self, kind: FuseKind) -> Option<u8> {
        match kind {
            FuseKind::Lock => self.lock,
            FuseKind::Low => self.low,
            FuseKind::High => self.high,
            FuseKind::Extended => self.extended,
        }
    }

    /// Store the value for one kind
    pub fn set(&mut self, kind: FuseKind, value: Option<u8>) {
        match kind {
            FuseKind::Lock => self.lock = value,
            FuseKind::Low => self.low = value,
            FuseKind::High => self.high = value,
            FuseKind::Extended => self.extended = value,
        }
    }
}

/// Memory space addressed by a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryType {
    /// Program flash, word addressed on the wire
    Flash,
    /// Data EEPROM, byte addressed on the wire
    Eeprom,
}

impl MemoryType {
    /// Memory type byte used by the `B` and `g` commands
    pub const fn wire_byte(self) -> u8 {
        match self {
            Self::Flash => b'F',
            Self::Eeprom => b'E',
        }
    }

    /// Parse the memory type byte of a `B` or `g` command
    pub const fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            b'F' => Some(Self::Flash),
            b'E' => Some(Self::Eeprom),
            _ => None,
        }
    }

    /// Convert a byte offset into the address the `A` command takes
    pub const fn wire_address(self, byte_offset: u32) -> u32 {
        match self {
            Self::Flash => byte_offset / 2,
            Self::Eeprom => byte_offset,
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flash => write!(f, "flash"),
            Self::Eeprom => write!(f, "EEPROM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_wire_order() {
        let sig = Signature::from_wire([0x0F, 0x95, 0x1E]);
        assert_eq!(sig, Signature::new(0x1E, 0x95, 0x0F));
        assert_eq!(sig.to_wire(), [0x0F, 0x95, 0x1E]);
    }

    #[test]
    fn test_page_geometry() {
        let desc = DeviceDescriptor::new(0x95, 0x0F, 64, 4, true, 0xFF);
        assert_eq!(desc.flash_page_bytes(), 128);
        assert_eq!(desc.flash_page_mask(), 0x3F);
        assert_eq!(desc.eeprom_page_mask(), 0x03);

        let unpaged = DeviceDescriptor::new(0x91, 0x09, 0, 0, false, 0x77);
        assert!(!unpaged.flash_paged());
        assert_eq!(unpaged.flash_page_mask(), 0);

        let oversized = DeviceDescriptor::new(0x98, 0x01, 0x8000, 0, false, 0);
        assert_eq!(oversized.flash_page_bytes(), u16::MAX);
    }

    #[test]
    fn test_wire_address_scaling() {
        assert_eq!(MemoryType::Flash.wire_address(0x100), 0x80);
        assert_eq!(MemoryType::Eeprom.wire_address(0x100), 0x100);
    }
}
