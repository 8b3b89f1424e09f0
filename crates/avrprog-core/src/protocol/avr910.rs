//! AVR910 serial protocol constants and types
//!
//! Every command is a single ASCII byte, optionally followed by fixed-size
//! parameters. 16-bit parameters are big-endian.

/// Acknowledge reply
pub const REPLY_OK: u8 = b'\r';
/// "Not understood" reply, also used for "device not supported"
pub const REPLY_UNKNOWN: u8 = b'?';
/// Positive answer to a capability query
pub const REPLY_YES: u8 = b'Y';
/// Negative answer to a capability query
pub const REPLY_NO: u8 = b'N';

/// Resync filler, ignored by the target
pub const ESCAPE: u8 = 0x1B;
/// Byte the host sends while searching for the baud rate
pub const IDLE_PROBE: u8 = 0xDD;
/// Sequence sent once if a peer echoes the idle probe back
pub const ESCAPE_SEQUENCE: [u8; 7] = [0xDD, 0x67, 0x00, 0x01, 0x40, 0x41, 0x03];
/// Number of escape bytes the host sends to flush a partial command
pub const RESYNC_PADDING: usize = 64;

/// Programmer identifier returned by `S`
pub const PROGRAMMER_ID: &[u8; 7] = b"AVRSPRG";
/// Software version returned by `V`
pub const PROGRAMMER_VERSION: &[u8; 2] = b"00";
/// Programmer type returned by `p` (serial)
pub const PROGRAMMER_TYPE: u8 = b'S';
/// Terminator of the `t` device code list
pub const DEVICE_LIST_END: u8 = 0x00;

/// Standard baud rates searched during synchronization
pub const BAUD_RATES: [u32; 7] = [2400, 4800, 9600, 19200, 38400, 57600, 115200];
/// Baud rate index tried first (19200)
pub const DEFAULT_BAUD_INDEX: usize = 3;

/// One AVR910 command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `a`: autoincrement query
    AutoIncrement,
    /// `A`: set address cursor
    SetAddress,
    /// `b`: block transfer query
    BlockSupport,
    /// `p`: programmer type
    ProgrammerType,
    /// `S`: programmer identifier
    ProgrammerId,
    /// `V`: software version
    SoftwareVersion,
    /// `t`: supported device codes
    DeviceCodes,
    /// `T`: select device type
    SelectDevice,
    /// `P`: enter programming mode
    EnterProgramming,
    /// `L`: leave programming mode
    LeaveProgramming,
    /// `e`: chip erase
    ChipErase,
    /// `R`: read flash word
    ReadFlashWord,
    /// `c`: load flash low byte
    WriteFlashLow,
    /// `C`: load flash high byte
    WriteFlashHigh,
    /// `m`: commit flash page
    CommitPage,
    /// `D`: write EEPROM byte
    WriteEeprom,
    /// `d`: read EEPROM byte
    ReadEeprom,
    /// `B`: block write
    BlockWrite,
    /// `g`: block read
    BlockRead,
    /// `r`: read lock bits
    ReadLock,
    /// `F`: read fuse low byte
    ReadFuse,
    /// `N`: read fuse high byte
    ReadHighFuse,
    /// `Q`: read extended fuse byte
    ReadExtFuse,
    /// `l`: write lock bits
    WriteLock,
    /// `f`: write fuse low byte
    WriteFuse,
    /// `n`: write fuse high byte
    WriteHighFuse,
    /// `q`: write extended fuse byte
    WriteExtFuse,
    /// `s`: read signature
    ReadSignature,
    /// `x`: LED on
    SetLed,
    /// `y`: LED off
    ClearLed,
    /// `E`: exit to passthrough
    Exit,
    /// ESC: resync filler
    Escape,
}

impl Command {
    /// Decode a command byte
    pub const fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            b'a' => Self::AutoIncrement,
            b'A' => Self::SetAddress,
            b'b' => Self::BlockSupport,
            b'p' => Self::ProgrammerType,
            b'S' => Self::ProgrammerId,
            b'V' => Self::SoftwareVersion,
            b't' => Self::DeviceCodes,
            b'T' => Self::SelectDevice,
            b'P' => Self::EnterProgramming,
            b'L' => Self::LeaveProgramming,
            b'e' => Self::ChipErase,
            b'R' => Self::ReadFlashWord,
            b'c' => Self::WriteFlashLow,
            b'C' => Self::WriteFlashHigh,
            b'm' => Self::CommitPage,
            b'D' => Self::WriteEeprom,
            b'd' => Self::ReadEeprom,
            b'B' => Self::BlockWrite,
            b'g' => Self::BlockRead,
            b'r' => Self::ReadLock,
            b'F' => Self::ReadFuse,
            b'N' => Self::ReadHighFuse,
            b'Q' => Self::ReadExtFuse,
            b'l' => Self::WriteLock,
            b'f' => Self::WriteFuse,
            b'n' => Self::WriteHighFuse,
            b'q' => Self::WriteExtFuse,
            b's' => Self::ReadSignature,
            b'x' => Self::SetLed,
            b'y' => Self::ClearLed,
            b'E' => Self::Exit,
            ESCAPE => Self::Escape,
            _ => return None,
        })
    }

    /// Command byte on the wire
    pub const fn byte(self) -> u8 {
        match self {
            Self::AutoIncrement => b'a',
            Self::SetAddress => b'A',
            Self::BlockSupport => b'b',
            Self::ProgrammerType => b'p',
            Self::ProgrammerId => b'S',
            Self::SoftwareVersion => b'V',
            Self::DeviceCodes => b't',
            Self::SelectDevice => b'T',
            Self::EnterProgramming => b'P',
            Self::LeaveProgramming => b'L',
            Self::ChipErase => b'e',
            Self::ReadFlashWord => b'R',
            Self::WriteFlashLow => b'c',
            Self::WriteFlashHigh => b'C',
            Self::CommitPage => b'm',
            Self::WriteEeprom => b'D',
            Self::ReadEeprom => b'd',
            Self::BlockWrite => b'B',
            Self::BlockRead => b'g',
            Self::ReadLock => b'r',
            Self::ReadFuse => b'F',
            Self::ReadHighFuse => b'N',
            Self::ReadExtFuse => b'Q',
            Self::WriteLock => b'l',
            Self::WriteFuse => b'f',
            Self::WriteHighFuse => b'n',
            Self::WriteExtFuse => b'q',
            Self::ReadSignature => b's',
            Self::SetLed => b'x',
            Self::ClearLed => b'y',
            Self::Exit => b'E',
            Self::Escape => ESCAPE,
        }
    }

    /// Whether the command moves the address cursor
    pub const fn advances_cursor(self) -> bool {
        matches!(
            self,
            Self::ReadFlashWord
                | Self::WriteFlashHigh
                | Self::WriteEeprom
                | Self::ReadEeprom
                | Self::BlockWrite
                | Self::BlockRead
        )
    }
}

/// Encode a 16-bit parameter
pub const fn be16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Decode a 16-bit parameter
pub const fn from_be16(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes_round_trip() {
        for byte in 0..=255u8 {
            if let Some(cmd) = Command::from_byte(byte) {
                assert_eq!(cmd.byte(), byte);
            }
        }
    }

    #[test]
    fn test_probe_bytes_are_not_commands() {
        assert!(Command::from_byte(IDLE_PROBE).is_none());
        assert_eq!(Command::from_byte(ESCAPE), Some(Command::Escape));
    }

    #[test]
    fn test_cursor_commands() {
        assert!(Command::WriteFlashHigh.advances_cursor());
        assert!(!Command::WriteFlashLow.advances_cursor());
        assert!(!Command::CommitPage.advances_cursor());
    }
}
