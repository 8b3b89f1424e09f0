//! Error types for avrprog-core
//!
//! This module provides a no_std compatible error type shared by the host
//! driver and the transfer algorithm.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Link errors
    /// No reply, or not enough reply bytes, within the timeout
    LinkTimeout {
        /// Command byte that was waiting for a reply
        command: u8,
    },
    /// The target answered `?` to a command
    ProtocolRejected {
        /// Rejected command byte
        command: u8,
    },
    /// The target answered with a byte the protocol does not allow here
    UnexpectedReply {
        /// Command byte
        command: u8,
        /// Byte received instead of the expected reply
        reply: u8,
    },

    // Transfer errors
    /// The record stream moved backwards
    AddressTracking {
        /// Next address the transfer window expected
        expected: u32,
        /// Address the record claimed
        found: u32,
    },
    /// The target refused to commit a page
    WriteFailure {
        /// Start address of the page
        address: u32,
    },
    /// Read-back differed from the written data on every attempt
    VerifyMismatch {
        /// Address of the first differing byte on the last attempt
        address: u32,
    },
    /// Page size does not fit the transfer window
    PageTooLarge {
        /// Requested page size in bytes
        size: u32,
    },

    // Device errors
    /// Signature not in the descriptor table, or wrong family byte
    UnsupportedDevice,

    // Parameter errors
    /// Invalid argument passed to an operation
    InvalidParameter(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkTimeout { command } => {
                write!(f, "timed out waiting for reply to '{}'", CommandByte(*command))
            }
            Self::ProtocolRejected { command } => {
                write!(f, "command '{}' rejected by target", CommandByte(*command))
            }
            Self::UnexpectedReply { command, reply } => write!(
                f,
                "unexpected reply 0x{:02X} to command '{}'",
                reply,
                CommandByte(*command)
            ),
            Self::AddressTracking { expected, found } => write!(
                f,
                "record address 0x{:06X} is behind the expected address 0x{:06X}",
                found, expected
            ),
            Self::WriteFailure { address } => {
                write!(f, "page write failed at address 0x{:06X}", address)
            }
            Self::VerifyMismatch { address } => {
                write!(f, "verify failed at address 0x{:06X}", address)
            }
            Self::PageTooLarge { size } => write!(f, "page size {} is too large", size),
            Self::UnsupportedDevice => write!(f, "device not supported"),
            Self::InvalidParameter(what) => write!(f, "invalid parameter: {}", what),
        }
    }
}

/// Displays a command byte as its ASCII letter when printable
struct CommandByte(u8);

impl fmt::Display for CommandByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_ascii_graphic() {
            write!(f, "{}", self.0 as char)
        } else {
            write!(f, "0x{:02X}", self.0)
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;

    #[test]
    fn test_display_command_letters() {
        let err = Error::ProtocolRejected { command: b'B' };
        assert_eq!(err.to_string(), "command 'B' rejected by target");

        let err = Error::LinkTimeout { command: 0x1B };
        assert_eq!(err.to_string(), "timed out waiting for reply to '0x1B'");
    }
}
