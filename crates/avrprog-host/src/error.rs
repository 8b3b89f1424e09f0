//! Error types for host-side operations

use core::fmt;

use avrprog_core::Error as CoreError;
use thiserror::Error;

/// Discovery step that failed while establishing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStep {
    /// `L`
    LeaveProgramming,
    /// `S` and `V`
    Identifier,
    /// `P`
    EnterProgramming,
    /// `s`
    Signature,
    /// `r`, `F`, `N`, `Q`
    LockFuse,
    /// `a`
    AutoIncrement,
    /// `b`
    BlockSupport,
}

impl fmt::Display for DiscoveryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::LeaveProgramming => "Unable to leave programming mode",
            Self::Identifier => "Unable to get programmer identifier",
            Self::EnterProgramming => "Programming mode failed",
            Self::Signature => "Unable to get signature bytes",
            Self::LockFuse => "Unable to get lock/fuse bytes",
            Self::AutoIncrement => "Unable to get autoincrement capability",
            Self::BlockSupport => "Unable to get block support capability",
        };
        f.write_str(msg)
    }
}

/// Host driver errors
#[derive(Debug, Error)]
pub enum Error {
    /// Protocol or transfer error
    #[error(transparent)]
    Protocol(#[from] CoreError),

    /// Synchronization tried every baud rate without an answer
    #[error("No response from programmer at any baud rate")]
    NoResponse,

    /// Session establishment failed at a specific step
    #[error("{step}: {source}")]
    Discovery {
        /// Step that failed
        step: DiscoveryStep,
        /// Underlying error
        source: Box<Error>,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error during communication
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serial port error
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),
}

impl Error {
    /// Wrap an error as a failed discovery step
    pub fn discovery(step: DiscoveryStep, source: Error) -> Self {
        Error::Discovery {
            step,
            source: Box::new(source),
        }
    }

    /// The core error, if this is a protocol/transfer error
    pub fn protocol(&self) -> Option<CoreError> {
        match self {
            Error::Protocol(e) => Some(*e),
            Error::Discovery { source, .. } => source.protocol(),
            _ => None,
        }
    }
}

/// Result type for host operations
pub type Result<T> = core::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_message() {
        let err = Error::discovery(
            DiscoveryStep::EnterProgramming,
            CoreError::ProtocolRejected { command: b'P' }.into(),
        );
        assert_eq!(
            err.to_string(),
            "Programming mode failed: command 'P' rejected by target"
        );
        assert_eq!(err.protocol(), Some(CoreError::ProtocolRejected { command: b'P' }));
    }
}
