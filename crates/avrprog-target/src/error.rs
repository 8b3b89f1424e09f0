//! Error types for the target interpreter

use core::fmt;

/// Errors that stop the interpreter loop
///
/// Protocol problems are answered on the wire; only link failures end up
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetError<E> {
    /// The link reported an error
    Link(E),
    /// The link has no more data (the host went away)
    LinkClosed,
}

impl<E: fmt::Debug> fmt::Display for TargetError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link error: {:?}", e),
            Self::LinkClosed => write!(f, "link closed"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for TargetError<E> {}
