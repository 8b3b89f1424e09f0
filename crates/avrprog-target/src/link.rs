//! `std::io` link adapter

use std::io;

/// Link error wrapping the `std::io` error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkError(pub io::ErrorKind);

impl embedded_io::Error for LinkError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0 {
            io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

/// Serves the interpreter from anything that is `std::io::Read + Write`
///
/// Reads block until a byte arrives; read timeouts of the underlying
/// stream are retried so a serial port with a short timeout behaves like
/// a blocking UART.
#[derive(Debug)]
pub struct StdLink<T> {
    inner: T,
}

impl<T> StdLink<T> {
    /// Wrap a stream
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> embedded_io::ErrorType for StdLink<T> {
    type Error = LinkError;
}

impl<T: io::Read> embedded_io::Read for StdLink<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    ) => {}
                Err(e) => return Err(LinkError(e.kind())),
            }
        }
    }
}

impl<T: io::Write> embedded_io::Write for StdLink<T> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, LinkError> {
        self.inner.write(buf).map_err(|e| LinkError(e.kind()))
    }

    fn flush(&mut self) -> Result<(), LinkError> {
        self.inner.flush().map_err(|e| LinkError(e.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Read, Write};
    use std::io::Cursor;
    use std::vec::Vec;

    #[test]
    fn test_reads_and_writes_through() {
        let mut link = StdLink::new(Cursor::new(b"ab".to_vec()));
        let mut buf = [0u8; 1];
        assert_eq!(link.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'a');

        let mut out = StdLink::new(Vec::new());
        out.write_all(b"\r").unwrap();
        assert_eq!(out.into_inner(), b"\r");
    }
}
