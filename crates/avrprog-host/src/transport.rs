//! Transport layer abstraction for AVR910 communication
//!
//! The host needs a byte pipe with read timeouts that can be reopened at a
//! different baud rate while searching for the programmer.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Transport trait for reading and writing bytes
pub trait Transport {
    /// Write bytes to the transport
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read with timeout (non-blocking)
    ///
    /// Reads up to `buf.len()` bytes, waiting up to `timeout_ms` milliseconds.
    /// Returns the number of bytes read, or 0 if timeout.
    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize>;

    /// Close the link and open it again at `baud`
    fn reopen(&mut self, baud: u32) -> Result<()>;

    /// Current baud rate
    fn baud_rate(&self) -> u32;

    /// Discard anything received but not yet read
    fn clear_input(&mut self) -> Result<()>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<()>;
}

/// Read until `buf` is full or `timeout_ms` passes without a new byte
///
/// Returns the number of bytes read; fewer than `buf.len()` means timeout.
pub fn read_exact_timeout<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    timeout_ms: u32,
) -> Result<usize> {
    let timeout = Duration::from_millis(timeout_ms as u64);
    let mut filled = 0;
    let mut deadline = Instant::now() + timeout;

    while filled < buf.len() {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        let remaining = (deadline - now).as_millis().max(1) as u32;
        let n = transport.read_nonblock(&mut buf[filled..], remaining)?;
        if n > 0 {
            filled += n;
            deadline = Instant::now() + timeout;
        }
    }
    log::trace!("transport: read {:02X?}", &buf[..filled]);
    Ok(filled)
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};

    /// Serial port transport
    pub struct SerialTransport {
        device: String,
        baud: u32,
        port: Option<Box<dyn SerialPort>>,
    }

    impl SerialTransport {
        /// Open a serial port at the given baud rate, 8N1 without flow control
        pub fn open(device: &str, baud: u32) -> Result<Self> {
            let port = Self::open_port(device, baud)?;
            log::info!("Opened serial port {} at {} baud", device, baud);
            Ok(Self {
                device: device.to_string(),
                baud,
                port: Some(port),
            })
        }

        fn open_port(device: &str, baud: u32) -> Result<Box<dyn SerialPort>> {
            let port = serialport::new(device, baud)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(Duration::from_secs(5))
                .open()?;
            Ok(port)
        }

        /// Device path
        pub fn device(&self) -> &str {
            &self.device
        }

        fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
            self.port
                .as_mut()
                .ok_or_else(|| Error::IoError(format!("{} is closed", self.device)))
        }
    }

    impl Transport for SerialTransport {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            log::trace!("transport: write {:02X?}", data);
            self.port()?.write_all(data)?;
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
            let port = self.port()?;
            port.set_timeout(Duration::from_millis(timeout_ms as u64))?;

            match port.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                Err(e) => Err(Error::from(e)),
            }
        }

        fn reopen(&mut self, baud: u32) -> Result<()> {
            // The port is opened exclusively, so it must be closed first
            self.port = None;
            self.port = Some(Self::open_port(&self.device, baud)?);
            self.baud = baud;
            log::debug!("Reopened serial port {} at {} baud", self.device, baud);
            Ok(())
        }

        fn baud_rate(&self) -> u32 {
            self.baud
        }

        fn clear_input(&mut self) -> Result<()> {
            self.port()?.clear(ClearBuffer::Input)?;
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.port()?.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Hands out one queued chunk per read
    struct Chunks {
        chunks: VecDeque<Vec<u8>>,
        reads: usize,
    }

    impl Transport for Chunks {
        fn write(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize> {
            self.reads += 1;
            match self.chunks.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => {
                    std::thread::sleep(Duration::from_millis(1));
                    Ok(0)
                }
            }
        }

        fn reopen(&mut self, _baud: u32) -> Result<()> {
            Ok(())
        }

        fn baud_rate(&self) -> u32 {
            19200
        }

        fn clear_input(&mut self) -> Result<()> {
            self.chunks.clear();
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_read_exact_collects_partial_reads() {
        let mut t = Chunks {
            chunks: VecDeque::from(vec![b"AVR".to_vec(), b"SP".to_vec(), b"RG".to_vec()]),
            reads: 0,
        };
        let mut buf = [0u8; 7];
        assert_eq!(read_exact_timeout(&mut t, &mut buf, 50).unwrap(), 7);
        assert_eq!(&buf, b"AVRSPRG");
        assert_eq!(t.reads, 3);
    }

    #[test]
    fn test_read_exact_times_out_short() {
        let mut t = Chunks {
            chunks: VecDeque::from(vec![b"Y".to_vec()]),
            reads: 0,
        };
        let mut buf = [0u8; 3];
        assert_eq!(read_exact_timeout(&mut t, &mut buf, 20).unwrap(), 1);
        assert_eq!(buf[0], b'Y');
    }
}
