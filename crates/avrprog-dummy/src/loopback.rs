//! In-process link between the host driver and the target interpreter
//!
//! The target side runs the real [`Interpreter`] on a thread, talking to a
//! [`DummyAvr`] over the bitbang bus. Bytes the host sends at a baud rate
//! other than the target's are lost, as on a real serial line.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use avrprog_core::protocol::{BAUD_RATES, DEFAULT_BAUD_INDEX};
use avrprog_host::{Result, Transport};
use avrprog_target::{Interpreter, TargetError};

use crate::avr::DummyAvr;

/// Target end of the channel pair
struct ChannelLink {
    rx: Receiver<u8>,
    tx: Sender<u8>,
}

impl embedded_io::ErrorType for ChannelLink {
    type Error = Infallible;
}

impl embedded_io::Read for ChannelLink {
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<usize, Infallible> {
        if buf.is_empty() {
            return Ok(0);
        }
        // A hung-up host reads as end of stream
        match self.rx.recv() {
            Ok(byte) => {
                buf[0] = byte;
                Ok(1)
            }
            Err(_) => Ok(0),
        }
    }
}

impl embedded_io::Write for ChannelLink {
    fn write(&mut self, buf: &[u8]) -> core::result::Result<usize, Infallible> {
        for &byte in buf {
            // The host may already have gone away
            let _ = self.tx.send(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> core::result::Result<(), Infallible> {
        Ok(())
    }
}

/// How the target thread ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetExit {
    /// The host closed the link while the interpreter waited for a command
    Closed,
    /// The host sent `E`
    Passthrough,
}

type TargetResult = (TargetExit, DummyAvr);

/// Host-side transport wired to an emulated programmer
pub struct Loopback {
    to_target: Sender<u8>,
    from_target: Receiver<u8>,
    pending: VecDeque<u8>,
    baud: u32,
    target_baud: u32,
    sent: Vec<(u32, u8)>,
    target: JoinHandle<TargetResult>,
}

impl Loopback {
    /// Start a programmer listening at `target_baud` with `avr` attached
    pub fn new(avr: DummyAvr, target_baud: u32) -> Self {
        let (host_tx, target_rx) = channel();
        let (target_tx, host_rx) = channel();
        let link = ChannelLink {
            rx: target_rx,
            tx: target_tx,
        };

        let target = std::thread::spawn(move || {
            let mut interpreter = Interpreter::new(link, avr);
            let exit = match interpreter.run() {
                Ok(()) => TargetExit::Passthrough,
                Err(TargetError::LinkClosed) => TargetExit::Closed,
                Err(TargetError::Link(e)) => match e {},
            };
            let (_, avr) = interpreter.into_parts();
            (exit, avr)
        });

        Self {
            to_target: host_tx,
            from_target: host_rx,
            pending: VecDeque::new(),
            baud: BAUD_RATES[DEFAULT_BAUD_INDEX],
            target_baud,
            sent: Vec::new(),
            target,
        }
    }

    /// Every byte the host wrote, with the baud rate it was sent at
    pub fn sent(&self) -> &[(u32, u8)] {
        &self.sent
    }

    /// Close the link and hand back the part
    pub fn finish(self) -> (TargetExit, DummyAvr) {
        let Self {
            to_target, target, ..
        } = self;
        drop(to_target);
        match target.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Transport for Loopback {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.sent.push((self.baud, byte));
            if self.baud != self.target_baud {
                continue;
            }
            let _ = self.to_target.send(byte);
        }
        Ok(())
    }

    fn read_nonblock(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending.is_empty() {
            match self
                .from_target
                .recv_timeout(Duration::from_millis(timeout_ms as u64))
            {
                Ok(byte) => self.pending.push_back(byte),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Ok(0)
                }
            }
        }
        self.pending.extend(self.from_target.try_iter());

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn reopen(&mut self, baud: u32) -> Result<()> {
        log::debug!("loopback: {} -> {} baud", self.baud, baud);
        self.baud = baud;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud
    }

    fn clear_input(&mut self) -> Result<()> {
        self.pending.clear();
        while self.from_target.try_recv().is_ok() {}
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
