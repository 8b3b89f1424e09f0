//! Baud rate search and resynchronization

use avrprog_core::protocol::{
    Command, BAUD_RATES, ESCAPE, ESCAPE_SEQUENCE, IDLE_PROBE, REPLY_NO, REPLY_UNKNOWN, REPLY_YES,
    RESYNC_PADDING,
};
use avrprog_core::Error as CoreError;

use crate::error::{Error, Result};
use crate::options::Options;
use crate::transport::{read_exact_timeout, Transport};

/// Find the baud rate the programmer listens at
///
/// Starting at `options.initial_baud_index`, send the idle probe and wait
/// for the "not understood" reply every AVR910 programmer gives to it. A
/// candidate is confirmed with the autoincrement query. Each failed guess
/// reopens the transport at the next standard rate. Returns the index of
/// the confirmed rate and leaves the transport open at it.
pub fn synchronize<T: Transport + ?Sized>(transport: &mut T, options: &Options) -> Result<usize> {
    let mut index = options.initial_baud_index % BAUD_RATES.len();
    let mut escape_sent = false;

    if transport.baud_rate() != BAUD_RATES[index] {
        transport.reopen(BAUD_RATES[index])?;
    }

    for cycle in 0..options.sync_cycles {
        if cycle > 0 {
            index = (index + 1) % BAUD_RATES.len();
            transport.reopen(BAUD_RATES[index])?;
        }
        log::debug!("avr910: probing at {} baud", BAUD_RATES[index]);

        transport.clear_input()?;
        transport.write(&[IDLE_PROBE])?;
        let mut reply = [0u8; 1];
        if read_exact_timeout(transport, &mut reply, options.probe_timeout_ms)? == 0 {
            continue;
        }

        match reply[0] {
            IDLE_PROBE => {
                if !escape_sent {
                    log::warn!("avr910: idle probe echoed, sending escape sequence");
                    transport.write(&ESCAPE_SEQUENCE)?;
                    escape_sent = true;
                }
            }
            REPLY_UNKNOWN => {
                if confirm(transport, options)? {
                    log::info!("avr910: synchronized at {} baud", BAUD_RATES[index]);
                    return Ok(index);
                }
                log::warn!("avr910: false positive at {} baud", BAUD_RATES[index]);
            }
            other => log::trace!("avr910: ignoring 0x{:02X} at {} baud", other, BAUD_RATES[index]),
        }
    }

    Err(Error::NoResponse)
}

/// Ask the autoincrement question and check for a Y/N answer
fn confirm<T: Transport + ?Sized>(transport: &mut T, options: &Options) -> Result<bool> {
    transport.write(&[Command::AutoIncrement.byte()])?;
    let mut reply = [0u8; 1];
    let n = read_exact_timeout(transport, &mut reply, options.response_timeout_ms)?;
    Ok(n == 1 && matches!(reply[0], REPLY_YES | REPLY_NO))
}

/// Recover from a half-sent command at the current baud rate
///
/// Pads out any pending parameters with escape bytes, which the target
/// ignores as commands, then checks that it answers again.
pub fn resync<T: Transport + ?Sized>(transport: &mut T, options: &Options) -> Result<()> {
    log::warn!("avr910: resynchronizing");
    transport.write(&[ESCAPE; RESYNC_PADDING])?;
    transport.flush()?;
    // Replies to whatever the escape bytes completed are stale now
    let mut drain = [0u8; 64];
    while transport.read_nonblock(&mut drain, options.probe_timeout_ms)? > 0 {}

    if confirm(transport, options)? {
        Ok(())
    } else {
        Err(CoreError::LinkTimeout {
            command: Command::AutoIncrement.byte(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Peer that only understands the link at one baud rate
    struct BaudPeer {
        baud: u32,
        live_baud: Option<u32>,
        echo_baud: Option<u32>,
        confirm_reply: u8,
        pending: VecDeque<u8>,
        sent: Vec<(u32, u8)>,
        reopens: usize,
    }

    impl BaudPeer {
        fn new(live_index: Option<usize>) -> Self {
            Self {
                baud: 0,
                live_baud: live_index.map(|i| BAUD_RATES[i]),
                echo_baud: None,
                confirm_reply: REPLY_YES,
                pending: VecDeque::new(),
                sent: Vec::new(),
                reopens: 0,
            }
        }
    }

    impl Transport for BaudPeer {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            for &b in data {
                self.sent.push((self.baud, b));
                if Some(self.baud) == self.echo_baud {
                    self.pending.push_back(b);
                } else if Some(self.baud) == self.live_baud {
                    match b {
                        b'a' => self.pending.push_back(self.confirm_reply),
                        ESCAPE => {}
                        _ => self.pending.push_back(REPLY_UNKNOWN),
                    }
                }
            }
            Ok(())
        }

        fn read_nonblock(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.pending.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            if n == 0 {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Ok(n)
        }

        fn reopen(&mut self, baud: u32) -> Result<()> {
            self.baud = baud;
            self.pending.clear();
            self.reopens += 1;
            Ok(())
        }

        fn baud_rate(&self) -> u32 {
            self.baud
        }

        fn clear_input(&mut self) -> Result<()> {
            self.pending.clear();
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn fast_options(initial: usize) -> Options {
        Options {
            initial_baud_index: initial,
            probe_timeout_ms: 5,
            response_timeout_ms: 5,
            ..Options::default()
        }
    }

    #[test]
    fn test_converges_at_live_rate() {
        let mut peer = BaudPeer::new(Some(3));
        let index = synchronize(&mut peer, &fast_options(0)).unwrap();

        assert_eq!(index, 3);
        assert_eq!(peer.baud_rate(), 19200);
        for &(baud, byte) in &peer.sent {
            assert!(byte == IDLE_PROBE || byte == b'a', "sent 0x{:02X}", byte);
            if byte == b'a' {
                assert_eq!(baud, 19200);
            }
        }
        assert_eq!(peer.sent.iter().filter(|(_, b)| *b == b'a').count(), 1);
    }

    #[test]
    fn test_wraps_around_the_rate_table() {
        let mut peer = BaudPeer::new(Some(1));
        assert_eq!(synchronize(&mut peer, &fast_options(5)).unwrap(), 1);
    }

    #[test]
    fn test_gives_up_after_two_rounds() {
        let mut peer = BaudPeer::new(None);
        let err = synchronize(&mut peer, &fast_options(3)).unwrap_err();

        assert!(matches!(err, Error::NoResponse));
        let probes = peer.sent.iter().filter(|(_, b)| *b == IDLE_PROBE).count();
        assert_eq!(probes, BAUD_RATES.len() * 2);
        for rate in BAUD_RATES {
            assert_eq!(peer.sent.iter().filter(|(b, _)| *b == rate).count(), 2);
        }
    }

    #[test]
    fn test_false_positive_keeps_searching() {
        let mut peer = BaudPeer::new(Some(3));
        peer.confirm_reply = 0x42;
        let err = synchronize(&mut peer, &fast_options(3)).unwrap_err();
        assert!(matches!(err, Error::NoResponse));
        assert_eq!(peer.sent.iter().filter(|(_, b)| *b == b'a').count(), 2);
    }

    #[test]
    fn test_escape_sequence_sent_once() {
        let mut peer = BaudPeer::new(None);
        peer.echo_baud = Some(19200);
        let err = synchronize(&mut peer, &fast_options(3)).unwrap_err();
        assert!(matches!(err, Error::NoResponse));

        let bytes: Vec<u8> = peer.sent.iter().map(|(_, b)| *b).collect();
        let count = bytes
            .windows(ESCAPE_SEQUENCE.len())
            .filter(|w| *w == ESCAPE_SEQUENCE)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_resync_pads_then_confirms() {
        let mut peer = BaudPeer::new(Some(3));
        peer.baud = 19200;
        resync(&mut peer, &fast_options(3)).unwrap();

        let escapes = peer.sent.iter().filter(|(_, b)| *b == ESCAPE).count();
        assert_eq!(escapes, RESYNC_PADDING);
        assert_eq!(peer.sent.last().map(|(_, b)| *b), Some(b'a'));
    }
}
