//! Host-side timing and behaviour settings

use avrprog_core::protocol::{BAUD_RATES, DEFAULT_BAUD_INDEX};
use avrprog_core::transfer::DEFAULT_RETRIES;

/// Baud rate cycles tried before giving up (every standard rate twice)
pub const DEFAULT_SYNC_CYCLES: usize = BAUD_RATES.len() * 2;

/// Settings for a programmer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Index into [`BAUD_RATES`] tried first
    pub initial_baud_index: usize,
    /// Baud rate cycles before synchronization fails
    pub sync_cycles: usize,
    /// Wait for an answer to the idle probe
    pub probe_timeout_ms: u32,
    /// Wait for an ordinary command reply
    pub response_timeout_ms: u32,
    /// Wait for replies to commands that program memory (erase, commit, block write, fuses)
    pub write_timeout_ms: u32,
    /// Delay between data bytes of a block write
    pub char_delay_us: u32,
    /// Write+verify attempts per page
    pub retries: u8,
    /// Use block commands when the programmer supports them
    pub block_mode: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_baud_index: DEFAULT_BAUD_INDEX,
            sync_cycles: DEFAULT_SYNC_CYCLES,
            probe_timeout_ms: 100,
            response_timeout_ms: 1_000,
            write_timeout_ms: 5_000,
            char_delay_us: 0,
            retries: DEFAULT_RETRIES,
            block_mode: true,
        }
    }
}

impl Options {
    /// Baud rate tried first
    pub fn initial_baud(&self) -> u32 {
        BAUD_RATES[self.initial_baud_index % BAUD_RATES.len()]
    }
}
