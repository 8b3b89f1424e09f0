//! ISP layer: transactions, programming-mode entry and write delays

use avrprog_core::device::{DeviceDescriptor, Signature};
use avrprog_core::programmer::bitbang::transaction;
use avrprog_core::programmer::{IspBus, ISP_TRANSACTION_LEN};
use avrprog_core::protocol::isp;

/// Programming-enable handshakes tried before giving up
pub const ENTER_ATTEMPTS: usize = 10;

/// Fixed wait after a paged flash commit on parts without a busy flag
pub const SHORT_DELAY_US: u32 = 4_500;

/// Fixed wait after erase, EEPROM and unpaged writes on parts without a busy flag
pub const LONG_DELAY_US: u32 = 9_000;

/// Reset pulse width before asserting reset
const RESET_RELEASE_US: u32 = 100;

/// Settle time after asserting reset
const RESET_SETTLE_US: u32 = 25_000;

/// Which fixed delay a write waits for when the part has no busy flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    /// Paged flash commit
    Short,
    /// Chip erase, EEPROM, lock/fuse and unpaged writes
    Long,
}

impl DelayKind {
    /// Delay in microseconds
    pub const fn micros(self) -> u32 {
        match self {
            Self::Short => SHORT_DELAY_US,
            Self::Long => LONG_DELAY_US,
        }
    }
}

/// ISP master built on an [`IspBus`]
#[derive(Debug)]
pub struct Isp<B> {
    bus: B,
}

impl<B: IspBus> Isp<B> {
    /// Wrap a bus
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Borrow the bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutably borrow the bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Unwrap the bus
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Issue one 4-byte instruction
    pub fn transaction(&mut self, instruction: [u8; ISP_TRANSACTION_LEN]) -> [u8; ISP_TRANSACTION_LEN] {
        transaction(&mut self.bus, instruction)
    }

    /// Issue an instruction and return its data byte
    pub fn read(&mut self, instruction: [u8; ISP_TRANSACTION_LEN]) -> u8 {
        self.transaction(instruction)[3]
    }

    /// Pulse reset and try the programming-enable handshake
    ///
    /// Returns `true` once the part echoes the handshake byte.
    pub fn enter_programming_mode(&mut self) -> bool {
        self.bus.enable_outputs(true);
        for attempt in 1..=ENTER_ATTEMPTS {
            self.bus.set_sck(false);
            self.bus.set_reset(false);
            self.bus.delay_us(RESET_RELEASE_US);
            self.bus.set_reset(true);
            self.bus.delay_us(RESET_SETTLE_US);

            let response = self.transaction(isp::programming_enable());
            if response[2] == isp::PROGRAMMING_ENABLE_ECHO {
                log::debug!("isp: programming enabled after {} attempt(s)", attempt);
                return true;
            }
        }
        log::debug!("isp: no handshake after {} attempts", ENTER_ATTEMPTS);
        false
    }

    /// Let the part run again and tri-state the bus
    pub fn release(&mut self) {
        self.bus.set_reset(false);
        self.bus.enable_outputs(false);
    }

    /// Read the three signature bytes
    pub fn read_signature(&mut self) -> Signature {
        Signature([
            self.read(isp::read_signature(0)),
            self.read(isp::read_signature(1)),
            self.read(isp::read_signature(2)),
        ])
    }

    /// Wait for a write to finish
    ///
    /// Parts with a busy flag are polled until it clears, without a bound.
    /// Others (and writes with no part selected) get a fixed delay.
    pub fn poll_delay(&mut self, descriptor: Option<DeviceDescriptor>, kind: DelayKind) {
        match descriptor {
            Some(d) if d.has_busy_flag => {
                while self.read(isp::poll_busy()) & 0x01 != 0 {}
            }
            _ => self.bus.delay_us(kind.micros()),
        }
    }
}
