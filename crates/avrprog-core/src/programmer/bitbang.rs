//! Bitbang ISP bus
//!
//! AVR serial programming is SPI mode 0 clocked by software: MOSI is set
//! while SCK is low, the part samples it on the rising edge, and MISO is
//! valid while SCK is high. Every instruction is four bytes long and the
//! part answers each byte with the byte it shifted in before.

/// Length of one ISP instruction and its response
pub const ISP_TRANSACTION_LEN: usize = 4;

/// Trait for low-level bitbang ISP operations
///
/// This is the minimal set of line operations the target needs. Delays are
/// part of the trait so tests can run without real timing.
pub trait IspBus {
    /// Drive the RESET line of the attached part (`active=true` holds it in reset)
    fn set_reset(&mut self, active: bool);

    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Get MISO line value
    fn get_miso(&self) -> bool;

    /// Busy-wait for the given number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Delay for half a clock period
    fn half_period_delay(&mut self) {
        self.delay_us(1);
    }

    /// Optional: Set SCK and get MISO atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `get_miso`.
    fn set_sck_get_miso(&mut self, sck: bool) -> bool {
        self.set_sck(sck);
        self.get_miso()
    }

    /// Optional: Drive SCK/MOSI/RESET as outputs (`false` tri-states them)
    fn enable_outputs(&mut self, _enabled: bool) {}

    /// Optional: Drive the status LED
    fn set_led(&mut self, _on: bool) {}

    /// Optional: Hand the serial lines over to the attached part
    fn enter_passthrough(&mut self) {}
}

/// Exchange one byte, MSB first, full duplex
pub fn transfer_byte<B: IspBus + ?Sized>(bus: &mut B, out: u8) -> u8 {
    let mut byte = 0u8;
    for i in (0..8).rev() {
        bus.set_mosi((out >> i) & 1 != 0);
        bus.half_period_delay();
        byte <<= 1;
        if bus.set_sck_get_miso(true) {
            byte |= 1;
        }
        bus.half_period_delay();
        bus.set_sck(false);
    }
    byte
}

/// Clock out a 4-byte instruction and collect the 4 response bytes
pub fn transaction<B: IspBus + ?Sized>(
    bus: &mut B,
    instruction: [u8; ISP_TRANSACTION_LEN],
) -> [u8; ISP_TRANSACTION_LEN] {
    let mut response = [0u8; ISP_TRANSACTION_LEN];
    for (out, byte) in response.iter_mut().zip(instruction) {
        *out = transfer_byte(bus, byte);
    }
    log::trace!("isp: {:02X?} -> {:02X?}", instruction, response);
    response
}
