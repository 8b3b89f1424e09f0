//! avrprog-dummy - emulated AVR part and in-process programmer for testing
//!
//! [`DummyAvr`] is an AVR part behind the bitbang ISP bus: signature,
//! flash and EEPROM with page buffers, lock/fuse bytes and a busy flag.
//! [`Loopback`] runs the target interpreter against it on a thread and
//! exposes the host end as a [`Transport`](avrprog_host::Transport), so the
//! whole stack can be exercised without hardware.

mod avr;
mod loopback;

pub use avr::{DummyAvr, DummyConfig, DummyStats};
pub use loopback::{Loopback, TargetExit};
