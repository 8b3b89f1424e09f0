//! avrprog-target - AVR910 command interpreter
//!
//! This crate is the programmer side of the link. An [`Interpreter`] reads
//! single-byte commands from a serial link, executes them against the
//! attached part over a bit-banged ISP bus and writes the replies back.
//!
//! The interpreter is generic over the link (`embedded_io::Read + Write`)
//! and the bus ([`avrprog_core::programmer::IspBus`]) so it runs unchanged
//! on a microcontroller, on a host serial port, or against a simulated
//! part in tests.
//!
//! # Example
//!
//! ```ignore
//! use avrprog_target::Interpreter;
//!
//! let mut interpreter = Interpreter::new(uart, gpio_bus);
//! interpreter.run()?; // returns once the host sends `E`
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

mod block;
mod error;
mod interpreter;
mod isp;
#[cfg(feature = "std")]
mod link;
mod session;

pub use error::TargetError;
pub use interpreter::{Interpreter, State};
pub use isp::{DelayKind, Isp, ENTER_ATTEMPTS, LONG_DELAY_US, SHORT_DELAY_US};
#[cfg(feature = "std")]
pub use link::{LinkError, StdLink};
pub use session::TargetSession;
