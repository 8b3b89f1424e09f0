//! Programmer-side hardware abstractions
//!
//! The target interpreter talks to the attached part through an
//! [`IspBus`]: four GPIO lines (RESET, SCK, MOSI, MISO) plus a delay
//! source. Everything above the bit level is built from that.

pub mod bitbang;

pub use bitbang::{IspBus, ISP_TRANSACTION_LEN};
