//! Protocol definitions
//!
//! This module contains the AVR910 serial command set spoken between host
//! and programmer, and the 4-byte ISP instructions the programmer sends to
//! the attached part.

mod avr910;
pub mod isp;

pub use avr910::*;
