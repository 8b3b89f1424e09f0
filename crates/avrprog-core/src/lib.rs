//! avrprog-core - Core library for AVR910 in-system programming
//!
//! This crate holds everything both ends of an AVR910 link agree on: the
//! device descriptor table, the wire command set, the 4-byte ISP
//! instructions, the bit-banged ISP byte primitive and the page-aligned
//! transfer algorithm. It is `no_std` so the target interpreter can run on
//! the programmer's own microcontroller.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`) and RON
//!   device database loading
//! - `alloc` - Enable heap allocation
//!
//! # Example
//!
//! ```ignore
//! use avrprog_core::device::{lookup, Signature};
//!
//! let sig = Signature::new(0x1E, 0x95, 0x0F);
//! if let Some(part) = lookup(sig) {
//!     println!("{}: {} byte flash pages", part.name, part.descriptor.flash_page_bytes());
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod device;
pub mod error;
pub mod programmer;
pub mod protocol;
pub mod transfer;

pub use error::{Error, Result};
