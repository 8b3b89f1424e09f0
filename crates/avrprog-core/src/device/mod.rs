//! AVR device descriptors and lookup
//!
//! This module provides types describing the parts an AVR910 programmer
//! can drive, the built-in descriptor table keyed by signature bytes, and
//! (with `std`) a database that extends the table from RON files.

mod capability;
mod table;
mod types;

#[cfg(feature = "std")]
mod database;

pub use capability::LockFuseAccess;
pub use table::{find_by_name, lookup, PARTS};
pub use types::*;

#[cfg(feature = "std")]
pub use database::*;
