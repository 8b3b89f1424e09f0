//! CLI command implementations
//!
//! Device-facing commands take a connected [`Programmer`](avrprog_host::Programmer)
//! generic over its transport, so they run the same against a serial port
//! and the in-process loopback.

mod erase;
mod fuses;
mod info;
mod list;
mod progress;
mod read;
mod serve;
mod verify;
mod write;

pub use erase::run_erase;
pub use fuses::run_fuses;
pub use info::run_info;
pub use list::list_devices;
pub use progress::PageBar;
pub use read::run_read;
pub use serve::run_serve;
pub use verify::run_verify;
pub use write::run_write;
