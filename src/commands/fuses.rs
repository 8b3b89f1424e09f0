//! Lock/fuse command implementation

use avrprog_core::device::{FuseBytes, FuseKind};
use avrprog_host::{Programmer, Transport};

/// Write the given lock/fuse bytes, then show all of them
pub fn run_fuses<T: Transport>(
    programmer: &mut Programmer<T>,
    changes: &FuseBytes,
) -> Result<(), Box<dyn std::error::Error>> {
    for kind in FuseKind::ALL {
        let Some(value) = changes.get(kind) else {
            continue;
        };
        if programmer.write_fuse(kind, value)? {
            println!("Wrote {} 0x{:02X}", kind.name(), value);
        } else {
            println!(
                "Skipped {}: {} does not allow writing it",
                kind.name(),
                programmer.session().device_type
            );
        }
    }

    let access = programmer.session().lock_fuse();
    println!();
    for kind in FuseKind::ALL {
        let label = format!("{}:", kind.name());
        if access.can_read(kind) {
            let value = programmer.read_fuse(kind)?;
            let writable = if access.can_write(kind) { "" } else { " (read-only)" };
            println!("{:<16} 0x{:02X}{}", label, value, writable);
        } else {
            println!("{:<16} not readable", label);
        }
    }

    Ok(())
}
