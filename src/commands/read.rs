//! Read command implementation

use avrprog_core::device::MemoryType;
use avrprog_host::{Programmer, Transport};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::PageBar;

/// Read `length` bytes of memory starting at `start` into a file
pub fn run_read<T: Transport>(
    programmer: &mut Programmer<T>,
    output: &Path,
    memory: MemoryType,
    start: u32,
    length: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut bar = PageBar::new(length as u64, "Reading")?;
    let data = match programmer.read_memory(memory, start, length as usize, &mut bar) {
        Ok(data) => data,
        Err(e) => {
            bar.abandon("Read failed");
            return Err(e.into());
        }
    };
    bar.finish("Read complete");

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!(
        "Wrote {} bytes of {} from 0x{:06X} to {:?}",
        data.len(),
        memory,
        start,
        output
    );

    Ok(())
}
