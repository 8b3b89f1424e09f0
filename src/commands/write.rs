//! Write command implementation

use avrprog_core::device::MemoryType;
use avrprog_core::transfer::ImageRecords;
use avrprog_host::{ProgramOptions, Programmer, Transport};
use std::path::Path;

use super::PageBar;

/// Upload a binary image placed at byte offset `address`
pub fn run_write<T: Transport>(
    programmer: &mut Programmer<T>,
    input: &Path,
    memory: MemoryType,
    address: u32,
    options: &ProgramOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let image = std::fs::read(input)?;
    if image.is_empty() {
        return Err(format!("{:?} is empty", input).into());
    }
    println!("Read {} bytes from {:?}", image.len(), input);

    if options.erase && memory == MemoryType::Flash {
        println!("Erasing chip (flash and EEPROM)...");
    }

    let page_size = programmer.session().page_size_bytes;
    let total = image.len() as u64 + (address % page_size) as u64;
    let mut bar = PageBar::new(total, "Writing")?;
    let result = programmer.program(
        memory,
        ImageRecords::new(address, &image),
        options,
        &mut bar,
    );

    match result {
        Ok(stats) => {
            bar.finish("Write complete");
            println!(
                "Wrote {} bytes to {} in {} pages{}",
                image.len(),
                memory,
                stats.pages,
                if options.verify { ", verified" } else { "" }
            );
            if stats.retries > 0 {
                println!("{} verify retries", stats.retries);
            }
            Ok(())
        }
        Err(e) => {
            bar.abandon("Write failed");
            Err(e.into())
        }
    }
}
