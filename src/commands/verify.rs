//! Verify command implementation

use avrprog_core::device::MemoryType;
use avrprog_core::transfer::ImageRecords;
use avrprog_host::{Programmer, Transport};
use std::path::Path;

use super::PageBar;

/// Compare memory against a binary image placed at byte offset `address`
pub fn run_verify<T: Transport>(
    programmer: &mut Programmer<T>,
    input: &Path,
    memory: MemoryType,
    address: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = std::fs::read(input)?;
    println!("Read {} bytes from {:?}", expected.len(), input);

    let page_size = programmer.session().page_size_bytes;
    let total = expected.len() as u64 + (address % page_size) as u64;
    let mut bar = PageBar::new(total, "Verifying")?;

    match programmer.verify(memory, ImageRecords::new(address, &expected), &mut bar) {
        Ok(_) => {
            bar.finish("Verification passed");
            println!("Verification passed!");
            Ok(())
        }
        Err(e) => {
            bar.abandon("Verification failed!");
            Err(e.into())
        }
    }
}
