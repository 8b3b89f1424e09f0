//! Erase command implementation

use avrprog_host::{Programmer, Transport};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Erase flash and EEPROM with a progress spinner
pub fn run_erase<T: Transport>(
    programmer: &mut Programmer<T>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Erasing {}...", programmer.session().device_type));
    pb.enable_steady_tick(Duration::from_millis(100));

    match programmer.chip_erase() {
        Ok(()) => {
            pb.finish_with_message("Chip erase complete");
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Chip erase failed");
            Err(e.into())
        }
    }
}
