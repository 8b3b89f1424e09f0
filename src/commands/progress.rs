//! Progress bar for page transfers

use avrprog_core::transfer::TransferProgress;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar advanced by committed pages
pub struct PageBar {
    pb: ProgressBar,
}

impl PageBar {
    /// Bar over `total` bytes, labelled with `action`
    pub fn new(total: u64, action: &'static str) -> Result<Self, Box<dyn std::error::Error>> {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}")?
                .progress_chars("#>-"),
        );
        pb.set_message(action);
        Ok(Self { pb })
    }

    /// Finish the bar, leaving it on screen
    pub fn finish(&self, message: &'static str) {
        self.pb.finish_with_message(message);
    }

    /// Stop the bar after a failure
    pub fn abandon(&self, message: &'static str) {
        self.pb.abandon_with_message(message);
    }
}

impl TransferProgress for PageBar {
    fn page_done(&mut self, _address: u32, len: usize) {
        self.pb.inc(len as u64);
    }

    fn retrying(&mut self, address: u32, attempt: u8) {
        self.pb
            .println(format!("Verify failed at page 0x{:06X}, attempt {}", address, attempt));
    }
}
