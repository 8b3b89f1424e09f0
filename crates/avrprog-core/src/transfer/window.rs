//! Page-sized staging buffer for the transfer algorithm

use heapless::Vec;

use crate::error::{Error, Result};

/// Largest page the window accepts, in bytes
pub const MAX_PAGE_SIZE: usize = 256;

/// Capacity of the window buffer
pub const WINDOW_CAPACITY: usize = MAX_PAGE_SIZE * 2;

/// Byte used to fill gaps in the record stream
pub const PAD_BYTE: u8 = 0xFF;

/// Bytes collected for the page currently being assembled
///
/// `block_start` is always a multiple of the page size, and while the
/// window holds data `running_address - block_start < page_size`.
#[derive(Debug, Clone)]
pub struct TransferWindow {
    page_size: u32,
    running_address: u32,
    block_start: u32,
    buffer: Vec<u8, WINDOW_CAPACITY>,
}

impl TransferWindow {
    /// Create a window for the given page size in bytes
    pub fn new(page_size: u32) -> Result<Self> {
        if page_size == 0 {
            return Err(Error::InvalidParameter("page size must not be zero"));
        }
        if page_size as usize > MAX_PAGE_SIZE {
            return Err(Error::PageTooLarge { size: page_size });
        }
        Ok(Self {
            page_size,
            running_address: 0,
            block_start: 0,
            buffer: Vec::new(),
        })
    }

    /// Align the window to the page containing `address`
    ///
    /// Returns the page start, where the address cursor must be placed.
    pub fn open(&mut self, address: u32) -> u32 {
        self.block_start = address - address % self.page_size;
        self.running_address = self.block_start;
        self.buffer.clear();
        self.block_start
    }

    /// Page size in bytes
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Address the next pushed byte lands on
    pub fn running_address(&self) -> u32 {
        self.running_address
    }

    /// Start address of the page being assembled
    pub fn block_start(&self) -> u32 {
        self.block_start
    }

    /// Bytes collected so far
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes collected so far
    pub fn filled(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no bytes have been collected
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether the page is complete
    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.page_size as usize
    }

    /// Append one byte at the running address
    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.buffer
            .push(byte)
            .map_err(|_| Error::PageTooLarge { size: self.page_size })?;
        self.running_address += 1;
        Ok(())
    }

    /// Move to the next page and empty the buffer
    pub fn advance(&mut self) {
        self.block_start += self.page_size;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_aligns_down() {
        let mut window = TransferWindow::new(64).unwrap();
        assert_eq!(window.open(0x1234), 0x1200);
        assert_eq!(window.running_address(), 0x1200);
        assert!(window.is_empty());
    }

    #[test]
    fn test_fill_and_advance() {
        let mut window = TransferWindow::new(4).unwrap();
        window.open(8);
        for b in 0..4 {
            assert!(!window.is_full());
            window.push(b).unwrap();
        }
        assert!(window.is_full());
        assert_eq!(window.data(), &[0, 1, 2, 3]);

        window.advance();
        assert_eq!(window.block_start(), 12);
        assert_eq!(window.running_address(), 12);
        assert_eq!(window.filled(), 0);
    }

    #[test]
    fn test_rejects_bad_page_sizes() {
        assert_eq!(
            TransferWindow::new(0).unwrap_err(),
            Error::InvalidParameter("page size must not be zero")
        );
        assert_eq!(
            TransferWindow::new(1024).unwrap_err(),
            Error::PageTooLarge { size: 1024 }
        );
    }
}
