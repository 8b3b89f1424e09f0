//! Page-aligned transfer algorithm
//!
//! Turns an ordered stream of `(address, kind, data)` records into
//! page-sized write and verify operations. Addresses are byte offsets into
//! the selected memory; converting them to wire addresses is the job of
//! the [`PageAccess`] implementation.
//!
//! Pages are assembled in a [`TransferWindow`]. Gaps in the stream are
//! filled with [`PAD_BYTE`], a page is committed as soon as it is full or
//! the stream ends, and each commit is written and verified as a unit up
//! to [`TransferOptions::retries`] times.

mod image;
mod window;

pub use image::{ImageRecords, DEFAULT_RECORD_LEN};
pub use window::{TransferWindow, MAX_PAGE_SIZE, PAD_BYTE, WINDOW_CAPACITY};

use crate::error::Error;

/// Write+verify attempts per page
pub const DEFAULT_RETRIES: u8 = 5;

/// Kind of a decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Ordinary data
    Data,
    /// End of the stream; later records are ignored
    EndOfStream,
}

/// One decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Byte address of the first data byte
    pub address: u32,
    /// Record kind
    pub kind: RecordKind,
    /// Payload (empty for end-of-stream)
    pub data: &'a [u8],
}

impl<'a> Record<'a> {
    /// A data record
    pub const fn data(address: u32, data: &'a [u8]) -> Self {
        Self {
            address,
            kind: RecordKind::Data,
            data,
        }
    }

    /// An end-of-stream record
    pub const fn end() -> Self {
        Self {
            address: 0,
            kind: RecordKind::EndOfStream,
            data: &[],
        }
    }
}

/// What a transfer pass does with each page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Page size in bytes
    pub page_size: u32,
    /// Write each page
    pub write: bool,
    /// Read each page back and compare
    pub verify: bool,
    /// Write+verify attempts per page
    pub retries: u8,
}

impl TransferOptions {
    /// Write and verify every page
    pub const fn upload(page_size: u32) -> Self {
        Self {
            page_size,
            write: true,
            verify: true,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Compare every page without writing
    pub const fn verify_only(page_size: u32) -> Self {
        Self {
            page_size,
            write: false,
            verify: true,
            retries: DEFAULT_RETRIES,
        }
    }
}

/// Page-level access to one memory of the attached part
///
/// Addresses are byte offsets. The error type must be able to carry the
/// transfer's own errors so that link failures and verify failures come
/// back through the same `Result` unchanged.
pub trait PageAccess {
    /// Error type of the underlying link
    type Error: From<Error>;

    /// Place the target's address cursor at `address`
    fn set_address(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Write one page (or the short first/last page) starting at `address`
    fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error>;

    /// Read `buf.len()` bytes starting at `address`
    fn read_page(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// Callback for progress reporting during a transfer
pub trait TransferProgress {
    /// Called after a page has been written and/or verified
    fn page_done(&mut self, address: u32, len: usize);

    /// Called before attempt `attempt` (2 and up) of a page
    fn retrying(&mut self, address: u32, attempt: u8);
}

/// A no-op progress reporter
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn page_done(&mut self, _address: u32, _len: usize) {}
    fn retrying(&mut self, _address: u32, _attempt: u8) {}
}

/// Statistics about a finished transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Pages committed
    pub pages: usize,
    /// Bytes committed, padding included
    pub bytes: usize,
    /// Extra attempts caused by verify failures
    pub retries: usize,
}

/// Run one upload or verify pass over a record stream
///
/// Errors from `access` abort the transfer immediately. A page whose
/// read-back differs is rewritten and re-read; if it still differs after
/// `options.retries` attempts the transfer stops with
/// [`Error::VerifyMismatch`] and later pages are not touched.
pub fn transfer<'r, A, I, P>(
    access: &mut A,
    records: I,
    options: &TransferOptions,
    progress: &mut P,
) -> Result<TransferStats, A::Error>
where
    A: PageAccess + ?Sized,
    I: IntoIterator<Item = Record<'r>>,
    P: TransferProgress + ?Sized,
{
    if !options.write && !options.verify {
        return Err(Error::InvalidParameter("transfer neither writes nor verifies").into());
    }
    if options.retries == 0 {
        return Err(Error::InvalidParameter("retry budget must not be zero").into());
    }

    let mut window = TransferWindow::new(options.page_size)?;
    let mut readback = [0u8; WINDOW_CAPACITY];
    let mut stats = TransferStats::default();
    let mut first = true;

    for record in records {
        if first {
            first = false;
            let start = window.open(record.address);
            log::debug!(
                "transfer: first record at 0x{:06X}, page start 0x{:06X}",
                record.address,
                start
            );
            access.set_address(start)?;
        }

        if record.kind == RecordKind::EndOfStream {
            break;
        }

        let mut index = 0;
        while index < record.data.len() {
            let target = record.address + index as u32;
            let running = window.running_address();
            if running > target {
                return Err(Error::AddressTracking {
                    expected: running,
                    found: target,
                }
                .into());
            }
            if running < target {
                window.push(PAD_BYTE)?;
            } else {
                window.push(record.data[index])?;
                index += 1;
            }
            if window.is_full() {
                commit(access, &mut window, options, &mut readback, progress, &mut stats)?;
            }
        }
    }

    if !window.is_empty() {
        commit(access, &mut window, options, &mut readback, progress, &mut stats)?;
    }

    log::debug!(
        "transfer: {} pages, {} bytes, {} retries",
        stats.pages,
        stats.bytes,
        stats.retries
    );
    Ok(stats)
}

fn commit<A, P>(
    access: &mut A,
    window: &mut TransferWindow,
    options: &TransferOptions,
    readback: &mut [u8; WINDOW_CAPACITY],
    progress: &mut P,
    stats: &mut TransferStats,
) -> Result<(), A::Error>
where
    A: PageAccess + ?Sized,
    P: TransferProgress + ?Sized,
{
    let address = window.block_start();
    let data = window.data();
    let mut mismatch = address;
    let mut verified = false;

    for attempt in 1..=options.retries {
        if attempt > 1 {
            log::warn!(
                "transfer: verify failed at 0x{:06X}, attempt {}/{}",
                mismatch,
                attempt,
                options.retries
            );
            stats.retries += 1;
            progress.retrying(address, attempt);
        }

        if options.write {
            access.write_page(address, data)?;
        }
        if !options.verify {
            verified = true;
            break;
        }

        let buf = &mut readback[..data.len()];
        access.read_page(address, buf)?;
        match data.iter().zip(buf.iter()).position(|(a, b)| a != b) {
            None => {
                verified = true;
                break;
            }
            Some(offset) => mismatch = address + offset as u32,
        }
    }

    if !verified {
        return Err(Error::VerifyMismatch { address: mismatch }.into());
    }

    stats.pages += 1;
    stats.bytes += data.len();
    progress.page_done(address, data.len());
    window.advance();
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec;
    use std::vec::Vec;

    /// In-memory page access that logs every operation
    struct FakeAccess {
        memory: Vec<u8>,
        writes: Vec<(u32, Vec<u8>)>,
        reads: usize,
        addresses: Vec<u32>,
        corrupt_reads: usize,
        fail_writes: bool,
    }

    impl FakeAccess {
        fn new(size: usize) -> Self {
            Self {
                memory: vec![0xFF; size],
                writes: Vec::new(),
                reads: 0,
                addresses: Vec::new(),
                corrupt_reads: 0,
                fail_writes: false,
            }
        }
    }

    impl PageAccess for FakeAccess {
        type Error = Error;

        fn set_address(&mut self, address: u32) -> Result<(), Error> {
            self.addresses.push(address);
            Ok(())
        }

        fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
            if self.fail_writes {
                return Err(Error::WriteFailure { address });
            }
            let start = address as usize;
            self.memory[start..start + data.len()].copy_from_slice(data);
            self.writes.push((address, data.to_vec()));
            Ok(())
        }

        fn read_page(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error> {
            let start = address as usize;
            buf.copy_from_slice(&self.memory[start..start + buf.len()]);
            self.reads += 1;
            if self.corrupt_reads > 0 {
                self.corrupt_reads -= 1;
                buf[buf.len() - 1] ^= 0x01;
            }
            Ok(())
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_commit_count_matches_page_math() {
        for p in [1u32, 4, 8, 16, 32, 64] {
            for start in [0u32, 1, 5, 64, 100] {
                for n in [1usize, 3, 16, 63, 64, 65, 200] {
                    let data = pattern(n);
                    let mut access = FakeAccess::new(1024);
                    let records = ImageRecords::new(start, &data);
                    let stats =
                        transfer(&mut access, records, &TransferOptions::upload(p), &mut NoProgress)
                            .unwrap();

                    let block_start = start - start % p;
                    let last = start + n as u32;
                    let expected = (last - block_start).div_ceil(p) as usize;
                    assert_eq!(access.writes.len(), expected, "p={} start={} n={}", p, start, n);
                    assert_eq!(stats.pages, expected);

                    let count = access.writes.len();
                    for (i, (addr, bytes)) in access.writes.iter().enumerate() {
                        assert_eq!(*addr, block_start + i as u32 * p);
                        if i + 1 < count {
                            assert_eq!(bytes.len(), p as usize);
                        }
                    }
                    assert_eq!(&access.memory[start as usize..last as usize], &data[..]);
                }
            }
        }
    }

    #[test]
    fn test_leading_gap_is_padded() {
        let mut access = FakeAccess::new(64);
        let records = [Record::data(5, &[0x11, 0x22]), Record::end()];
        transfer(&mut access, records, &TransferOptions::upload(8), &mut NoProgress).unwrap();

        assert_eq!(access.addresses, [0]);
        assert_eq!(access.writes.len(), 1);
        assert_eq!(access.writes[0].1, [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x11, 0x22]);
    }

    #[test]
    fn test_gap_between_records_is_padded() {
        let mut access = FakeAccess::new(64);
        let records = [Record::data(0, &[1, 2]), Record::data(4, &[5, 6]), Record::end()];
        transfer(&mut access, records, &TransferOptions::upload(4), &mut NoProgress).unwrap();

        assert_eq!(access.writes[0].1, [1, 2, 0xFF, 0xFF]);
        assert_eq!(access.writes[1].1, [5, 6]);
    }

    #[test]
    fn test_backwards_record_is_address_tracking_error() {
        let mut access = FakeAccess::new(64);
        let records = [Record::data(8, &[1, 2, 3]), Record::data(9, &[4]), Record::end()];
        let err = transfer(&mut access, records, &TransferOptions::upload(16), &mut NoProgress)
            .unwrap_err();

        assert_eq!(err, Error::AddressTracking { expected: 11, found: 9 });
        assert!(access.writes.is_empty());
    }

    #[test]
    fn test_end_marker_flushes_and_stops() {
        let mut access = FakeAccess::new(64);
        let records = [Record::data(0, &[1, 2, 3]), Record::end(), Record::data(3, &[4])];
        let stats =
            transfer(&mut access, records, &TransferOptions::upload(8), &mut NoProgress).unwrap();

        assert_eq!(stats.pages, 1);
        assert_eq!(access.writes[0].1, [1, 2, 3]);
    }

    #[test]
    fn test_verify_only_is_idempotent() {
        let data = pattern(100);
        let mut access = FakeAccess::new(256);
        access.memory[..100].copy_from_slice(&data);

        for _ in 0..2 {
            let stats = transfer(
                &mut access,
                ImageRecords::new(0, &data),
                &TransferOptions::verify_only(32),
                &mut NoProgress,
            )
            .unwrap();
            assert_eq!(stats.pages, 4);
            assert_eq!(stats.retries, 0);
        }
        assert!(access.writes.is_empty());
        assert_eq!(access.reads, 8);
    }

    #[test]
    fn test_verify_only_reports_mismatch() {
        let data = pattern(16);
        let mut access = FakeAccess::new(64);
        let err = transfer(
            &mut access,
            ImageRecords::new(0, &data),
            &TransferOptions::verify_only(16),
            &mut NoProgress,
        )
        .unwrap_err();

        assert_eq!(err, Error::VerifyMismatch { address: 0 });
        assert!(access.writes.is_empty());
        assert_eq!(access.reads, DEFAULT_RETRIES as usize);
    }

    #[test]
    fn test_succeeds_on_last_attempt() {
        let data = pattern(32);
        let mut access = FakeAccess::new(64);
        access.corrupt_reads = 4;

        let stats = transfer(
            &mut access,
            ImageRecords::new(0, &data),
            &TransferOptions::upload(16),
            &mut NoProgress,
        )
        .unwrap();

        assert_eq!(stats.retries, 4);
        assert_eq!(stats.pages, 2);
        assert_eq!(access.writes.len(), 6);
    }

    #[test]
    fn test_gives_up_after_retry_budget() {
        let data = pattern(48);
        let mut access = FakeAccess::new(64);
        access.corrupt_reads = 5;

        let err = transfer(
            &mut access,
            ImageRecords::new(0, &data),
            &TransferOptions::upload(16),
            &mut NoProgress,
        )
        .unwrap_err();

        assert_eq!(err, Error::VerifyMismatch { address: 15 });
        assert_eq!(access.writes.len(), 5);
        assert!(access.writes.iter().all(|(addr, _)| *addr == 0));
    }

    #[test]
    fn test_write_failure_is_not_retried() {
        let data = pattern(16);
        let mut access = FakeAccess::new(64);
        access.fail_writes = true;

        let err = transfer(
            &mut access,
            ImageRecords::new(0, &data),
            &TransferOptions::upload(16),
            &mut NoProgress,
        )
        .unwrap_err();

        assert_eq!(err, Error::WriteFailure { address: 0 });
        assert_eq!(access.reads, 0);
    }

    #[test]
    fn test_progress_reports_retries() {
        struct Counter {
            pages: usize,
            retries: Vec<u8>,
        }
        impl TransferProgress for Counter {
            fn page_done(&mut self, _address: u32, _len: usize) {
                self.pages += 1;
            }
            fn retrying(&mut self, _address: u32, attempt: u8) {
                self.retries.push(attempt);
            }
        }

        let data = pattern(8);
        let mut access = FakeAccess::new(64);
        access.corrupt_reads = 2;
        let mut progress = Counter {
            pages: 0,
            retries: Vec::new(),
        };
        transfer(&mut access, ImageRecords::new(0, &data), &TransferOptions::upload(8), &mut progress)
            .unwrap();

        assert_eq!(progress.pages, 1);
        assert_eq!(progress.retries, [2, 3]);
    }

    #[test]
    fn test_rejects_empty_pass() {
        let mut access = FakeAccess::new(8);
        let options = TransferOptions {
            write: false,
            verify: false,
            ..TransferOptions::upload(8)
        };
        let err = transfer(&mut access, [Record::end()], &options, &mut NoProgress).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }
}
