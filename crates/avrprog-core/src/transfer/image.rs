//! Record streams built from raw binary images

use super::{Record, RecordKind};

/// Default number of data bytes per record, as in Intel HEX files
pub const DEFAULT_RECORD_LEN: usize = 16;

/// Cuts a binary image placed at `base` into data records followed by an
/// end-of-stream record
#[derive(Debug, Clone)]
pub struct ImageRecords<'a> {
    address: u32,
    chunks: core::slice::Chunks<'a, u8>,
    finished: bool,
}

impl<'a> ImageRecords<'a> {
    /// Records of [`DEFAULT_RECORD_LEN`] bytes
    pub fn new(base: u32, image: &'a [u8]) -> Self {
        Self::with_record_len(base, image, DEFAULT_RECORD_LEN)
    }

    /// Records of `record_len` bytes (at least one)
    pub fn with_record_len(base: u32, image: &'a [u8], record_len: usize) -> Self {
        Self {
            address: base,
            chunks: image.chunks(record_len.max(1)),
            finished: false,
        }
    }
}

impl<'a> Iterator for ImageRecords<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Record<'a>> {
        if self.finished {
            return None;
        }
        match self.chunks.next() {
            Some(chunk) => {
                let record = Record::data(self.address, chunk);
                self.address += chunk.len() as u32;
                Some(record)
            }
            None => {
                self.finished = true;
                Some(Record {
                    address: self.address,
                    kind: RecordKind::EndOfStream,
                    data: &[],
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_cover_image() {
        let image = [0u8; 40];
        let mut records = ImageRecords::new(0x100, &image);

        let r = records.next().unwrap();
        assert_eq!((r.address, r.data.len()), (0x100, 16));
        let r = records.next().unwrap();
        assert_eq!((r.address, r.data.len()), (0x110, 16));
        let r = records.next().unwrap();
        assert_eq!((r.address, r.data.len()), (0x120, 8));

        let end = records.next().unwrap();
        assert_eq!(end.kind, RecordKind::EndOfStream);
        assert_eq!(end.address, 0x128);
        assert!(records.next().is_none());
    }

    #[test]
    fn test_empty_image_is_just_end() {
        let mut records = ImageRecords::new(0, &[]);
        assert_eq!(records.next().unwrap().kind, RecordKind::EndOfStream);
        assert!(records.next().is_none());
    }
}
