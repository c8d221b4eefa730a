//! Streaming record reader and writer.
//!
//! The reader tolerates damaged input: when a frame header fails its sync
//! or size invariants it slides forward one byte at a time until the next
//! plausible header, so one corrupt record costs its own bytes and nothing
//! after it.

use std::io::{ErrorKind, Read, Write};

use log::warn;

use crate::header::{RecordHeader, FLAG_CHECKSUM, HEADER_SIZE, SYNC_PATTERN, TAIL_SIZE};
use crate::{checksum, CodecError, Record};

/// Upper bound a header `size` field may claim. Anything larger is treated
/// as corruption rather than a record to allocate for.
const MAX_RECORD_SIZE: u32 = 1 << 24;

/// Iterator over the records of a telemetry stream.
///
/// Yields `Err` for records that are individually undecodable (bad
/// checksum, truncated payload) while staying positioned on the next
/// record, so callers can count failures and keep going.
pub struct RecordReader<R: Read> {
    inner: R,
    offset: u64,
    resynced_bytes: u64,
    checksum_failures: u64,
    eof: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        RecordReader {
            inner,
            offset: 0,
            resynced_bytes: 0,
            checksum_failures: 0,
            eof: false,
        }
    }

    /// Byte offset of the next unread position in the stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total bytes skipped while hunting for sync patterns.
    pub fn resynced_bytes(&self) -> u64 {
        self.resynced_bytes
    }

    /// Records whose checksum tails did not verify.
    pub fn checksum_failures(&self) -> u64 {
        self.checksum_failures
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fills `buf` completely, or returns the number of bytes short at
    /// end of stream.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.offset += filled as u64;
        Ok(filled)
    }

    fn next_record(&mut self) -> Option<Result<Record, CodecError>> {
        if self.eof {
            return None;
        }
        let mut window = [0u8; HEADER_SIZE as usize];
        match self.read_full(&mut window) {
            Ok(n) if n == 0 => {
                self.eof = true;
                return None;
            }
            Ok(n) if n < window.len() => {
                self.eof = true;
                warn!("discarding {n} trailing bytes (no room for a record header)");
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                self.eof = true;
                return Some(Err(e));
            }
        }

        // Hunt for a plausible header, one byte at a time.
        let mut skipped: u64 = 0;
        let header = loop {
            let (header, sync) = match RecordHeader::read(&mut &window[..]) {
                Ok(v) => v,
                Err(e) => {
                    self.eof = true;
                    return Some(Err(e.into()));
                }
            };
            let plausible = sync == SYNC_PATTERN
                && header.size >= HEADER_SIZE + TAIL_SIZE
                && header.size <= MAX_RECORD_SIZE;
            if plausible {
                break header;
            }
            window.copy_within(1.., 0);
            let last = window.len() - 1;
            match self.read_full(std::slice::from_mut(&mut window[last])) {
                Ok(1) => {}
                Ok(_) => {
                    self.eof = true;
                    warn!("stream ended while resynchronizing ({skipped} bytes skipped)");
                    return None;
                }
                Err(e) => {
                    self.eof = true;
                    return Some(Err(e));
                }
            }
            skipped += 1;
        };
        if skipped > 0 {
            self.resynced_bytes += skipped;
            warn!(
                "resynchronized after skipping {skipped} bytes at offset {}",
                self.offset - HEADER_SIZE as u64 - skipped
            );
        }

        let rest = (header.size - HEADER_SIZE) as usize;
        let mut body = vec![0u8; rest];
        match self.read_full(&mut body) {
            Ok(n) if n < rest => {
                self.eof = true;
                return Some(Err(CodecError::TruncatedPayload {
                    needed: rest,
                    remaining: n,
                }));
            }
            Ok(_) => {}
            Err(e) => {
                self.eof = true;
                return Some(Err(e));
            }
        }

        let payload_end = rest - TAIL_SIZE as usize;
        if header.flags & FLAG_CHECKSUM != 0 {
            let stored = u32::from_le_bytes(body[payload_end..].try_into().expect("4-byte tail"));
            let mut computed = checksum(&window);
            computed = computed.wrapping_add(checksum(&body[..payload_end]));
            if stored != computed {
                self.checksum_failures += 1;
                return Some(Err(CodecError::BadChecksum {
                    record_type: header.record_type,
                    stored,
                    computed,
                }));
            }
        }

        let body = match Record::decode_payload(&header, &body[..payload_end]) {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok(Record { header, body }))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

/// Sequential record writer. Every record goes out with its frame size,
/// optional-data offset, and checksum recomputed.
pub struct RecordWriter<W: Write> {
    inner: W,
    bytes_written: u64,
    records_written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        RecordWriter {
            inner,
            bytes_written: 0,
            records_written: 0,
        }
    }

    pub fn write_record(&mut self, record: &Record) -> Result<(), CodecError> {
        let frame = record.encode()?;
        self.inner.write_all(&frame)?;
        self.bytes_written += frame.len() as u64;
        self.records_written += 1;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn flush(&mut self) -> Result<(), CodecError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Timestamp, RECID_HEADING};
    use crate::sensor::Heading;
    use crate::RecordBody;

    fn heading_record(heading: f32) -> Record {
        Record::new(
            RecordBody::Heading(Heading { heading }),
            Timestamp {
                year: 2006,
                day: 10,
                seconds: 1.0,
                hours: 0,
                minutes: 0,
            },
        )
    }

    #[test]
    fn roundtrip_through_writer_and_reader() {
        let mut writer = RecordWriter::new(Vec::new());
        for i in 0..3 {
            writer.write_record(&heading_record(i as f32)).unwrap();
        }
        assert_eq!(writer.records_written(), 3);
        let bytes = writer.into_inner();

        let reader = RecordReader::new(bytes.as_slice());
        let records: Vec<Record> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        for (i, rec) in records.iter().enumerate() {
            assert_eq!(rec.header.record_type, RECID_HEADING);
            assert_eq!(rec.body, RecordBody::Heading(Heading { heading: i as f32 }));
        }
    }

    #[test]
    fn resynchronizes_past_garbage() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(&heading_record(1.0)).unwrap();
        let mut bytes = writer.into_inner();

        let mut stream = vec![0xAB; 17];
        stream.append(&mut bytes);

        let mut reader = RecordReader::new(stream.as_slice());
        let rec = reader.next().unwrap().unwrap();
        assert_eq!(rec.body, RecordBody::Heading(Heading { heading: 1.0 }));
        assert_eq!(reader.resynced_bytes(), 17);
        assert!(reader.next().is_none());
    }

    #[test]
    fn bad_checksum_is_reported_and_reader_continues() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(&heading_record(1.0)).unwrap();
        let first_len = writer.bytes_written() as usize;
        writer.write_record(&heading_record(2.0)).unwrap();
        let mut bytes = writer.into_inner();
        // Flip a payload byte of the first record.
        bytes[first_len - 5] ^= 0xFF;

        let mut reader = RecordReader::new(bytes.as_slice());
        assert!(matches!(
            reader.next().unwrap(),
            Err(CodecError::BadChecksum { .. })
        ));
        let second = reader.next().unwrap().unwrap();
        assert_eq!(second.body, RecordBody::Heading(Heading { heading: 2.0 }));
        assert_eq!(reader.checksum_failures(), 1);
    }

    #[test]
    fn truncated_stream_yields_truncation_error() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_record(&heading_record(1.0)).unwrap();
        let bytes = writer.into_inner();
        let cut = &bytes[..bytes.len() - 3];

        let mut reader = RecordReader::new(cut);
        assert!(matches!(
            reader.next().unwrap(),
            Err(CodecError::TruncatedPayload { .. })
        ));
        assert!(reader.next().is_none());
    }
}
