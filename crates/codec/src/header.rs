//! Data Record Frame header read/write helpers.
//!
//! Every record in a 7k telemetry file starts with the same 64-byte frame
//! header and ends with a 4-byte checksum tail:
//!
//! ```text
//! [version: u16 LE][offset: u16 LE][sync: u32 LE = 0x0000FFFF][size: u32 LE]
//! [optional_data_offset: u32][optional_data_id: u32]
//! [year: u16][day: u16][seconds: f32][hours: u8][minutes: u8][reserved: u16]
//! [record_type: u32][device_id: u32][subsystem_id: u32][data_set: u32]
//! [record_number: u32][previous_record: i64][next_record: i64]
//! [flags: u16][reserved2: u16]
//! ```
//!
//! `size` counts from the version field through the end of the checksum
//! tail, so the payload length is `size - HEADER_SIZE - TAIL_SIZE`. The
//! checksum (when header flag bit 0 is set) is the wrapping 32-bit sum of
//! every byte before the tail.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDate, Timelike};
use std::io::{self, Read, Write};

/// Sync pattern every record header must carry.
pub const SYNC_PATTERN: u32 = 0x0000_FFFF;

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: u32 = 72;

/// Size of the trailing checksum in bytes.
pub const TAIL_SIZE: u32 = 4;

/// Header flag bit 0: the record carries a valid checksum tail.
pub const FLAG_CHECKSUM: u16 = 0x0001;

// Record type codes for the payloads this codec models.
pub const RECID_POSITION: u32 = 1003;
pub const RECID_ALTITUDE: u32 = 1006;
pub const RECID_DEPTH: u32 = 1008;
pub const RECID_SVP: u32 = 1009;
pub const RECID_CTD: u32 = 1010;
pub const RECID_ROLL_PITCH_HEAVE: u32 = 1012;
pub const RECID_HEADING: u32 = 1013;
pub const RECID_NAVIGATION: u32 = 1015;
pub const RECID_ATTITUDE: u32 = 1016;
pub const RECID_TOWED_SIDESCAN: u32 = 3000;
pub const RECID_SUBBOTTOM: u32 = 3001;
pub const RECID_VEHICLE_FRAME: u32 = 3100;
pub const RECID_SONAR_SETTINGS: u32 = 7000;
pub const RECID_BEAM_GEOMETRY: u32 = 7004;
pub const RECID_BATHYMETRY: u32 = 7006;
pub const RECID_BACKSCATTER: u32 = 7007;
pub const RECID_BEAM_DATA: u32 = 7008;
pub const RECID_INSTALLATION: u32 = 7030;
pub const RECID_EVENT_MESSAGE: u32 = 7051;
pub const RECID_FILE_HEADER: u32 = 7200;

/// UTC timestamp as carried in the frame header: year, day-of-year, and a
/// fractional second within the hour/minute.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timestamp {
    pub year: u16,
    pub day: u16,
    pub seconds: f32,
    pub hours: u8,
    pub minutes: u8,
}

impl Timestamp {
    /// Converts to seconds since the Unix epoch.
    ///
    /// Returns 0.0 for a timestamp whose year/day fields do not form a
    /// valid date (all-zero headers from synthetic records).
    pub fn to_epoch_seconds(&self) -> f64 {
        let date = match NaiveDate::from_yo_opt(self.year as i32, self.day.max(1) as u32) {
            Some(d) => d,
            None => return 0.0,
        };
        let whole = self.seconds.floor();
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        midnight.and_utc().timestamp() as f64
            + 3600.0 * self.hours as f64
            + 60.0 * self.minutes as f64
            + whole as f64
            + (self.seconds - whole) as f64
    }

    /// Builds a header timestamp from seconds since the Unix epoch.
    pub fn from_epoch_seconds(time_d: f64) -> Self {
        let secs = time_d.floor() as i64;
        let frac = time_d - secs as f64;
        let dt = chrono::DateTime::from_timestamp(secs, 0)
            .unwrap_or_else(|| chrono::DateTime::from_timestamp(0, 0).expect("epoch"));
        let naive = dt.naive_utc();
        Timestamp {
            year: naive.year() as u16,
            day: naive.ordinal() as u16,
            seconds: naive.second() as f32 + frac as f32,
            hours: naive.hour() as u8,
            minutes: naive.minute() as u8,
        }
    }
}

/// The fixed 64-byte Data Record Frame header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordHeader {
    pub version: u16,
    pub offset: u16,
    pub size: u32,
    pub optional_data_offset: u32,
    pub optional_data_id: u32,
    pub time: Timestamp,
    pub record_type: u32,
    pub device_id: u32,
    pub subsystem_id: u32,
    pub data_set: u32,
    pub record_number: u32,
    pub previous_record: i64,
    pub next_record: i64,
    pub flags: u16,
}

impl RecordHeader {
    /// Minimal header for a freshly built record of the given type. `size`
    /// is filled in by the encoder.
    pub fn new(record_type: u32) -> Self {
        RecordHeader {
            version: 5,
            offset: HEADER_SIZE as u16 - 4,
            record_type,
            previous_record: -1,
            next_record: -1,
            ..Default::default()
        }
    }

    /// Payload length implied by `size` (excludes header and checksum tail).
    pub fn payload_len(&self) -> u32 {
        self.size.saturating_sub(HEADER_SIZE + TAIL_SIZE)
    }

    /// Reads a header from `r`. The sync pattern and size invariants are
    /// checked by the caller so it can distinguish resynchronizable
    /// corruption from I/O failure; this only performs raw field extraction.
    pub fn read<R: Read>(r: &mut R) -> io::Result<(Self, u32)> {
        let version = r.read_u16::<LittleEndian>()?;
        let offset = r.read_u16::<LittleEndian>()?;
        let sync = r.read_u32::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()?;
        let optional_data_offset = r.read_u32::<LittleEndian>()?;
        let optional_data_id = r.read_u32::<LittleEndian>()?;
        let time = Timestamp {
            year: r.read_u16::<LittleEndian>()?,
            day: r.read_u16::<LittleEndian>()?,
            seconds: r.read_f32::<LittleEndian>()?,
            hours: r.read_u8()?,
            minutes: r.read_u8()?,
        };
        let _reserved = r.read_u16::<LittleEndian>()?;
        let record_type = r.read_u32::<LittleEndian>()?;
        let device_id = r.read_u32::<LittleEndian>()?;
        let subsystem_id = r.read_u32::<LittleEndian>()?;
        let data_set = r.read_u32::<LittleEndian>()?;
        let record_number = r.read_u32::<LittleEndian>()?;
        let previous_record = r.read_i64::<LittleEndian>()?;
        let next_record = r.read_i64::<LittleEndian>()?;
        let flags = r.read_u16::<LittleEndian>()?;
        let _reserved2 = r.read_u16::<LittleEndian>()?;
        Ok((
            RecordHeader {
                version,
                offset,
                size,
                optional_data_offset,
                optional_data_id,
                time,
                record_type,
                device_id,
                subsystem_id,
                data_set,
                record_number,
                previous_record,
                next_record,
                flags,
            },
            sync,
        ))
    }

    /// Writes the header to `w` with the sync pattern in place.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.version)?;
        w.write_u16::<LittleEndian>(self.offset)?;
        w.write_u32::<LittleEndian>(SYNC_PATTERN)?;
        w.write_u32::<LittleEndian>(self.size)?;
        w.write_u32::<LittleEndian>(self.optional_data_offset)?;
        w.write_u32::<LittleEndian>(self.optional_data_id)?;
        w.write_u16::<LittleEndian>(self.time.year)?;
        w.write_u16::<LittleEndian>(self.time.day)?;
        w.write_f32::<LittleEndian>(self.time.seconds)?;
        w.write_u8(self.time.hours)?;
        w.write_u8(self.time.minutes)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(self.record_type)?;
        w.write_u32::<LittleEndian>(self.device_id)?;
        w.write_u32::<LittleEndian>(self.subsystem_id)?;
        w.write_u32::<LittleEndian>(self.data_set)?;
        w.write_u32::<LittleEndian>(self.record_number)?;
        w.write_i64::<LittleEndian>(self.previous_record)?;
        w.write_i64::<LittleEndian>(self.next_record)?;
        w.write_u16::<LittleEndian>(self.flags)?;
        w.write_u16::<LittleEndian>(0)?;
        Ok(())
    }
}

/// Wrapping 32-bit byte sum used by the record checksum tail.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32))
}
