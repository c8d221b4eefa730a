//! Record codec for 7k-series multibeam telemetry files.
//!
//! A telemetry file is a flat sequence of records, each wrapped in the
//! 64-byte Data Record Frame described in [`header`]. This crate decodes
//! and re-encodes the record kinds the preprocessing passes need: the
//! 1000-series ancillary sensor records, the towed-instrument 3000-series,
//! vehicle telemetry frames, and the sonar's own 7000-series. Everything
//! else is carried through byte-for-byte as [`RecordBody::Opaque`] so a
//! rewritten file keeps records this codec does not model.
//!
//! [`RecordReader`] scans a stream record by record and resynchronizes on
//! the frame sync pattern after corruption; [`RecordWriter`] re-emits
//! records with sizes, optional-data offsets, and checksums recomputed.

pub mod fsdw;
pub mod header;
mod reader;
pub mod sensor;
pub mod sonar;
pub mod vehicle;

use std::io;

use thiserror::Error;

pub use header::{checksum, RecordHeader, Timestamp, FLAG_CHECKSUM, HEADER_SIZE, SYNC_PATTERN, TAIL_SIZE};
pub use reader::{RecordReader, RecordWriter};

use header::*;

/// Errors produced while decoding or encoding records.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A frame header failed its sync or size invariants and no further
    /// sync pattern was found in the stream.
    #[error("corrupt record header at byte {offset}")]
    CorruptHeader { offset: u64 },

    /// The payload ended before a field or array it promised.
    #[error("truncated payload: needed {needed} bytes, {remaining} remain")]
    TruncatedPayload { needed: usize, remaining: usize },

    /// The checksum tail did not match the record bytes.
    #[error("record {record_type} checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    BadChecksum {
        record_type: u32,
        stored: u32,
        computed: u32,
    },

    /// A snippet record declared a per-sample width this codec does not
    /// handle.
    #[error("record {record_type} has unsupported sample type {sample_type:#06x}")]
    UnsupportedSampleType { record_type: u32, sample_type: u32 },

    /// Per-beam arrays of one record disagree on the beam count.
    #[error("record {record_type} has per-beam arrays of differing lengths")]
    InconsistentArrays { record_type: u32 },
}

/// Checks that `buf` still holds at least `needed` bytes before any field
/// or array read, so a hostile length field cannot trigger a huge
/// allocation or a partial-read panic.
pub(crate) fn ensure(buf: &[u8], needed: usize) -> Result<(), CodecError> {
    if buf.len() < needed {
        return Err(CodecError::TruncatedPayload {
            needed,
            remaining: buf.len(),
        });
    }
    Ok(())
}

/// Decoded payload of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBody {
    Position(sensor::Position),
    Altitude(sensor::Altitude),
    Depth(sensor::Depth),
    SoundVelocityProfile(sensor::SoundVelocityProfile),
    Ctd(sensor::Ctd),
    RollPitchHeave(sensor::RollPitchHeave),
    Heading(sensor::Heading),
    Navigation(sensor::Navigation),
    Attitude(sensor::Attitude),
    TowedSidescan(fsdw::TowedSidescan),
    Subbottom(fsdw::Subbottom),
    VehicleFrames(vehicle::VehicleFrames),
    SonarSettings(sonar::SonarSettings),
    BeamGeometry(sonar::BeamGeometry),
    Bathymetry(sonar::Bathymetry),
    Backscatter(sonar::Backscatter),
    BeamData(sonar::BeamData),
    EventMessage(sonar::EventMessage),
    FileHeader(sonar::FileHeader),
    /// Any record type this codec does not model, kept verbatim.
    Opaque(Vec<u8>),
}

impl RecordBody {
    /// Record type code this body serializes as. `Opaque` bodies keep the
    /// type of the header they were read under.
    pub fn record_type(&self) -> Option<u32> {
        Some(match self {
            RecordBody::Position(_) => RECID_POSITION,
            RecordBody::Altitude(_) => RECID_ALTITUDE,
            RecordBody::Depth(_) => RECID_DEPTH,
            RecordBody::SoundVelocityProfile(_) => RECID_SVP,
            RecordBody::Ctd(_) => RECID_CTD,
            RecordBody::RollPitchHeave(_) => RECID_ROLL_PITCH_HEAVE,
            RecordBody::Heading(_) => RECID_HEADING,
            RecordBody::Navigation(_) => RECID_NAVIGATION,
            RecordBody::Attitude(_) => RECID_ATTITUDE,
            RecordBody::TowedSidescan(_) => RECID_TOWED_SIDESCAN,
            RecordBody::Subbottom(_) => RECID_SUBBOTTOM,
            RecordBody::VehicleFrames(_) => RECID_VEHICLE_FRAME,
            RecordBody::SonarSettings(_) => RECID_SONAR_SETTINGS,
            RecordBody::BeamGeometry(_) => RECID_BEAM_GEOMETRY,
            RecordBody::Bathymetry(_) => RECID_BATHYMETRY,
            RecordBody::Backscatter(_) => RECID_BACKSCATTER,
            RecordBody::BeamData(_) => RECID_BEAM_DATA,
            RecordBody::EventMessage(_) => RECID_EVENT_MESSAGE,
            RecordBody::FileHeader(_) => RECID_FILE_HEADER,
            RecordBody::Opaque(_) => return None,
        })
    }
}

/// One complete record: frame header plus decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub header: RecordHeader,
    pub body: RecordBody,
}

impl Record {
    /// Builds a record around `body` with a fresh header stamped `time`.
    /// Frame size and offsets are filled in at encode time.
    pub fn new(body: RecordBody, time: Timestamp) -> Self {
        let record_type = body.record_type().unwrap_or(0);
        let mut header = RecordHeader::new(record_type);
        header.time = time;
        Record { header, body }
    }

    /// Seconds since the Unix epoch of the frame header timestamp.
    pub fn time_d(&self) -> f64 {
        self.header.time.to_epoch_seconds()
    }

    /// Decodes `payload` according to the header's record type. Unknown
    /// types come back as [`RecordBody::Opaque`].
    pub fn decode_payload(header: &RecordHeader, payload: &[u8]) -> Result<RecordBody, CodecError> {
        let mut buf = payload;
        let buf = &mut buf;
        Ok(match header.record_type {
            RECID_POSITION => RecordBody::Position(sensor::Position::decode(buf)?),
            RECID_ALTITUDE => RecordBody::Altitude(sensor::Altitude::decode(buf)?),
            RECID_DEPTH => RecordBody::Depth(sensor::Depth::decode(buf)?),
            RECID_SVP => {
                RecordBody::SoundVelocityProfile(sensor::SoundVelocityProfile::decode(buf)?)
            }
            RECID_CTD => RecordBody::Ctd(sensor::Ctd::decode(buf)?),
            RECID_ROLL_PITCH_HEAVE => {
                RecordBody::RollPitchHeave(sensor::RollPitchHeave::decode(buf)?)
            }
            RECID_HEADING => RecordBody::Heading(sensor::Heading::decode(buf)?),
            RECID_NAVIGATION => RecordBody::Navigation(sensor::Navigation::decode(buf)?),
            RECID_ATTITUDE => RecordBody::Attitude(sensor::Attitude::decode(buf)?),
            RECID_TOWED_SIDESCAN => RecordBody::TowedSidescan(fsdw::TowedSidescan::decode(buf)?),
            RECID_SUBBOTTOM => RecordBody::Subbottom(fsdw::Subbottom::decode(buf)?),
            RECID_VEHICLE_FRAME => RecordBody::VehicleFrames(vehicle::VehicleFrames::decode(buf)?),
            RECID_SONAR_SETTINGS => RecordBody::SonarSettings(sonar::SonarSettings::decode(buf)?),
            RECID_BEAM_GEOMETRY => RecordBody::BeamGeometry(sonar::BeamGeometry::decode(buf)?),
            RECID_BATHYMETRY => RecordBody::Bathymetry(sonar::Bathymetry::decode(
                buf,
                header.version,
                header.optional_data_offset != 0,
            )?),
            RECID_BACKSCATTER => RecordBody::Backscatter(sonar::Backscatter::decode(buf)?),
            RECID_BEAM_DATA => RecordBody::BeamData(sonar::BeamData::decode(buf)?),
            RECID_EVENT_MESSAGE => RecordBody::EventMessage(sonar::EventMessage::decode(buf)?),
            RECID_FILE_HEADER => RecordBody::FileHeader(sonar::FileHeader::decode(buf)?),
            _ => RecordBody::Opaque(payload.to_vec()),
        })
    }

    /// Serializes the record as a complete frame: header, payload, and
    /// checksum tail, with `size` and the optional-data offset recomputed
    /// from the payload actually written.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut payload = Vec::new();
        let optional_at = self.encode_payload(&mut payload)?;

        let mut header = self.header.clone();
        header.size = HEADER_SIZE + payload.len() as u32 + TAIL_SIZE;
        header.optional_data_offset = match optional_at {
            Some(rel) => HEADER_SIZE + rel as u32,
            None => 0,
        };
        header.flags |= FLAG_CHECKSUM;

        let mut frame = Vec::with_capacity(header.size as usize);
        header.write(&mut frame)?;
        frame.extend_from_slice(&payload);
        let sum = checksum(&frame);
        frame.extend_from_slice(&sum.to_le_bytes());
        Ok(frame)
    }

    fn encode_payload(&self, w: &mut Vec<u8>) -> Result<Option<usize>, CodecError> {
        let opt = match &self.body {
            RecordBody::Position(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::Altitude(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::Depth(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::SoundVelocityProfile(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::Ctd(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::RollPitchHeave(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::Heading(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::Navigation(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::Attitude(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::TowedSidescan(p) => p.encode(w)?,
            RecordBody::Subbottom(p) => p.encode(w)?,
            RecordBody::VehicleFrames(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::SonarSettings(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::BeamGeometry(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::Bathymetry(p) => p.encode(w, self.header.version)?,
            RecordBody::Backscatter(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::BeamData(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::EventMessage(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::FileHeader(p) => {
                p.encode(w)?;
                None
            }
            RecordBody::Opaque(bytes) => {
                w.extend_from_slice(bytes);
                // Opaque records keep whatever offset the header carried.
                if self.header.optional_data_offset != 0 {
                    return Ok(Some(
                        (self.header.optional_data_offset - HEADER_SIZE) as usize,
                    ));
                }
                None
            }
        };
        Ok(opt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_encode_fills_size_and_checksum() {
        let rec = Record::new(
            RecordBody::Heading(sensor::Heading { heading: 1.57 }),
            Timestamp {
                year: 2006,
                day: 40,
                seconds: 3.0,
                hours: 1,
                minutes: 2,
            },
        );
        let frame = rec.encode().unwrap();
        assert_eq!(frame.len(), HEADER_SIZE as usize + 4 + TAIL_SIZE as usize);

        let (header, sync) = RecordHeader::read(&mut frame.as_slice()).unwrap();
        assert_eq!(sync, SYNC_PATTERN);
        assert_eq!(header.size as usize, frame.len());
        assert_eq!(header.record_type, header::RECID_HEADING);
        assert_ne!(header.flags & FLAG_CHECKSUM, 0);

        let body_end = frame.len() - TAIL_SIZE as usize;
        let stored = u32::from_le_bytes(frame[body_end..].try_into().unwrap());
        assert_eq!(stored, checksum(&frame[..body_end]));
    }

    #[test]
    fn unknown_record_type_decodes_opaque() {
        let header = RecordHeader::new(7777);
        let payload = [1u8, 2, 3, 4, 5];
        let body = Record::decode_payload(&header, &payload).unwrap();
        assert_eq!(body, RecordBody::Opaque(payload.to_vec()));
    }

    #[test]
    fn padded_bathymetry_payload_decodes_without_processed_block() {
        let bath = sonar::Bathymetry {
            ping_number: 3,
            range: vec![0.1, 0.2],
            quality: vec![0x0F, 0x0F],
            intensity: vec![1.0, 2.0],
            ..Default::default()
        };
        let mut header = RecordHeader::new(header::RECID_BATHYMETRY);
        let mut payload = Vec::new();
        bath.encode(&mut payload, header.version).unwrap();
        payload.extend_from_slice(&[0u8; 2]);
        header.optional_data_offset = 0;

        let body = Record::decode_payload(&header, &payload).unwrap();
        match body {
            RecordBody::Bathymetry(b) => {
                assert_eq!(b, bath);
                assert!(b.processed.is_none());
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn truncated_payload_is_reported() {
        let header = RecordHeader::new(header::RECID_POSITION);
        let err = Record::decode_payload(&header, &[0u8; 10]).unwrap_err();
        match err {
            CodecError::TruncatedPayload { needed, remaining } => {
                assert_eq!(needed, 36);
                assert_eq!(remaining, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn towed_sidescan_encode_sets_optional_offset() {
        let rec = Record::new(
            RecordBody::TowedSidescan(fsdw::TowedSidescan {
                ping_number: 9,
                channels: vec![fsdw::TowedChannel::default(), fsdw::TowedChannel::default()],
                headers: vec![
                    fsdw::SidescanHeader::default(),
                    fsdw::SidescanHeader::default(),
                ],
                ..Default::default()
            }),
            Timestamp::default(),
        );
        let frame = rec.encode().unwrap();
        let (header, _) = RecordHeader::read(&mut frame.as_slice()).unwrap();
        // 32-byte body prefix plus two empty 64-byte channel blocks.
        assert_eq!(header.optional_data_offset, HEADER_SIZE + 32 + 128);
    }
}
