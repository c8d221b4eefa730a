//! Towed-sonar payloads (3000-series): dual-channel sidescan and single
//! channel sub-bottom profiler records from the companion towed instrument.
//!
//! Both record kinds share a 20-byte type header plus 12 reserved bytes,
//! followed by per-channel blocks (64-byte channel info + raw sample bytes)
//! and, in the optional-data section, the instrument's own acquisition
//! headers: an 80-byte sidescan header per channel, or a 240-byte seismic
//! trace header for sub-bottom data.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::{ensure, CodecError};

/// Per-channel acquisition info block (64 bytes on the wire). Sample bytes
/// are kept raw; `bytes_per_sample` says how to interpret them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TowedChannel {
    pub number: u8,
    /// 0 = port, 1 = starboard.
    pub channel_type: u8,
    /// 0 = slant range, 1 = ground range.
    pub data_type: u8,
    pub polarity: u8,
    pub bytes_per_sample: u8,
    pub number_samples: u32,
    /// Start of the first sample in microseconds after the ping timestamp.
    pub start_time: u32,
    /// Sample interval in microseconds.
    pub sample_interval: u32,
    pub range: f32,
    pub voltage: f32,
    pub name: [u8; 16],
    pub data: Vec<u8>,
}

impl TowedChannel {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 64)?;
        let number = buf.read_u8()?;
        let channel_type = buf.read_u8()?;
        let data_type = buf.read_u8()?;
        let polarity = buf.read_u8()?;
        let bytes_per_sample = buf.read_u8()?;
        let mut reserved1 = [0u8; 3];
        buf.read_exact(&mut reserved1)?;
        let number_samples = buf.read_u32::<LittleEndian>()?;
        let start_time = buf.read_u32::<LittleEndian>()?;
        let sample_interval = buf.read_u32::<LittleEndian>()?;
        let range = buf.read_f32::<LittleEndian>()?;
        let voltage = buf.read_f32::<LittleEndian>()?;
        let mut name = [0u8; 16];
        buf.read_exact(&mut name)?;
        let mut reserved2 = [0u8; 20];
        buf.read_exact(&mut reserved2)?;

        let nbytes = number_samples as usize * bytes_per_sample.max(1) as usize;
        ensure(buf, nbytes)?;
        let mut data = vec![0u8; nbytes];
        buf.read_exact(&mut data)?;

        Ok(TowedChannel {
            number,
            channel_type,
            data_type,
            polarity,
            bytes_per_sample,
            number_samples,
            start_time,
            sample_interval,
            range,
            voltage,
            name,
            data,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.number)?;
        w.write_u8(self.channel_type)?;
        w.write_u8(self.data_type)?;
        w.write_u8(self.polarity)?;
        w.write_u8(self.bytes_per_sample)?;
        w.write_all(&[0u8; 3])?;
        w.write_u32::<LittleEndian>(self.number_samples)?;
        w.write_u32::<LittleEndian>(self.start_time)?;
        w.write_u32::<LittleEndian>(self.sample_interval)?;
        w.write_f32::<LittleEndian>(self.range)?;
        w.write_f32::<LittleEndian>(self.voltage)?;
        w.write_all(&self.name)?;
        w.write_all(&[0u8; 20])?;
        w.write_all(&self.data)?;
        Ok(())
    }

    /// Decodes the raw sample bytes as 16-bit envelope samples. One-byte
    /// channels are widened.
    pub fn samples_i16(&self) -> Vec<i16> {
        match self.bytes_per_sample {
            2 => self
                .data
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect(),
            _ => self.data.iter().map(|&b| b as i16).collect(),
        }
    }
}

/// Sidescan acquisition header, one per channel (80 bytes on the wire).
/// Carries the towed instrument's own ping counter and clock, which is the
/// independent stream the timestamp reconciliation pass keys on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SidescanHeader {
    pub subsystem: u16,
    pub channel_num: u16,
    pub ping_num: u32,
    pub packet_num: u16,
    pub trig_source: u16,
    pub samples: u32,
    pub sample_interval_ns: u32,
    pub start_depth: u32,
    pub weighting_factor: i16,
    pub adc_gain: u16,
    pub adc_max: u16,
    pub range_setting: u16,
    pub pulse_id: u16,
    pub mark_number: u16,
    pub data_format: u16,
    pub milliseconds_today: u32,
    pub year: i16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub heading: i16,
    pub pitch: i16,
    pub roll: i16,
    pub heave: i16,
    pub yaw: i16,
    pub depth: u32,
    pub temperature: i16,
    pub longitude: i32,
    pub latitude: i32,
}

impl SidescanHeader {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 80)?;
        let subsystem = buf.read_u16::<LittleEndian>()?;
        let channel_num = buf.read_u16::<LittleEndian>()?;
        let ping_num = buf.read_u32::<LittleEndian>()?;
        let packet_num = buf.read_u16::<LittleEndian>()?;
        let trig_source = buf.read_u16::<LittleEndian>()?;
        let samples = buf.read_u32::<LittleEndian>()?;
        let sample_interval_ns = buf.read_u32::<LittleEndian>()?;
        let start_depth = buf.read_u32::<LittleEndian>()?;
        let weighting_factor = buf.read_i16::<LittleEndian>()?;
        let adc_gain = buf.read_u16::<LittleEndian>()?;
        let adc_max = buf.read_u16::<LittleEndian>()?;
        let range_setting = buf.read_u16::<LittleEndian>()?;
        let pulse_id = buf.read_u16::<LittleEndian>()?;
        let mark_number = buf.read_u16::<LittleEndian>()?;
        let data_format = buf.read_u16::<LittleEndian>()?;
        let _reserved = buf.read_u16::<LittleEndian>()?;
        let milliseconds_today = buf.read_u32::<LittleEndian>()?;
        let year = buf.read_i16::<LittleEndian>()?;
        let day = buf.read_u16::<LittleEndian>()?;
        let hour = buf.read_u16::<LittleEndian>()?;
        let minute = buf.read_u16::<LittleEndian>()?;
        let second = buf.read_u16::<LittleEndian>()?;
        let heading = buf.read_i16::<LittleEndian>()?;
        let pitch = buf.read_i16::<LittleEndian>()?;
        let roll = buf.read_i16::<LittleEndian>()?;
        let heave = buf.read_i16::<LittleEndian>()?;
        let yaw = buf.read_i16::<LittleEndian>()?;
        let depth = buf.read_u32::<LittleEndian>()?;
        let temperature = buf.read_i16::<LittleEndian>()?;
        let mut reserved2 = [0u8; 2];
        buf.read_exact(&mut reserved2)?;
        let longitude = buf.read_i32::<LittleEndian>()?;
        let latitude = buf.read_i32::<LittleEndian>()?;
        Ok(SidescanHeader {
            subsystem,
            channel_num,
            ping_num,
            packet_num,
            trig_source,
            samples,
            sample_interval_ns,
            start_depth,
            weighting_factor,
            adc_gain,
            adc_max,
            range_setting,
            pulse_id,
            mark_number,
            data_format,
            milliseconds_today,
            year,
            day,
            hour,
            minute,
            second,
            heading,
            pitch,
            roll,
            heave,
            yaw,
            depth,
            temperature,
            longitude,
            latitude,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.subsystem)?;
        w.write_u16::<LittleEndian>(self.channel_num)?;
        w.write_u32::<LittleEndian>(self.ping_num)?;
        w.write_u16::<LittleEndian>(self.packet_num)?;
        w.write_u16::<LittleEndian>(self.trig_source)?;
        w.write_u32::<LittleEndian>(self.samples)?;
        w.write_u32::<LittleEndian>(self.sample_interval_ns)?;
        w.write_u32::<LittleEndian>(self.start_depth)?;
        w.write_i16::<LittleEndian>(self.weighting_factor)?;
        w.write_u16::<LittleEndian>(self.adc_gain)?;
        w.write_u16::<LittleEndian>(self.adc_max)?;
        w.write_u16::<LittleEndian>(self.range_setting)?;
        w.write_u16::<LittleEndian>(self.pulse_id)?;
        w.write_u16::<LittleEndian>(self.mark_number)?;
        w.write_u16::<LittleEndian>(self.data_format)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(self.milliseconds_today)?;
        w.write_i16::<LittleEndian>(self.year)?;
        w.write_u16::<LittleEndian>(self.day)?;
        w.write_u16::<LittleEndian>(self.hour)?;
        w.write_u16::<LittleEndian>(self.minute)?;
        w.write_u16::<LittleEndian>(self.second)?;
        w.write_i16::<LittleEndian>(self.heading)?;
        w.write_i16::<LittleEndian>(self.pitch)?;
        w.write_i16::<LittleEndian>(self.roll)?;
        w.write_i16::<LittleEndian>(self.heave)?;
        w.write_i16::<LittleEndian>(self.yaw)?;
        w.write_u32::<LittleEndian>(self.depth)?;
        w.write_i16::<LittleEndian>(self.temperature)?;
        w.write_all(&[0u8; 2])?;
        w.write_i32::<LittleEndian>(self.longitude)?;
        w.write_i32::<LittleEndian>(self.latitude)?;
        Ok(())
    }

    /// Acquisition timestamp as seconds since the Unix epoch, built from
    /// the header's own clock fields (independent of the record header).
    pub fn epoch_seconds(&self) -> f64 {
        let t = crate::header::Timestamp {
            year: self.year.max(0) as u16,
            day: self.day,
            seconds: (self.second as f32) + (self.milliseconds_today % 1000) as f32 / 1000.0,
            hours: self.hour as u8,
            minutes: self.minute as u8,
        };
        t.to_epoch_seconds()
    }
}

/// Seismic trace header for sub-bottom data (240 bytes on the wire),
/// following the standard trace header layout so the channel can be lifted
/// straight into a SEG-Y trace. Only the fields the extraction API reads
/// are named; the rest ride along as raw filler so encode reproduces the
/// full 240 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct SegyTraceHeader {
    pub sequence_number: i32,
    pub start_depth: u32,
    pub ping_num: u32,
    pub channel_num: u32,
    pub data_format: i16,
    pub samples: u16,
    pub sample_interval_ns: u32,
    pub adc_gain: u16,
    pub pulse_power: i16,
    pub start_freq_decihz: u16,
    pub end_freq_decihz: u16,
    pub sweep_length_ms: u16,
    pub year: i16,
    pub day: i16,
    pub hour: i16,
    pub minute: i16,
    pub second: i16,
    pub heading: i16,
    pub pitch: i16,
    pub roll: i16,
    pub temperature: i16,
    pub weighting_factor: i16,
    /// Bytes 16-27 and 30-33 and other unnamed spans, preserved verbatim.
    pub filler: Vec<u8>,
}

impl Default for SegyTraceHeader {
    fn default() -> Self {
        SegyTraceHeader {
            sequence_number: 0,
            start_depth: 0,
            ping_num: 0,
            channel_num: 0,
            data_format: 0,
            samples: 0,
            sample_interval_ns: 0,
            adc_gain: 0,
            pulse_power: 0,
            start_freq_decihz: 0,
            end_freq_decihz: 0,
            sweep_length_ms: 0,
            year: 0,
            day: 0,
            hour: 0,
            minute: 0,
            second: 0,
            heading: 0,
            pitch: 0,
            roll: 0,
            temperature: 0,
            weighting_factor: 0,
            filler: vec![0u8; SEGY_FILLER_LEN],
        }
    }
}

/// Total unnamed bytes inside the 240-byte trace header.
const SEGY_FILLER_LEN: usize = 240 - 54;

impl SegyTraceHeader {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 240)?;
        let mut h = SegyTraceHeader::default();
        let mut filler = Vec::with_capacity(SEGY_FILLER_LEN);
        let mut skip = |buf: &mut &[u8], filler: &mut Vec<u8>, n: usize| -> io::Result<()> {
            let mut tmp = vec![0u8; n];
            buf.read_exact(&mut tmp)?;
            filler.extend_from_slice(&tmp);
            Ok(())
        };
        h.sequence_number = buf.read_i32::<LittleEndian>()?; // 0-3
        h.start_depth = buf.read_u32::<LittleEndian>()?; // 4-7
        h.ping_num = buf.read_u32::<LittleEndian>()?; // 8-11
        h.channel_num = buf.read_u32::<LittleEndian>()?; // 12-15
        skip(buf, &mut filler, 18)?; // 16-33: unused + trace id + unused
        h.data_format = buf.read_i16::<LittleEndian>()?; // 34-35
        skip(buf, &mut filler, 78)?; // 36-113: antennae, RS232, nav coords
        h.samples = buf.read_u16::<LittleEndian>()?; // 114-115
        h.sample_interval_ns = buf.read_u32::<LittleEndian>()?; // 116-119
        h.adc_gain = buf.read_u16::<LittleEndian>()?; // 120-121
        h.pulse_power = buf.read_i16::<LittleEndian>()?; // 122-123
        skip(buf, &mut filler, 2)?; // 124-125: correlated
        h.start_freq_decihz = buf.read_u16::<LittleEndian>()?; // 126-127
        h.end_freq_decihz = buf.read_u16::<LittleEndian>()?; // 128-129
        h.sweep_length_ms = buf.read_u16::<LittleEndian>()?; // 130-131
        skip(buf, &mut filler, 24)?; // 132-155
        h.year = buf.read_i16::<LittleEndian>()?; // 156-157
        h.day = buf.read_i16::<LittleEndian>()?; // 158-159
        h.hour = buf.read_i16::<LittleEndian>()?; // 160-161
        h.minute = buf.read_i16::<LittleEndian>()?; // 162-163
        h.second = buf.read_i16::<LittleEndian>()?; // 164-165
        skip(buf, &mut filler, 2)?; // 166-167: time basis
        h.weighting_factor = buf.read_i16::<LittleEndian>()?; // 168-169
        skip(buf, &mut filler, 2)?; // 170-171
        h.heading = buf.read_i16::<LittleEndian>()?; // 172-173
        h.pitch = buf.read_i16::<LittleEndian>()?; // 174-175
        h.roll = buf.read_i16::<LittleEndian>()?; // 176-177
        h.temperature = buf.read_i16::<LittleEndian>()?; // 178-179
        skip(buf, &mut filler, 60)?; // 180-239: user defined area
        h.filler = filler;
        Ok(h)
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let f = &self.filler;
        // Filler spans, in decode order.
        let (f0, rest) = f.split_at(18);
        let (f1, rest) = rest.split_at(78);
        let (f2, rest) = rest.split_at(2);
        let (f3, rest) = rest.split_at(24);
        let (f4, rest) = rest.split_at(2);
        let (f5, f6) = rest.split_at(2);
        w.write_i32::<LittleEndian>(self.sequence_number)?;
        w.write_u32::<LittleEndian>(self.start_depth)?;
        w.write_u32::<LittleEndian>(self.ping_num)?;
        w.write_u32::<LittleEndian>(self.channel_num)?;
        w.write_all(f0)?;
        w.write_i16::<LittleEndian>(self.data_format)?;
        w.write_all(f1)?;
        w.write_u16::<LittleEndian>(self.samples)?;
        w.write_u32::<LittleEndian>(self.sample_interval_ns)?;
        w.write_u16::<LittleEndian>(self.adc_gain)?;
        w.write_i16::<LittleEndian>(self.pulse_power)?;
        w.write_all(f2)?;
        w.write_u16::<LittleEndian>(self.start_freq_decihz)?;
        w.write_u16::<LittleEndian>(self.end_freq_decihz)?;
        w.write_u16::<LittleEndian>(self.sweep_length_ms)?;
        w.write_all(f3)?;
        w.write_i16::<LittleEndian>(self.year)?;
        w.write_i16::<LittleEndian>(self.day)?;
        w.write_i16::<LittleEndian>(self.hour)?;
        w.write_i16::<LittleEndian>(self.minute)?;
        w.write_i16::<LittleEndian>(self.second)?;
        w.write_all(f4)?;
        w.write_i16::<LittleEndian>(self.weighting_factor)?;
        w.write_all(f5)?;
        w.write_i16::<LittleEndian>(self.heading)?;
        w.write_i16::<LittleEndian>(self.pitch)?;
        w.write_i16::<LittleEndian>(self.roll)?;
        w.write_i16::<LittleEndian>(self.temperature)?;
        w.write_all(f6)?;
        Ok(())
    }
}

/// Dual-channel towed sidescan record (3000).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TowedSidescan {
    pub msec_timestamp: i32,
    pub ping_number: i32,
    pub data_format: i32,
    pub channels: Vec<TowedChannel>,
    pub headers: Vec<SidescanHeader>,
}

impl TowedSidescan {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 32)?;
        let msec_timestamp = buf.read_i32::<LittleEndian>()?;
        let ping_number = buf.read_i32::<LittleEndian>()?;
        let number_channels = buf.read_i32::<LittleEndian>()?;
        let _total_bytes = buf.read_i32::<LittleEndian>()?;
        let data_format = buf.read_i32::<LittleEndian>()?;
        let mut reserved = [0u8; 12];
        buf.read_exact(&mut reserved)?;

        let nchan = number_channels.clamp(0, 2) as usize;
        let mut channels = Vec::with_capacity(nchan);
        for _ in 0..nchan {
            channels.push(TowedChannel::decode(buf)?);
        }
        let mut headers = Vec::with_capacity(nchan);
        for _ in 0..nchan {
            headers.push(SidescanHeader::decode(buf)?);
        }
        Ok(TowedSidescan {
            msec_timestamp,
            ping_number,
            data_format,
            channels,
            headers,
        })
    }

    /// Returns the offset of the optional-data section (the acquisition
    /// headers) relative to the start of the payload.
    pub fn encode(&self, w: &mut Vec<u8>) -> io::Result<Option<usize>> {
        w.write_i32::<LittleEndian>(self.msec_timestamp)?;
        w.write_i32::<LittleEndian>(self.ping_number)?;
        w.write_i32::<LittleEndian>(self.channels.len() as i32)?;
        let total: usize = self
            .channels
            .iter()
            .map(|c| 64 + c.data.len())
            .sum::<usize>()
            + 80 * self.headers.len();
        w.write_i32::<LittleEndian>(total as i32)?;
        w.write_i32::<LittleEndian>(self.data_format)?;
        w.write_all(&[0u8; 12])?;
        for c in &self.channels {
            c.encode(w)?;
        }
        let optional_at = w.len();
        for h in &self.headers {
            h.encode(w)?;
        }
        Ok(Some(optional_at))
    }
}

/// Single-channel towed sub-bottom record (3001).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subbottom {
    pub msec_timestamp: i32,
    pub ping_number: i32,
    pub data_format: i32,
    pub channel: TowedChannel,
    pub trace_header: SegyTraceHeader,
}

impl Subbottom {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 32)?;
        let msec_timestamp = buf.read_i32::<LittleEndian>()?;
        let ping_number = buf.read_i32::<LittleEndian>()?;
        let _number_channels = buf.read_i32::<LittleEndian>()?;
        let _total_bytes = buf.read_i32::<LittleEndian>()?;
        let data_format = buf.read_i32::<LittleEndian>()?;
        let mut reserved = [0u8; 12];
        buf.read_exact(&mut reserved)?;
        let channel = TowedChannel::decode(buf)?;
        let trace_header = SegyTraceHeader::decode(buf)?;
        Ok(Subbottom {
            msec_timestamp,
            ping_number,
            data_format,
            channel,
            trace_header,
        })
    }

    pub fn encode(&self, w: &mut Vec<u8>) -> io::Result<Option<usize>> {
        w.write_i32::<LittleEndian>(self.msec_timestamp)?;
        w.write_i32::<LittleEndian>(self.ping_number)?;
        w.write_i32::<LittleEndian>(1)?;
        w.write_i32::<LittleEndian>((64 + self.channel.data.len() + 240) as i32)?;
        w.write_i32::<LittleEndian>(self.data_format)?;
        w.write_all(&[0u8; 12])?;
        self.channel.encode(w)?;
        let optional_at = w.len();
        self.trace_header.encode(w)?;
        Ok(Some(optional_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segy_trace_header_is_240_bytes_and_roundtrips() {
        let header = SegyTraceHeader {
            sequence_number: 42,
            ping_num: 7,
            samples: 3,
            sample_interval_ns: 20_000,
            year: 2006,
            day: 46,
            hour: 13,
            minute: 5,
            second: 9,
            heading: 1800,
            ..Default::default()
        };
        let mut bytes = Vec::new();
        header.encode(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 240);

        let decoded = SegyTraceHeader::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn subbottom_roundtrips_with_samples() {
        let record = Subbottom {
            ping_number: 7,
            channel: TowedChannel {
                bytes_per_sample: 2,
                number_samples: 3,
                sample_interval: 20,
                data: vec![0x10, 0x00, 0xF4, 0x01, 0x9C, 0xFF],
                ..Default::default()
            },
            trace_header: SegyTraceHeader {
                ping_num: 7,
                samples: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut payload = Vec::new();
        let optional_at = record.encode(&mut payload).unwrap();
        assert_eq!(optional_at, Some(32 + 64 + 6));

        let decoded = Subbottom::decode(&mut payload.as_slice()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.channel.samples_i16(), vec![16, 500, -100]);
    }

    #[test]
    fn sidescan_header_clock_is_independent_of_the_frame() {
        let header = SidescanHeader {
            year: 2006,
            day: 46,
            hour: 13,
            minute: 30,
            second: 15,
            milliseconds_today: 48_615_250,
            ..Default::default()
        };
        let t = header.epoch_seconds();
        let back = crate::header::Timestamp::from_epoch_seconds(t);
        assert_eq!(back.year, 2006);
        assert_eq!(back.day, 46);
        assert_eq!(back.hours, 13);
        assert_eq!(back.minutes, 30);
        assert!((back.seconds - 15.25).abs() < 1e-3);
    }
}
