//! Underwater-vehicle telemetry frames (record 3100).
//!
//! A single 3100 record carries a batch of fixed 128-byte frames, all of
//! the same kind: navigation frames (position, depth, attitude with their
//! own sensor clocks) or environmental frames (CTD readings). The vehicle's
//! navigation clock is the reference the timestamp reconciliation pass
//! trusts, so these records matter even when only bathymetry is wanted.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::header::Timestamp;
use crate::{ensure, CodecError};

/// Frame kind discriminator carried in the record body.
pub const VEHICLE_DATA_NAV: i32 = 0;
pub const VEHICLE_DATA_ENVIRONMENTAL: i32 = 1;

fn decode_frame_prefix(buf: &mut &[u8]) -> Result<(i32, u16, u16, i32, i32, Timestamp, u32), CodecError> {
    let packet_size = buf.read_i32::<LittleEndian>()?;
    let version = buf.read_u16::<LittleEndian>()?;
    let offset = buf.read_u16::<LittleEndian>()?;
    let data_type = buf.read_i32::<LittleEndian>()?;
    let data_size = buf.read_i32::<LittleEndian>()?;
    let time = Timestamp {
        year: buf.read_u16::<LittleEndian>()?,
        day: buf.read_u16::<LittleEndian>()?,
        seconds: buf.read_f32::<LittleEndian>()?,
        hours: buf.read_u8()?,
        minutes: buf.read_u8()?,
    };
    let checksum = buf.read_u32::<LittleEndian>()?;
    Ok((packet_size, version, offset, data_type, data_size, time, checksum))
}

fn encode_frame_prefix<W: Write>(
    w: &mut W,
    packet_size: i32,
    version: u16,
    offset: u16,
    data_type: i32,
    data_size: i32,
    time: &Timestamp,
    checksum: u32,
) -> io::Result<()> {
    w.write_i32::<LittleEndian>(packet_size)?;
    w.write_u16::<LittleEndian>(version)?;
    w.write_u16::<LittleEndian>(offset)?;
    w.write_i32::<LittleEndian>(data_type)?;
    w.write_i32::<LittleEndian>(data_size)?;
    w.write_u16::<LittleEndian>(time.year)?;
    w.write_u16::<LittleEndian>(time.day)?;
    w.write_f32::<LittleEndian>(time.seconds)?;
    w.write_u8(time.hours)?;
    w.write_u8(time.minutes)?;
    w.write_u32::<LittleEndian>(checksum)?;
    Ok(())
}

/// Vehicle navigation frame (128 bytes on the wire).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VehicleNav {
    pub packet_size: i32,
    pub version: u16,
    pub offset: u16,
    pub data_type: i32,
    pub data_size: i32,
    pub time: Timestamp,
    pub checksum: u32,
    /// Known latency of this frame relative to the sensor clock, in
    /// milliseconds (negative means the frame lags).
    pub timedelay_ms: i16,
    pub quality: u32,
    /// Radians, positive north.
    pub latitude: f64,
    /// Radians, positive east.
    pub longitude: f64,
    /// Meters per second.
    pub speed: f32,
    pub depth: f64,
    pub altitude: f64,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub northing_rate: f32,
    pub easting_rate: f32,
    pub depth_rate: f32,
    pub altitude_rate: f32,
    pub roll_rate: f32,
    pub pitch_rate: f32,
    pub yaw_rate: f32,
    /// Sensor clock of the position fix, seconds since the Unix epoch.
    pub position_time: f64,
    /// Sensor clock of the depth reading, seconds since the Unix epoch.
    pub depth_time: f64,
}

impl VehicleNav {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 128)?;
        let (packet_size, version, offset, data_type, data_size, time, checksum) =
            decode_frame_prefix(buf)?;
        Ok(VehicleNav {
            packet_size,
            version,
            offset,
            data_type,
            data_size,
            time,
            checksum,
            timedelay_ms: buf.read_i16::<LittleEndian>()?,
            quality: buf.read_u32::<LittleEndian>()?,
            latitude: buf.read_f64::<LittleEndian>()?,
            longitude: buf.read_f64::<LittleEndian>()?,
            speed: buf.read_f32::<LittleEndian>()?,
            depth: buf.read_f64::<LittleEndian>()?,
            altitude: buf.read_f64::<LittleEndian>()?,
            roll: buf.read_f32::<LittleEndian>()?,
            pitch: buf.read_f32::<LittleEndian>()?,
            yaw: buf.read_f32::<LittleEndian>()?,
            northing_rate: buf.read_f32::<LittleEndian>()?,
            easting_rate: buf.read_f32::<LittleEndian>()?,
            depth_rate: buf.read_f32::<LittleEndian>()?,
            altitude_rate: buf.read_f32::<LittleEndian>()?,
            roll_rate: buf.read_f32::<LittleEndian>()?,
            pitch_rate: buf.read_f32::<LittleEndian>()?,
            yaw_rate: buf.read_f32::<LittleEndian>()?,
            position_time: buf.read_f64::<LittleEndian>()?,
            depth_time: buf.read_f64::<LittleEndian>()?,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        encode_frame_prefix(
            w,
            self.packet_size,
            self.version,
            self.offset,
            self.data_type,
            self.data_size,
            &self.time,
            self.checksum,
        )?;
        w.write_i16::<LittleEndian>(self.timedelay_ms)?;
        w.write_u32::<LittleEndian>(self.quality)?;
        w.write_f64::<LittleEndian>(self.latitude)?;
        w.write_f64::<LittleEndian>(self.longitude)?;
        w.write_f32::<LittleEndian>(self.speed)?;
        w.write_f64::<LittleEndian>(self.depth)?;
        w.write_f64::<LittleEndian>(self.altitude)?;
        w.write_f32::<LittleEndian>(self.roll)?;
        w.write_f32::<LittleEndian>(self.pitch)?;
        w.write_f32::<LittleEndian>(self.yaw)?;
        w.write_f32::<LittleEndian>(self.northing_rate)?;
        w.write_f32::<LittleEndian>(self.easting_rate)?;
        w.write_f32::<LittleEndian>(self.depth_rate)?;
        w.write_f32::<LittleEndian>(self.altitude_rate)?;
        w.write_f32::<LittleEndian>(self.roll_rate)?;
        w.write_f32::<LittleEndian>(self.pitch_rate)?;
        w.write_f32::<LittleEndian>(self.yaw_rate)?;
        w.write_f64::<LittleEndian>(self.position_time)?;
        w.write_f64::<LittleEndian>(self.depth_time)?;
        Ok(())
    }
}

/// Vehicle environmental (CTD) frame (128 bytes on the wire).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VehicleEnvironment {
    pub packet_size: i32,
    pub version: u16,
    pub offset: u16,
    pub data_type: i32,
    pub data_size: i32,
    pub time: Timestamp,
    pub checksum: u32,
    pub quality: u32,
    /// Meters per second.
    pub sound_speed: f32,
    pub conductivity: f32,
    pub temperature: f32,
    pub pressure: f32,
    pub salinity: f32,
    pub ctd_time: f64,
    pub temperature_time: f64,
    pub surface_pressure: f64,
    pub temperature_counts: i32,
    pub conductivity_frequency: f32,
    pub pressure_counts: i32,
    pub pressure_comp_voltage: f32,
    pub sensor_time_sec: i32,
    pub sensor_time_nsec: i32,
    pub sensors: [u16; 8],
}

impl VehicleEnvironment {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 128)?;
        let (packet_size, version, offset, data_type, data_size, time, checksum) =
            decode_frame_prefix(buf)?;
        let _reserved1 = buf.read_i16::<LittleEndian>()?;
        let quality = buf.read_u32::<LittleEndian>()?;
        let sound_speed = buf.read_f32::<LittleEndian>()?;
        let conductivity = buf.read_f32::<LittleEndian>()?;
        let temperature = buf.read_f32::<LittleEndian>()?;
        let pressure = buf.read_f32::<LittleEndian>()?;
        let salinity = buf.read_f32::<LittleEndian>()?;
        let ctd_time = buf.read_f64::<LittleEndian>()?;
        let temperature_time = buf.read_f64::<LittleEndian>()?;
        let surface_pressure = buf.read_f64::<LittleEndian>()?;
        let temperature_counts = buf.read_i32::<LittleEndian>()?;
        let conductivity_frequency = buf.read_f32::<LittleEndian>()?;
        let pressure_counts = buf.read_i32::<LittleEndian>()?;
        let pressure_comp_voltage = buf.read_f32::<LittleEndian>()?;
        let sensor_time_sec = buf.read_i32::<LittleEndian>()?;
        let sensor_time_nsec = buf.read_i32::<LittleEndian>()?;
        let mut sensors = [0u16; 8];
        for s in sensors.iter_mut() {
            *s = buf.read_u16::<LittleEndian>()?;
        }
        let mut reserved2 = [0u8; 8];
        buf.read_exact(&mut reserved2)?;
        Ok(VehicleEnvironment {
            packet_size,
            version,
            offset,
            data_type,
            data_size,
            time,
            checksum,
            quality,
            sound_speed,
            conductivity,
            temperature,
            pressure,
            salinity,
            ctd_time,
            temperature_time,
            surface_pressure,
            temperature_counts,
            conductivity_frequency,
            pressure_counts,
            pressure_comp_voltage,
            sensor_time_sec,
            sensor_time_nsec,
            sensors,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        encode_frame_prefix(
            w,
            self.packet_size,
            self.version,
            self.offset,
            self.data_type,
            self.data_size,
            &self.time,
            self.checksum,
        )?;
        w.write_i16::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(self.quality)?;
        w.write_f32::<LittleEndian>(self.sound_speed)?;
        w.write_f32::<LittleEndian>(self.conductivity)?;
        w.write_f32::<LittleEndian>(self.temperature)?;
        w.write_f32::<LittleEndian>(self.pressure)?;
        w.write_f32::<LittleEndian>(self.salinity)?;
        w.write_f64::<LittleEndian>(self.ctd_time)?;
        w.write_f64::<LittleEndian>(self.temperature_time)?;
        w.write_f64::<LittleEndian>(self.surface_pressure)?;
        w.write_i32::<LittleEndian>(self.temperature_counts)?;
        w.write_f32::<LittleEndian>(self.conductivity_frequency)?;
        w.write_i32::<LittleEndian>(self.pressure_counts)?;
        w.write_f32::<LittleEndian>(self.pressure_comp_voltage)?;
        w.write_i32::<LittleEndian>(self.sensor_time_sec)?;
        w.write_i32::<LittleEndian>(self.sensor_time_nsec)?;
        for s in &self.sensors {
            w.write_u16::<LittleEndian>(*s)?;
        }
        w.write_all(&[0u8; 8])?;
        Ok(())
    }
}

/// Frame batch carried by a single 3100 record. All frames in one record
/// share a kind.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleFrameData {
    Nav(Vec<VehicleNav>),
    Environmental(Vec<VehicleEnvironment>),
}

impl Default for VehicleFrameData {
    fn default() -> Self {
        VehicleFrameData::Nav(Vec::new())
    }
}

/// Vehicle telemetry record (3100).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VehicleFrames {
    pub msec_timestamp: i32,
    pub frames: VehicleFrameData,
}

impl VehicleFrames {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 32)?;
        let msec_timestamp = buf.read_i32::<LittleEndian>()?;
        let number_frames = buf.read_i32::<LittleEndian>()?;
        let _frame_size = buf.read_i32::<LittleEndian>()?;
        let data_format = buf.read_i32::<LittleEndian>()?;
        let mut reserved = [0u8; 16];
        buf.read_exact(&mut reserved)?;

        let n = number_frames.max(0) as usize;
        let frames = match data_format {
            VEHICLE_DATA_ENVIRONMENTAL => {
                let mut v = Vec::with_capacity(n.min(1024));
                for _ in 0..n {
                    v.push(VehicleEnvironment::decode(buf)?);
                }
                VehicleFrameData::Environmental(v)
            }
            _ => {
                let mut v = Vec::with_capacity(n.min(1024));
                for _ in 0..n {
                    v.push(VehicleNav::decode(buf)?);
                }
                VehicleFrameData::Nav(v)
            }
        };
        Ok(VehicleFrames {
            msec_timestamp,
            frames,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let (n, data_format) = match &self.frames {
            VehicleFrameData::Nav(v) => (v.len(), VEHICLE_DATA_NAV),
            VehicleFrameData::Environmental(v) => (v.len(), VEHICLE_DATA_ENVIRONMENTAL),
        };
        w.write_i32::<LittleEndian>(self.msec_timestamp)?;
        w.write_i32::<LittleEndian>(n as i32)?;
        w.write_i32::<LittleEndian>(128)?;
        w.write_i32::<LittleEndian>(data_format)?;
        w.write_all(&[0u8; 16])?;
        match &self.frames {
            VehicleFrameData::Nav(v) => {
                for f in v {
                    f.encode(w)?;
                }
            }
            VehicleFrameData::Environmental(v) => {
                for f in v {
                    f.encode(w)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nav_frame_is_128_bytes() {
        let f = VehicleNav::default();
        let mut buf = Vec::new();
        f.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 128);
    }

    #[test]
    fn env_frame_is_128_bytes() {
        let f = VehicleEnvironment::default();
        let mut buf = Vec::new();
        f.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), 128);
    }

    #[test]
    fn frame_batch_roundtrip() {
        let rec = VehicleFrames {
            msec_timestamp: 123456,
            frames: VehicleFrameData::Nav(vec![
                VehicleNav {
                    latitude: 0.6,
                    longitude: -2.1,
                    depth: 812.5,
                    altitude: 23.0,
                    position_time: 1.1234e9,
                    depth_time: 1.1234e9,
                    ..Default::default()
                },
                VehicleNav {
                    speed: 1.4,
                    yaw: 0.3,
                    ..Default::default()
                },
            ]),
        };
        let mut buf = Vec::new();
        rec.encode(&mut buf).unwrap();
        let back = VehicleFrames::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(back, rec);
    }
}
