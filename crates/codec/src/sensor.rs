//! Ancillary sensor payloads (1000-series records).
//!
//! These are the navigation, attitude, depth, altitude, and water-column
//! records logged alongside the sonar's own 7000-series data. All angles are
//! radians and all distances meters, straight off the wire.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

use crate::{ensure, CodecError};

/// Position fix (record 1003).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Position {
    /// 0 = WGS84; other datums undefined.
    pub datum: u32,
    /// Sensor latency in seconds.
    pub latency: f32,
    /// Latitude in radians.
    pub latitude: f64,
    /// Longitude in radians.
    pub longitude: f64,
    /// Height relative to the datum in meters.
    pub height: f64,
    /// 0 = geographic, 1 = grid coordinates.
    pub position_type: u8,
    pub utm_zone: u8,
    /// 0 = navigation data, 1 = dead reckoning.
    pub quality: u8,
    pub method: u8,
}

impl Position {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 36)?;
        Ok(Position {
            datum: buf.read_u32::<LittleEndian>()?,
            latency: buf.read_f32::<LittleEndian>()?,
            latitude: buf.read_f64::<LittleEndian>()?,
            longitude: buf.read_f64::<LittleEndian>()?,
            height: buf.read_f64::<LittleEndian>()?,
            position_type: buf.read_u8()?,
            utm_zone: buf.read_u8()?,
            quality: buf.read_u8()?,
            method: buf.read_u8()?,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.datum)?;
        w.write_f32::<LittleEndian>(self.latency)?;
        w.write_f64::<LittleEndian>(self.latitude)?;
        w.write_f64::<LittleEndian>(self.longitude)?;
        w.write_f64::<LittleEndian>(self.height)?;
        w.write_u8(self.position_type)?;
        w.write_u8(self.utm_zone)?;
        w.write_u8(self.quality)?;
        w.write_u8(self.method)?;
        Ok(())
    }
}

/// Altitude above the seafloor (record 1006).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Altitude {
    pub altitude: f32,
}

impl Altitude {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 4)?;
        Ok(Altitude {
            altitude: buf.read_f32::<LittleEndian>()?,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_f32::<LittleEndian>(self.altitude)
    }
}

/// Sensor or water depth (record 1008).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Depth {
    /// 0 = depth to sensor, 1 = water depth.
    pub descriptor: u8,
    /// 0 = raw as measured, 1 = corrected to mean sea level.
    pub correction: u8,
    pub depth: f32,
}

impl Depth {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 8)?;
        let descriptor = buf.read_u8()?;
        let correction = buf.read_u8()?;
        let _reserved = buf.read_u16::<LittleEndian>()?;
        Ok(Depth {
            descriptor,
            correction,
            depth: buf.read_f32::<LittleEndian>()?,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.descriptor)?;
        w.write_u8(self.correction)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_f32::<LittleEndian>(self.depth)?;
        Ok(())
    }
}

/// Sound velocity profile (record 1009). Depth and velocity arrays are
/// stored planar on the wire: all depths, then all velocities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SoundVelocityProfile {
    /// 1 = the latitude/longitude fields are valid.
    pub position_flag: u8,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: Vec<f32>,
    pub sound_velocity: Vec<f32>,
}

impl SoundVelocityProfile {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 24)?;
        let position_flag = buf.read_u8()?;
        let _reserved1 = buf.read_u8()?;
        let _reserved2 = buf.read_u16::<LittleEndian>()?;
        let latitude = buf.read_f64::<LittleEndian>()?;
        let longitude = buf.read_f64::<LittleEndian>()?;
        let n = buf.read_u32::<LittleEndian>()? as usize;
        ensure(buf, n * 8)?;
        let mut depth = Vec::with_capacity(n);
        for _ in 0..n {
            depth.push(buf.read_f32::<LittleEndian>()?);
        }
        let mut sound_velocity = Vec::with_capacity(n);
        for _ in 0..n {
            sound_velocity.push(buf.read_f32::<LittleEndian>()?);
        }
        Ok(SoundVelocityProfile {
            position_flag,
            latitude,
            longitude,
            depth,
            sound_velocity,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.position_flag)?;
        w.write_u8(0)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_f64::<LittleEndian>(self.latitude)?;
        w.write_f64::<LittleEndian>(self.longitude)?;
        w.write_u32::<LittleEndian>(self.depth.len() as u32)?;
        for d in &self.depth {
            w.write_f32::<LittleEndian>(*d)?;
        }
        for v in &self.sound_velocity {
            w.write_f32::<LittleEndian>(*v)?;
        }
        Ok(())
    }
}

/// Conductivity/temperature/depth cast (record 1010). Sample arrays are
/// planar like the SVP record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ctd {
    pub velocity_source_flag: u8,
    pub velocity_algorithm: u8,
    /// 0 = conductivity (S/m), 1 = salinity (ppt).
    pub conductivity_flag: u8,
    /// 0 = pressure (pascals), 1 = depth (meters).
    pub pressure_flag: u8,
    pub position_flag: u8,
    pub latitude: f64,
    pub longitude: f64,
    pub frequency: f32,
    pub conductivity_salinity: Vec<f32>,
    pub temperature: Vec<f32>,
    pub pressure_depth: Vec<f32>,
    pub sound_velocity: Vec<f32>,
}

impl Ctd {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 32)?;
        let velocity_source_flag = buf.read_u8()?;
        let velocity_algorithm = buf.read_u8()?;
        let conductivity_flag = buf.read_u8()?;
        let pressure_flag = buf.read_u8()?;
        let position_flag = buf.read_u8()?;
        let _reserved1 = buf.read_u8()?;
        let _reserved2 = buf.read_u16::<LittleEndian>()?;
        let latitude = buf.read_f64::<LittleEndian>()?;
        let longitude = buf.read_f64::<LittleEndian>()?;
        let frequency = buf.read_f32::<LittleEndian>()?;
        let n = buf.read_u32::<LittleEndian>()? as usize;
        ensure(buf, n * 16)?;
        let mut read_column = || -> io::Result<Vec<f32>> {
            let mut col = Vec::with_capacity(n);
            for _ in 0..n {
                col.push(buf.read_f32::<LittleEndian>()?);
            }
            Ok(col)
        };
        let conductivity_salinity = read_column()?;
        let temperature = read_column()?;
        let pressure_depth = read_column()?;
        let sound_velocity = read_column()?;
        Ok(Ctd {
            velocity_source_flag,
            velocity_algorithm,
            conductivity_flag,
            pressure_flag,
            position_flag,
            latitude,
            longitude,
            frequency,
            conductivity_salinity,
            temperature,
            pressure_depth,
            sound_velocity,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.velocity_source_flag)?;
        w.write_u8(self.velocity_algorithm)?;
        w.write_u8(self.conductivity_flag)?;
        w.write_u8(self.pressure_flag)?;
        w.write_u8(self.position_flag)?;
        w.write_u8(0)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_f64::<LittleEndian>(self.latitude)?;
        w.write_f64::<LittleEndian>(self.longitude)?;
        w.write_f32::<LittleEndian>(self.frequency)?;
        w.write_u32::<LittleEndian>(self.conductivity_salinity.len() as u32)?;
        for col in [
            &self.conductivity_salinity,
            &self.temperature,
            &self.pressure_depth,
            &self.sound_velocity,
        ] {
            for v in col {
                w.write_f32::<LittleEndian>(*v)?;
            }
        }
        Ok(())
    }
}

/// Roll/pitch/heave snapshot (record 1012).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RollPitchHeave {
    pub roll: f32,
    pub pitch: f32,
    pub heave: f32,
}

impl RollPitchHeave {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 12)?;
        Ok(RollPitchHeave {
            roll: buf.read_f32::<LittleEndian>()?,
            pitch: buf.read_f32::<LittleEndian>()?,
            heave: buf.read_f32::<LittleEndian>()?,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_f32::<LittleEndian>(self.roll)?;
        w.write_f32::<LittleEndian>(self.pitch)?;
        w.write_f32::<LittleEndian>(self.heave)?;
        Ok(())
    }
}

/// Heading snapshot (record 1013).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Heading {
    pub heading: f32,
}

impl Heading {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 4)?;
        Ok(Heading {
            heading: buf.read_f32::<LittleEndian>()?,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_f32::<LittleEndian>(self.heading)
    }
}

/// Full navigation solution (record 1015).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Navigation {
    /// 1 = ellipsoid, 2 = geoid, 3 = chart datum.
    pub vertical_reference: u8,
    pub latitude: f64,
    pub longitude: f64,
    pub position_accuracy: f32,
    pub height: f32,
    pub height_accuracy: f32,
    pub speed: f32,
    pub course: f32,
    pub heading: f32,
}

impl Navigation {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 41)?;
        Ok(Navigation {
            vertical_reference: buf.read_u8()?,
            latitude: buf.read_f64::<LittleEndian>()?,
            longitude: buf.read_f64::<LittleEndian>()?,
            position_accuracy: buf.read_f32::<LittleEndian>()?,
            height: buf.read_f32::<LittleEndian>()?,
            height_accuracy: buf.read_f32::<LittleEndian>()?,
            speed: buf.read_f32::<LittleEndian>()?,
            course: buf.read_f32::<LittleEndian>()?,
            heading: buf.read_f32::<LittleEndian>()?,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.vertical_reference)?;
        w.write_f64::<LittleEndian>(self.latitude)?;
        w.write_f64::<LittleEndian>(self.longitude)?;
        w.write_f32::<LittleEndian>(self.position_accuracy)?;
        w.write_f32::<LittleEndian>(self.height)?;
        w.write_f32::<LittleEndian>(self.height_accuracy)?;
        w.write_f32::<LittleEndian>(self.speed)?;
        w.write_f32::<LittleEndian>(self.course)?;
        w.write_f32::<LittleEndian>(self.heading)?;
        Ok(())
    }
}

/// One attitude sample within a record 1016, offset from the record
/// timestamp by `delta_time` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttitudeSample {
    pub delta_time_ms: u16,
    pub roll: f32,
    pub pitch: f32,
    pub heave: f32,
    pub heading: f32,
}

/// Attitude time series (record 1016), interleaved samples on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attitude {
    pub samples: Vec<AttitudeSample>,
}

impl Attitude {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 1)?;
        let n = buf.read_u8()? as usize;
        ensure(buf, n * 18)?;
        let mut samples = Vec::with_capacity(n);
        for _ in 0..n {
            samples.push(AttitudeSample {
                delta_time_ms: buf.read_u16::<LittleEndian>()?,
                roll: buf.read_f32::<LittleEndian>()?,
                pitch: buf.read_f32::<LittleEndian>()?,
                heave: buf.read_f32::<LittleEndian>()?,
                heading: buf.read_f32::<LittleEndian>()?,
            });
        }
        Ok(Attitude { samples })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(self.samples.len() as u8)?;
        for s in &self.samples {
            w.write_u16::<LittleEndian>(s.delta_time_ms)?;
            w.write_f32::<LittleEndian>(s.roll)?;
            w.write_f32::<LittleEndian>(s.pitch)?;
            w.write_f32::<LittleEndian>(s.heave)?;
            w.write_f32::<LittleEndian>(s.heading)?;
        }
        Ok(())
    }
}
