//! Sonar-generated payloads (7000-series): volatile settings, receiver
//! geometry, bathymetry, backscatter, per-beam snippet data, operator event
//! messages, and the file header catalog record.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::header::{RECID_BEAM_DATA, RECID_BATHYMETRY};
use crate::{ensure, CodecError};

fn read_fixed_string(buf: &mut &[u8], n: usize) -> io::Result<String> {
    let mut raw = vec![0u8; n];
    buf.read_exact(&mut raw)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(n);
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn write_fixed_string<W: Write>(w: &mut W, s: &str, n: usize) -> io::Result<()> {
    let bytes = s.as_bytes();
    let take = bytes.len().min(n);
    w.write_all(&bytes[..take])?;
    for _ in take..n {
        w.write_u8(0)?;
    }
    Ok(())
}

/// Volatile sonar settings at the moment of a ping (record 7000, 156-byte
/// fixed payload). The preprocessing passes read `sound_velocity` for ray
/// projection and the beamwidths for sidescan footprints; everything else
/// rides along for rewrite fidelity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SonarSettings {
    pub serial_number: u64,
    pub ping_number: u32,
    pub multi_ping: u16,
    pub frequency: f32,
    pub sample_rate: f32,
    pub receiver_bandwidth: f32,
    pub pulse_width: f32,
    pub pulse_type: u32,
    pub pulse_envelope: u32,
    pub pulse_envelope_par: f32,
    pub pulse_reserved: u32,
    pub max_ping_rate: f32,
    pub ping_period: f32,
    pub range_selection: f32,
    pub power_selection: f32,
    pub gain_selection: f32,
    pub control_flags: u32,
    pub projector_magic_no: u32,
    pub steering_vertical: f32,
    pub steering_horizontal: f32,
    pub beamwidth_vertical: f32,
    pub beamwidth_horizontal: f32,
    pub focal_point: f32,
    pub projector_weighting: u32,
    pub projector_weighting_par: f32,
    pub transmit_flags: u32,
    pub hydrophone_magic_no: u32,
    pub receive_weighting: u32,
    pub receive_weighting_par: f32,
    pub receive_flags: u32,
    pub receive_width: f32,
    pub range_minimum: f32,
    pub range_maximum: f32,
    pub depth_minimum: f32,
    pub depth_maximum: f32,
    pub absorption: f32,
    /// Meters per second; 0 means not measured.
    pub sound_velocity: f32,
    pub spreading: f32,
}

impl SonarSettings {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 156)?;
        let s = SonarSettings {
            serial_number: buf.read_u64::<LittleEndian>()?,
            ping_number: buf.read_u32::<LittleEndian>()?,
            multi_ping: buf.read_u16::<LittleEndian>()?,
            frequency: buf.read_f32::<LittleEndian>()?,
            sample_rate: buf.read_f32::<LittleEndian>()?,
            receiver_bandwidth: buf.read_f32::<LittleEndian>()?,
            pulse_width: buf.read_f32::<LittleEndian>()?,
            pulse_type: buf.read_u32::<LittleEndian>()?,
            pulse_envelope: buf.read_u32::<LittleEndian>()?,
            pulse_envelope_par: buf.read_f32::<LittleEndian>()?,
            pulse_reserved: buf.read_u32::<LittleEndian>()?,
            max_ping_rate: buf.read_f32::<LittleEndian>()?,
            ping_period: buf.read_f32::<LittleEndian>()?,
            range_selection: buf.read_f32::<LittleEndian>()?,
            power_selection: buf.read_f32::<LittleEndian>()?,
            gain_selection: buf.read_f32::<LittleEndian>()?,
            control_flags: buf.read_u32::<LittleEndian>()?,
            projector_magic_no: buf.read_u32::<LittleEndian>()?,
            steering_vertical: buf.read_f32::<LittleEndian>()?,
            steering_horizontal: buf.read_f32::<LittleEndian>()?,
            beamwidth_vertical: buf.read_f32::<LittleEndian>()?,
            beamwidth_horizontal: buf.read_f32::<LittleEndian>()?,
            focal_point: buf.read_f32::<LittleEndian>()?,
            projector_weighting: buf.read_u32::<LittleEndian>()?,
            projector_weighting_par: buf.read_f32::<LittleEndian>()?,
            transmit_flags: buf.read_u32::<LittleEndian>()?,
            hydrophone_magic_no: buf.read_u32::<LittleEndian>()?,
            receive_weighting: buf.read_u32::<LittleEndian>()?,
            receive_weighting_par: buf.read_f32::<LittleEndian>()?,
            receive_flags: buf.read_u32::<LittleEndian>()?,
            receive_width: buf.read_f32::<LittleEndian>()?,
            range_minimum: buf.read_f32::<LittleEndian>()?,
            range_maximum: buf.read_f32::<LittleEndian>()?,
            depth_minimum: buf.read_f32::<LittleEndian>()?,
            depth_maximum: buf.read_f32::<LittleEndian>()?,
            absorption: buf.read_f32::<LittleEndian>()?,
            sound_velocity: buf.read_f32::<LittleEndian>()?,
            spreading: buf.read_f32::<LittleEndian>()?,
        };
        let _reserved = buf.read_u16::<LittleEndian>()?;
        Ok(s)
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.serial_number)?;
        w.write_u32::<LittleEndian>(self.ping_number)?;
        w.write_u16::<LittleEndian>(self.multi_ping)?;
        w.write_f32::<LittleEndian>(self.frequency)?;
        w.write_f32::<LittleEndian>(self.sample_rate)?;
        w.write_f32::<LittleEndian>(self.receiver_bandwidth)?;
        w.write_f32::<LittleEndian>(self.pulse_width)?;
        w.write_u32::<LittleEndian>(self.pulse_type)?;
        w.write_u32::<LittleEndian>(self.pulse_envelope)?;
        w.write_f32::<LittleEndian>(self.pulse_envelope_par)?;
        w.write_u32::<LittleEndian>(self.pulse_reserved)?;
        w.write_f32::<LittleEndian>(self.max_ping_rate)?;
        w.write_f32::<LittleEndian>(self.ping_period)?;
        w.write_f32::<LittleEndian>(self.range_selection)?;
        w.write_f32::<LittleEndian>(self.power_selection)?;
        w.write_f32::<LittleEndian>(self.gain_selection)?;
        w.write_u32::<LittleEndian>(self.control_flags)?;
        w.write_u32::<LittleEndian>(self.projector_magic_no)?;
        w.write_f32::<LittleEndian>(self.steering_vertical)?;
        w.write_f32::<LittleEndian>(self.steering_horizontal)?;
        w.write_f32::<LittleEndian>(self.beamwidth_vertical)?;
        w.write_f32::<LittleEndian>(self.beamwidth_horizontal)?;
        w.write_f32::<LittleEndian>(self.focal_point)?;
        w.write_u32::<LittleEndian>(self.projector_weighting)?;
        w.write_f32::<LittleEndian>(self.projector_weighting_par)?;
        w.write_u32::<LittleEndian>(self.transmit_flags)?;
        w.write_u32::<LittleEndian>(self.hydrophone_magic_no)?;
        w.write_u32::<LittleEndian>(self.receive_weighting)?;
        w.write_f32::<LittleEndian>(self.receive_weighting_par)?;
        w.write_u32::<LittleEndian>(self.receive_flags)?;
        w.write_f32::<LittleEndian>(self.receive_width)?;
        w.write_f32::<LittleEndian>(self.range_minimum)?;
        w.write_f32::<LittleEndian>(self.range_maximum)?;
        w.write_f32::<LittleEndian>(self.depth_minimum)?;
        w.write_f32::<LittleEndian>(self.depth_maximum)?;
        w.write_f32::<LittleEndian>(self.absorption)?;
        w.write_f32::<LittleEndian>(self.sound_velocity)?;
        w.write_f32::<LittleEndian>(self.spreading)?;
        w.write_u16::<LittleEndian>(0)?;
        Ok(())
    }
}

/// Receiver beam geometry (record 7004): per-beam steering angles and
/// beamwidths in radians, stored as planar arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeamGeometry {
    pub serial_number: u64,
    pub angle_alongtrack: Vec<f32>,
    pub angle_acrosstrack: Vec<f32>,
    pub beamwidth_alongtrack: Vec<f32>,
    pub beamwidth_acrosstrack: Vec<f32>,
}

impl BeamGeometry {
    pub fn number_beams(&self) -> usize {
        self.angle_acrosstrack.len()
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 12)?;
        let serial_number = buf.read_u64::<LittleEndian>()?;
        let n = buf.read_u32::<LittleEndian>()? as usize;
        ensure(buf, n.saturating_mul(16))?;
        let mut read_column = |buf: &mut &[u8]| -> io::Result<Vec<f32>> {
            let mut v = Vec::with_capacity(n);
            for _ in 0..n {
                v.push(buf.read_f32::<LittleEndian>()?);
            }
            Ok(v)
        };
        Ok(BeamGeometry {
            serial_number,
            angle_alongtrack: read_column(buf)?,
            angle_acrosstrack: read_column(buf)?,
            beamwidth_alongtrack: read_column(buf)?,
            beamwidth_acrosstrack: read_column(buf)?,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.serial_number)?;
        w.write_u32::<LittleEndian>(self.number_beams() as u32)?;
        for col in [
            &self.angle_alongtrack,
            &self.angle_acrosstrack,
            &self.beamwidth_alongtrack,
            &self.beamwidth_acrosstrack,
        ] {
            for v in col {
                w.write_f32::<LittleEndian>(*v)?;
            }
        }
        Ok(())
    }
}

/// Computed soundings carried in the optional-data section of a 7006
/// record, produced by the preprocessing passes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BathymetryProcessed {
    pub frequency: f32,
    /// Radians, positive north.
    pub latitude: f64,
    /// Radians, positive east.
    pub longitude: f64,
    /// Radians.
    pub heading: f32,
    pub height_source: u8,
    pub tide: f32,
    pub roll: f32,
    pub pitch: f32,
    pub heave: f32,
    pub vehicle_height: f32,
    pub depth: Vec<f32>,
    pub alongtrack: Vec<f32>,
    pub acrosstrack: Vec<f32>,
    pub pointing_angle: Vec<f32>,
    pub azimuth_angle: Vec<f32>,
}

/// Bathymetric ping record (7006). Payload version 5 added the layer
/// compensation flag and a per-ping sound velocity; earlier versions stop
/// after the beam count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bathymetry {
    pub serial_number: u64,
    pub ping_number: u32,
    pub multi_ping: u16,
    pub layer_comp_flag: u8,
    pub sound_vel_flag: u8,
    /// Meters per second; meaningful only when the record version carries it.
    pub sound_velocity: f32,
    /// Two-way travel time per beam, seconds.
    pub range: Vec<f32>,
    /// Per-beam quality byte (detection validity low nibble, flags high).
    pub quality: Vec<u8>,
    pub intensity: Vec<f32>,
    /// Present when the record has been through the geometry pass.
    pub processed: Option<BathymetryProcessed>,
}

impl Bathymetry {
    pub fn number_beams(&self) -> usize {
        self.range.len()
    }

    /// `has_optional` comes from the frame header's optional-data offset;
    /// leftover payload bytes alone do not imply a processed block, since
    /// records may carry trailing padding.
    pub fn decode(buf: &mut &[u8], version: u16, has_optional: bool) -> Result<Self, CodecError> {
        ensure(buf, 18)?;
        let serial_number = buf.read_u64::<LittleEndian>()?;
        let ping_number = buf.read_u32::<LittleEndian>()?;
        let multi_ping = buf.read_u16::<LittleEndian>()?;
        let n = buf.read_u32::<LittleEndian>()? as usize;
        let (layer_comp_flag, sound_vel_flag, sound_velocity) = if version >= 5 {
            ensure(buf, 6)?;
            (
                buf.read_u8()?,
                buf.read_u8()?,
                buf.read_f32::<LittleEndian>()?,
            )
        } else {
            (0, 0, 0.0)
        };
        ensure(buf, n.saturating_mul(9))?;
        let mut range = Vec::with_capacity(n);
        for _ in 0..n {
            range.push(buf.read_f32::<LittleEndian>()?);
        }
        let mut quality = vec![0u8; n];
        buf.read_exact(&mut quality)?;
        let mut intensity = Vec::with_capacity(n);
        for _ in 0..n {
            intensity.push(buf.read_f32::<LittleEndian>()?);
        }

        let processed = if has_optional {
            ensure(buf, 37 + n.saturating_mul(20))?;
            let frequency = buf.read_f32::<LittleEndian>()?;
            let latitude = buf.read_f64::<LittleEndian>()?;
            let longitude = buf.read_f64::<LittleEndian>()?;
            let heading = buf.read_f32::<LittleEndian>()?;
            let height_source = buf.read_u8()?;
            let tide = buf.read_f32::<LittleEndian>()?;
            let roll = buf.read_f32::<LittleEndian>()?;
            let pitch = buf.read_f32::<LittleEndian>()?;
            let heave = buf.read_f32::<LittleEndian>()?;
            let vehicle_height = buf.read_f32::<LittleEndian>()?;
            let mut p = BathymetryProcessed {
                frequency,
                latitude,
                longitude,
                heading,
                height_source,
                tide,
                roll,
                pitch,
                heave,
                vehicle_height,
                ..Default::default()
            };
            for _ in 0..n {
                p.depth.push(buf.read_f32::<LittleEndian>()?);
                p.alongtrack.push(buf.read_f32::<LittleEndian>()?);
                p.acrosstrack.push(buf.read_f32::<LittleEndian>()?);
                p.pointing_angle.push(buf.read_f32::<LittleEndian>()?);
                p.azimuth_angle.push(buf.read_f32::<LittleEndian>()?);
            }
            Some(p)
        } else {
            None
        };

        Ok(Bathymetry {
            serial_number,
            ping_number,
            multi_ping,
            layer_comp_flag,
            sound_vel_flag,
            sound_velocity,
            range,
            quality,
            intensity,
            processed,
        })
    }

    /// Returns the offset of the processed block relative to the start of
    /// the payload, when present.
    pub fn encode(&self, w: &mut Vec<u8>, version: u16) -> Result<Option<usize>, CodecError> {
        let n = self.number_beams();
        if self.quality.len() != n || self.intensity.len() != n {
            return Err(CodecError::InconsistentArrays {
                record_type: RECID_BATHYMETRY,
            });
        }
        w.write_u64::<LittleEndian>(self.serial_number)?;
        w.write_u32::<LittleEndian>(self.ping_number)?;
        w.write_u16::<LittleEndian>(self.multi_ping)?;
        w.write_u32::<LittleEndian>(n as u32)?;
        if version >= 5 {
            w.write_u8(self.layer_comp_flag)?;
            w.write_u8(self.sound_vel_flag)?;
            w.write_f32::<LittleEndian>(self.sound_velocity)?;
        }
        for v in &self.range {
            w.write_f32::<LittleEndian>(*v)?;
        }
        w.write_all(&self.quality)?;
        for v in &self.intensity {
            w.write_f32::<LittleEndian>(*v)?;
        }
        let optional_at = match &self.processed {
            Some(p) => {
                if p.depth.len() != n {
                    return Err(CodecError::InconsistentArrays {
                        record_type: RECID_BATHYMETRY,
                    });
                }
                let at = w.len();
                w.write_f32::<LittleEndian>(p.frequency)?;
                w.write_f64::<LittleEndian>(p.latitude)?;
                w.write_f64::<LittleEndian>(p.longitude)?;
                w.write_f32::<LittleEndian>(p.heading)?;
                w.write_u8(p.height_source)?;
                w.write_f32::<LittleEndian>(p.tide)?;
                w.write_f32::<LittleEndian>(p.roll)?;
                w.write_f32::<LittleEndian>(p.pitch)?;
                w.write_f32::<LittleEndian>(p.heave)?;
                w.write_f32::<LittleEndian>(p.vehicle_height)?;
                for i in 0..n {
                    w.write_f32::<LittleEndian>(p.depth[i])?;
                    w.write_f32::<LittleEndian>(p.alongtrack[i])?;
                    w.write_f32::<LittleEndian>(p.acrosstrack[i])?;
                    w.write_f32::<LittleEndian>(p.pointing_angle[i])?;
                    w.write_f32::<LittleEndian>(p.azimuth_angle[i])?;
                }
                Some(at)
            }
            None => None,
        };
        Ok(optional_at)
    }
}

/// Port/starboard time-series backscatter (record 7007). Sample bytes stay
/// raw; `sample_size` gives the per-sample width.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Backscatter {
    pub serial_number: u64,
    pub ping_number: u32,
    pub multi_ping: u16,
    pub beam_position: f32,
    pub control_flags: u32,
    pub number_samples: u32,
    pub port_beamwidth_x: f32,
    pub port_beamwidth_y: f32,
    pub stbd_beamwidth_x: f32,
    pub stbd_beamwidth_y: f32,
    pub port_steering_x: f32,
    pub port_steering_y: f32,
    pub stbd_steering_x: f32,
    pub stbd_steering_y: f32,
    pub number_beams: u16,
    pub current_beam: u16,
    pub sample_size: u8,
    pub data_type: u8,
    pub port_data: Vec<u8>,
    pub stbd_data: Vec<u8>,
}

impl Backscatter {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 64)?;
        let serial_number = buf.read_u64::<LittleEndian>()?;
        let ping_number = buf.read_u32::<LittleEndian>()?;
        let multi_ping = buf.read_u16::<LittleEndian>()?;
        let beam_position = buf.read_f32::<LittleEndian>()?;
        let control_flags = buf.read_u32::<LittleEndian>()?;
        let number_samples = buf.read_u32::<LittleEndian>()?;
        let port_beamwidth_x = buf.read_f32::<LittleEndian>()?;
        let port_beamwidth_y = buf.read_f32::<LittleEndian>()?;
        let stbd_beamwidth_x = buf.read_f32::<LittleEndian>()?;
        let stbd_beamwidth_y = buf.read_f32::<LittleEndian>()?;
        let port_steering_x = buf.read_f32::<LittleEndian>()?;
        let port_steering_y = buf.read_f32::<LittleEndian>()?;
        let stbd_steering_x = buf.read_f32::<LittleEndian>()?;
        let stbd_steering_y = buf.read_f32::<LittleEndian>()?;
        let number_beams = buf.read_u16::<LittleEndian>()?;
        let current_beam = buf.read_u16::<LittleEndian>()?;
        let sample_size = buf.read_u8()?;
        let data_type = buf.read_u8()?;
        let nbytes = number_samples as usize * sample_size.max(1) as usize;
        ensure(buf, nbytes.saturating_mul(2))?;
        let mut port_data = vec![0u8; nbytes];
        buf.read_exact(&mut port_data)?;
        let mut stbd_data = vec![0u8; nbytes];
        buf.read_exact(&mut stbd_data)?;
        Ok(Backscatter {
            serial_number,
            ping_number,
            multi_ping,
            beam_position,
            control_flags,
            number_samples,
            port_beamwidth_x,
            port_beamwidth_y,
            stbd_beamwidth_x,
            stbd_beamwidth_y,
            port_steering_x,
            port_steering_y,
            stbd_steering_x,
            stbd_steering_y,
            number_beams,
            current_beam,
            sample_size,
            data_type,
            port_data,
            stbd_data,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.serial_number)?;
        w.write_u32::<LittleEndian>(self.ping_number)?;
        w.write_u16::<LittleEndian>(self.multi_ping)?;
        w.write_f32::<LittleEndian>(self.beam_position)?;
        w.write_u32::<LittleEndian>(self.control_flags)?;
        w.write_u32::<LittleEndian>(self.number_samples)?;
        w.write_f32::<LittleEndian>(self.port_beamwidth_x)?;
        w.write_f32::<LittleEndian>(self.port_beamwidth_y)?;
        w.write_f32::<LittleEndian>(self.stbd_beamwidth_x)?;
        w.write_f32::<LittleEndian>(self.stbd_beamwidth_y)?;
        w.write_f32::<LittleEndian>(self.port_steering_x)?;
        w.write_f32::<LittleEndian>(self.port_steering_y)?;
        w.write_f32::<LittleEndian>(self.stbd_steering_x)?;
        w.write_f32::<LittleEndian>(self.stbd_steering_y)?;
        w.write_u16::<LittleEndian>(self.number_beams)?;
        w.write_u16::<LittleEndian>(self.current_beam)?;
        w.write_u8(self.sample_size)?;
        w.write_u8(self.data_type)?;
        w.write_all(&self.port_data)?;
        w.write_all(&self.stbd_data)?;
        Ok(())
    }
}

/// One beam's amplitude (and optional phase) snippet from a 7008 record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snippet {
    pub beam_number: u16,
    /// Sample index of the first snippet sample within the full trace.
    pub begin_sample: u32,
    pub end_sample: u32,
    pub amplitude: Vec<u16>,
    pub phase: Vec<i16>,
}

impl Snippet {
    pub fn len(&self) -> usize {
        self.amplitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitude.is_empty()
    }
}

/// Per-beam snippet record (7008): a window of raw amplitude samples around
/// the bottom detection of each beam. `sample_type` packs the per-sample
/// widths: bits 0-3 amplitude bytes, bits 4-7 phase bytes (0 = absent).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeamData {
    pub serial_number: u64,
    pub ping_number: u32,
    pub multi_ping: u16,
    pub sample_type: u32,
    pub snippets: Vec<Snippet>,
}

impl BeamData {
    pub fn number_beams(&self) -> usize {
        self.snippets.len()
    }

    fn sample_widths(sample_type: u32) -> Result<(usize, usize), CodecError> {
        let amp = (sample_type & 0x0F) as usize;
        let phase = ((sample_type >> 4) & 0x0F) as usize;
        if !matches!(amp, 1 | 2) || phase > 2 {
            return Err(CodecError::UnsupportedSampleType {
                record_type: RECID_BEAM_DATA,
                sample_type,
            });
        }
        Ok((amp, phase))
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 20)?;
        let serial_number = buf.read_u64::<LittleEndian>()?;
        let ping_number = buf.read_u32::<LittleEndian>()?;
        let multi_ping = buf.read_u16::<LittleEndian>()?;
        let number_beams = buf.read_u16::<LittleEndian>()? as usize;
        let sample_type = buf.read_u32::<LittleEndian>()?;
        let (amp_width, phase_width) = Self::sample_widths(sample_type)?;

        ensure(buf, number_beams.saturating_mul(10))?;
        let mut snippets = Vec::with_capacity(number_beams);
        for _ in 0..number_beams {
            snippets.push(Snippet {
                beam_number: buf.read_u16::<LittleEndian>()?,
                begin_sample: buf.read_u32::<LittleEndian>()?,
                end_sample: buf.read_u32::<LittleEndian>()?,
                ..Default::default()
            });
        }
        for s in snippets.iter_mut() {
            let n = (s.end_sample.saturating_sub(s.begin_sample) + 1) as usize;
            ensure(buf, n.saturating_mul(amp_width + phase_width))?;
            s.amplitude.reserve(n);
            for _ in 0..n {
                let a = match amp_width {
                    1 => buf.read_u8()? as u16,
                    _ => buf.read_u16::<LittleEndian>()?,
                };
                s.amplitude.push(a);
            }
            if phase_width > 0 {
                s.phase.reserve(n);
                for _ in 0..n {
                    let p = match phase_width {
                        1 => buf.read_i8()? as i16,
                        _ => buf.read_i16::<LittleEndian>()?,
                    };
                    s.phase.push(p);
                }
            }
        }
        Ok(BeamData {
            serial_number,
            ping_number,
            multi_ping,
            sample_type,
            snippets,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        let (amp_width, phase_width) = Self::sample_widths(self.sample_type)?;
        w.write_u64::<LittleEndian>(self.serial_number)?;
        w.write_u32::<LittleEndian>(self.ping_number)?;
        w.write_u16::<LittleEndian>(self.multi_ping)?;
        w.write_u16::<LittleEndian>(self.snippets.len() as u16)?;
        w.write_u32::<LittleEndian>(self.sample_type)?;
        for s in &self.snippets {
            w.write_u16::<LittleEndian>(s.beam_number)?;
            w.write_u32::<LittleEndian>(s.begin_sample)?;
            w.write_u32::<LittleEndian>(s.end_sample)?;
        }
        for s in &self.snippets {
            for &a in &s.amplitude {
                match amp_width {
                    1 => w.write_u8(a.min(u8::MAX as u16) as u8)?,
                    _ => w.write_u16::<LittleEndian>(a)?,
                }
            }
            for &p in &s.phase {
                match phase_width {
                    0 => {}
                    1 => w.write_i8(p.clamp(i8::MIN as i16, i8::MAX as i16) as i8)?,
                    _ => w.write_i16::<LittleEndian>(p)?,
                }
            }
        }
        Ok(())
    }
}

/// Free-form operator event message (record 7051).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventMessage {
    pub serial_number: u64,
    pub event_id: u16,
    pub event_identifier: u16,
    pub message: String,
}

impl EventMessage {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 14)?;
        let serial_number = buf.read_u64::<LittleEndian>()?;
        let event_id = buf.read_u16::<LittleEndian>()?;
        let message_length = buf.read_u16::<LittleEndian>()? as usize;
        let event_identifier = buf.read_u16::<LittleEndian>()?;
        ensure(buf, message_length)?;
        let message = read_fixed_string(buf, message_length)?;
        Ok(EventMessage {
            serial_number,
            event_id,
            event_identifier,
            message,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.serial_number)?;
        w.write_u16::<LittleEndian>(self.event_id)?;
        w.write_u16::<LittleEndian>(self.message.len() as u16)?;
        w.write_u16::<LittleEndian>(self.event_identifier)?;
        w.write_all(self.message.as_bytes())?;
        Ok(())
    }
}

/// Device registered in the file header catalog.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileHeaderDevice {
    pub device_identifier: u32,
    pub system_enumerator: u16,
}

/// File header record (7200), always the first record of a telemetry file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileHeader {
    pub file_identifier: [u8; 16],
    pub version: u16,
    pub session_identifier: [u8; 16],
    pub record_data_size: u32,
    pub recording_name: String,
    pub recording_version: String,
    pub user_defined_name: String,
    pub notes: String,
    pub devices: Vec<FileHeaderDevice>,
}

impl FileHeader {
    pub fn decode(buf: &mut &[u8]) -> Result<Self, CodecError> {
        ensure(buf, 44 + 64 + 16 + 64 + 128)?;
        let mut file_identifier = [0u8; 16];
        buf.read_exact(&mut file_identifier)?;
        let version = buf.read_u16::<LittleEndian>()?;
        let _reserved = buf.read_u16::<LittleEndian>()?;
        let mut session_identifier = [0u8; 16];
        buf.read_exact(&mut session_identifier)?;
        let record_data_size = buf.read_u32::<LittleEndian>()?;
        let number_devices = buf.read_u32::<LittleEndian>()? as usize;
        let recording_name = read_fixed_string(buf, 64)?;
        let recording_version = read_fixed_string(buf, 16)?;
        let user_defined_name = read_fixed_string(buf, 64)?;
        let notes = read_fixed_string(buf, 128)?;
        ensure(buf, number_devices.saturating_mul(6))?;
        let mut devices = Vec::with_capacity(number_devices);
        for _ in 0..number_devices {
            devices.push(FileHeaderDevice {
                device_identifier: buf.read_u32::<LittleEndian>()?,
                system_enumerator: buf.read_u16::<LittleEndian>()?,
            });
        }
        Ok(FileHeader {
            file_identifier,
            version,
            session_identifier,
            record_data_size,
            recording_name,
            recording_version,
            user_defined_name,
            notes,
            devices,
        })
    }

    pub fn encode<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.file_identifier)?;
        w.write_u16::<LittleEndian>(self.version)?;
        w.write_u16::<LittleEndian>(0)?;
        w.write_all(&self.session_identifier)?;
        w.write_u32::<LittleEndian>(self.record_data_size)?;
        w.write_u32::<LittleEndian>(self.devices.len() as u32)?;
        write_fixed_string(w, &self.recording_name, 64)?;
        write_fixed_string(w, &self.recording_version, 16)?;
        write_fixed_string(w, &self.user_defined_name, 64)?;
        write_fixed_string(w, &self.notes, 128)?;
        for d in &self.devices {
            w.write_u32::<LittleEndian>(d.device_identifier)?;
            w.write_u16::<LittleEndian>(d.system_enumerator)?;
        }
        Ok(())
    }
}
