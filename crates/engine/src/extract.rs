//! Flat extraction API over resolved pings and records.
//!
//! Downstream consumers want plain swath arrays rather than wire structs:
//! one sounding row per ping, detection classes, gain settings, water-column
//! profiles, and the sub-bottom channel as a standard seismic trace. Each
//! `extract_*` here has an `insert_*` inverse that rebuilds the record form.

use codec::fsdw::{SegyTraceHeader, Subbottom, TowedChannel};
use codec::sensor::SoundVelocityProfile;
use codec::sonar::{Bathymetry, SonarSettings};
use ping::{detect_class, BeamClass, DetectClass, ResolvedPing};
use sidescan::SidescanRow;

/// One sounding of a flattened swath.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwathBeam {
    pub class: BeamClass,
    pub depth: f64,
    pub acrosstrack: f64,
    pub alongtrack: f64,
}

/// Analysis-ready view of one ping: platform state plus flat sounding and
/// pixel arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Swath {
    pub time_d: f64,
    /// Radians, positive east.
    pub longitude: f64,
    /// Radians, positive north.
    pub latitude: f64,
    /// Radians.
    pub heading: f64,
    pub speed: f64,
    pub sonar_depth: f64,
    pub altitude: f64,
    pub beams: Vec<SwathBeam>,
    /// Reconstructed sidescan pixels, when a row was built for this ping.
    pub pixels: Vec<Option<f32>>,
}

/// Flattens a resolved ping (and its sidescan row, when one exists).
pub fn extract(ping: &ResolvedPing, row: Option<&SidescanRow>) -> Swath {
    Swath {
        time_d: ping.time_d,
        longitude: ping.longitude,
        latitude: ping.latitude,
        heading: ping.heading,
        speed: ping.speed,
        sonar_depth: ping.sonar_depth,
        altitude: ping.altitude,
        beams: ping
            .beams
            .iter()
            .map(|b| SwathBeam {
                class: b.class,
                depth: b.depth,
                acrosstrack: b.acrosstrack,
                alongtrack: b.alongtrack,
            })
            .collect(),
        pixels: row.map(|r| r.amplitude.clone()).unwrap_or_default(),
    }
}

/// Writes a swath's soundings back over a bathymetry record's processed
/// block, re-flagging quality override bits to match the swath classes.
/// Beams beyond the record's count are ignored.
pub fn insert(swath: &Swath, bath: &mut Bathymetry) {
    let n = bath.number_beams();
    let processed = bath.processed.get_or_insert_with(Default::default);
    processed.depth.resize(n, 0.0);
    processed.acrosstrack.resize(n, 0.0);
    processed.alongtrack.resize(n, 0.0);
    processed.pointing_angle.resize(n, 0.0);
    processed.azimuth_angle.resize(n, 0.0);
    for (i, beam) in swath.beams.iter().take(n).enumerate() {
        processed.depth[i] = beam.depth as f32;
        processed.acrosstrack[i] = beam.acrosstrack as f32;
        processed.alongtrack[i] = beam.alongtrack as f32;
        match beam.class {
            BeamClass::Flagged => bath.quality[i] |= 0x80,
            BeamClass::Good => bath.quality[i] &= !0xC0,
            BeamClass::Null => {}
        }
    }
    processed.latitude = swath.latitude;
    processed.longitude = swath.longitude;
    processed.heading = swath.heading as f32;
    processed.vehicle_height = -swath.sonar_depth as f32;
}

/// Per-beam detection method from the (current-era) quality bytes.
pub fn detects(bath: &Bathymetry) -> Vec<DetectClass> {
    bath.quality.iter().map(|&q| detect_class(q)).collect()
}

/// Transmit/receive gain settings of a ping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gains {
    /// Transmit power selection, dB.
    pub transmit_gain: f64,
    /// Pulse length, seconds.
    pub pulse_length: f64,
    /// Receiver gain selection, dB.
    pub receive_gain: f64,
}

pub fn gains(settings: &SonarSettings) -> Gains {
    Gains {
        transmit_gain: settings.power_selection as f64,
        pulse_length: settings.pulse_width as f64,
        receive_gain: settings.gain_selection as f64,
    }
}

/// Water-column profile as (depth, sound velocity) pairs.
pub fn extract_svp(svp: &SoundVelocityProfile) -> Vec<(f32, f32)> {
    svp.depth
        .iter()
        .copied()
        .zip(svp.sound_velocity.iter().copied())
        .collect()
}

pub fn insert_svp(samples: &[(f32, f32)]) -> SoundVelocityProfile {
    SoundVelocityProfile {
        depth: samples.iter().map(|&(d, _)| d).collect(),
        sound_velocity: samples.iter().map(|&(_, v)| v).collect(),
        ..Default::default()
    }
}

/// A sub-bottom channel lifted out of its record as a seismic trace.
#[derive(Debug, Clone, PartialEq)]
pub struct SegyTrace {
    pub sequence_number: i32,
    pub ping_number: u32,
    pub sample_interval_ns: u32,
    pub samples: Vec<i16>,
}

pub fn extract_segy_trace(record: &Subbottom) -> SegyTrace {
    SegyTrace {
        sequence_number: record.trace_header.sequence_number,
        ping_number: record.trace_header.ping_num,
        sample_interval_ns: record.trace_header.sample_interval_ns,
        samples: record.channel.samples_i16(),
    }
}

pub fn insert_segy_trace(trace: &SegyTrace) -> Subbottom {
    let mut data = Vec::with_capacity(trace.samples.len() * 2);
    for s in &trace.samples {
        data.extend_from_slice(&s.to_le_bytes());
    }
    Subbottom {
        ping_number: trace.ping_number as i32,
        channel: TowedChannel {
            bytes_per_sample: 2,
            number_samples: trace.samples.len() as u32,
            sample_interval: trace.sample_interval_ns / 1000,
            data,
            ..Default::default()
        },
        trace_header: SegyTraceHeader {
            sequence_number: trace.sequence_number,
            ping_num: trace.ping_number,
            channel_num: 0,
            samples: trace.samples.len() as u16,
            sample_interval_ns: trace.sample_interval_ns,
            ..Default::default()
        },
        ..Default::default()
    }
}
