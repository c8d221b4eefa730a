//! Sounding geometry: project each beam's travel time and steering angles
//! into depth and across/alongtrack distances, anchored to the sensor
//! channels interpolated at ping time.

use codec::sonar::BathymetryProcessed;
use log::debug;
use thiserror::Error;
use timeseries::{SensorStore, SeriesError};

use crate::quality::{classify, has_detection, BeamClass};
use crate::Ping;

/// Fallback water sound speed when neither the settings record nor any
/// environmental frame supplied one.
pub const DEFAULT_SOUND_SPEED: f64 = 1500.0;

/// Travel-time correction for a contiguous beam span, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeOffset {
    pub start_beam: usize,
    pub end_beam: usize,
    pub offset_secs: f64,
}

impl RangeOffset {
    pub fn applies_to(&self, beam: usize) -> bool {
        beam >= self.start_beam && beam <= self.end_beam
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolveConfig {
    /// Added to every ping time before sensor interpolation, seconds.
    pub time_lag: f64,
    /// Sensor mounting offsets (alongtrack, acrosstrack) in meters,
    /// converted to a depth correction through pitch and roll.
    pub sonar_depth_offset: (f64, f64),
    pub range_offsets: Vec<RangeOffset>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The sensor record streams do not cover this ping's time, so no
    /// trustworthy geometry exists for it.
    #[error("ping {ping_number}: sensor data does not cover ping time {time:.3}")]
    Unintelligible { ping_number: u32, time: f64 },

    /// No beam-geometry record has been seen yet.
    #[error("ping {ping_number}: no receiver beam geometry available")]
    MissingGeometry { ping_number: u32 },
}

/// One projected sounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBeam {
    pub class: BeamClass,
    pub quality: u8,
    /// Two-way travel time after range offsets, seconds.
    pub range_secs: f64,
    /// Meters below the surface (sonar depth included).
    pub depth: f64,
    pub acrosstrack: f64,
    pub alongtrack: f64,
    /// Takeoff angle from vertical, radians.
    pub pointing_angle: f64,
    /// Azimuth of the takeoff direction, radians.
    pub azimuth_angle: f64,
}

/// A ping with its platform state fixed and every beam projected.
#[derive(Debug, Clone)]
pub struct ResolvedPing {
    pub ping_number: u32,
    pub multi_ping: u16,
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
    pub roll: f64,
    pub pitch: f64,
    pub heave: f64,
    pub sound_speed: f64,
    pub beams: Vec<ResolvedBeam>,
}

impl ResolvedPing {
    /// Folds the resolved state back into the per-beam optional block of a
    /// bathymetry record.
    pub fn to_processed(&self, frequency: f32) -> BathymetryProcessed {
        let mut p = BathymetryProcessed {
            frequency,
            latitude: self.latitude,
            longitude: self.longitude,
            heading: self.heading as f32,
            roll: self.roll as f32,
            pitch: self.pitch as f32,
            heave: self.heave as f32,
            vehicle_height: -self.sonar_depth as f32,
            ..Default::default()
        };
        for b in &self.beams {
            p.depth.push(b.depth as f32);
            p.alongtrack.push(b.alongtrack as f32);
            p.acrosstrack.push(b.acrosstrack as f32);
            p.pointing_angle.push(b.pointing_angle as f32);
            p.azimuth_angle.push(b.azimuth_angle as f32);
        }
        p
    }
}

/// Converts a beam direction given as rotations in the pitch plane
/// (`alpha`) and roll plane (`beta`, 90 degrees = straight down) into a
/// takeoff angle from vertical and an azimuth, both in radians.
pub fn rollpitch_to_takeoff(alpha: f64, beta: f64) -> (f64, f64) {
    let theta = (alpha.cos() * beta.sin()).clamp(-1.0, 1.0).acos();
    let phi = if theta == 0.0 {
        0.0
    } else {
        alpha.sin().atan2(alpha.cos() * beta.cos())
    };
    (theta, phi)
}

fn required(
    value: Result<f64, SeriesError>,
    ping_number: u32,
    time: f64,
) -> Result<f64, ResolveError> {
    value.map_err(|_| ResolveError::Unintelligible { ping_number, time })
}

/// Interpolates the platform state at ping time and projects every beam
/// with a usable detection. Channels that may legitimately be absent
/// (altitude, speed, heave) fall back to zero; position, heading,
/// attitude, and sensor depth are mandatory.
pub fn resolve(
    ping: &Ping,
    store: &SensorStore,
    config: &ResolveConfig,
) -> Result<ResolvedPing, ResolveError> {
    let ping_number = ping.key.ping_number;
    let time = ping.time_d + config.time_lag;

    let geometry = ping
        .geometry
        .as_ref()
        .ok_or(ResolveError::MissingGeometry { ping_number })?;

    let longitude = required(store.longitude.interpolate(time), ping_number, time)?;
    let latitude = required(store.latitude.interpolate(time), ping_number, time)?;
    let heading = required(store.heading.interpolate(time), ping_number, time)?;
    let roll = required(store.roll.interpolate(time), ping_number, time)?;
    let pitch = required(store.pitch.interpolate(time), ping_number, time)?;
    let mut sonar_depth = required(store.sonar_depth.interpolate(time), ping_number, time)?;
    let altitude = store.altitude.interpolate(time).unwrap_or(0.0);
    let speed = store.speed.interpolate(time).unwrap_or(0.0);
    let heave = store.heave.interpolate(time).unwrap_or(0.0);

    // Mounting offsets become a depth correction through the current
    // attitude.
    let (off_x, off_y) = config.sonar_depth_offset;
    sonar_depth += off_x * pitch.sin() + off_y * roll.sin();

    let sound_speed = ping
        .settings
        .as_ref()
        .map(|s| s.sound_velocity as f64)
        .filter(|&c| c > 0.0)
        .or_else(|| store.sound_speed.interpolate(time).ok().filter(|&c| c > 0.0))
        .unwrap_or(DEFAULT_SOUND_SPEED);

    let bath = &ping.bathymetry;
    let nbeams = bath.number_beams().min(geometry.number_beams());
    let mut beams = Vec::with_capacity(nbeams);
    for i in 0..nbeams {
        let quality = bath.quality[i];
        let mut range = bath.range[i] as f64;
        for off in &config.range_offsets {
            if off.applies_to(i) {
                range += off.offset_secs;
            }
        }
        if !has_detection(quality) || range <= 0.0 {
            beams.push(ResolvedBeam {
                class: BeamClass::Null,
                quality,
                range_secs: range,
                depth: 0.0,
                acrosstrack: 0.0,
                alongtrack: 0.0,
                pointing_angle: 0.0,
                azimuth_angle: 0.0,
            });
            continue;
        }

        let alpha = geometry.angle_alongtrack[i] as f64 + pitch;
        let beta = std::f64::consts::FRAC_PI_2 - (geometry.angle_acrosstrack[i] as f64 - roll);
        let (theta, phi) = rollpitch_to_takeoff(alpha, beta);
        let rr = 0.5 * sound_speed * range;
        let xx = rr * theta.sin();
        let zz = rr * theta.cos();
        beams.push(ResolvedBeam {
            class: classify(quality),
            quality,
            range_secs: range,
            depth: zz + sonar_depth,
            acrosstrack: xx * phi.cos(),
            alongtrack: xx * phi.sin(),
            pointing_angle: theta,
            azimuth_angle: phi,
        });
    }
    debug!(
        "ping {ping_number} resolved: {} beams, c = {sound_speed:.1} m/s",
        beams.len()
    );

    Ok(ResolvedPing {
        ping_number,
        multi_ping: ping.key.multi_ping,
        time_d: ping.time_d,
        longitude,
        latitude,
        heading,
        speed,
        sonar_depth,
        altitude,
        roll,
        pitch,
        heave,
        sound_speed,
        beams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::header::{RecordHeader, RECID_BATHYMETRY};
    use codec::sonar::{Bathymetry, BeamGeometry};
    use crate::{Ping, PingKey};

    fn flat_store(t0: f64, t1: f64) -> SensorStore {
        let mut store = SensorStore::new();
        for (t, v) in [(t0, 0.0), (t1, 0.0)] {
            store.push_nav(t, 0.5 + v, 0.25);
            store.heading.push(t, 0.0);
            store.sonar_depth.push(t, 100.0);
            store.push_attitude(t, 0.0, 0.0, 0.0);
        }
        store
    }

    fn vertical_ping(range_secs: f32) -> Ping {
        let mut header = RecordHeader::new(RECID_BATHYMETRY);
        header.version = 5;
        Ping {
            key: PingKey {
                ping_number: 1,
                multi_ping: 0,
            },
            time_d: 50.0,
            header,
            settings: None,
            geometry: Some(BeamGeometry {
                serial_number: 0,
                angle_alongtrack: vec![0.0],
                angle_acrosstrack: vec![0.0],
                beamwidth_alongtrack: vec![0.02],
                beamwidth_acrosstrack: vec![0.02],
            }),
            bathymetry: Bathymetry {
                range: vec![range_secs],
                quality: vec![0x2F],
                intensity: vec![0.0],
                ..Default::default()
            },
            backscatter: None,
            beam_data: None,
            degraded: false,
        }
    }

    #[test]
    fn nadir_beam_projects_straight_down() {
        let store = flat_store(0.0, 100.0);
        let ping = vertical_ping(1.0);
        let resolved = resolve(&ping, &store, &ResolveConfig::default()).unwrap();
        let b = &resolved.beams[0];
        // 1 s two-way at 1500 m/s is 750 m of water below a 100 m deep sensor.
        assert!((b.depth - 850.0).abs() < 1e-6);
        assert!(b.acrosstrack.abs() < 1e-6);
        assert!(b.alongtrack.abs() < 1e-6);
        assert_eq!(b.class, BeamClass::Good);
    }

    #[test]
    fn roll_tilts_the_nadir_beam() {
        let mut store = flat_store(0.0, 100.0);
        store.roll = timeseries::TimeSeries::new("roll");
        store.roll.push(0.0, 0.1);
        store.roll.push(100.0, 0.1);
        let ping = vertical_ping(1.0);
        let resolved = resolve(&ping, &store, &ResolveConfig::default()).unwrap();
        let b = &resolved.beams[0];
        assert!((b.pointing_angle - 0.1).abs() < 1e-9);
        assert!(b.acrosstrack > 70.0, "acrosstrack = {}", b.acrosstrack);
    }

    #[test]
    fn range_offsets_shift_travel_time() {
        let store = flat_store(0.0, 100.0);
        let ping = vertical_ping(1.0);
        let config = ResolveConfig {
            range_offsets: vec![RangeOffset {
                start_beam: 0,
                end_beam: 0,
                offset_secs: 1.0,
            }],
            ..Default::default()
        };
        let resolved = resolve(&ping, &store, &config).unwrap();
        assert!((resolved.beams[0].depth - 1600.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_coverage_ping_is_unintelligible() {
        let store = flat_store(0.0, 10.0);
        let ping = vertical_ping(1.0); // time 50.0, past coverage
        assert!(matches!(
            resolve(&ping, &store, &ResolveConfig::default()),
            Err(ResolveError::Unintelligible { ping_number: 1, .. })
        ));
    }

    #[test]
    fn takeoff_transform_identities() {
        let (theta, _) = rollpitch_to_takeoff(0.0, std::f64::consts::FRAC_PI_2);
        assert!(theta.abs() < 1e-12);
        let (theta, phi) = rollpitch_to_takeoff(0.0, std::f64::consts::FRAC_PI_2 - 0.3);
        assert!((theta - 0.3).abs() < 1e-12);
        assert!(phi.abs() < 1e-12);
    }
}
