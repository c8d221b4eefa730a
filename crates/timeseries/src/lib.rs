//! Time-ordered sensor sample stores with linear interpolation.
//!
//! Preprocessing needs every ancillary sensor stream (navigation, depth,
//! heading, attitude, altitude) queryable at arbitrary ping times. Samples
//! arrive roughly in time order from the record stream; each series keeps
//! them strictly monotonic by dropping any sample that does not advance the
//! clock, then answers interpolation queries by binary search over the
//! stored times.

use log::warn;
use thiserror::Error;

/// Sample storage grows in fixed chunks; record streams deliver sensor
/// samples in long bursts.
const ALLOC_CHUNK: usize = 1024;

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    /// The query time lies before the first or after the last sample, so
    /// no bracketing pair exists.
    #[error("time {time} outside series span [{first}, {last}]")]
    OutOfRange { time: f64, first: f64, last: f64 },

    /// The series holds no samples at all.
    #[error("series is empty")]
    Empty,
}

/// A single scalar channel sampled against seconds since the Unix epoch.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    name: &'static str,
    times: Vec<f64>,
    values: Vec<f64>,
    dropped: u64,
}

impl TimeSeries {
    pub fn new(name: &'static str) -> Self {
        TimeSeries {
            name,
            times: Vec::new(),
            values: Vec::new(),
            dropped: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Samples rejected for not advancing the clock.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn first_time(&self) -> Option<f64> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    /// Appends a sample. Out-of-order and duplicate times are dropped so
    /// the series stays strictly increasing; the first drop of a series is
    /// logged, the rest only counted.
    pub fn push(&mut self, time: f64, value: f64) {
        if let Some(&last) = self.times.last() {
            if time <= last {
                if self.dropped == 0 {
                    warn!(
                        "{}: dropping non-monotonic sample at {time} (last {last})",
                        self.name
                    );
                }
                self.dropped += 1;
                return;
            }
        }
        if self.times.len() == self.times.capacity() {
            self.times.reserve(ALLOC_CHUNK);
            self.values.reserve(ALLOC_CHUNK);
        }
        self.times.push(time);
        self.values.push(value);
    }

    /// Index of the last sample at or before `time`, if any.
    fn lower_index(&self, time: f64) -> Option<usize> {
        match self
            .times
            .binary_search_by(|t| t.partial_cmp(&time).expect("series times are finite"))
        {
            Ok(i) => Some(i),
            Err(0) => None,
            Err(i) => Some(i - 1),
        }
    }

    /// Linear interpolation at `time`. Queries outside the sampled span
    /// are refused rather than extrapolated.
    pub fn interpolate(&self, time: f64) -> Result<f64, SeriesError> {
        let (first, last) = match (self.first_time(), self.last_time()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(SeriesError::Empty),
        };
        if time < first || time > last {
            return Err(SeriesError::OutOfRange { time, first, last });
        }
        let i = self.lower_index(time).expect("time >= first sample");
        if self.times[i] == time || i + 1 == self.times.len() {
            return Ok(self.values[i]);
        }
        let t0 = self.times[i];
        let t1 = self.times[i + 1];
        let frac = (time - t0) / (t1 - t0);
        Ok(self.values[i] + frac * (self.values[i + 1] - self.values[i]))
    }
}

/// A channel of angles in radians, interpolated along the shortest arc so
/// a heading series crossing north does not swing through half a circle.
#[derive(Debug, Clone, Default)]
pub struct AngleSeries {
    inner: TimeSeries,
}

const TWO_PI: f64 = 2.0 * std::f64::consts::PI;

impl AngleSeries {
    pub fn new(name: &'static str) -> Self {
        AngleSeries {
            inner: TimeSeries::new(name),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped()
    }

    pub fn push(&mut self, time: f64, angle: f64) {
        self.inner.push(time, angle.rem_euclid(TWO_PI));
    }

    pub fn interpolate(&self, time: f64) -> Result<f64, SeriesError> {
        let (first, last) = match (self.inner.first_time(), self.inner.last_time()) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(SeriesError::Empty),
        };
        if time < first || time > last {
            return Err(SeriesError::OutOfRange { time, first, last });
        }
        let i = self.inner.lower_index(time).expect("time >= first sample");
        if self.inner.times[i] == time || i + 1 == self.inner.times.len() {
            return Ok(self.inner.values[i]);
        }
        let t0 = self.inner.times[i];
        let t1 = self.inner.times[i + 1];
        let a0 = self.inner.values[i];
        let a1 = self.inner.values[i + 1];
        let mut delta = a1 - a0;
        if delta > std::f64::consts::PI {
            delta -= TWO_PI;
        } else if delta < -std::f64::consts::PI {
            delta += TWO_PI;
        }
        let frac = (time - t0) / (t1 - t0);
        Ok((a0 + frac * delta).rem_euclid(TWO_PI))
    }
}

/// Every ancillary channel the preprocessing passes query, keyed by the
/// sensor streams that feed them.
#[derive(Debug, Default)]
pub struct SensorStore {
    pub longitude: TimeSeries,
    pub latitude: TimeSeries,
    pub speed: TimeSeries,
    pub sonar_depth: TimeSeries,
    pub altitude: TimeSeries,
    pub heading: AngleSeries,
    pub roll: TimeSeries,
    pub pitch: TimeSeries,
    pub heave: TimeSeries,
    pub sound_speed: TimeSeries,
}

impl SensorStore {
    pub fn new() -> Self {
        SensorStore {
            longitude: TimeSeries::new("longitude"),
            latitude: TimeSeries::new("latitude"),
            speed: TimeSeries::new("speed"),
            sonar_depth: TimeSeries::new("sonar_depth"),
            altitude: TimeSeries::new("altitude"),
            heading: AngleSeries::new("heading"),
            roll: TimeSeries::new("roll"),
            pitch: TimeSeries::new("pitch"),
            heave: TimeSeries::new("heave"),
            sound_speed: TimeSeries::new("sound_speed"),
        }
    }

    pub fn push_nav(&mut self, time: f64, longitude: f64, latitude: f64) {
        self.longitude.push(time, longitude);
        self.latitude.push(time, latitude);
    }

    pub fn push_attitude(&mut self, time: f64, roll: f64, pitch: f64, heave: f64) {
        self.roll.push(time, roll);
        self.pitch.push(time, pitch);
        self.heave.push(time, heave);
    }

    /// Total samples dropped across all channels, for the end-of-run
    /// summary.
    pub fn total_dropped(&self) -> u64 {
        self.longitude.dropped()
            + self.latitude.dropped()
            + self.speed.dropped()
            + self.sonar_depth.dropped()
            + self.altitude.dropped()
            + self.heading.dropped()
            + self.roll.dropped()
            + self.pitch.dropped()
            + self.heave.dropped()
            + self.sound_speed.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn interpolates_between_samples() {
        let mut s = TimeSeries::new("test");
        s.push(0.0, 10.0);
        s.push(10.0, 20.0);
        assert_eq!(s.interpolate(5.0), Ok(15.0));
        assert_eq!(s.interpolate(0.0), Ok(10.0));
        assert_eq!(s.interpolate(10.0), Ok(20.0));
    }

    #[test]
    fn refuses_extrapolation() {
        let mut s = TimeSeries::new("test");
        s.push(1.0, 1.0);
        s.push(2.0, 2.0);
        assert!(matches!(
            s.interpolate(0.5),
            Err(SeriesError::OutOfRange { .. })
        ));
        assert!(matches!(
            s.interpolate(2.5),
            Err(SeriesError::OutOfRange { .. })
        ));
    }

    #[test]
    fn empty_series_is_an_error() {
        let s = TimeSeries::new("test");
        assert_eq!(s.interpolate(1.0), Err(SeriesError::Empty));
    }

    #[test]
    fn drops_non_monotonic_samples() {
        let mut s = TimeSeries::new("test");
        s.push(1.0, 1.0);
        s.push(2.0, 2.0);
        s.push(1.5, 99.0);
        s.push(2.0, 99.0);
        s.push(3.0, 3.0);
        assert_eq!(s.len(), 3);
        assert_eq!(s.dropped(), 2);
        assert_eq!(s.interpolate(2.5), Ok(2.5));
    }

    #[test]
    fn heading_interpolates_across_north() {
        let mut h = AngleSeries::new("heading");
        // 350 degrees, then 10 degrees: the mean must be north, not south.
        h.push(0.0, 350.0_f64.to_radians());
        h.push(10.0, 10.0_f64.to_radians());
        let mid = h.interpolate(5.0).unwrap();
        assert!(mid < 0.01 || mid > TWO_PI - 0.01, "mid = {mid}");
    }

    #[test]
    fn heading_negative_input_is_normalized() {
        let mut h = AngleSeries::new("heading");
        h.push(0.0, -PI / 2.0);
        h.push(1.0, -PI / 2.0);
        let v = h.interpolate(0.5).unwrap();
        assert!((v - 3.0 * PI / 2.0).abs() < 1e-9);
    }

    #[test]
    fn store_tracks_drops_across_channels() {
        let mut store = SensorStore::new();
        store.push_nav(1.0, 0.1, 0.2);
        store.push_nav(0.5, 0.1, 0.2);
        store.heading.push(1.0, 0.0);
        store.heading.push(1.0, 0.1);
        assert_eq!(store.total_dropped(), 3);
    }
}
