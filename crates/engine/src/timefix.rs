//! Two-pass timestamp reconciliation.
//!
//! The sonar's bathymetry clock drifts against the towed instrument's
//! clock, which is the one tied to navigation. During the gather pass every
//! bathymetry ping lands in this table; pings that immediately follow a
//! towed-sidescan record get a measured offset between the two clocks.
//! `finalize` then spreads those measured offsets over the pings without
//! one, and the rewrite pass asks `corrected` for each ping's new
//! timestamp.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimefixError {
    /// Not a single bathymetry ping paired with a sidescan record, so no
    /// clock relation can be established.
    #[error("no bathymetry ping pairs with a sidescan record; clocks cannot be reconciled")]
    DesynchronizedClocks,
}

/// One bathymetry ping's reconciliation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeEntry {
    /// Header timestamp as read, epoch seconds.
    pub raw_time: f64,
    pub ping_number: u32,
    /// Sidescan-clock minus bathymetry-clock, seconds.
    pub time_offset: f64,
    /// Sidescan ping counter minus bathymetry ping number.
    pub ping_offset: i64,
    /// Whether the offset was measured rather than interpolated.
    pub measured: bool,
}

impl TimeEntry {
    pub fn corrected_time(&self) -> f64 {
        self.raw_time + self.time_offset
    }
}

/// Reconciliation table built during the gather pass.
#[derive(Debug, Default)]
pub struct TimestampTable {
    entries: Vec<TimeEntry>,
    last_sidescan: Option<(f64, i64)>,
    finalized: bool,
}

impl TimestampTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TimeEntry] {
        &self.entries
    }

    /// Notes a towed-sidescan record: its own clock and ping counter
    /// become the pairing candidate for the next bathymetry ping.
    pub fn observe_sidescan(&mut self, time: f64, ping_number: i64) {
        self.last_sidescan = Some((time, ping_number));
    }

    /// Notes any other record between a sidescan and a bathymetry ping.
    /// An intervening record voids the pairing candidate; only a ping that
    /// directly follows its sidescan gets a measured offset.
    pub fn observe_other(&mut self) {
        self.last_sidescan = None;
    }

    /// Appends a bathymetry ping. Pings whose time does not advance past
    /// the previous entry are ignored, mirroring the per-channel monotonic
    /// rule of the sensor store. Consumes the pending sidescan pairing, if
    /// any.
    pub fn observe_bathymetry(&mut self, raw_time: f64, ping_number: u32) {
        if let Some(last) = self.entries.last() {
            if raw_time <= last.raw_time {
                self.last_sidescan = None;
                return;
            }
        }
        let entry = match self.last_sidescan.take() {
            Some((ss_time, ss_ping)) => TimeEntry {
                raw_time,
                ping_number,
                time_offset: ss_time - raw_time,
                ping_offset: ss_ping - ping_number as i64,
                measured: true,
            },
            None => TimeEntry {
                raw_time,
                ping_number,
                time_offset: 0.0,
                ping_offset: 0,
                measured: false,
            },
        };
        self.entries.push(entry);
    }

    /// Resolves the unmeasured offsets.
    ///
    /// A measured offset only holds up to the next unmeasured entry (the
    /// pairing may have been coincidental), so invalidity first propagates
    /// backward. Remaining gaps are filled by index-linear interpolation
    /// between the nearest measured neighbors, or by copying the single
    /// neighbor at the table's ends.
    pub fn finalize(&mut self) -> Result<(), TimefixError> {
        let was_measured: Vec<bool> = self.entries.iter().map(|e| e.measured).collect();
        for i in 0..self.entries.len().saturating_sub(1) {
            if !was_measured[i + 1] {
                self.entries[i].measured = false;
            }
        }
        if !self.entries.iter().any(|e| e.measured) {
            return Err(TimefixError::DesynchronizedClocks);
        }
        for i in 0..self.entries.len() {
            if self.entries[i].measured {
                continue;
            }
            let before = self.entries[..i].iter().rposition(|e| e.measured);
            let after = self.entries[i + 1..]
                .iter()
                .position(|e| e.measured)
                .map(|j| i + 1 + j);
            self.entries[i].time_offset = match (before, after) {
                (Some(s), Some(e)) => {
                    let o0 = self.entries[s].time_offset;
                    let o1 = self.entries[e].time_offset;
                    o0 + (o1 - o0) * (i - s) as f64 / (e - s) as f64
                }
                (Some(s), None) => self.entries[s].time_offset,
                (None, Some(e)) => self.entries[e].time_offset,
                (None, None) => unreachable!("at least one measured entry exists"),
            };
        }
        self.finalized = true;
        Ok(())
    }

    /// Corrected timestamp for a ping seen during the gather pass. Only
    /// meaningful after `finalize`. Entries are strictly increasing in
    /// `raw_time`, so the lookup is a binary search.
    pub fn corrected(&self, ping_number: u32, raw_time: f64) -> Option<f64> {
        debug_assert!(self.finalized, "corrected() before finalize()");
        let i = self.entries.partition_point(|e| e.raw_time < raw_time - 1e-6);
        self.entries
            .get(i)
            .filter(|e| e.ping_number == ping_number && (e.raw_time - raw_time).abs() < 1e-6)
            .map(|e| e.corrected_time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measured_offsets_survive_finalize() {
        let mut t = TimestampTable::new();
        t.observe_sidescan(101.5, 11);
        t.observe_bathymetry(100.0, 1);
        t.observe_sidescan(102.5, 12);
        t.observe_bathymetry(101.0, 2);
        t.finalize().unwrap();
        assert_eq!(t.entries()[0].time_offset, 1.5);
        assert_eq!(t.entries()[1].time_offset, 1.5);
        assert_eq!(t.corrected(1, 100.0), Some(101.5));
        assert_eq!(t.corrected(2, 101.0), Some(102.5));
    }

    #[test]
    fn interior_gap_interpolates_by_index() {
        let mut t = TimestampTable::new();
        t.observe_sidescan(101.0, 10);
        t.observe_bathymetry(100.0, 1); // offset 1.0
        t.observe_sidescan(102.2, 11);
        t.observe_bathymetry(101.0, 2); // measured, invalidated by ping 3
        t.observe_bathymetry(102.0, 3); // unmeasured
        t.observe_sidescan(107.0, 14);
        t.observe_bathymetry(103.0, 4); // offset 4.0
        t.finalize().unwrap();
        assert!(t.entries()[0].measured);
        assert!(!t.entries()[1].measured);
        assert!((t.entries()[1].time_offset - 2.0).abs() < 1e-12);
        assert!((t.entries()[2].time_offset - 3.0).abs() < 1e-12);
        assert!(t.entries()[3].measured);
    }

    #[test]
    fn invalidity_propagates_backward() {
        let mut t = TimestampTable::new();
        t.observe_sidescan(102.0, 10);
        t.observe_bathymetry(100.0, 1); // measured 2.0, but next is not
        t.observe_bathymetry(101.0, 2); // unmeasured
        t.observe_sidescan(104.5, 12);
        t.observe_bathymetry(102.0, 3); // measured 2.5
        t.finalize().unwrap();
        // Entry 0 lost its measured status and picks up the tail value.
        assert!(!t.entries()[0].measured);
        assert_eq!(t.entries()[0].time_offset, 2.5);
        assert_eq!(t.entries()[1].time_offset, 2.5);
        assert!(t.entries()[2].measured);
    }

    #[test]
    fn corrected_times_stay_monotone() {
        let mut t = TimestampTable::new();
        for i in 0..10u32 {
            if i % 3 == 0 {
                t.observe_sidescan(100.0 + i as f64 + 1.2, 20 + i as i64);
            }
            t.observe_bathymetry(100.0 + i as f64, i);
        }
        t.finalize().unwrap();
        let times: Vec<f64> = t.entries().iter().map(|e| e.corrected_time()).collect();
        for w in times.windows(2) {
            assert!(w[0] < w[1], "corrected times must stay increasing");
        }
    }

    #[test]
    fn no_pairing_at_all_is_fatal() {
        let mut t = TimestampTable::new();
        t.observe_bathymetry(100.0, 1);
        t.observe_bathymetry(101.0, 2);
        assert_eq!(t.finalize(), Err(TimefixError::DesynchronizedClocks));
    }

    #[test]
    fn lookup_hits_both_ends_and_rejects_strangers() {
        let mut t = TimestampTable::new();
        for i in 0..100u32 {
            t.observe_sidescan(100.0 + i as f64 + 0.5, i as i64 + 7);
            t.observe_bathymetry(100.0 + i as f64, i);
        }
        t.finalize().unwrap();
        assert_eq!(t.corrected(0, 100.0), Some(100.5));
        assert_eq!(t.corrected(99, 199.0), Some(199.5));
        assert_eq!(t.corrected(50, 150.0), Some(150.5));
        // Right time, wrong ping number.
        assert_eq!(t.corrected(51, 150.0), None);
        // Time between entries.
        assert_eq!(t.corrected(50, 150.4), None);
        // Past either end.
        assert_eq!(t.corrected(0, 99.0), None);
        assert_eq!(t.corrected(99, 200.0), None);
    }

    #[test]
    fn intervening_record_voids_the_pairing() {
        let mut t = TimestampTable::new();
        t.observe_sidescan(101.0, 10);
        t.observe_other();
        t.observe_bathymetry(100.0, 1);
        assert!(!t.entries()[0].measured);
        assert_eq!(t.entries()[0].time_offset, 0.0);
    }

    #[test]
    fn non_monotonic_pings_are_ignored() {
        let mut t = TimestampTable::new();
        t.observe_sidescan(101.0, 10);
        t.observe_bathymetry(100.0, 1);
        t.observe_bathymetry(99.0, 2);
        assert_eq!(t.len(), 1);
    }
}
