//! Ping assembly and per-beam resolution.
//!
//! A single sonar ping is spread over several records in the stream: a
//! settings record, a bathymetry record, and optionally backscatter and
//! snippet records, all stamped with the same `(ping_number, multi_ping)`
//! key. [`PingAssembler`] folds the stream back into whole [`Ping`]s;
//! [`geometry::resolve`] turns a ping plus interpolated sensor state into
//! projected soundings; [`quality`] normalizes the era-dependent per-beam
//! quality bytes.

pub mod geometry;
pub mod quality;

use codec::header::RecordHeader;
use codec::sonar::{Backscatter, Bathymetry, BeamData, BeamGeometry, SonarSettings};
use codec::{Record, RecordBody};
use log::warn;

pub use geometry::{
    resolve, rollpitch_to_takeoff, RangeOffset, ResolveConfig, ResolveError, ResolvedBeam,
    ResolvedPing, DEFAULT_SOUND_SPEED,
};
pub use quality::{classify, detect_class, remap_quality, BeamClass, DetectClass};

/// Identity of one ping. `multi_ping` separates the pings of a multi-ping
/// cycle sharing a ping number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PingKey {
    pub ping_number: u32,
    pub multi_ping: u16,
}

/// One assembled ping: the bathymetry record that anchors it plus whatever
/// companion records arrived under the same key.
#[derive(Debug, Clone)]
pub struct Ping {
    pub key: PingKey,
    /// Header timestamp of the bathymetry record, epoch seconds.
    pub time_d: f64,
    /// Frame header of the bathymetry record.
    pub header: RecordHeader,
    pub settings: Option<SonarSettings>,
    pub geometry: Option<BeamGeometry>,
    pub bathymetry: Bathymetry,
    pub backscatter: Option<Backscatter>,
    pub beam_data: Option<BeamData>,
    /// Set when companion records disagree on the beam count; the ping is
    /// still usable, the mismatched parts just cannot be trusted per-beam.
    pub degraded: bool,
}

/// Stream-order ping assembler. Feed every record through [`ingest`];
/// completed pings come back as soon as the stream moves on to the next
/// ping key. [`finish`] flushes the last open ping.
///
/// [`ingest`]: PingAssembler::ingest
/// [`finish`]: PingAssembler::finish
#[derive(Debug, Default)]
pub struct PingAssembler {
    latest_settings: Option<SonarSettings>,
    latest_geometry: Option<BeamGeometry>,
    open: Option<Ping>,
}

impl PingAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one record. Returns a completed ping when `record` starts
    /// a new one.
    pub fn ingest(&mut self, record: &Record) -> Option<Ping> {
        match &record.body {
            RecordBody::SonarSettings(s) => {
                self.latest_settings = Some(s.clone());
                None
            }
            RecordBody::BeamGeometry(g) => {
                self.latest_geometry = Some(g.clone());
                None
            }
            RecordBody::Bathymetry(b) => {
                let key = PingKey {
                    ping_number: b.ping_number,
                    multi_ping: b.multi_ping,
                };
                let mut ping = Ping {
                    key,
                    time_d: record.header.time.to_epoch_seconds(),
                    header: record.header.clone(),
                    settings: self.latest_settings.clone(),
                    geometry: self.latest_geometry.clone(),
                    bathymetry: b.clone(),
                    backscatter: None,
                    beam_data: None,
                    degraded: false,
                };
                if let Some(g) = &ping.geometry {
                    if g.number_beams() != b.number_beams() {
                        warn!(
                            "ping {}: geometry has {} beams, bathymetry {}",
                            key.ping_number,
                            g.number_beams(),
                            b.number_beams()
                        );
                        ping.degraded = true;
                    }
                }
                self.open.replace(ping)
            }
            RecordBody::Backscatter(bs) => {
                self.attach(bs.ping_number, bs.multi_ping, |ping| {
                    ping.backscatter = Some(bs.clone());
                    false
                });
                None
            }
            RecordBody::BeamData(bd) => {
                self.attach(bd.ping_number, bd.multi_ping, |ping| {
                    let mismatch = bd.number_beams() != ping.bathymetry.number_beams();
                    ping.beam_data = Some(bd.clone());
                    mismatch
                });
                None
            }
            _ => None,
        }
    }

    /// Attaches a companion record to the open ping when the keys agree.
    /// `apply` returns whether the attachment degrades the ping.
    fn attach<F>(&mut self, ping_number: u32, multi_ping: u16, apply: F)
    where
        F: FnOnce(&mut Ping) -> bool,
    {
        let key = PingKey {
            ping_number,
            multi_ping,
        };
        match self.open.as_mut() {
            Some(ping) if ping.key == key => {
                if apply(ping) {
                    warn!("ping {}: companion record beam count mismatch", ping_number);
                    ping.degraded = true;
                }
            }
            _ => {
                warn!("dropping companion record for unknown ping {ping_number}");
            }
        }
    }

    /// Flushes the final open ping at end of stream.
    pub fn finish(&mut self) -> Option<Ping> {
        self.open.take()
    }
}
