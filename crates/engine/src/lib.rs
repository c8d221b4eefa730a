//! # Engine - batch preprocessing pipeline
//!
//! The orchestrator that ties the [`codec`], [`timeseries`], [`ping`], and
//! [`sidescan`] crates into the two-pass batch preprocessor behind the
//! `swath7k` tool.
//!
//! ## Architecture
//!
//! ```text
//! input file
//!   |
//!   v
//! ┌─────────────────────────────────────────────────┐
//! │                PASS 1: gather                   │
//! │                                                 │
//! │ RecordReader → vehicle/sensor records           │
//! │              → SensorStore channels             │
//! │              → bathymetry + sidescan times      │
//! │              → TimestampTable                   │
//! └─────────────────────────────────────────────────┘
//!   |  TimestampTable::finalize()
//!   v
//! ┌─────────────────────────────────────────────────┐
//! │                PASS 2: rewrite                  │
//! │                                                 │
//! │ RecordReader → fix timestamps, remap quality    │
//! │              → PingAssembler → resolve()        │
//! │              → Reconstructor (sidescan rows)    │
//! │              → RecordWriter (output file)       │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module      | Purpose                                            |
//! |-------------|----------------------------------------------------|
//! | `lib.rs`    | `Preprocessor`, the two passes, run summary        |
//! | [`timefix`] | Bathymetry/sidescan clock reconciliation table     |
//! | [`extract`] | Flat swath/detect/gain/SVP/seismic-trace API       |
//!
//! Per-record decode failures are counted and skipped; a ping whose time
//! falls outside the sensor coverage is dropped from the output; only an
//! unreadable input file or irreconcilable clocks abort the run.

mod extract;
mod timefix;

#[cfg(test)]
mod tests;

pub use extract::{
    detects, extract, extract_segy_trace, extract_svp, gains, insert, insert_segy_trace,
    insert_svp, Gains, SegyTrace, Swath, SwathBeam,
};
pub use timefix::{TimeEntry, TimefixError, TimestampTable};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use codec::vehicle::VehicleFrameData;
use codec::{Record, RecordBody, RecordReader, RecordWriter, Timestamp};
use log::{debug, info, warn};
use ping::{remap_quality, resolve, Ping, PingAssembler, ResolveError};
use sidescan::{Reconstructor, SidescanConfig};
use timeseries::SensorStore;

/// Everything the pipeline can be told to do.
#[derive(Debug, Clone, Default)]
pub struct PreprocessConfig {
    /// Rewrite bathymetry header timestamps from the reconciliation table.
    pub fix_timestamps: bool,
    pub resolve: ping::ResolveConfig,
    /// When set, reconstruct a sidescan row per ping with snippet data.
    pub sidescan: Option<SidescanConfig>,
}

/// Counters reported after a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub records_read: u64,
    pub records_written: u64,
    pub bathymetry: u64,
    pub backscatter: u64,
    pub beam_data: u64,
    pub sidescan_records: u64,
    pub subbottom: u64,
    pub vehicle_frames: u64,
    pub ancillary: u64,
    pub opaque: u64,
    pub decode_failures: u64,
    pub pings_resolved: u64,
    pub pings_degraded: u64,
    pub pings_dropped: u64,
    pub timestamps_fixed: u64,
    pub sidescan_rows: u64,
    pub sensor_samples_dropped: u64,
}

impl RunSummary {
    fn count_kind(&mut self, body: &RecordBody) {
        match body {
            RecordBody::Bathymetry(_) => self.bathymetry += 1,
            RecordBody::Backscatter(_) => self.backscatter += 1,
            RecordBody::BeamData(_) => self.beam_data += 1,
            RecordBody::TowedSidescan(_) => self.sidescan_records += 1,
            RecordBody::Subbottom(_) => self.subbottom += 1,
            RecordBody::VehicleFrames(_) => self.vehicle_frames += 1,
            RecordBody::Opaque(_) => self.opaque += 1,
            _ => self.ancillary += 1,
        }
    }
}

/// The batch preprocessor. Construct once per run.
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Preprocessor { config }
    }

    /// Pass 1: stream the file once, filling the sensor store and the
    /// timestamp reconciliation table. Public so the timestamp listing
    /// mode can show the table without rewriting anything.
    pub fn scan(&self, input: &Path) -> Result<(SensorStore, TimestampTable, RunSummary)> {
        let file =
            File::open(input).with_context(|| format!("opening input file {}", input.display()))?;
        let mut reader = RecordReader::new(BufReader::new(file));
        let mut store = SensorStore::new();
        let mut table = TimestampTable::new();
        let mut summary = RunSummary::default();

        for result in reader.by_ref() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    summary.decode_failures += 1;
                    warn!("gather pass: skipping record: {e}");
                    continue;
                }
            };
            summary.records_read += 1;
            gather_record(&record, &mut store, &mut table);
        }
        summary.sensor_samples_dropped = store.total_dropped();
        info!(
            "gather pass: {} records, {} pings in table, {} bytes resynced",
            summary.records_read,
            table.len(),
            reader.resynced_bytes()
        );
        Ok((store, table, summary))
    }

    /// Runs both passes, writing the rewritten record stream to `output`.
    pub fn run(&self, input: &Path, output: &Path) -> Result<RunSummary> {
        let (store, mut table, scan_summary) = self.scan(input)?;
        if self.config.fix_timestamps {
            table
                .finalize()
                .context("reconciling bathymetry and sidescan clocks")?;
        }

        let file = File::open(input)
            .with_context(|| format!("reopening input file {}", input.display()))?;
        let mut reader = RecordReader::new(BufReader::new(file));
        let out = File::create(output)
            .with_context(|| format!("creating output file {}", output.display()))?;
        let mut writer = RecordWriter::new(BufWriter::new(out));

        let mut summary = RunSummary {
            decode_failures: scan_summary.decode_failures,
            sensor_samples_dropped: scan_summary.sensor_samples_dropped,
            ..Default::default()
        };
        let mut assembler = PingAssembler::new();
        let mut reconstructor = self.config.sidescan.clone().map(Reconstructor::new);
        // Records of the currently open ping, held back until the ping can
        // be resolved as a whole.
        let mut pending: Vec<Record> = Vec::new();

        for result in reader.by_ref() {
            let mut record = match result {
                Ok(r) => r,
                Err(e) => {
                    debug!("rewrite pass: skipping record: {e}");
                    continue;
                }
            };
            summary.records_read += 1;
            summary.count_kind(&record.body);

            if let RecordBody::Bathymetry(b) = &mut record.body {
                if self.config.fix_timestamps {
                    let raw = record.header.time.to_epoch_seconds();
                    if let Some(fixed) = table.corrected(b.ping_number, raw) {
                        record.header.time = Timestamp::from_epoch_seconds(fixed);
                        summary.timestamps_fixed += 1;
                    }
                }
                let version = record.header.version;
                let year = record.header.time.year;
                for i in 0..b.quality.len() {
                    b.quality[i] = remap_quality(b.quality[i], b.range[i], version, year);
                }
            }

            if let Some(done) = assembler.ingest(&record) {
                self.flush_ping(
                    done,
                    &mut pending,
                    &mut writer,
                    &store,
                    &mut reconstructor,
                    &mut summary,
                )?;
            }

            if matches!(record.body, RecordBody::Bathymetry(_)) || !pending.is_empty() {
                pending.push(record);
            } else {
                writer.write_record(&record)?;
                summary.records_written += 1;
            }
        }
        if let Some(done) = assembler.finish() {
            self.flush_ping(
                done,
                &mut pending,
                &mut writer,
                &store,
                &mut reconstructor,
                &mut summary,
            )?;
        }
        for record in pending.drain(..) {
            writer.write_record(&record)?;
            summary.records_written += 1;
        }
        writer.flush()?;

        info!(
            "rewrite pass: {} records in, {} out; {} pings resolved, {} degraded, {} dropped; \
             {} timestamps fixed, {} sidescan rows",
            summary.records_read,
            summary.records_written,
            summary.pings_resolved,
            summary.pings_degraded,
            summary.pings_dropped,
            summary.timestamps_fixed,
            summary.sidescan_rows
        );
        Ok(summary)
    }

    /// Resolves one completed ping and writes its held-back records.
    fn flush_ping<W: std::io::Write>(
        &self,
        done: Ping,
        pending: &mut Vec<Record>,
        writer: &mut RecordWriter<W>,
        store: &SensorStore,
        reconstructor: &mut Option<Reconstructor>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        match resolve(&done, store, &self.config.resolve) {
            Ok(resolved) => {
                summary.pings_resolved += 1;
                if done.degraded {
                    summary.pings_degraded += 1;
                }
                if let (Some(r), Some(bd)) = (reconstructor.as_mut(), done.beam_data.as_ref()) {
                    let sample_rate = done
                        .settings
                        .as_ref()
                        .map(|s| s.sample_rate as f64)
                        .unwrap_or(0.0);
                    let row = r.reconstruct(&resolved, bd, sample_rate);
                    if row.occupied() > 0 {
                        summary.sidescan_rows += 1;
                    }
                }
                let frequency = done.settings.as_ref().map(|s| s.frequency).unwrap_or(0.0);
                for record in pending.iter_mut() {
                    if let RecordBody::Bathymetry(b) = &mut record.body {
                        if b.ping_number == done.key.ping_number
                            && b.multi_ping == done.key.multi_ping
                        {
                            // Range offsets applied during resolution stay
                            // in the rewritten record too.
                            for (i, beam) in resolved.beams.iter().enumerate() {
                                if i < b.range.len() {
                                    b.range[i] = beam.range_secs as f32;
                                }
                            }
                            b.processed = Some(resolved.to_processed(frequency));
                        }
                    }
                }
                for record in pending.drain(..) {
                    writer.write_record(&record)?;
                    summary.records_written += 1;
                }
            }
            Err(err @ ResolveError::Unintelligible { .. }) => {
                summary.pings_dropped += 1;
                warn!("{err}; excluding ping from output");
                for record in pending.drain(..) {
                    if ping_record_key(&record) == Some(done.key) {
                        continue;
                    }
                    writer.write_record(&record)?;
                    summary.records_written += 1;
                }
            }
            Err(err @ ResolveError::MissingGeometry { .. }) => {
                // No geometry record yet: pass the records through untouched.
                debug!("{err}; writing ping unresolved");
                for record in pending.drain(..) {
                    writer.write_record(&record)?;
                    summary.records_written += 1;
                }
            }
        }
        Ok(())
    }
}

/// The ping key a sonar data record belongs to, if it is one.
fn ping_record_key(record: &Record) -> Option<ping::PingKey> {
    let (ping_number, multi_ping) = match &record.body {
        RecordBody::Bathymetry(b) => (b.ping_number, b.multi_ping),
        RecordBody::Backscatter(b) => (b.ping_number, b.multi_ping),
        RecordBody::BeamData(b) => (b.ping_number, b.multi_ping),
        _ => return None,
    };
    Some(ping::PingKey {
        ping_number,
        multi_ping,
    })
}

/// Feeds one record's contents into the sensor store and timestamp table.
fn gather_record(record: &Record, store: &mut SensorStore, table: &mut TimestampTable) {
    let time = record.header.time.to_epoch_seconds();
    // A measured clock offset requires the bathymetry record to directly
    // follow its sidescan record; anything in between voids the pairing.
    if !matches!(
        record.body,
        RecordBody::TowedSidescan(_) | RecordBody::Bathymetry(_)
    ) {
        table.observe_other();
    }
    match &record.body {
        RecordBody::VehicleFrames(v) => match &v.frames {
            VehicleFrameData::Nav(frames) => {
                for f in frames {
                    let t = f.time.to_epoch_seconds();
                    store.push_nav(t, f.longitude, f.latitude);
                    store.speed.push(t, f.speed as f64);
                    store.sonar_depth.push(t, f.depth);
                    store.heading.push(t, f.yaw as f64);
                    store.roll.push(t, f.roll as f64);
                    store.pitch.push(t, f.pitch as f64);
                    store.altitude.push(t, f.altitude);
                }
            }
            VehicleFrameData::Environmental(frames) => {
                for f in frames {
                    if f.sound_speed > 0.0 {
                        store
                            .sound_speed
                            .push(f.time.to_epoch_seconds(), f.sound_speed as f64);
                    }
                }
            }
        },
        RecordBody::Position(p) => store.push_nav(time, p.longitude, p.latitude),
        RecordBody::Navigation(n) => {
            store.push_nav(time, n.longitude, n.latitude);
            store.speed.push(time, n.speed as f64);
            store.heading.push(time, n.heading as f64);
        }
        RecordBody::Depth(d) => store.sonar_depth.push(time, d.depth as f64),
        RecordBody::Heading(h) => store.heading.push(time, h.heading as f64),
        RecordBody::RollPitchHeave(a) => {
            store.push_attitude(time, a.roll as f64, a.pitch as f64, a.heave as f64)
        }
        RecordBody::Attitude(a) => {
            for s in &a.samples {
                let t = time + s.delta_time_ms as f64 / 1000.0;
                store.push_attitude(t, s.roll as f64, s.pitch as f64, s.heave as f64);
                store.heading.push(t, s.heading as f64);
            }
        }
        RecordBody::Altitude(a) => store.altitude.push(time, a.altitude as f64),
        RecordBody::Ctd(c) => {
            if let Some(&v) = c.sound_velocity.last() {
                if v > 0.0 {
                    store.sound_speed.push(time, v as f64);
                }
            }
        }
        RecordBody::TowedSidescan(ss) => {
            // The towed instrument's own clock and ping counter drive the
            // reconciliation, not the frame header.
            let ss_time = ss
                .headers
                .first()
                .map(|h| h.epoch_seconds())
                .filter(|&t| t > 0.0)
                .unwrap_or(time);
            table.observe_sidescan(ss_time, ss.ping_number as i64);
        }
        RecordBody::Bathymetry(b) => table.observe_bathymetry(time, b.ping_number),
        _ => {}
    }
}
