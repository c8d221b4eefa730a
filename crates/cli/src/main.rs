//! # swath7k - batch telemetry preprocessor
//!
//! Reads a 7k-series multibeam telemetry file, reconciles the bathymetry
//! clock with the towed instrument's clock, resolves per-beam geometry
//! against the interpolated platform state, reconstructs a sidescan row per
//! ping from the snippet records, and writes the rewritten record stream
//! to a new file.
//!
//! ## Usage
//!
//! ```text
//! swath7k --input dive042.s7k --output dive042_p.s7k --fix-timestamps
//! swath7k --input dive042.s7k --timestamps
//! ```
//!
//! ## Options
//!
//! ```text
//! --input <FILE>                    Telemetry file to read
//! --output <FILE>                   Rewritten file to produce
//! --fix-timestamps                  Move bathymetry headers onto the towed clock
//! --sonar-depth-offset <X> <Y>      Sonar lever arm, meters
//! --range-offset <START,END,SECS>   Travel-time correction for a beam span
//!                                   (repeatable, up to three)
//! --time-lag <SECS>                 Constant sensor clock lag
//! --no-sidescan                     Skip sidescan reconstruction
//! --timestamps                      Print the clock reconciliation table and exit
//! -v / -vv                          Info / debug logging
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use engine::{PreprocessConfig, Preprocessor, RunSummary};
use ping::{RangeOffset, ResolveConfig};
use sidescan::SidescanConfig;

/// A beam span's travel-time correction can stack with others but the
/// hardware never needs more than a few.
const MAX_RANGE_OFFSETS: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "swath7k", version, about = "Batch preprocessor for 7k multibeam telemetry")]
struct Args {
    /// Telemetry file to read.
    #[arg(long, short = 'i')]
    input: PathBuf,

    /// Rewritten telemetry file to produce.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Rewrite bathymetry timestamps onto the towed instrument's clock.
    #[arg(long)]
    fix_timestamps: bool,

    /// Sonar lever arm relative to the depth sensor, meters (X along, Y
    /// across).
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    sonar_depth_offset: Option<Vec<f64>>,

    /// Travel-time correction START,END,SECS added to beams START..=END.
    #[arg(long, value_parser = parse_range_offset)]
    range_offset: Vec<RangeOffset>,

    /// Constant lag of the sensor clocks behind the sonar clock, seconds.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    time_lag: f64,

    /// Skip sidescan reconstruction from the snippet records.
    #[arg(long)]
    no_sidescan: bool,

    /// Print the clock reconciliation table instead of rewriting the file.
    #[arg(long)]
    timestamps: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_range_offset(s: &str) -> Result<RangeOffset, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected START,END,SECS, got {s:?}"));
    }
    let start_beam: usize = parts[0]
        .trim()
        .parse()
        .map_err(|e| format!("bad start beam: {e}"))?;
    let end_beam: usize = parts[1]
        .trim()
        .parse()
        .map_err(|e| format!("bad end beam: {e}"))?;
    let offset_secs: f64 = parts[2]
        .trim()
        .parse()
        .map_err(|e| format!("bad offset: {e}"))?;
    if end_beam < start_beam {
        return Err(format!("beam span {start_beam}..{end_beam} is inverted"));
    }
    Ok(RangeOffset {
        start_beam,
        end_beam,
        offset_secs,
    })
}

fn print_summary(summary: &RunSummary) {
    println!("records read         {}", summary.records_read);
    println!("records written      {}", summary.records_written);
    println!("  bathymetry         {}", summary.bathymetry);
    println!("  backscatter        {}", summary.backscatter);
    println!("  snippets           {}", summary.beam_data);
    println!("  towed sidescan     {}", summary.sidescan_records);
    println!("  sub-bottom         {}", summary.subbottom);
    println!("  vehicle frames     {}", summary.vehicle_frames);
    println!("  ancillary          {}", summary.ancillary);
    println!("  unmodeled          {}", summary.opaque);
    println!("decode failures      {}", summary.decode_failures);
    println!("pings resolved       {}", summary.pings_resolved);
    println!("pings degraded       {}", summary.pings_degraded);
    println!("pings dropped        {}", summary.pings_dropped);
    println!("timestamps fixed     {}", summary.timestamps_fixed);
    println!("sidescan rows        {}", summary.sidescan_rows);
    println!("sensor samples dropped {}", summary.sensor_samples_dropped);
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.range_offset.len() > MAX_RANGE_OFFSETS {
        bail!("at most {MAX_RANGE_OFFSETS} --range-offset corrections are supported");
    }
    let sonar_depth_offset = match &args.sonar_depth_offset {
        Some(v) => (v[0], v[1]),
        None => (0.0, 0.0),
    };

    let config = PreprocessConfig {
        fix_timestamps: args.fix_timestamps,
        resolve: ResolveConfig {
            time_lag: args.time_lag,
            sonar_depth_offset,
            range_offsets: args.range_offset.clone(),
        },
        sidescan: if args.no_sidescan {
            None
        } else {
            Some(SidescanConfig::default())
        },
    };
    let preprocessor = Preprocessor::new(config);

    if args.timestamps {
        let (_, mut table, summary) = preprocessor.scan(&args.input)?;
        table
            .finalize()
            .context("reconciling bathymetry and sidescan clocks")?;
        println!("clock reconciliation for {}:", args.input.display());
        for e in table.entries() {
            println!(
                "ping {:>8}  raw {:17.6}  offset {:+10.6}  pings {:+4}  {}",
                e.ping_number,
                e.raw_time,
                e.time_offset,
                e.ping_offset,
                if e.measured { "measured" } else { "interpolated" }
            );
        }
        println!(
            "{} pings, {} records read",
            table.len(),
            summary.records_read
        );
        return Ok(());
    }

    let output = match args.output {
        Some(p) => p,
        None => bail!("--output is required unless --timestamps is given"),
    };
    let summary = preprocessor.run(&args.input, &output)?;
    print_summary(&summary);
    Ok(())
}
