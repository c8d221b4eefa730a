use crate::*;
use anyhow::Result;
use codec::{RecordBody, Timestamp};
use tempfile::tempdir;

use super::helpers::*;

// Mid-February 2006, inside the later quality era.
const T0: f64 = 1_140_000_000.0;

/// Three nadir pings with a towed sidescan record 1.5 s ahead of each, so
/// every ping pairs and the clock offset is a constant 1.5.
fn standard_input() -> Vec<codec::Record> {
    let mut records = vec![
        nav_record(&[T0 - 10.0, T0 + 30.0], 100.0),
        settings_record(1, T0),
        geometry_record(4, T0),
    ];
    for i in 0..3u32 {
        let t = T0 + i as f64;
        records.push(sidescan_record(10 + i as i32, t + 1.5));
        records.push(bathymetry_record(1 + i, t, 4));
        records.push(beam_data_record(1 + i, t, 4));
    }
    records
}

#[test]
fn pipeline_fixes_timestamps_and_resolves_pings() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.s7k");
    let output = dir.path().join("out.s7k");
    write_records(&input, &standard_input());

    let pre = Preprocessor::new(PreprocessConfig {
        fix_timestamps: true,
        sidescan: Some(Default::default()),
        ..Default::default()
    });
    let summary = pre.run(&input, &output)?;

    assert_eq!(summary.bathymetry, 3);
    assert_eq!(summary.timestamps_fixed, 3);
    assert_eq!(summary.pings_resolved, 3);
    assert_eq!(summary.pings_dropped, 0);
    assert_eq!(summary.records_written, summary.records_read);
    assert_eq!(summary.sidescan_rows, 3);

    let out = read_records(&output);
    let baths: Vec<_> = out
        .iter()
        .filter(|r| matches!(r.body, RecordBody::Bathymetry(_)))
        .collect();
    assert_eq!(baths.len(), 3);
    for (i, rec) in baths.iter().enumerate() {
        let raw = T0 + i as f64;
        assert!(
            (rec.time_d() - (raw + 1.5)).abs() < 0.01,
            "ping {i} header time {} not shifted to towed clock",
            rec.time_d()
        );
        if let RecordBody::Bathymetry(b) = &rec.body {
            let p = b.processed.as_ref().expect("processed block written");
            // 0.1 s two-way at 1500 m/s is 75 m slant, plus 100 m of
            // sensor depth.
            assert!((p.depth[0] - 175.0).abs() < 0.5);
            assert!(p.acrosstrack[0].abs() < 0.5);
        }
    }
    Ok(())
}

#[test]
fn quality_bytes_are_remapped_to_current_era() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.s7k");
    let output = dir.path().join("out.s7k");

    let mut records = standard_input();
    if let RecordBody::Bathymetry(b) = &mut records[4].body {
        // Old-era "good amplitude detect" code on one beam.
        b.quality[2] = 4;
    } else {
        panic!("record 4 is the first bathymetry");
    }
    write_records(&input, &records);

    let pre = Preprocessor::new(PreprocessConfig::default());
    pre.run(&input, &output)?;

    let out = read_records(&output);
    let first = out
        .iter()
        .find_map(|r| match &r.body {
            RecordBody::Bathymetry(b) => Some(b),
            _ => None,
        })
        .expect("bathymetry survives");
    assert_eq!(first.quality[2], 0x2F);
    assert_eq!(first.quality[0], 0x3F);
    Ok(())
}

#[test]
fn range_offsets_are_written_back_into_the_records() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.s7k");
    let output = dir.path().join("out.s7k");
    write_records(&input, &standard_input());

    let pre = Preprocessor::new(PreprocessConfig {
        resolve: ping::ResolveConfig {
            range_offsets: vec![ping::RangeOffset {
                start_beam: 0,
                end_beam: 1,
                offset_secs: 0.01,
            }],
            ..Default::default()
        },
        ..Default::default()
    });
    let summary = pre.run(&input, &output)?;
    assert_eq!(summary.pings_resolved, 3);

    let out = read_records(&output);
    for rec in &out {
        if let RecordBody::Bathymetry(b) = &rec.body {
            // Offset beams carry the corrected two-way time; the rest
            // keep the measured 0.1 s.
            assert!((b.range[0] - 0.11).abs() < 1e-6);
            assert!((b.range[1] - 0.11).abs() < 1e-6);
            assert!((b.range[2] - 0.1).abs() < 1e-6);
            assert!((b.range[3] - 0.1).abs() < 1e-6);
        }
    }
    Ok(())
}

#[test]
fn ping_outside_sensor_coverage_is_dropped() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.s7k");
    let output = dir.path().join("out.s7k");

    let mut records = standard_input();
    // A straggler ping far past the navigation window.
    records.push(bathymetry_record(9, T0 + 300.0, 4));
    write_records(&input, &records);

    let pre = Preprocessor::new(PreprocessConfig::default());
    let summary = pre.run(&input, &output)?;
    assert_eq!(summary.pings_resolved, 3);
    assert_eq!(summary.pings_dropped, 1);

    let out = read_records(&output);
    assert!(out.iter().all(|r| match &r.body {
        RecordBody::Bathymetry(b) => b.ping_number != 9,
        _ => true,
    }));
    Ok(())
}

#[test]
fn timestamp_fix_without_any_pairing_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.s7k");
    let output = dir.path().join("out.s7k");

    let records: Vec<_> = standard_input()
        .into_iter()
        .filter(|r| !matches!(r.body, RecordBody::TowedSidescan(_)))
        .collect();
    write_records(&input, &records);

    let pre = Preprocessor::new(PreprocessConfig {
        fix_timestamps: true,
        ..Default::default()
    });
    assert!(pre.run(&input, &output).is_err());
}

#[test]
fn unmodeled_records_pass_through_verbatim() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.s7k");
    let output = dir.path().join("out.s7k");

    let mut records = standard_input();
    let mut opaque = codec::Record::new(
        RecordBody::Opaque(vec![0xAB; 16]),
        Timestamp::from_epoch_seconds(T0),
    );
    opaque.header.record_type = 7022;
    records.insert(1, opaque);
    write_records(&input, &records);

    let pre = Preprocessor::new(PreprocessConfig::default());
    pre.run(&input, &output)?;

    let out = read_records(&output);
    let carried = out
        .iter()
        .find(|r| r.header.record_type == 7022)
        .expect("unmodeled record kept");
    assert_eq!(carried.body, RecordBody::Opaque(vec![0xAB; 16]));
    Ok(())
}

#[test]
fn scan_builds_the_timestamp_table() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("in.s7k");
    write_records(&input, &standard_input());

    let pre = Preprocessor::new(PreprocessConfig::default());
    let (store, table, summary) = pre.scan(&input)?;

    assert_eq!(summary.records_read, 12);
    assert_eq!(summary.decode_failures, 0);
    assert_eq!(table.len(), 3);
    for entry in table.entries() {
        assert!(entry.measured);
        assert!((entry.time_offset - 1.5).abs() < 0.01);
    }
    assert!(store.longitude.len() >= 2);
    assert!(store.heading.len() >= 2);
    Ok(())
}
