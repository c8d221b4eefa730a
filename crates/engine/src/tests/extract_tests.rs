use crate::*;
use codec::sonar::{Bathymetry, SonarSettings};
use ping::{BeamClass, DetectClass, ResolvedBeam, ResolvedPing};

fn resolved_ping() -> ResolvedPing {
    let beam = |class, depth, across| ResolvedBeam {
        class,
        quality: 0x3F,
        range_secs: 0.1,
        depth,
        acrosstrack: across,
        alongtrack: 0.0,
        pointing_angle: 0.0,
        azimuth_angle: 0.0,
    };
    ResolvedPing {
        ping_number: 7,
        multi_ping: 0,
        time_d: 1000.0,
        longitude: -2.1,
        latitude: 0.6,
        heading: 1.0,
        speed: 1.5,
        sonar_depth: 100.0,
        altitude: 42.0,
        roll: 0.0,
        pitch: 0.0,
        heave: 0.0,
        sound_speed: 1500.0,
        beams: vec![
            beam(BeamClass::Good, 175.0, -20.0),
            beam(BeamClass::Flagged, 180.0, 20.0),
        ],
    }
}

#[test]
fn swath_writes_back_into_the_processed_block() {
    let swath = extract(&resolved_ping(), None);
    assert_eq!(swath.beams.len(), 2);
    assert_eq!(swath.sonar_depth, 100.0);

    let mut bath = Bathymetry {
        ping_number: 7,
        range: vec![0.1, 0.1],
        quality: vec![0x5F, 0x1F],
        intensity: vec![0.0, 0.0],
        ..Default::default()
    };
    insert(&swath, &mut bath);

    let p = bath.processed.as_ref().unwrap();
    assert_eq!(p.depth, vec![175.0, 180.0]);
    assert_eq!(p.acrosstrack, vec![-20.0, 20.0]);
    assert_eq!(p.latitude, 0.6);
    assert_eq!(p.vehicle_height, -100.0);
    // Good clears filter flags, flagged sets the operator bit.
    assert_eq!(bath.quality[0], 0x1F);
    assert_eq!(bath.quality[1], 0x9F);
}

#[test]
fn detects_reads_the_validity_bits() {
    let bath = Bathymetry {
        range: vec![0.1; 3],
        quality: vec![0x2F, 0x1F, 0x03],
        intensity: vec![0.0; 3],
        ..Default::default()
    };
    assert_eq!(
        detects(&bath),
        vec![DetectClass::Phase, DetectClass::Amplitude, DetectClass::Unknown]
    );
}

#[test]
fn gains_come_from_the_settings_record() {
    let g = gains(&SonarSettings {
        power_selection: 190.0,
        pulse_width: 0.000_06,
        gain_selection: 30.0,
        ..Default::default()
    });
    assert_eq!(g.transmit_gain, 190.0);
    assert!((g.pulse_length - 0.000_06).abs() < 1e-12);
    assert_eq!(g.receive_gain, 30.0);
}

#[test]
fn svp_extracts_as_pairs() {
    let svp = insert_svp(&[(0.0, 1500.0), (10.0, 1495.5)]);
    assert_eq!(svp.depth, vec![0.0, 10.0]);
    assert_eq!(svp.sound_velocity, vec![1500.0, 1495.5]);
    assert_eq!(extract_svp(&svp), vec![(0.0, 1500.0), (10.0, 1495.5)]);
}

#[test]
fn segy_trace_roundtrips_through_the_record() {
    let trace = SegyTrace {
        sequence_number: 12,
        ping_number: 7,
        sample_interval_ns: 20_000,
        samples: vec![0, 100, -100, 32000],
    };
    let record = insert_segy_trace(&trace);
    assert_eq!(record.channel.number_samples, 4);
    assert_eq!(record.trace_header.samples, 4);
    assert_eq!(extract_segy_trace(&record), trace);
}
