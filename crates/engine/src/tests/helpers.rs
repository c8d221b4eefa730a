use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use codec::fsdw::{SidescanHeader, TowedChannel, TowedSidescan};
use codec::sonar::{Bathymetry, BeamData, BeamGeometry, Snippet, SonarSettings};
use codec::vehicle::{VehicleFrameData, VehicleFrames, VehicleNav};
use codec::{Record, RecordBody, RecordReader, RecordWriter, Timestamp};

pub fn at(time_d: f64) -> Timestamp {
    Timestamp::from_epoch_seconds(time_d)
}

/// Vehicle nav record covering `times`, flying level at `depth` meters.
pub fn nav_record(times: &[f64], depth: f64) -> Record {
    let frames = times
        .iter()
        .map(|&t| VehicleNav {
            time: at(t),
            latitude: 0.6,
            longitude: -2.1,
            speed: 1.5,
            depth,
            altitude: 42.0,
            roll: 0.0,
            pitch: 0.0,
            yaw: 1.0,
            ..Default::default()
        })
        .collect();
    Record::new(
        RecordBody::VehicleFrames(VehicleFrames {
            msec_timestamp: 0,
            frames: VehicleFrameData::Nav(frames),
        }),
        at(times[0]),
    )
}

pub fn settings_record(ping_number: u32, time_d: f64) -> Record {
    Record::new(
        RecordBody::SonarSettings(SonarSettings {
            ping_number,
            frequency: 200_000.0,
            sample_rate: 34_000.0,
            sound_velocity: 1500.0,
            ..Default::default()
        }),
        at(time_d),
    )
}

pub fn geometry_record(nbeams: usize, time_d: f64) -> Record {
    Record::new(
        RecordBody::BeamGeometry(BeamGeometry {
            serial_number: 1,
            angle_alongtrack: vec![0.0; nbeams],
            angle_acrosstrack: vec![0.0; nbeams],
            beamwidth_alongtrack: vec![0.02; nbeams],
            beamwidth_acrosstrack: vec![0.02; nbeams],
        }),
        at(time_d),
    )
}

/// Nadir-looking bathymetry ping: 0.1 s two-way ranges, good detections.
pub fn bathymetry_record(ping_number: u32, time_d: f64, nbeams: usize) -> Record {
    let mut rec = Record::new(
        RecordBody::Bathymetry(Bathymetry {
            ping_number,
            range: vec![0.1; nbeams],
            quality: vec![0x3F; nbeams],
            intensity: vec![0.0; nbeams],
            ..Default::default()
        }),
        at(time_d),
    );
    rec.header.version = 5;
    rec
}

/// Towed sidescan record whose frame header carries the towed clock.
pub fn sidescan_record(ping_number: i32, time_d: f64) -> Record {
    Record::new(
        RecordBody::TowedSidescan(TowedSidescan {
            ping_number,
            channels: vec![TowedChannel::default(), TowedChannel::default()],
            headers: vec![SidescanHeader::default(), SidescanHeader::default()],
            ..Default::default()
        }),
        at(time_d),
    )
}

pub fn beam_data_record(ping_number: u32, time_d: f64, nbeams: usize) -> Record {
    Record::new(
        RecordBody::BeamData(BeamData {
            ping_number,
            sample_type: 0x0002,
            snippets: (0..nbeams)
                .map(|i| Snippet {
                    beam_number: i as u16,
                    begin_sample: 100,
                    end_sample: 107,
                    amplitude: vec![500; 8],
                    phase: vec![],
                })
                .collect(),
            ..Default::default()
        }),
        at(time_d),
    )
}

pub fn write_records(path: &Path, records: &[Record]) {
    let mut writer = RecordWriter::new(BufWriter::new(File::create(path).unwrap()));
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.flush().unwrap();
}

pub fn read_records(path: &Path) -> Vec<Record> {
    let mut reader = RecordReader::new(BufReader::new(File::open(path).unwrap()));
    reader
        .by_ref()
        .collect::<Result<Vec<_>, _>>()
        .expect("output file reads back clean")
}
