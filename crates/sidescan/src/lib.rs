//! Pseudo-sidescan reconstruction from per-beam snippet samples.
//!
//! Each snippet record carries a window of raw amplitude samples around
//! every beam's bottom detection. Laying those samples out along the
//! across-track axis at a common pixel size produces a sidescan-like image
//! row per ping. The pixel size adapts to the terrain: wide enough that the
//! swath fits the pixel budget, never finer than what the outermost grazing
//! geometry can support, and rate-limited between pings so the image does
//! not flicker.

use codec::sonar::BeamData;
use log::debug;
use ping::{BeamClass, ResolvedPing};

/// Tuning for the reconstruction.
#[derive(Debug, Clone)]
pub struct SidescanConfig {
    /// Across-track pixel count of every output row.
    pub pixels: usize,
    /// Half of the angular swath the pixel budget must span, radians.
    pub half_angle: f64,
    /// Grazing-angle floor used to clamp the pixel size, radians.
    pub min_grazing: f64,
    /// Receiver beamwidth used for footprint estimates, radians.
    pub beamwidth: f64,
    /// Longest run of empty pixels that gap interpolation may fill.
    pub max_interp_gap: usize,
}

impl Default for SidescanConfig {
    fn default() -> Self {
        SidescanConfig {
            pixels: 1024,
            half_angle: 60.0_f64.to_radians(),
            min_grazing: 0.1_f64.to_radians(),
            beamwidth: 2.5_f64.to_radians(),
            max_interp_gap: 10,
        }
    }
}

/// One reconstructed image row.
#[derive(Debug, Clone, PartialEq)]
pub struct SidescanRow {
    pub time_d: f64,
    /// Across-track meters per pixel used for this row.
    pub pixel_size: f64,
    /// Mean amplitude per across-track bin; `None` where nothing mapped.
    pub amplitude: Vec<Option<f32>>,
    /// Mean alongtrack offset of the samples in each occupied bin, meters.
    pub alongtrack: Vec<f32>,
}

impl SidescanRow {
    fn empty(time_d: f64, pixel_size: f64, pixels: usize) -> Self {
        SidescanRow {
            time_d,
            pixel_size,
            amplitude: vec![None; pixels],
            alongtrack: vec![0.0; pixels],
        }
    }

    pub fn occupied(&self) -> usize {
        self.amplitude.iter().filter(|a| a.is_some()).count()
    }
}

/// Per-file reconstruction state: the smoothed pixel size survives across
/// pings.
#[derive(Debug)]
pub struct Reconstructor {
    config: SidescanConfig,
    pixel_size: f64,
}

impl Reconstructor {
    pub fn new(config: SidescanConfig) -> Self {
        Reconstructor {
            config,
            pixel_size: 0.0,
        }
    }

    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Median height of the good soundings above the sensor track, i.e.
    /// the water column the swath geometry is built on.
    fn median_good_height(ping: &ResolvedPing) -> Option<f64> {
        let mut heights: Vec<f64> = ping
            .beams
            .iter()
            .filter(|b| b.class == BeamClass::Good)
            .map(|b| b.depth - ping.sonar_depth)
            .filter(|&h| h > 0.0)
            .collect();
        if heights.is_empty() {
            return None;
        }
        heights.sort_by(|a, b| a.partial_cmp(b).expect("depths are finite"));
        Some(heights[heights.len() / 2])
    }

    /// Picks the pixel size for this ping: the swath-filling value clamped
    /// by the grazing floor, then rate-limited to 5% movement per ping.
    /// The first ping's computed value is taken as-is.
    fn update_pixel_size(&mut self, median_height: f64) -> f64 {
        let cfg = &self.config;
        let mut calc = 2.0 * cfg.half_angle.tan() * median_height / cfg.pixels as f64;
        calc = calc.max(median_height * cfg.min_grazing.sin());
        if self.pixel_size <= 0.0 {
            self.pixel_size = calc;
        } else if calc < 0.95 * self.pixel_size {
            self.pixel_size *= 0.95;
        } else if calc > 1.05 * self.pixel_size {
            self.pixel_size *= 1.05;
        } else {
            self.pixel_size = calc;
        }
        self.pixel_size
    }

    /// Builds one image row. Beams without a good detection or without a
    /// snippet contribute nothing; a ping with no usable beam yields an
    /// empty row.
    pub fn reconstruct(
        &mut self,
        ping: &ResolvedPing,
        beam_data: &BeamData,
        sample_rate: f64,
    ) -> SidescanRow {
        let pixels = self.config.pixels;
        let median_height = match Self::median_good_height(ping) {
            Some(h) => h,
            None => {
                debug!("ping {}: no good beams, empty sidescan row", ping.ping_number);
                return SidescanRow::empty(ping.time_d, self.pixel_size, pixels);
            }
        };
        let pixel_size = self.update_pixel_size(median_height);

        // Raw sample spacing from the receiver clock.
        let ss_spacing = if sample_rate > 0.0 {
            0.5 * ping.sound_speed / sample_rate
        } else {
            0.0
        };

        let mut sum = vec![0.0f64; pixels];
        let mut along = vec![0.0f64; pixels];
        let mut count = vec![0u32; pixels];

        for snippet in &beam_data.snippets {
            let i = snippet.beam_number as usize;
            let beam = match ping.beams.get(i) {
                Some(b) if b.class == BeamClass::Good => b,
                _ => continue,
            };
            let nsamples = snippet.amplitude.len();
            if nsamples == 0 {
                continue;
            }
            let height = (beam.depth - ping.sonar_depth).max(0.01);
            let slant = (height * height + beam.acrosstrack * beam.acrosstrack).sqrt();
            // Angle of the beam from vertical at the seafloor.
            let angle = beam.acrosstrack.atan2(height);
            let beam_foot = slant * self.config.beamwidth.sin() / angle.cos().abs().max(1e-6);
            let sint = angle.sin().abs();
            // Spread the snippet over the beam footprint unless the raw
            // sample spacing already covers more ground.
            let spacing = if sint < nsamples as f64 * ss_spacing / beam_foot {
                beam_foot / nsamples as f64
            } else {
                ss_spacing / sint.max(1e-6)
            };
            let spacing = if beam.acrosstrack < 0.0 { -spacing } else { spacing };

            let center = (nsamples as f64 - 1.0) / 2.0;
            for (j, &amp) in snippet.amplitude.iter().enumerate() {
                let xtrack = beam.acrosstrack + spacing * (j as f64 - center);
                let bin = (pixels as f64 / 2.0 + xtrack / pixel_size).round();
                if bin < 0.0 || bin >= pixels as f64 {
                    continue;
                }
                let bin = bin as usize;
                sum[bin] += amp as f64;
                along[bin] += beam.alongtrack;
                count[bin] += 1;
            }
        }

        let mut row = SidescanRow::empty(ping.time_d, pixel_size, pixels);
        for i in 0..pixels {
            if count[i] > 0 {
                row.amplitude[i] = Some((sum[i] / count[i] as f64) as f32);
                row.alongtrack[i] = (along[i] / count[i] as f64) as f32;
            }
        }
        interpolate_gaps(&mut row, self.config.max_interp_gap);
        row
    }
}

/// Fills empty pixel runs bracketed by occupied pixels, linearly, when the
/// run is no longer than `max_gap`. Runs touching the row edges stay empty.
fn interpolate_gaps(row: &mut SidescanRow, max_gap: usize) {
    if max_gap == 0 {
        return;
    }
    let n = row.amplitude.len();
    let mut left: Option<usize> = None;
    let mut i = 0;
    while i < n {
        if row.amplitude[i].is_some() {
            left = Some(i);
            i += 1;
            continue;
        }
        // Scan the vacancy run.
        let start = i;
        while i < n && row.amplitude[i].is_none() {
            i += 1;
        }
        let (l, r) = match (left, if i < n { Some(i) } else { None }) {
            (Some(l), Some(r)) => (l, r),
            _ => continue,
        };
        let gap = r - l - 1;
        if gap > max_gap {
            continue;
        }
        let a0 = row.amplitude[l].expect("left edge occupied") as f64;
        let a1 = row.amplitude[r].expect("right edge occupied") as f64;
        let g0 = row.alongtrack[l] as f64;
        let g1 = row.alongtrack[r] as f64;
        for k in (start..r).filter(|&k| k > l) {
            let frac = (k - l) as f64 / (r - l) as f64;
            row.amplitude[k] = Some((a0 + frac * (a1 - a0)) as f32);
            row.alongtrack[k] = (g0 + frac * (g1 - g0)) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec::sonar::Snippet;
    use ping::{BeamClass, ResolvedBeam, ResolvedPing};

    fn beam(acrosstrack: f64, depth: f64, class: BeamClass) -> ResolvedBeam {
        ResolvedBeam {
            class,
            quality: if class == BeamClass::Good { 0x2F } else { 0 },
            range_secs: 0.1,
            depth,
            acrosstrack,
            alongtrack: 0.0,
            pointing_angle: 0.0,
            azimuth_angle: 0.0,
        }
    }

    fn ping_with(beams: Vec<ResolvedBeam>) -> ResolvedPing {
        ResolvedPing {
            ping_number: 1,
            multi_ping: 0,
            time_d: 100.0,
            longitude: 0.0,
            latitude: 0.0,
            heading: 0.0,
            speed: 0.0,
            sonar_depth: 0.0,
            altitude: 50.0,
            roll: 0.0,
            pitch: 0.0,
            heave: 0.0,
            sound_speed: 1500.0,
            beams,
        }
    }

    fn snippet(beam_number: u16, amplitude: Vec<u16>) -> Snippet {
        let n = amplitude.len() as u32;
        Snippet {
            beam_number,
            begin_sample: 100,
            end_sample: 100 + n - 1,
            amplitude,
            phase: vec![],
        }
    }

    fn beam_data(snippets: Vec<Snippet>) -> BeamData {
        BeamData {
            ping_number: 1,
            sample_type: 0x0002,
            snippets,
            ..Default::default()
        }
    }

    #[test]
    fn no_good_beams_yields_empty_row() {
        let mut r = Reconstructor::new(SidescanConfig::default());
        let ping = ping_with(vec![beam(0.0, 50.0, BeamClass::Null)]);
        let row = r.reconstruct(&ping, &beam_data(vec![snippet(0, vec![5])]), 10000.0);
        assert_eq!(row.occupied(), 0);
    }

    #[test]
    fn single_sample_lands_at_beam_position() {
        let cfg = SidescanConfig {
            max_interp_gap: 0,
            ..Default::default()
        };
        let pixels = cfg.pixels;
        let mut r = Reconstructor::new(cfg);
        let ping = ping_with(vec![beam(0.0, 50.0, BeamClass::Good)]);
        let row = r.reconstruct(&ping, &beam_data(vec![snippet(0, vec![42])]), 10000.0);
        assert_eq!(row.occupied(), 1);
        assert_eq!(row.amplitude[pixels / 2], Some(42.0));
    }

    #[test]
    fn pixel_size_moves_at_most_five_percent() {
        let mut r = Reconstructor::new(SidescanConfig::default());
        let ping = ping_with(vec![beam(0.0, 50.0, BeamClass::Good)]);
        r.reconstruct(&ping, &beam_data(vec![snippet(0, vec![1])]), 10000.0);
        let first = r.pixel_size();
        assert!(first > 0.0);

        // Twice the depth wants twice the pixel size, but gets only +5%.
        let deeper = ping_with(vec![beam(0.0, 100.0, BeamClass::Good)]);
        r.reconstruct(&deeper, &beam_data(vec![snippet(0, vec![1])]), 10000.0);
        assert!((r.pixel_size() - 1.05 * first).abs() < 1e-12);
    }

    #[test]
    fn short_gaps_interpolate_long_gaps_stay_null() {
        let mut row = SidescanRow::empty(0.0, 1.0, 16);
        row.amplitude[2] = Some(10.0);
        row.amplitude[5] = Some(40.0); // gap of 2
        row.amplitude[12] = Some(100.0); // gap of 6
        interpolate_gaps(&mut row, 3);
        assert_eq!(row.amplitude[3], Some(20.0));
        assert_eq!(row.amplitude[4], Some(30.0));
        assert_eq!(row.amplitude[8], None);
        // Edges never interpolate.
        assert_eq!(row.amplitude[0], None);
        assert_eq!(row.amplitude[15], None);
    }

    #[test]
    fn port_and_starboard_separate() {
        let cfg = SidescanConfig {
            max_interp_gap: 0,
            ..Default::default()
        };
        let pixels = cfg.pixels;
        let mut r = Reconstructor::new(cfg);
        let ping = ping_with(vec![
            beam(-40.0, 50.0, BeamClass::Good),
            beam(40.0, 50.0, BeamClass::Good),
        ]);
        let row = r.reconstruct(
            &ping,
            &beam_data(vec![snippet(0, vec![10]), snippet(1, vec![20])]),
            10000.0,
        );
        let port: Vec<usize> = (0..pixels / 2).filter(|&i| row.amplitude[i].is_some()).collect();
        let stbd: Vec<usize> = (pixels / 2..pixels)
            .filter(|&i| row.amplitude[i].is_some())
            .collect();
        assert_eq!(port.len(), 1);
        assert_eq!(stbd.len(), 1);
        assert_eq!(row.amplitude[port[0]], Some(10.0));
        assert_eq!(row.amplitude[stbd[0]], Some(20.0));
    }
}
