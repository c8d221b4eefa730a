//! Per-beam quality byte remapping and classification.
//!
//! The quality byte changed meaning twice over the format's life. Early
//! records carry a bare 4-bit brightness/colinearity nibble; later firmware
//! moved the detection-validity flags into bits 4-5 and reserved the low
//! nibble. Remapping rewrites every era into the current layout so the rest
//! of the pipeline reads one convention:
//!
//! - bits 0-3: legacy brightness/colinearity nibble
//! - bit 4 (0x10): amplitude detect valid
//! - bit 5 (0x20): phase detect valid
//! - bit 6 (0x40): flagged by automatic filter
//! - bit 7 (0x80): flagged by operator

/// Travel times at or below this are treated as no-detection when widening
/// pre-v5 quality nibbles (7 ms of two-way time).
const NOISE_FLOOR_SECS: f32 = 0.007;

/// Rewrites a raw quality byte into the current-era layout. The record
/// version and header year select the era; current-era bytes pass through
/// unchanged, so the remap is idempotent.
pub fn remap_quality(raw: u8, range_secs: f32, record_version: u16, year: u16) -> u8 {
    if record_version < 5 {
        if raw < 16 {
            if range_secs > NOISE_FLOOR_SECS {
                (raw & 0xF0) | 0x0F
            } else {
                (raw & 0xF0) | 0x03
            }
        } else {
            raw
        }
    } else if record_version == 5 && year < 2006 {
        match raw {
            8 => 0x2F,
            4 => 0x1F,
            _ => raw,
        }
    } else if record_version == 5 {
        match raw {
            4 => 0x2F,
            2 => 0x1F,
            _ => raw,
        }
    } else {
        raw
    }
}

/// What a (remapped) quality byte says about a beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamClass {
    /// No detection at all.
    Null,
    /// Valid detection, not flagged.
    Good,
    /// Detection exists but is flagged out.
    Flagged,
}

/// Classifies a remapped quality byte. Override bits win over validity
/// bits: a flagged beam stays flagged however it was detected.
pub fn classify(quality: u8) -> BeamClass {
    if quality == 0 {
        BeamClass::Null
    } else if quality & 0xC0 != 0 {
        BeamClass::Flagged
    } else if quality & 0x30 != 0 {
        BeamClass::Good
    } else {
        BeamClass::Flagged
    }
}

/// Whether the detection is usable for geometry at all (any low-nibble
/// evidence), matching the raw-record convention.
pub fn has_detection(quality: u8) -> bool {
    quality & 0x0F != 0
}

/// Detection method recoverable from bits 4-5 of a current-era byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectClass {
    Amplitude,
    Phase,
    Unknown,
}

pub fn detect_class(quality: u8) -> DetectClass {
    if quality & 0x20 != 0 {
        DetectClass::Phase
    } else if quality & 0x10 != 0 {
        DetectClass::Amplitude
    } else {
        DetectClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_v5_widens_by_range() {
        assert_eq!(remap_quality(0x03, 0.1, 4, 2004), 0x0F);
        assert_eq!(remap_quality(0x03, 0.001, 4, 2004), 0x03);
        // High-nibble values are already current-era.
        assert_eq!(remap_quality(0x2F, 0.1, 4, 2004), 0x2F);
    }

    #[test]
    fn v5_eras_split_at_2006() {
        assert_eq!(remap_quality(8, 0.1, 5, 2005), 0x2F);
        assert_eq!(remap_quality(4, 0.1, 5, 2005), 0x1F);
        assert_eq!(remap_quality(4, 0.1, 5, 2006), 0x2F);
        assert_eq!(remap_quality(2, 0.1, 5, 2007), 0x1F);
    }

    #[test]
    fn current_era_is_idempotent() {
        for q in [0x00u8, 0x1F, 0x2F, 0x4F, 0x8F, 0xC0] {
            let once = remap_quality(q, 0.1, 5, 2007);
            assert_eq!(remap_quality(once, 0.1, 5, 2007), once);
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify(0x00), BeamClass::Null);
        assert_eq!(classify(0xC0), BeamClass::Flagged);
        assert_eq!(classify(0x10), BeamClass::Good);
        assert_eq!(classify(0x2F), BeamClass::Good);
        assert_eq!(classify(0x4F), BeamClass::Flagged);
        assert_eq!(classify(0x8F), BeamClass::Flagged);
        // Detection evidence without validity bits stays suspect.
        assert_eq!(classify(0x03), BeamClass::Flagged);
    }

    #[test]
    fn detect_classes_from_validity_bits() {
        assert_eq!(detect_class(0x2F), DetectClass::Phase);
        assert_eq!(detect_class(0x1F), DetectClass::Amplitude);
        assert_eq!(detect_class(0x0F), DetectClass::Unknown);
    }
}
