// Scales, pitch arithmetic and chord spelling.
//
// Pitches are MIDI note numbers (C4 = 60) held as `i32` so voice-leading
// arithmetic can go negative transiently. Pitch classes are `u8` in 0..12
// with 0 = C.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::random::{chance, unit};

pub type Pitch = i32;

/// Rotation of the circle of fifths assigned to 30 degree hue sectors.
/// Neighbouring hues land on fifth-related keys rather than chromatic ones.
pub const CIRCLE_OF_FIFTHS: [u8; 12] = [0, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10, 5];

/// Above this edge tension a chord may pick up an extra color tone.
pub const EXTENSION_THRESHOLD: f32 = 0.55;

/// Scale the key and chord degrees are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleMode {
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    HarmonicMinor,
    PentatonicMajor,
    PentatonicMinor,
}

impl ScaleMode {
    pub const ALL: [ScaleMode; 9] = [
        ScaleMode::Ionian,
        ScaleMode::Dorian,
        ScaleMode::Phrygian,
        ScaleMode::Lydian,
        ScaleMode::Mixolydian,
        ScaleMode::Aeolian,
        ScaleMode::HarmonicMinor,
        ScaleMode::PentatonicMajor,
        ScaleMode::PentatonicMinor,
    ];

    /// Semitone offsets of each degree above the key.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleMode::Ionian => &[0, 2, 4, 5, 7, 9, 11],
            ScaleMode::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleMode::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleMode::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleMode::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleMode::Aeolian => &[0, 2, 3, 5, 7, 8, 10],
            ScaleMode::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            ScaleMode::PentatonicMajor => &[0, 2, 4, 7, 9],
            ScaleMode::PentatonicMinor => &[0, 3, 5, 7, 10],
        }
    }

    pub fn degree_count(self) -> usize {
        self.intervals().len()
    }

    /// Pitch classes of the scale built on `key`, in degree order.
    pub fn pitch_classes(self, key: u8) -> Vec<u8> {
        self.intervals().iter().map(|iv| (key + iv) % 12).collect()
    }
}

/// Interval recipe applied to a scale degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChordColor {
    Triad,
    Seventh,
    Add9,
    Sus2,
    Sus4,
}

pub fn hue_to_pitch_class(hue_degrees: f32) -> u8 {
    let sector = ((hue_degrees % 360.0) / 30.0 + 0.5).floor() as i32;
    CIRCLE_OF_FIFTHS[sector.rem_euclid(12) as usize]
}

/// MIDI pitch of a pitch class in an octave, where octave 4 holds middle C.
pub fn midi(pitch_class: u8, octave: i32) -> Pitch {
    12 * (octave + 1) + Pitch::from(pitch_class % 12)
}

pub fn pitch_class(pitch: Pitch) -> u8 {
    pitch.rem_euclid(12) as u8
}

/// Shortest signed distance between pitch classes, in `[-6, 5]`.
pub fn circular_distance(from: u8, to: u8) -> i32 {
    (i32::from(to) - i32::from(from) + 18).rem_euclid(12) - 6
}

/// The pitch carrying `pc` that lies closest to `anchor`.
pub fn nearest_with_pitch_class(anchor: Pitch, pc: u8) -> Pitch {
    anchor + circular_distance(pitch_class(anchor), pc % 12)
}

/// Unique pitch classes of a voiced chord, in voice order.
pub fn unique_pitch_classes(pitches: &[Pitch]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pitches.len());
    for &p in pitches {
        let pc = pitch_class(p);
        if !out.contains(&pc) {
            out.push(pc);
        }
    }
    out
}

/// Spells the chord on `degree` without any random extension.
pub fn base_chord(key: u8, mode: ScaleMode, degree: usize, color: ChordColor) -> Vec<u8> {
    let tone = |step: usize| scale_tone(key, mode, degree, step);
    let (root, second, third, fourth, fifth, seventh) =
        (tone(0), tone(1), tone(2), tone(3), tone(4), tone(6));

    let pcs = match color {
        ChordColor::Triad => vec![root, third, fifth],
        ChordColor::Seventh => vec![root, third, fifth, seventh],
        ChordColor::Add9 => vec![root, third, fifth, second],
        ChordColor::Sus2 => vec![root, second, fifth],
        ChordColor::Sus4 => vec![root, fourth, fifth],
    };
    dedup_in_order(pcs)
}

/// Spells the chord on `degree`, adding a scale 4th or 6th now and then when
/// `edge_tension` is above [`EXTENSION_THRESHOLD`].
pub fn chord_pitch_classes<R: Rng + ?Sized>(
    key: u8,
    mode: ScaleMode,
    degree: usize,
    color: ChordColor,
    edge_tension: f32,
    rng: &mut R,
) -> Vec<u8> {
    let mut pcs = base_chord(key, mode, degree, color);

    if edge_tension > EXTENSION_THRESHOLD
        && chance(rng, (edge_tension - EXTENSION_THRESHOLD) * 0.35)
    {
        let extra = if unit(rng) < 0.6 {
            scale_tone(key, mode, degree, 3)
        } else {
            scale_tone(key, mode, degree, 5)
        };
        if !pcs.contains(&extra) {
            pcs.push(extra);
        }
    }
    pcs
}

/// Pitch class `step` scale positions above `degree` (0 = root, 2 = third).
fn scale_tone(key: u8, mode: ScaleMode, degree: usize, step: usize) -> u8 {
    let intervals = mode.intervals();
    let n = intervals.len();
    (key + intervals[(degree % n + step) % n]) % 12
}

fn dedup_in_order(pcs: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(pcs.len());
    for pc in pcs {
        if !out.contains(&pc) {
            out.push(pc);
        }
    }
    out
}
