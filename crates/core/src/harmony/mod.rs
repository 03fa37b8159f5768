//! Key tracking, degree progression and chord voicing.
//!
//! [`HarmonyState`] is the only long-lived musical state in the generator.
//! [`advance`] mutates it once per chord tick and reports the change as a
//! [`ChordEvent`]; everything else only reads it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::FeatureSnapshot,
    config::HarmonySettings,
    math::{clamp01, lerp, round_half_up},
    random::{chance, weighted_pick},
};

mod theory;
mod voicing;

pub use theory::{
    base_chord, chord_pitch_classes, circular_distance, hue_to_pitch_class, midi,
    nearest_with_pitch_class, pitch_class, unique_pitch_classes, ChordColor, Pitch, ScaleMode,
    CIRCLE_OF_FIFTHS, EXTENSION_THRESHOLD,
};
pub use voicing::{candidate_voicings, voice_chord, voicing_cost, Register};

/// Non-adjacent jumps taken on a "surprise" tick.
const SURPRISE_JUMPS: [i32; 5] = [2, 3, 4, -2, -3];
/// Functional moves: up a fourth, up a fifth, step up, step down, up a third.
const FUNCTIONAL_MOVES: [i32; 5] = [3, 4, 1, -1, 2];
const FUNCTIONAL_WEIGHTS: [f32; 5] = [1.2, 1.0, 0.8, 0.6, 0.7];

/// Last picked pitch of each melodic layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MelodicAnchors {
    pub particle: Option<Pitch>,
    pub air: Option<Pitch>,
}

/// Persistent musical state. `key == None` is the uninitialized state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonyState {
    key: Option<u8>,
    degree: usize,
    chord: Vec<Pitch>,
    pub last_melodic: MelodicAnchors,
}

impl HarmonyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.key.is_some()
    }

    pub fn key(&self) -> Option<u8> {
        self.key
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Currently sounding chord, ascending. Empty before the first chord.
    pub fn chord(&self) -> &[Pitch] {
        &self.chord
    }

    /// Sounding chord together with the melodic anchors, borrowed apart so
    /// a layer can read one and update the other.
    pub fn melodic_view(&mut self) -> (&[Pitch], &mut MelodicAnchors) {
        (&self.chord, &mut self.last_melodic)
    }

    /// Returns to the uninitialized state, handing back the chord that was
    /// sounding so the caller can release it.
    pub fn reset(&mut self) -> Vec<Pitch> {
        let sounding = std::mem::take(&mut self.chord);
        *self = Self::default();
        sounding
    }
}

/// A chord change, scheduled at `time` on the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    pub time: f64,
    pub key: u8,
    pub degree: usize,
    pub pitches: Vec<Pitch>,
    /// Voices of the previous chord, released at the same instant.
    pub released: Vec<Pitch>,
    pub velocity: f32,
}

/// Chord register derived from brightness: returns the base octave and the
/// MIDI window voicings must fit into.
pub fn chord_register(brightness: f32, settings: &HarmonySettings) -> (i32, Register) {
    let shift = round_half_up((brightness - 0.5) * settings.octave_range_from_brightness);
    let base = settings.base_octave.saturating_add(shift).clamp(1, 6);
    let register = Register {
        low: midi(0, base - 1),
        high: midi(11, base + 3),
    };
    (base, register)
}

/// Harmonic tension in `[0, 1]` from the visual activity of the scene.
pub fn tension(snapshot: &FeatureSnapshot) -> f32 {
    clamp01(snapshot.edge * 0.7 + snapshot.motion * 0.5 + snapshot.saturation * 0.25)
}

/// Moves the key one semitone towards `target` with probability `strength`.
pub fn drift_key<R: Rng + ?Sized>(current: u8, target: u8, strength: f32, rng: &mut R) -> u8 {
    let distance = circular_distance(current, target);
    if distance != 0 && chance(rng, clamp01(strength)) {
        (i32::from(current) + distance.signum()).rem_euclid(12) as u8
    } else {
        current
    }
}

/// Picks the next scale degree.
pub fn next_degree<R: Rng + ?Sized>(
    current: usize,
    degree_count: usize,
    surprise: f32,
    tension: f32,
    rng: &mut R,
) -> usize {
    if degree_count <= 1 {
        return 0;
    }
    let n = degree_count as i32;
    let step = |offset: i32| (current as i32 + offset).rem_euclid(n) as usize;

    if chance(rng, clamp01(surprise) * lerp(0.35, 1.0, tension)) {
        let jump = SURPRISE_JUMPS[rng.random_range(0..SURPRISE_JUMPS.len())];
        return step(jump);
    }

    let mut weights = FUNCTIONAL_WEIGHTS;
    weights[2] *= lerp(0.9, 1.15, tension);
    weights[4] *= lerp(0.85, 1.2, tension);
    let moves = FUNCTIONAL_MOVES.map(step);
    weighted_pick(&moves, &weights, rng).copied().unwrap_or(current)
}

/// One chord tick.
///
/// `snapshot` is `None` until the extractor has published; the key then
/// seeds from the default snapshot and does not drift. The first tick seeds
/// the key from the hue and sounds the tonic chord.
pub fn advance<R: Rng + ?Sized>(
    state: &mut HarmonyState,
    snapshot: Option<&FeatureSnapshot>,
    settings: &HarmonySettings,
    time: f64,
    rng: &mut R,
) -> ChordEvent {
    let fallback = FeatureSnapshot::default();
    let f = snapshot.unwrap_or(&fallback);
    let target = hue_to_pitch_class(f.dominant_hue_degrees);
    let mode = settings.mode;

    match state.key {
        None => {
            state.key = Some(target);
            state.degree = 0;
        }
        Some(current) => {
            if snapshot.is_some() {
                state.key = Some(drift_key(current, target, settings.root_from_hue(), rng));
            }
            state.degree = next_degree(
                state.degree,
                mode.degree_count(),
                settings.degree_surprise(),
                tension(f),
                rng,
            );
        }
    }
    let key = state.key.unwrap_or(target);
    let degree = state.degree % mode.degree_count();

    let (base_octave, register) = chord_register(f.brightness, settings);
    let anchor = midi(key, base_octave) + Pitch::from(mode.intervals()[degree]);
    let pcs = chord_pitch_classes(key, mode, degree, settings.chord_color, f.edge, rng);
    let pitches = voice_chord(&pcs, anchor, &state.chord, settings.voice_spread(), register);

    let velocity = (0.4 + f.saturation * 0.25 + (1.0 - f.motion) * 0.15).clamp(0.25, 0.85);
    let released = std::mem::replace(&mut state.chord, pitches.clone());

    tracing::debug!(key, degree, ?pitches, velocity, "chord change");

    ChordEvent {
        time,
        key,
        degree,
        pitches,
        released,
        velocity,
    }
}
