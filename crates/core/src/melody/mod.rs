//! Particle and air layers: short stochastic melodies over the current chord.
//!
//! Both layers pick pitches with [`pick_note_near`], which favours small
//! steps from the layer's previous note, so each layer reads as a line
//! rather than a scatter of independent notes.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    analysis::FeatureSnapshot,
    config::{AirSettings, TextureSettings},
    harmony::{midi, nearest_with_pitch_class, unique_pitch_classes, Pitch, Register, ScaleMode},
    math::{clamp01, lerp, round_half_up},
    random::{chance, unit, weighted_pick},
};

/// Above this density the particle layer may play two notes per tick.
const DOUBLE_NOTE_DENSITY: f32 = 0.72;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoiceLayer {
    Particle,
    Air,
}

/// A single note handed to one of the melodic voice pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub layer: VoiceLayer,
    pub pitch: Pitch,
    /// Seconds.
    pub duration: f32,
    pub time: f64,
    pub velocity: f32,
}

/// Harmony as seen by the melodic layers.
#[derive(Debug, Clone, Copy)]
pub struct ChordContext<'a> {
    pub key: Option<u8>,
    pub mode: ScaleMode,
    /// Sounding chord, ascending; empty before the first chord.
    pub chord: &'a [Pitch],
    /// Pitch class implied by the current hue, used before any chord exists.
    pub hue_pitch_class: u8,
}

impl ChordContext<'_> {
    fn key_or_hue(&self) -> u8 {
        self.key.unwrap_or(self.hue_pitch_class)
    }

    fn chord_pitch_classes(&self) -> Vec<u8> {
        if self.chord.is_empty() {
            vec![self.hue_pitch_class]
        } else {
            unique_pitch_classes(self.chord)
        }
    }

    /// Chord tones twice, scale tones once.
    pub fn pool(&self) -> Vec<u8> {
        let chord = self.chord_pitch_classes();
        let mut pool = Vec::with_capacity(chord.len() * 2 + 7);
        pool.extend_from_slice(&chord);
        pool.extend_from_slice(&chord);
        pool.extend(self.mode.pitch_classes(self.key_or_hue()));
        pool
    }
}

/// Picks a pitch from `pool` near `anchor` inside `register`.
///
/// Each pool entry proposes its pitch class nearest the anchor plus the
/// octaves either side, weighted by a Gaussian in semitone distance. A
/// higher `step_bias` narrows the Gaussian. Falls back to the anchor
/// clamped into the register when nothing fits.
pub fn pick_note_near<R: Rng + ?Sized>(
    pool: &[u8],
    anchor: Pitch,
    register: Register,
    step_bias: f32,
    rng: &mut R,
) -> Pitch {
    let sigma = lerp(10.0, 3.2, clamp01(step_bias));
    let mut candidates = Vec::with_capacity(pool.len() * 3);
    let mut weights = Vec::with_capacity(pool.len() * 3);

    for &pc in pool {
        let mut m = nearest_with_pitch_class(anchor, pc);
        while m < register.low {
            m += 12;
        }
        while m > register.high {
            m -= 12;
        }
        for candidate in [m - 12, m, m + 12] {
            if !register.contains(candidate) {
                continue;
            }
            let d = (candidate - anchor) as f32;
            candidates.push(candidate);
            weights.push((-(d * d) / (2.0 * sigma * sigma)).exp());
        }
    }

    match weighted_pick(&candidates, &weights, rng) {
        Some(&pitch) => pitch,
        None => {
            tracing::warn!(anchor, "empty melodic pool, holding anchor");
            register.clamp(anchor)
        }
    }
}

pub fn particle_density(snapshot: &FeatureSnapshot, texture: &TextureSettings) -> f32 {
    clamp01(
        texture.density_base
            + snapshot.motion * texture.density_from_motion
            + snapshot.edge * texture.density_from_edge,
    )
}

/// 0, 1 or 2 notes for a tick at the given density.
pub fn particle_count<R: Rng + ?Sized>(density: f32, rng: &mut R) -> usize {
    if density > DOUBLE_NOTE_DENSITY {
        if chance(rng, density) {
            2
        } else {
            1
        }
    } else if chance(rng, density) {
        1
    } else {
        0
    }
}

/// Particle register, nudged an octave by very bright or dark scenes.
pub fn particle_register(brightness: f32, texture: &TextureSettings) -> Register {
    let shift = round_half_up(brightness - 0.5);
    Register::new(
        midi(0, texture.register_min.saturating_add(shift).clamp(1, 8)),
        midi(11, texture.register_max.saturating_add(shift).clamp(2, 9)),
    )
}

/// One particle tick. `last` is the layer's continuity anchor and is
/// updated with the final note played.
pub fn particle_notes<R: Rng + ?Sized>(
    ctx: &ChordContext<'_>,
    last: &mut Option<Pitch>,
    snapshot: &FeatureSnapshot,
    texture: &TextureSettings,
    time: f64,
    rng: &mut R,
) -> Vec<NoteEvent> {
    let density = particle_density(snapshot, texture);
    let count = particle_count(density, rng);
    if count == 0 {
        return Vec::new();
    }

    let register = particle_register(snapshot.brightness, texture);
    let pool = ctx.pool();
    let mut anchor = last.unwrap_or_else(|| midi(ctx.key_or_hue(), 5));

    let activity = clamp01(snapshot.motion * 0.9 + snapshot.edge * 0.35);
    let duration = lerp(texture.note_len_max_sec, texture.note_len_min_sec, activity).max(0.0);
    let velocity = clamp01(
        texture.velocity * (0.55 + 0.35 * snapshot.saturation) * (0.85 + 0.3 * density),
    );

    let mut notes = Vec::with_capacity(count);
    for _ in 0..count {
        let pitch = pick_note_near(&pool, anchor, register, texture.step_bias, rng);
        anchor = pitch;
        let jitter = (unit(rng) - 0.5) * texture.humanize_sec();
        notes.push(NoteEvent {
            layer: VoiceLayer::Particle,
            pitch,
            duration,
            time: (time + f64::from(jitter)).max(0.0),
            velocity,
        });
    }
    *last = Some(anchor);

    tracing::debug!(density, count, pitch = anchor, "particle notes");
    notes
}

pub fn air_probability(snapshot: &FeatureSnapshot, air: &AirSettings) -> f32 {
    let b = snapshot.brightness;
    let s = snapshot.saturation;
    let m = snapshot.motion;
    clamp01(0.15 + air.amount * (0.35 + 0.35 * b + 0.2 * s) * (0.9 - m * 0.5))
}

pub fn air_register() -> Register {
    Register::new(midi(0, 6), midi(11, 8))
}

/// One air tick: nothing, a single long high note, or that note plus a
/// softer one around a fifth above.
///
/// The first note sits near the sounding chord's top voice an octave up.
/// `last` anchors it only while no chord sounds, and is updated with the
/// final note played.
pub fn air_notes<R: Rng + ?Sized>(
    ctx: &ChordContext<'_>,
    last: &mut Option<Pitch>,
    snapshot: &FeatureSnapshot,
    air: &AirSettings,
    time: f64,
    rng: &mut R,
) -> Vec<NoteEvent> {
    if !air.enabled {
        return Vec::new();
    }
    if unit(rng) > air_probability(snapshot, air) {
        return Vec::new();
    }

    let register = air_register();
    let top = match ctx.chord.last() {
        Some(&top) => top + 12,
        None => last.unwrap_or_else(|| midi(ctx.hue_pitch_class, 5) + 12),
    };
    let pool = ctx.pool();

    let length = (air.note_len_sec * (0.85 + snapshot.brightness * 0.35)).clamp(1.5, 12.0);
    let velocity = clamp01(0.12 + air.amount * (0.25 + 0.15 * snapshot.saturation));

    let first = pick_note_near(&pool, register.clamp(top), register, 0.9, rng);
    let mut notes = vec![NoteEvent {
        layer: VoiceLayer::Air,
        pitch: first,
        duration: length,
        time: time + 0.01,
        velocity,
    }];
    *last = Some(first);

    if chance(rng, 0.5) {
        let second = pick_note_near(&pool, first + 7, register, 0.85, rng);
        notes.push(NoteEvent {
            layer: VoiceLayer::Air,
            pitch: second,
            duration: length * 0.9,
            time: time + 0.03,
            velocity: velocity * 0.8,
        });
        *last = Some(second);
    }

    tracing::debug!(count = notes.len(), pitch = first, "air notes");
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{harmony::pitch_class, random::seeded};

    const C_MAJOR: [Pitch; 3] = [48, 52, 55];

    fn ctx(chord: &[Pitch]) -> ChordContext<'_> {
        ChordContext {
            key: Some(0),
            mode: ScaleMode::Ionian,
            chord,
            hue_pitch_class: 0,
        }
    }

    fn snapshot(motion: f32, edge: f32) -> FeatureSnapshot {
        FeatureSnapshot {
            motion,
            edge,
            ..FeatureSnapshot::default()
        }
    }

    #[test]
    fn pool_weights_chord_tones_double() {
        let pool = ctx(&C_MAJOR).pool();
        assert_eq!(pool.iter().filter(|&&pc| pc == 0).count(), 3);
        assert_eq!(pool.iter().filter(|&&pc| pc == 2).count(), 1);
        assert_eq!(pool.len(), 3 * 2 + 7);
    }

    #[test]
    fn picks_stay_in_register_and_pool() {
        let mut rng = seeded(12);
        let register = Register::new(60, 84);
        let pool = ctx(&C_MAJOR).pool();
        let mut anchor = 66;
        for _ in 0..500 {
            anchor = pick_note_near(&pool, anchor, register, 0.8, &mut rng);
            assert!(register.contains(anchor));
            assert!(pool.contains(&pitch_class(anchor)));
        }
    }

    #[test]
    fn step_bias_tightens_motion() {
        let register = Register::new(48, 96);
        let pool = ScaleMode::Ionian.pitch_classes(0);
        let mean_leap = |bias: f32| {
            let mut rng = seeded(5);
            (0..2000)
                .map(|_| (pick_note_near(&pool, 72, register, bias, &mut rng) - 72).abs())
                .sum::<i32>() as f32
                / 2000.0
        };
        assert!(mean_leap(1.0) < mean_leap(0.0));
    }

    #[test]
    fn empty_pool_holds_anchor() {
        let mut rng = seeded(1);
        assert_eq!(pick_note_near(&[], 40, Register::new(60, 72), 0.5, &mut rng), 60);
    }

    #[test]
    fn zero_density_is_silent() {
        let texture = TextureSettings {
            density_base: 0.0,
            density_from_motion: 0.0,
            density_from_edge: 0.0,
            ..TextureSettings::default()
        };
        let mut rng = seeded(2);
        let mut last = None;
        for _ in 0..300 {
            let busy = snapshot(1.0, 1.0);
            let notes = particle_notes(&ctx(&C_MAJOR), &mut last, &busy, &texture, 0.0, &mut rng);
            assert!(notes.is_empty());
        }
        assert_eq!(last, None);
    }

    #[test]
    fn dense_scenes_play_up_to_two_notes() {
        let texture = TextureSettings::default();
        let mut rng = seeded(6);
        let mut last = None;
        let mut saw_two = false;
        for i in 0..200 {
            let busy = snapshot(1.0, 1.0);
            let notes =
                particle_notes(&ctx(&C_MAJOR), &mut last, &busy, &texture, i as f64, &mut rng);
            assert!(!notes.is_empty() && notes.len() <= 2);
            saw_two |= notes.len() == 2;
            for note in &notes {
                assert!((note.time - i as f64).abs() <= 0.01);
                let lengths = texture.note_len_min_sec..=texture.note_len_max_sec;
                assert!(lengths.contains(&note.duration));
                assert!((0.0..=1.0).contains(&note.velocity));
            }
        }
        assert!(saw_two);
        assert!(last.is_some());
    }

    #[test]
    fn particle_anchor_carries_between_ticks() {
        let texture = TextureSettings {
            density_base: 0.6,
            ..TextureSettings::default()
        };
        let mut rng = seeded(30);
        let mut last = Some(70);
        let mut previous = 70;
        for i in 0..200 {
            let still = snapshot(0.0, 0.0);
            let notes =
                particle_notes(&ctx(&C_MAJOR), &mut last, &still, &texture, i as f64, &mut rng);
            if let Some(note) = notes.last() {
                assert_eq!(last, Some(note.pitch));
                // Step bias 0.84 keeps sigma near 4.3 semitones.
                assert!((note.pitch - previous).abs() <= 24);
                previous = note.pitch;
            }
        }
    }

    #[test]
    fn disabled_air_is_silent() {
        let air = AirSettings {
            enabled: false,
            amount: 1.0,
            ..AirSettings::default()
        };
        let mut rng = seeded(3);
        let mut last = None;
        for _ in 0..500 {
            let still = snapshot(0.0, 0.0);
            let notes = air_notes(&ctx(&C_MAJOR), &mut last, &still, &air, 0.0, &mut rng);
            assert!(notes.is_empty());
        }
    }

    #[test]
    fn air_notes_sit_high_and_long() {
        let air = AirSettings {
            amount: 1.0,
            ..AirSettings::default()
        };
        let mut rng = seeded(8);
        let mut last = None;
        let mut seen_pair = false;
        for i in 0..300 {
            let still = snapshot(0.0, 0.0);
            let notes = air_notes(&ctx(&C_MAJOR), &mut last, &still, &air, i as f64, &mut rng);
            for note in &notes {
                assert!(air_register().contains(note.pitch));
                assert!(note.duration >= 1.5 * 0.9);
            }
            if let [first, second] = notes.as_slice() {
                seen_pair = true;
                assert!(second.velocity < first.velocity);
                assert!(second.duration < first.duration);
                assert!(second.time > first.time);
            }
        }
        assert!(seen_pair);
    }

    #[test]
    fn air_follows_last_note_only_without_a_chord() {
        let air = AirSettings {
            amount: 1.0,
            ..AirSettings::default()
        };
        let still = snapshot(0.0, 0.0);
        let mean_first = |chord: &[Pitch], seed: u64| {
            let mut rng = seeded(seed);
            let (mut sum, mut count) = (0, 0);
            for i in 0..400 {
                let mut last = Some(112);
                let notes = air_notes(&ctx(chord), &mut last, &still, &air, i as f64, &mut rng);
                if let Some(first) = notes.first() {
                    assert_eq!(last, notes.last().map(|n| n.pitch));
                    sum += first.pitch;
                    count += 1;
                }
            }
            assert!(count > 0);
            sum as f32 / count as f32
        };
        assert!(mean_first(&[], 31) > 104.0);
        assert!(mean_first(&C_MAJOR, 32) < 92.0);
    }

    #[test]
    fn air_probability_has_a_floor() {
        let still = AirSettings {
            amount: 0.0,
            ..AirSettings::default()
        };
        assert!((air_probability(&snapshot(1.0, 0.0), &still) - 0.15).abs() < 1e-6);
    }

    #[test]
    fn inverted_register_bounds_are_normalised() {
        let texture = TextureSettings {
            register_min: 8,
            register_max: 2,
            ..TextureSettings::default()
        };
        let register = particle_register(0.5, &texture);
        assert!(register.low <= register.high);
    }

    #[test]
    fn extreme_register_bounds_saturate() {
        let texture = TextureSettings {
            register_min: i32::MIN,
            register_max: i32::MAX,
            ..TextureSettings::default()
        };
        for brightness in [0.0, 0.5, 1.0] {
            let register = particle_register(brightness, &texture);
            assert_eq!(register, Register::new(midi(0, 1), midi(11, 9)));
        }
    }
}
