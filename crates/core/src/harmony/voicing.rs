use super::theory::{nearest_with_pitch_class, Pitch};
use crate::math::{lerp, round_half_up};

/// Single-voice moves larger than this are penalised on top of their size.
const LEAP_LIMIT: i32 = 9;
const LEAP_PENALTY: f32 = 1.5;
/// Chord spans wider than this are penalised.
const SPAN_LIMIT: i32 = 30;
const SPAN_PENALTY: f32 = 0.6;

/// Inclusive MIDI window a voicing has to fit into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub low: Pitch,
    pub high: Pitch,
}

impl Register {
    /// Window between two bounds given in either order.
    pub fn new(a: Pitch, b: Pitch) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn contains(&self, pitch: Pitch) -> bool {
        (self.low..=self.high).contains(&pitch)
    }

    pub fn clamp(&self, pitch: Pitch) -> Pitch {
        pitch.max(self.low).min(self.high)
    }
}

/// Places `pcs` into octaves, one candidate per rotation, and returns the
/// candidate that moves least from `previous`. Without a previous chord the
/// root-position candidate wins. The result is sorted ascending.
///
/// An empty pitch-class list yields the anchor alone.
pub fn voice_chord(
    pcs: &[u8],
    anchor: Pitch,
    previous: &[Pitch],
    spread: f32,
    register: Register,
) -> Vec<Pitch> {
    if pcs.is_empty() {
        return vec![anchor];
    }

    let candidates = candidate_voicings(pcs, anchor, spread, register);
    if previous.is_empty() {
        return candidates[0].clone();
    }

    let mut prev_sorted = previous.to_vec();
    prev_sorted.sort_unstable();

    let mut best = 0;
    let mut best_cost = f32::INFINITY;
    for (i, candidate) in candidates.iter().enumerate() {
        let cost = voicing_cost(&prev_sorted, candidate);
        if cost < best_cost {
            best_cost = cost;
            best = i;
        }
    }
    candidates[best].clone()
}

/// One sorted voicing per rotation of `pcs`.
pub fn candidate_voicings(
    pcs: &[u8],
    anchor: Pitch,
    spread: f32,
    register: Register,
) -> Vec<Vec<Pitch>> {
    let spread = spread.clamp(0.0, 1.0);
    let min_gap = lerp(2.0, 5.0, spread);
    let lifted = round_half_up(lerp(0.0, 2.0, spread)) as usize;

    (0..pcs.len())
        .map(|rotation| {
            let mut voiced = Vec::with_capacity(pcs.len());
            let mut last = anchor - 24;
            for i in 0..pcs.len() {
                let pc = pcs[(i + rotation) % pcs.len()];
                let mut m = nearest_with_pitch_class(anchor, pc);
                while m as f32 <= last as f32 + min_gap {
                    m += 12;
                }
                last = m;
                voiced.push(m);
            }

            // Widen by lifting the top voices; the bass stays put.
            for k in 0..lifted {
                match voiced.len().checked_sub(1 + k) {
                    Some(idx) if idx >= 1 => voiced[idx] += 12,
                    _ => {}
                }
            }

            fit_register(&mut voiced, register);
            voiced.sort_unstable();
            voiced
        })
        .collect()
}

/// Movement cost between two sorted voicings. Voices are paired bottom-up;
/// surplus voices on either side are ignored.
pub fn voicing_cost(previous_sorted: &[Pitch], candidate_sorted: &[Pitch]) -> f32 {
    let mut cost: f32 = previous_sorted
        .iter()
        .zip(candidate_sorted)
        .map(|(&a, &b)| {
            let d = (b - a).abs();
            let mut c = d as f32;
            if d > LEAP_LIMIT {
                c += (d - LEAP_LIMIT) as f32 * LEAP_PENALTY;
            }
            c
        })
        .sum();

    if let (Some(&lo), Some(&hi)) = (candidate_sorted.first(), candidate_sorted.last()) {
        cost += (hi - lo - SPAN_LIMIT).max(0) as f32 * SPAN_PENALTY;
    }
    cost
}

/// Transposes by whole octaves: up until the lowest voice is inside the
/// window, then down until the highest voice is. A chord wider than the
/// window keeps its top inside.
fn fit_register(voiced: &mut [Pitch], register: Register) {
    while voiced.iter().min().is_some_and(|&lo| lo < register.low) {
        voiced.iter_mut().for_each(|p| *p += 12);
    }
    while voiced.iter().max().is_some_and(|&hi| hi > register.high) {
        voiced.iter_mut().for_each(|p| *p -= 12);
    }
}
