use serde::{Deserialize, Serialize};

use crate::{
    analysis::FeatureSnapshot,
    config::Settings,
    math::{clamp01, db_to_gain, lerp},
};

/// Ramp used when parameters are applied at start-up.
pub const RAMP_IMMEDIATE: f32 = 0.001;
/// Ramp used for every update while running.
pub const RAMP_SMOOTH: f32 = 0.6;

const PAD_BUS_DB: f32 = -10.0;
const PARTICLE_BUS_DB: f32 = -16.0;
const AIR_BUS_DB: f32 = -18.0;
const FX_BUS_DB: f32 = 0.0;
const PAN_DEPTH: f32 = 0.55;

/// Synthesis-graph control a [`ParameterUpdate`] is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Param {
    PadGain,
    ParticleGain,
    AirGain,
    FxGain,
    MasterVolumeDb,
    LimiterDb,
    FilterCutoffHz,
    FilterQ,
    ChorusWet,
    ChorusDepth,
    ChorusRateHz,
    DelayTime,
    DelayFeedback,
    DelayWet,
    ReverbWet,
    ReverbDecay,
    ReverbPreDelay,
    StereoWidth,
    AirHighpassHz,
    ParticlePan,
}

/// Move to `target` over `seconds`. Interpolation belongs to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub target: f32,
    pub seconds: f32,
}

impl Ramp {
    pub fn new(target: f32, seconds: f32) -> Self {
        Self { target, seconds }
    }
}

/// Concrete value routed to a synthesis parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub param: Param,
    pub ramp: Ramp,
}

/// Periods of the three generator tasks, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cadences {
    pub chord: f32,
    pub particle: f32,
    pub air: f32,
}

/// Everything the mapper derives from one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousParams {
    pub cadences: Cadences,
    pub updates: Vec<ParameterUpdate>,
}

impl ContinuousParams {
    pub fn get(&self, param: Param) -> Option<Ramp> {
        self.updates
            .iter()
            .find(|u| u.param == param)
            .map(|u| u.ramp)
    }
}

/// Derives cadences and control values from the scene. Pure.
///
/// `snapshot` is `None` before the first analysis tick; defaults stand in
/// and the particle pan is left where it is.
pub fn map_params(
    snapshot: Option<&FeatureSnapshot>,
    settings: &Settings,
    immediate: bool,
) -> ContinuousParams {
    let fallback = FeatureSnapshot::default();
    let f = snapshot.unwrap_or(&fallback);
    let (bright, sat, motion) = (f.brightness, f.saturation, f.motion);
    let fx = &settings.fx;
    let seconds = if immediate { RAMP_IMMEDIATE } else { RAMP_SMOOTH };
    let ramp = |target: f32| Ramp::new(target, seconds);

    let cadences = Cadences {
        chord: lerp(settings.harmony.chord_seconds, settings.harmony.chord_seconds_min, motion)
            .clamp(2.5, 20.0),
        particle: settings.texture.particle_interval_sec.clamp(0.06, 1.0),
        air: settings.air.interval_sec.clamp(0.2, 8.0),
    };

    let filter_hz =
        (fx.filter_hz * (0.7 + 0.7 * bright) * (0.8 + 0.6 * sat)).clamp(300.0, 18_000.0);
    let air_highpass = (settings.air.highpass_hz * (0.85 + sat * 0.3)).clamp(500.0, 6000.0);

    let mut updates = vec![
        update(Param::PadGain, ramp(db_to_gain(PAD_BUS_DB))),
        update(Param::ParticleGain, ramp(db_to_gain(PARTICLE_BUS_DB))),
        update(Param::AirGain, ramp(db_to_gain(AIR_BUS_DB))),
        update(Param::FxGain, ramp(db_to_gain(FX_BUS_DB))),
        update(Param::MasterVolumeDb, ramp(settings.master.volume_db.min(6.0))),
        update(Param::LimiterDb, ramp(settings.master.limiter_db.min(0.0))),
        update(Param::FilterCutoffHz, ramp(filter_hz)),
        update(Param::FilterQ, ramp(fx.filter_q.clamp(0.1, 20.0))),
        update(Param::ChorusDepth, ramp(clamp01(fx.chorus_depth + sat * 0.08))),
        update(Param::ChorusRateHz, ramp(fx.chorus_rate.clamp(0.05, 1.2))),
        update(Param::ChorusWet, ramp(clamp01(fx.chorus_wet + sat * 0.06))),
        update(Param::DelayTime, ramp(fx.delay_time.clamp(0.0, 2.0))),
        update(Param::DelayFeedback, ramp(clamp01(fx.delay_feedback + motion * 0.08))),
        update(Param::DelayWet, ramp(clamp01(fx.delay_wet + motion * 0.05))),
        update(Param::ReverbWet, ramp(clamp01(fx.reverb_wet + (1.0 - motion) * 0.05))),
        update(Param::ReverbDecay, ramp(fx.reverb_decay.clamp(0.1, 30.0))),
        update(Param::ReverbPreDelay, ramp(fx.reverb_pre_delay.clamp(0.0, 1.0))),
        update(Param::StereoWidth, ramp(clamp01(fx.stereo_width + sat * 0.1))),
        update(Param::AirHighpassHz, ramp(air_highpass)),
    ];

    if let Some(f) = snapshot {
        let pan = f.dominant_hue_degrees.to_radians().sin() * PAN_DEPTH;
        updates.push(update(Param::ParticlePan, ramp(pan.clamp(-1.0, 1.0))));
    }

    ContinuousParams { cadences, updates }
}

fn update(param: Param, ramp: Ramp) -> ParameterUpdate {
    ParameterUpdate { param, ramp }
}

/// Runtime mapping matrix populated with [`ParameterUpdate`] values after
/// each tick.
///
/// Reverb decay and pre-delay rebuild the reverb in most backends, so they
/// are only forwarded when they actually change.
#[derive(Debug, Default, Clone)]
pub struct MappingMatrix {
    updates: Vec<ParameterUpdate>,
    last_reverb_decay: Option<f32>,
    last_reverb_pre_delay: Option<f32>,
}

impl MappingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets what was sent; the next evaluation forwards everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn updates(&self) -> &[ParameterUpdate] {
        &self.updates
    }

    /// Evaluates the mapper and keeps the updates worth forwarding, readable
    /// through [`MappingMatrix::updates`]. Returns the task cadences.
    pub fn apply_from_snapshot(
        &mut self,
        snapshot: Option<&FeatureSnapshot>,
        settings: &Settings,
        immediate: bool,
    ) -> Cadences {
        let params = map_params(snapshot, settings, immediate);
        self.updates.clear();

        for u in params.updates {
            let keep = match u.param {
                Param::ReverbDecay => changed(&mut self.last_reverb_decay, u.ramp.target, 0.01),
                Param::ReverbPreDelay => {
                    changed(&mut self.last_reverb_pre_delay, u.ramp.target, 0.001)
                }
                _ => true,
            };
            if keep {
                self.updates.push(u);
            }
        }
        params.cadences
    }
}

fn changed(last: &mut Option<f32>, value: f32, tolerance: f32) -> bool {
    match last {
        Some(prev) if (*prev - value).abs() <= tolerance => false,
        _ => {
            *last = Some(value);
            true
        }
    }
}
