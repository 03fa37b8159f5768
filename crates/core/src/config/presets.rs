use crate::{
    harmony::{ChordColor, ScaleMode},
    PainterError, Result, Settings,
};

pub const DEFAULT_PRESET_ID: &str = "ethereal-lydian";

/// A named patch applied on top of [`Settings::default`].
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub apply: fn(&mut Settings),
}

const PRESETS: &[Preset] = &[
    Preset {
        id: DEFAULT_PRESET_ID,
        name: "Ethereal Lydian Choir",
        description: "Bright, weightless mode with plenty of air and a soft texture.",
        apply: ethereal_lydian,
    },
    Preset {
        id: "warm-dorian",
        name: "Warm Dorian Drift",
        description: "Warmer and deeper, with a gentle melancholy.",
        apply: warm_dorian,
    },
    Preset {
        id: "bright-pentatonic",
        name: "Bright Pentatonic Shimmer",
        description: "Lots of notes without dissonance: pentatonic plus shimmer.",
        apply: bright_pentatonic,
    },
    Preset {
        id: "deep-aeolian",
        name: "Deep Aeolian Space",
        description: "Deep space: slower, lower, wider.",
        apply: deep_aeolian,
    },
];

pub fn presets() -> &'static [Preset] {
    PRESETS
}

pub fn preset(id: &str) -> Result<&'static Preset> {
    PRESETS
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| PainterError::UnknownPreset(id.to_string()))
}

fn ethereal_lydian(s: &mut Settings) {
    s.harmony.mode = ScaleMode::Lydian;
    s.harmony.chord_color = ChordColor::Add9;
    s.harmony.degree_surprise = 0.3;
    s.fx.reverb_wet = 0.64;
    s.fx.reverb_decay = 11.5;
    s.fx.chorus_wet = 0.28;
    s.fx.filter_hz = 10_500.0;
    s.texture.density_base = 0.16;
    s.texture.step_bias = 0.86;
    s.air.enabled = true;
    s.air.amount = 0.78;
    s.air.highpass_hz = 1500.0;
}

fn warm_dorian(s: &mut Settings) {
    s.harmony.mode = ScaleMode::Dorian;
    s.harmony.chord_color = ChordColor::Seventh;
    s.harmony.degree_surprise = 0.22;
    s.harmony.voice_spread = 0.55;
    s.fx.reverb_wet = 0.58;
    s.fx.reverb_decay = 9.5;
    s.fx.filter_hz = 8200.0;
    s.fx.delay_wet = 0.12;
    s.texture.density_base = 0.2;
    s.texture.density_from_edge = 0.5;
    s.texture.register_min = 3;
    s.texture.register_max = 6;
    s.air.enabled = true;
    s.air.amount = 0.55;
    s.air.highpass_hz = 1200.0;
}

fn bright_pentatonic(s: &mut Settings) {
    s.harmony.mode = ScaleMode::PentatonicMajor;
    s.harmony.chord_color = ChordColor::Add9;
    s.harmony.degree_surprise = 0.18;
    s.harmony.chord_seconds = 7.0;
    s.texture.density_base = 0.28;
    s.texture.density_from_motion = 1.0;
    s.texture.step_bias = 0.9;
    s.texture.register_min = 5;
    s.texture.register_max = 8;
    s.fx.reverb_wet = 0.66;
    s.fx.chorus_wet = 0.22;
    s.fx.filter_hz = 11_500.0;
    s.air.enabled = true;
    s.air.amount = 0.85;
    s.air.interval_sec = 1.1;
}

fn deep_aeolian(s: &mut Settings) {
    s.harmony.mode = ScaleMode::Aeolian;
    s.harmony.chord_color = ChordColor::Seventh;
    s.harmony.chord_seconds = 10.0;
    s.harmony.chord_seconds_min = 6.0;
    s.harmony.voice_spread = 0.72;
    s.fx.reverb_wet = 0.6;
    s.fx.reverb_decay = 12.5;
    s.fx.filter_hz = 7200.0;
    s.fx.delay_wet = 0.08;
    s.fx.stereo_width = 0.75;
    s.texture.density_base = 0.12;
    s.texture.density_from_motion = 0.8;
    s.texture.register_min = 3;
    s.texture.register_max = 6;
    s.air.enabled = true;
    s.air.amount = 0.45;
    s.air.interval_sec = 2.0;
    s.master.volume_db = -12.0;
}
