use std::{
    fs,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::{
    harmony::{ChordColor, ScaleMode},
    Result,
};

mod presets;

pub use presets::{preset, presets, Preset, DEFAULT_PRESET_ID};

/// Top-level configuration structure for the generator.
///
/// Every section is `#[serde(default)]`, so a settings file only needs to
/// name the fields it changes. Values are never validated on load; the
/// accessors clamp them at the point of use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub preset_id: String,
    pub analysis: AnalysisSettings,
    pub harmony: HarmonySettings,
    pub texture: TextureSettings,
    pub air: AirSettings,
    pub fx: FxSettings,
    pub master: MasterSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preset_id: DEFAULT_PRESET_ID.to_string(),
            analysis: AnalysisSettings::default(),
            harmony: HarmonySettings::default(),
            texture: TextureSettings::default(),
            air: AirSettings::default(),
            fx: FxSettings::default(),
            master: MasterSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults patched by the named built-in preset.
    pub fn from_preset(id: &str) -> Result<Self> {
        let preset = preset(id)?;
        let mut settings = Self::default();
        (preset.apply)(&mut settings);
        settings.preset_id = preset.id.to_string();
        Ok(settings)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a (possibly partial) JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Video analysis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Edge length of the square analysis buffer.
    pub size: u32,
    /// Analysis ticks per second.
    pub fps: u32,
    pub smoothing_sec: f32,
    pub hue_bins: u32,
    pub palette_size: u32,
    pub motion_gain: f32,
    pub edge_gain: f32,
    pub edge_threshold: f32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            size: 96,
            fps: 20,
            smoothing_sec: 1.0,
            hue_bins: 36,
            palette_size: 5,
            motion_gain: 18.0,
            edge_gain: 7.0,
            edge_threshold: 0.14,
        }
    }
}

impl AnalysisSettings {
    pub fn size(&self) -> usize {
        self.size.clamp(32, 256) as usize
    }

    pub fn rate(&self) -> u32 {
        self.fps.clamp(5, 60)
    }

    pub fn smoothing_tau(&self) -> f32 {
        self.smoothing_sec.max(0.05)
    }

    pub fn hue_bins(&self) -> usize {
        self.hue_bins.clamp(12, 72) as usize
    }

    pub fn palette_size(&self) -> usize {
        self.palette_size.clamp(1, 8) as usize
    }

    pub fn motion_gain(&self) -> f32 {
        self.motion_gain.max(1.0)
    }

    pub fn edge_gain(&self) -> f32 {
        self.edge_gain.max(1.0)
    }

    pub fn edge_threshold(&self) -> f32 {
        self.edge_threshold.clamp(0.0, 1.0)
    }
}

/// Chord layer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonySettings {
    pub mode: ScaleMode,
    pub chord_color: ChordColor,
    pub base_octave: i32,
    /// How many octaves brightness may shift the chord register.
    pub octave_range_from_brightness: f32,
    /// Chord cadence for a still scene.
    pub chord_seconds: f32,
    /// Chord cadence for a scene in full motion.
    pub chord_seconds_min: f32,
    pub root_from_hue: f32,
    pub degree_surprise: f32,
    pub voice_spread: f32,
}

impl Default for HarmonySettings {
    fn default() -> Self {
        Self {
            mode: ScaleMode::Lydian,
            chord_color: ChordColor::Add9,
            base_octave: 3,
            octave_range_from_brightness: 2.0,
            chord_seconds: 8.0,
            chord_seconds_min: 4.5,
            root_from_hue: 0.9,
            degree_surprise: 0.28,
            voice_spread: 0.65,
        }
    }
}

impl HarmonySettings {
    pub fn root_from_hue(&self) -> f32 {
        self.root_from_hue.clamp(0.0, 1.0)
    }

    pub fn degree_surprise(&self) -> f32 {
        self.degree_surprise.clamp(0.0, 1.0)
    }

    pub fn voice_spread(&self) -> f32 {
        self.voice_spread.clamp(0.0, 1.0)
    }
}

/// Particle layer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSettings {
    pub particle_interval_sec: f32,
    pub density_base: f32,
    pub density_from_motion: f32,
    pub density_from_edge: f32,
    pub velocity: f32,
    pub note_len_min_sec: f32,
    pub note_len_max_sec: f32,
    /// Lowest octave of the particle register.
    pub register_min: i32,
    /// Highest octave of the particle register.
    pub register_max: i32,
    pub step_bias: f32,
    pub humanize_ms: f32,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            particle_interval_sec: 0.22,
            density_base: 0.18,
            density_from_motion: 0.9,
            density_from_edge: 0.45,
            velocity: 0.6,
            note_len_min_sec: 0.08,
            note_len_max_sec: 0.7,
            register_min: 4,
            register_max: 7,
            step_bias: 0.84,
            humanize_ms: 18.0,
        }
    }
}

impl TextureSettings {
    pub fn humanize_sec(&self) -> f32 {
        self.humanize_ms.max(0.0) / 1000.0
    }
}

/// Air layer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirSettings {
    pub enabled: bool,
    pub amount: f32,
    pub interval_sec: f32,
    pub note_len_sec: f32,
    pub highpass_hz: f32,
}

impl Default for AirSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            amount: 0.7,
            interval_sec: 1.4,
            note_len_sec: 4.5,
            highpass_hz: 1400.0,
        }
    }
}

/// Effect chain parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxSettings {
    pub filter_hz: f32,
    pub filter_q: f32,
    pub reverb_wet: f32,
    pub reverb_decay: f32,
    pub reverb_pre_delay: f32,
    pub chorus_wet: f32,
    pub chorus_depth: f32,
    pub chorus_rate: f32,
    pub delay_wet: f32,
    pub delay_time: f32,
    pub delay_feedback: f32,
    pub stereo_width: f32,
}

impl Default for FxSettings {
    fn default() -> Self {
        Self {
            filter_hz: 9500.0,
            filter_q: 0.7,
            reverb_wet: 0.62,
            reverb_decay: 10.5,
            reverb_pre_delay: 0.02,
            chorus_wet: 0.25,
            chorus_depth: 0.33,
            chorus_rate: 0.22,
            delay_wet: 0.09,
            delay_time: 0.42,
            delay_feedback: 0.33,
            stereo_width: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterSettings {
    pub volume_db: f32,
    pub limiter_db: f32,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            volume_db: -10.0,
            limiter_db: -1.0,
        }
    }
}

/// Supplies the current settings snapshot on every read.
pub trait SettingsProvider {
    fn current(&self) -> Arc<Settings>;
}

impl SettingsProvider for Settings {
    fn current(&self) -> Arc<Settings> {
        Arc::new(self.clone())
    }
}

/// Shared, swappable settings. Readers receive an immutable snapshot, so an
/// edit never lands halfway through a tick.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Arc<Settings>>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(settings))),
        }
    }

    pub fn replace(&self, settings: Settings) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(settings);
    }

    /// Applies an edit on a copy of the current settings and publishes it.
    pub fn update(&self, edit: impl FnOnce(&mut Settings)) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Settings::clone(&slot);
        edit(&mut next);
        *slot = Arc::new(next);
    }
}

impl SettingsProvider for SharedSettings {
    fn current(&self) -> Arc<Settings> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
