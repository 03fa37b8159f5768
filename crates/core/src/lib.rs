//! Core library for Ambient Painter.
//!
//! A camera frame is reduced to a handful of smoothed visual features
//! ([`FeatureSnapshot`]); those drive a harmony state machine, two melodic
//! layers and a set of continuous synthesis parameters. Every decision is
//! handed to a [`SynthBackend`], so the crate itself never produces audio.
//!
//! Each module owns one subsystem: frame analysis, harmony, melody,
//! parameter mapping, scheduling, and the [`AmbientEngine`] façade tying
//! them together.

pub mod analysis;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod harmony;
pub mod mapping;
pub mod math;
pub mod melody;
pub mod random;
pub mod timeline;

pub use analysis::{
    AnalysisDriver, FeatureExtractor, FeatureSnapshot, FrameSource, SnapshotHandle, VideoFrame,
};
pub use backend::{BackendCall, RecordingBackend, SynthBackend};
pub use config::{Settings, SettingsProvider, SharedSettings};
pub use engine::{AmbientEngine, START_OFFSET};
pub use error::{PainterError, Result};
pub use harmony::{ChordColor, ChordEvent, HarmonyState, Pitch, ScaleMode};
pub use mapping::{map_params, ContinuousParams, MappingMatrix, Param, ParameterUpdate, Ramp};
pub use melody::{NoteEvent, VoiceLayer};
pub use timeline::{Clock, PlaybackClock, Scheduler, SystemClock, TaskId, Transport};
