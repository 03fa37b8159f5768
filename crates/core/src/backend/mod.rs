//! Capability interface to the synthesis engine.
//!
//! The generator only decides what to play; a [`SynthBackend`] renders it.
//! Every call is fire-and-forget except [`SynthBackend::ensure_ready`].

use serde::{Deserialize, Serialize};

use crate::{
    harmony::Pitch,
    mapping::{Param, Ramp},
    melody::VoiceLayer,
    PainterError, Result,
};

pub trait SynthBackend {
    /// Confirms the backend can accept events. Called on every start;
    /// an error aborts the start before anything is scheduled.
    fn ensure_ready(&mut self) -> Result<()>;

    /// Starts the pad voices for `pitches` at `time` (transport seconds).
    fn attack_chord(&mut self, pitches: &[Pitch], velocity: f32, time: f64);

    fn release_chord(&mut self, pitches: &[Pitch], time: f64);

    /// Plays one self-terminating note on the particle or air pool.
    fn trigger_note(
        &mut self,
        layer: VoiceLayer,
        pitch: Pitch,
        duration: f32,
        time: f64,
        velocity: f32,
    );

    fn set_param(&mut self, param: Param, ramp: Ramp);
}

impl<B: SynthBackend + ?Sized> SynthBackend for Box<B> {
    fn ensure_ready(&mut self) -> Result<()> {
        (**self).ensure_ready()
    }

    fn attack_chord(&mut self, pitches: &[Pitch], velocity: f32, time: f64) {
        (**self).attack_chord(pitches, velocity, time)
    }

    fn release_chord(&mut self, pitches: &[Pitch], time: f64) {
        (**self).release_chord(pitches, time)
    }

    fn trigger_note(
        &mut self,
        layer: VoiceLayer,
        pitch: Pitch,
        duration: f32,
        time: f64,
        velocity: f32,
    ) {
        (**self).trigger_note(layer, pitch, duration, time, velocity)
    }

    fn set_param(&mut self, param: Param, ramp: Ramp) {
        (**self).set_param(param, ramp)
    }
}

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BackendCall {
    Attack {
        pitches: Vec<Pitch>,
        velocity: f32,
        time: f64,
    },
    Release {
        pitches: Vec<Pitch>,
        time: f64,
    },
    Note {
        layer: VoiceLayer,
        pitch: Pitch,
        duration: f32,
        time: f64,
        velocity: f32,
    },
    Param {
        param: Param,
        ramp: Ramp,
    },
}

/// Backend that renders nothing and keeps a log of every call, plus the
/// set of pad pitches currently held.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    sounding: Vec<Pitch>,
    unavailable: Option<String>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose readiness check fails with `reason`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn set_available(&mut self) {
        self.unavailable = None;
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Pad pitches attacked and not yet released.
    pub fn sounding(&self) -> &[Pitch] {
        &self.sounding
    }

    pub fn notes(&self, layer: VoiceLayer) -> impl Iterator<Item = &BackendCall> + '_ {
        self.calls
            .iter()
            .filter(move |c| matches!(c, BackendCall::Note { layer: l, .. } if *l == layer))
    }

    pub fn attacks(&self) -> impl Iterator<Item = &BackendCall> + '_ {
        self.calls
            .iter()
            .filter(|c| matches!(c, BackendCall::Attack { .. }))
    }

    pub fn last_param(&self, param: Param) -> Option<Ramp> {
        self.calls.iter().rev().find_map(|c| match c {
            BackendCall::Param { param: p, ramp } if *p == param => Some(*ramp),
            _ => None,
        })
    }
}

impl SynthBackend for RecordingBackend {
    fn ensure_ready(&mut self) -> Result<()> {
        match &self.unavailable {
            Some(reason) => Err(PainterError::BackendUnavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn attack_chord(&mut self, pitches: &[Pitch], velocity: f32, time: f64) {
        self.sounding.extend_from_slice(pitches);
        self.calls.push(BackendCall::Attack {
            pitches: pitches.to_vec(),
            velocity,
            time,
        });
    }

    fn release_chord(&mut self, pitches: &[Pitch], time: f64) {
        for p in pitches {
            if let Some(i) = self.sounding.iter().position(|s| s == p) {
                self.sounding.swap_remove(i);
            }
        }
        self.calls.push(BackendCall::Release {
            pitches: pitches.to_vec(),
            time,
        });
    }

    fn trigger_note(
        &mut self,
        layer: VoiceLayer,
        pitch: Pitch,
        duration: f32,
        time: f64,
        velocity: f32,
    ) {
        self.calls.push(BackendCall::Note {
            layer,
            pitch,
            duration,
            time,
            velocity,
        });
    }

    fn set_param(&mut self, param: Param, ramp: Ramp) {
        self.calls.push(BackendCall::Param { param, ramp });
    }
}
