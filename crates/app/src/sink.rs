use std::io::Write;

use ambient_painter_core::{
    BackendCall, Param, PainterError, Pitch, Ramp, Result, SynthBackend, VoiceLayer,
};

/// Backend that narrates every decision through `tracing` and, optionally,
/// writes each call to stdout as one JSON line.
#[derive(Debug, Default)]
pub struct LogBackend {
    json: bool,
    pub chords: usize,
    pub particle_notes: usize,
    pub air_notes: usize,
}

impl LogBackend {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            ..Self::default()
        }
    }

    fn emit(&self, call: BackendCall) {
        if !self.json {
            return;
        }
        match serde_json::to_string(&call) {
            Ok(line) => {
                let mut out = std::io::stdout().lock();
                if let Err(err) = writeln!(out, "{line}") {
                    tracing::warn!(%err, "failed to write event");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to encode event"),
        }
    }
}

impl SynthBackend for LogBackend {
    fn ensure_ready(&mut self) -> Result<()> {
        // Stdout is the only output; refuse when it is already closed.
        std::io::stdout()
            .flush()
            .map_err(|err| PainterError::BackendUnavailable(err.to_string()))
    }

    fn attack_chord(&mut self, pitches: &[Pitch], velocity: f32, time: f64) {
        self.chords += 1;
        tracing::info!(time, ?pitches, velocity, "chord");
        self.emit(BackendCall::Attack {
            pitches: pitches.to_vec(),
            velocity,
            time,
        });
    }

    fn release_chord(&mut self, pitches: &[Pitch], time: f64) {
        tracing::debug!(time, ?pitches, "release");
        self.emit(BackendCall::Release {
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
        match layer {
            VoiceLayer::Particle => self.particle_notes += 1,
            VoiceLayer::Air => self.air_notes += 1,
        }
        tracing::debug!(?layer, pitch, duration, time, velocity, "note");
        self.emit(BackendCall::Note {
            layer,
            pitch,
            duration,
            time,
            velocity,
        });
    }

    fn set_param(&mut self, param: Param, ramp: Ramp) {
        tracing::trace!(?param, target = ramp.target, seconds = ramp.seconds, "param");
        self.emit(BackendCall::Param { param, ramp });
    }
}
