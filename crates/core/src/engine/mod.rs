//! Generator façade: owns the transport, the harmony state and the backend,
//! and runs the chord, particle and air tasks.

use std::sync::Arc;

use crate::{
    analysis::{FeatureSnapshot, SnapshotHandle},
    backend::SynthBackend,
    config::{Settings, SettingsProvider},
    harmony::{self, hue_to_pitch_class, ChordEvent, HarmonyState},
    mapping::{Cadences, MappingMatrix},
    melody::{self, ChordContext, NoteEvent},
    random::GeneratorRng,
    timeline::{Clock, PeriodicTask, Scheduler, TaskId, Transport},
    Result,
};

/// Delay between `start` and the first run of every task.
pub const START_OFFSET: f64 = 0.05;

/// State the generator tasks share. Owned by [`AmbientEngine`] and handed to
/// each task by the transport.
pub struct Performance<B> {
    backend: B,
    settings: Box<dyn SettingsProvider>,
    snapshots: SnapshotHandle,
    harmony: HarmonyState,
    mapping: MappingMatrix,
    rng: GeneratorRng,
    last_chord: Option<ChordEvent>,
}

impl<B: SynthBackend> Performance<B> {
    /// Maps the scene onto the synthesis graph and returns the cadences for
    /// the next runs.
    fn apply_params(
        &mut self,
        snapshot: Option<&FeatureSnapshot>,
        settings: &Settings,
        immediate: bool,
    ) -> Cadences {
        let cadences = self.mapping.apply_from_snapshot(snapshot, settings, immediate);
        for u in self.mapping.updates() {
            self.backend.set_param(u.param, u.ramp);
        }
        cadences
    }

    fn chord_tick(&mut self, time: f64) -> f64 {
        let settings = self.settings.current();
        let snapshot = self.snapshots.latest();
        let cadences = self.apply_params(snapshot.as_deref(), &settings, false);

        let event = harmony::advance(
            &mut self.harmony,
            snapshot.as_deref(),
            &settings.harmony,
            time,
            &mut self.rng,
        );
        if !event.released.is_empty() {
            self.backend.release_chord(&event.released, time);
        }
        self.backend.attack_chord(&event.pitches, event.velocity, time);

        let anchors = &mut self.harmony.last_melodic;
        if anchors.particle.is_none() {
            anchors.particle = event.pitches.get(event.pitches.len() / 2).copied();
        }
        self.last_chord = Some(event);

        f64::from(cadences.chord)
    }

    fn particle_tick(&mut self, time: f64) -> f64 {
        let settings = self.settings.current();
        let snapshot = self.snapshots.latest();
        let cadences = self.apply_params(snapshot.as_deref(), &settings, false);
        let Some(snapshot) = snapshot else {
            return f64::from(cadences.particle);
        };

        let key = self.harmony.key();
        let (chord, anchors) = self.harmony.melodic_view();
        let ctx = ChordContext {
            key,
            mode: settings.harmony.mode,
            chord,
            hue_pitch_class: hue_to_pitch_class(snapshot.dominant_hue_degrees),
        };
        let notes = melody::particle_notes(
            &ctx,
            &mut anchors.particle,
            &snapshot,
            &settings.texture,
            time,
            &mut self.rng,
        );
        play(&mut self.backend, &notes);

        f64::from(cadences.particle)
    }

    fn air_tick(&mut self, time: f64) -> f64 {
        let settings = self.settings.current();
        let snapshot = self.snapshots.latest();
        let cadences = self.apply_params(snapshot.as_deref(), &settings, false);
        let Some(snapshot) = snapshot else {
            return f64::from(cadences.air);
        };

        let key = self.harmony.key();
        let (chord, anchors) = self.harmony.melodic_view();
        let ctx = ChordContext {
            key,
            mode: settings.harmony.mode,
            chord,
            hue_pitch_class: hue_to_pitch_class(snapshot.dominant_hue_degrees),
        };
        let notes = melody::air_notes(
            &ctx,
            &mut anchors.air,
            &snapshot,
            &settings.air,
            time,
            &mut self.rng,
        );
        play(&mut self.backend, &notes);

        f64::from(cadences.air)
    }
}

fn play<B: SynthBackend>(backend: &mut B, notes: &[NoteEvent]) {
    for n in notes {
        backend.trigger_note(n.layer, n.pitch, n.duration, n.time, n.velocity);
    }
}

/// High level generator façade.
///
/// Nothing happens on its own: the host moves time forward with
/// [`AmbientEngine::advance_to`] (or [`AmbientEngine::pump`] with a clock)
/// and every task due by then runs.
pub struct AmbientEngine<B: SynthBackend + 'static> {
    transport: Transport<Performance<B>>,
    performance: Performance<B>,
    tasks: Vec<TaskId>,
}

impl<B: SynthBackend + 'static> AmbientEngine<B> {
    pub fn new(
        backend: B,
        settings: impl SettingsProvider + 'static,
        snapshots: SnapshotHandle,
        rng: GeneratorRng,
    ) -> Self {
        Self {
            transport: Transport::new(),
            performance: Performance {
                backend,
                settings: Box::new(settings),
                snapshots,
                harmony: HarmonyState::new(),
                mapping: MappingMatrix::new(),
                rng,
                last_chord: None,
            },
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Transport time in seconds.
    pub fn now(&self) -> f64 {
        self.transport.now()
    }

    pub fn backend(&self) -> &B {
        &self.performance.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.performance.backend
    }

    pub fn harmony(&self) -> &HarmonyState {
        &self.performance.harmony
    }

    /// Most recent chord change, for telemetry.
    pub fn last_chord(&self) -> Option<&ChordEvent> {
        self.performance.last_chord.as_ref()
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.performance.settings.current()
    }

    /// Checks the backend, pushes the current parameters without ramping and
    /// schedules the three tasks [`START_OFFSET`] seconds from now. Starting
    /// a running engine does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.performance.backend.ensure_ready()?;

        let perf = &mut self.performance;
        perf.harmony.reset();
        perf.mapping.clear();
        perf.last_chord = None;
        let settings = perf.settings.current();
        let snapshot = perf.snapshots.latest();
        perf.apply_params(snapshot.as_deref(), &settings, true);

        let first = self.transport.now() + START_OFFSET;
        let tasks: [PeriodicTask<Performance<B>>; 3] = [
            Box::new(|p: &mut Performance<B>, t| p.chord_tick(t)),
            Box::new(|p: &mut Performance<B>, t| p.particle_tick(t)),
            Box::new(|p: &mut Performance<B>, t| p.air_tick(t)),
        ];
        for task in tasks {
            let id = self.transport.schedule_at(first, task);
            self.tasks.push(id);
        }

        tracing::info!(at = first, preset = %settings.preset_id, "generator started");
        Ok(())
    }

    /// Halts every task, releases the sounding chord and clears the musical
    /// state. Stopping a stopped engine does nothing.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        for id in self.tasks.drain(..) {
            self.transport.cancel(id);
        }

        let now = self.transport.now();
        let perf = &mut self.performance;
        let sounding = perf.harmony.reset();
        if !sounding.is_empty() {
            perf.backend.release_chord(&sounding, now);
        }
        perf.mapping.clear();

        tracing::info!(at = now, released = sounding.len(), "generator stopped");
    }

    /// Runs every task due up to `until`. Returns how many runs happened.
    pub fn advance_to(&mut self, until: f64) -> usize {
        self.transport.advance_to(&mut self.performance, until)
    }

    pub fn pump(&mut self, clock: &dyn Clock) -> usize {
        self.advance_to(clock.now())
    }
}

impl<B: SynthBackend + 'static> std::fmt::Debug for AmbientEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbientEngine")
            .field("transport", &self.transport)
            .field("running", &self.is_running())
            .field("harmony", &self.performance.harmony)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{BackendCall, RecordingBackend},
        mapping::{Param, RAMP_IMMEDIATE, RAMP_SMOOTH},
        melody::VoiceLayer,
        random::seeded,
        timeline::PlaybackClock,
        PainterError,
    };

    fn engine(settings: Settings) -> (AmbientEngine<RecordingBackend>, SnapshotHandle) {
        let snapshots = SnapshotHandle::new();
        let backend = RecordingBackend::new();
        let engine = AmbientEngine::new(backend, settings, snapshots.clone(), seeded(3));
        (engine, snapshots)
    }

    fn busy_scene() -> FeatureSnapshot {
        FeatureSnapshot {
            dominant_hue_degrees: 200.0,
            brightness: 0.7,
            saturation: 0.8,
            motion: 0.9,
            edge: 0.8,
            ..FeatureSnapshot::default()
        }
    }

    #[test]
    fn start_applies_params_immediately_and_delays_tasks() {
        let (mut engine, _) = engine(Settings::default());
        engine.start().unwrap();
        assert!(engine.is_running());

        let ramp = engine.backend().last_param(Param::ReverbWet).unwrap();
        assert_eq!(ramp.seconds, RAMP_IMMEDIATE);
        assert_eq!(engine.backend().attacks().count(), 0);

        assert_eq!(engine.advance_to(START_OFFSET - 0.01), 0);
        engine.advance_to(START_OFFSET);
        assert_eq!(engine.backend().attacks().count(), 1);
        let ramp = engine.backend().last_param(Param::ReverbWet).unwrap();
        assert_eq!(ramp.seconds, RAMP_SMOOTH);
    }

    #[test]
    fn unavailable_backend_schedules_nothing() {
        let snapshots = SnapshotHandle::new();
        let backend = RecordingBackend::unavailable("device busy");
        let mut engine = AmbientEngine::new(backend, Settings::default(), snapshots, seeded(1));

        let err = engine.start().unwrap_err();
        assert!(matches!(err, PainterError::BackendUnavailable(_)));
        assert!(!engine.is_running());
        assert_eq!(engine.advance_to(60.0), 0);
        assert!(engine.backend().calls().is_empty());
    }

    #[test]
    fn melodic_layers_wait_for_first_snapshot() {
        let (mut engine, snapshots) = engine(Settings::default());
        engine.start().unwrap();
        engine.advance_to(10.0);
        assert_eq!(engine.backend().notes(VoiceLayer::Particle).count(), 0);
        assert_eq!(engine.backend().notes(VoiceLayer::Air).count(), 0);
        assert!(engine.backend().attacks().count() >= 1);

        snapshots.publish(busy_scene());
        engine.advance_to(20.0);
        assert!(engine.backend().notes(VoiceLayer::Particle).count() > 0);
    }

    #[test]
    fn chord_changes_release_the_previous_voices() {
        let (mut engine, snapshots) = engine(Settings::default());
        snapshots.publish(busy_scene());
        engine.start().unwrap();
        engine.advance_to(30.0);

        let attacks = engine.backend().attacks().count();
        assert!(attacks >= 3);
        let mut held = Vec::new();
        for call in engine.backend().calls() {
            match call {
                BackendCall::Attack { pitches, .. } => {
                    assert!(held.is_empty(), "attack while {held:?} still sounding");
                    held = pitches.clone();
                }
                BackendCall::Release { pitches, .. } => {
                    assert_eq!(pitches, &held);
                    held.clear();
                }
                _ => {}
            }
        }
        assert_eq!(engine.backend().sounding().len(), held.len());
    }

    #[test]
    fn stop_releases_voices_and_clears_state() {
        let (mut engine, snapshots) = engine(Settings::default());
        snapshots.publish(busy_scene());
        engine.start().unwrap();
        engine.advance_to(5.0);
        assert!(!engine.backend().sounding().is_empty());

        engine.stop();
        assert!(!engine.is_running());
        assert!(engine.backend().sounding().is_empty());
        assert!(!engine.harmony().is_active());
        assert_eq!(engine.harmony().last_melodic, Default::default());

        let calls = engine.backend().calls().len();
        engine.advance_to(60.0);
        assert_eq!(engine.backend().calls().len(), calls);

        engine.stop();
        assert_eq!(engine.backend().calls().len(), calls);
    }

    #[test]
    fn restart_reseeds_harmony() {
        let (mut engine, snapshots) = engine(Settings::default());
        snapshots.publish(busy_scene());
        engine.start().unwrap();
        engine.advance_to(3.0);
        engine.stop();

        engine.start().unwrap();
        let mut clock = PlaybackClock::default();
        clock.advance(3.0 + START_OFFSET);
        engine.pump(&clock);
        let chord = engine.last_chord().unwrap();
        assert_eq!(chord.degree, 0);
        assert!(chord.released.is_empty());
    }

    #[test]
    fn start_is_idempotent() {
        let (mut engine, _) = engine(Settings::default());
        engine.start().unwrap();
        engine.start().unwrap();
        engine.advance_to(START_OFFSET);
        assert_eq!(engine.backend().attacks().count(), 1);
    }
}
