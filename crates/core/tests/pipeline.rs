use ambient_painter_core::{
    harmony::unique_pitch_classes, random::seeded, AmbientEngine, AnalysisDriver, BackendCall,
    ChordColor, FeatureExtractor, FrameSource, RecordingBackend, ScaleMode, Scheduler, Settings,
    SharedSettings, SnapshotHandle, Transport, VideoFrame, VoiceLayer,
};

/// Camera stand-in that cycles through a fixed list of frames.
struct Reel {
    frames: Vec<VideoFrame>,
    next: usize,
}

impl Reel {
    fn still(frame: VideoFrame) -> Self {
        Self {
            frames: vec![frame],
            next: 0,
        }
    }

    fn flicker() -> Self {
        Self {
            frames: vec![
                VideoFrame::solid(48, 48, [250, 250, 250]),
                VideoFrame::solid(48, 48, [5, 5, 5]),
            ],
            next: 0,
        }
    }
}

impl FrameSource for Reel {
    fn current_frame(&mut self) -> Option<VideoFrame> {
        let frame = self.frames.get(self.next % self.frames.len()).cloned();
        self.next += 1;
        frame
    }
}

struct Rig {
    engine: AmbientEngine<RecordingBackend>,
    driver: AnalysisDriver<Reel>,
    analysis: Transport<AnalysisDriver<Reel>>,
    now: f64,
}

impl Rig {
    fn new(settings: Settings, reel: Reel) -> Self {
        let shared = SharedSettings::new(settings);
        let snapshots = SnapshotHandle::new();
        let driver = AnalysisDriver::new(reel, shared.clone(), snapshots.clone());
        let engine = AmbientEngine::new(RecordingBackend::new(), shared, snapshots, seeded(11));

        let mut analysis = Transport::new();
        analysis.schedule_at(0.0, AnalysisDriver::<Reel>::task());
        Self {
            engine,
            driver,
            analysis,
            now: 0.0,
        }
    }

    /// Moves both clocks forward in 10 ms steps, calling `each` after every
    /// step.
    fn run_until(&mut self, until: f64, mut each: impl FnMut(&AmbientEngine<RecordingBackend>)) {
        while self.now < until {
            self.now = (self.now + 0.01).min(until);
            self.analysis.advance_to(&mut self.driver, self.now);
            self.engine.advance_to(self.now);
            each(&self.engine);
        }
    }
}

fn red() -> VideoFrame {
    VideoFrame::solid(64, 48, [255, 0, 0])
}

fn ionian_triads() -> Settings {
    let mut settings = Settings::default();
    settings.harmony.mode = ScaleMode::Ionian;
    settings.harmony.chord_color = ChordColor::Triad;
    settings.harmony.root_from_hue = 1.0;
    settings
}

#[test]
fn red_scene_opens_on_c_major_and_holds_the_key() {
    let mut rig = Rig::new(ionian_triads(), Reel::still(red()));
    rig.run_until(0.02, |_| {});
    rig.engine.start().unwrap();

    let mut keys = Vec::new();
    let mut chords_seen = 0;
    rig.run_until(45.0, |engine| {
        let attacks = engine.backend().attacks().count();
        if attacks > chords_seen {
            chords_seen = attacks;
            keys.push(engine.harmony().key());
        }
    });

    let first = rig
        .engine
        .backend()
        .attacks()
        .next()
        .cloned()
        .expect("a chord was played");
    let BackendCall::Attack { pitches, .. } = first else {
        unreachable!()
    };
    let mut pcs = unique_pitch_classes(&pitches);
    pcs.sort_unstable();
    assert_eq!(pcs, vec![0, 4, 7]);

    assert!(keys.len() >= 6, "only {} chords", keys.len());
    assert!(keys.iter().all(|k| *k == Some(0)));
}

#[test]
fn zero_density_keeps_particles_silent() {
    let mut settings = Settings::default();
    settings.texture.density_base = 0.0;
    settings.texture.density_from_motion = 0.0;
    settings.texture.density_from_edge = 0.0;

    let mut rig = Rig::new(settings, Reel::flicker());
    rig.engine.start().unwrap();
    rig.run_until(20.0, |_| {});

    assert_eq!(rig.engine.backend().notes(VoiceLayer::Particle).count(), 0);
    assert!(rig.engine.backend().attacks().count() > 0);
}

#[test]
fn disabled_air_layer_is_silent() {
    let mut settings = Settings::default();
    settings.air.enabled = false;
    settings.air.amount = 1.0;

    let mut rig = Rig::new(settings, Reel::still(red()));
    rig.engine.start().unwrap();
    rig.run_until(30.0, |_| {});
    assert_eq!(rig.engine.backend().notes(VoiceLayer::Air).count(), 0);
}

#[test]
fn air_notes_sit_in_the_high_register() {
    let mut settings = Settings::default();
    settings.air.amount = 1.0;

    let mut rig = Rig::new(settings, Reel::still(red()));
    rig.engine.start().unwrap();
    rig.run_until(30.0, |_| {});

    let pitches: Vec<i32> = rig
        .engine
        .backend()
        .notes(VoiceLayer::Air)
        .filter_map(|call| match call {
            BackendCall::Note { pitch, .. } => Some(*pitch),
            _ => None,
        })
        .collect();
    assert!(!pitches.is_empty());
    assert!(pitches.iter().all(|p| (84..=119).contains(p)));
}

#[test]
fn stop_silences_everything() {
    let mut rig = Rig::new(Settings::default(), Reel::flicker());
    rig.engine.start().unwrap();
    rig.run_until(6.0, |_| {});
    assert!(!rig.engine.backend().sounding().is_empty());

    rig.engine.stop();
    assert!(rig.engine.backend().sounding().is_empty());
    assert_eq!(rig.engine.harmony().key(), None);
    assert!(rig.engine.harmony().chord().is_empty());

    let calls = rig.engine.backend().calls().len();
    rig.run_until(20.0, |_| {});
    assert_eq!(rig.engine.backend().calls().len(), calls);
}

#[test]
fn unavailable_backend_never_ticks() {
    let snapshots = SnapshotHandle::new();
    let backend = RecordingBackend::unavailable("no output device");
    let mut engine = AmbientEngine::new(backend, Settings::default(), snapshots, seeded(2));

    assert!(engine.start().is_err());
    assert_eq!(engine.advance_to(120.0), 0);
    assert!(engine.backend().calls().is_empty());
}

#[test]
fn resize_resets_motion() {
    let shared = SharedSettings::new(Settings::default());
    let snapshots = SnapshotHandle::new();
    let mut driver = AnalysisDriver::new(Reel::flicker(), shared.clone(), snapshots.clone());

    for i in 0..60 {
        driver.tick(f64::from(i) * 0.05);
    }
    let moving = snapshots.latest().unwrap();
    assert!(moving.motion > 0.5, "motion {}", moving.motion);

    shared.update(|s| s.analysis.size = 64);
    driver.tick(3.0);
    let resized = snapshots.latest().unwrap();
    assert_eq!(resized.frame_size, 64);
    assert_eq!(resized.motion, 0.0);
}

#[test]
fn identical_frames_are_still_and_equally_contrasted() {
    let frame = VideoFrame::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            [200, 120, 40]
        } else {
            [20, 40, 90]
        }
    });
    let settings = Settings::default().analysis;
    let mut extractor = FeatureExtractor::new();

    let a = extractor.extract(&frame, &settings, 0.0);
    let b = extractor.extract(&frame, &settings, 0.05);
    assert!(b.motion < 1e-6);
    assert!((a.contrast - b.contrast).abs() < 1e-6);
    assert!(a.contrast > 0.0);
}
