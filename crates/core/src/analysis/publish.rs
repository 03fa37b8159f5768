use std::sync::{Arc, Mutex, PoisonError};

use super::{FeatureExtractor, FeatureSnapshot, FrameSource};
use crate::{config::SettingsProvider, timeline::PeriodicTask};

/// Latest published snapshot, shared between the analysis loop (sole
/// writer) and the generator (reader). Readers always see a whole snapshot.
#[derive(Clone, Default)]
pub struct SnapshotHandle {
    shared: Arc<Mutex<Option<Arc<FeatureSnapshot>>>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: FeatureSnapshot) {
        let mut slot = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(snapshot));
    }

    /// `None` until the first publish.
    pub fn latest(&self) -> Option<Arc<FeatureSnapshot>> {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        let mut slot = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

impl std::fmt::Debug for SnapshotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotHandle")
            .field("published", &self.latest().is_some())
            .finish()
    }
}

/// Runs the extractor on its own cadence and publishes each result.
pub struct AnalysisDriver<S> {
    source: S,
    extractor: FeatureExtractor,
    snapshots: SnapshotHandle,
    settings: Box<dyn SettingsProvider>,
}

impl<S: FrameSource> AnalysisDriver<S> {
    pub fn new(
        source: S,
        settings: impl SettingsProvider + 'static,
        snapshots: SnapshotHandle,
    ) -> Self {
        Self {
            source,
            extractor: FeatureExtractor::new(),
            snapshots,
            settings: Box::new(settings),
        }
    }

    pub fn snapshots(&self) -> &SnapshotHandle {
        &self.snapshots
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Analyses the current frame, if any, and returns the seconds until the
    /// next tick at the configured rate.
    pub fn tick(&mut self, now: f64) -> f64 {
        let settings = self.settings.current();
        let analysis = &settings.analysis;
        if let Some(snapshot) = self.extractor.tick(&mut self.source, analysis, now) {
            tracing::trace!(
                hue = snapshot.dominant_hue_degrees,
                brightness = snapshot.brightness,
                motion = snapshot.motion,
                "snapshot published"
            );
            self.snapshots.publish(snapshot);
        }
        1.0 / f64::from(analysis.rate())
    }
}

impl<S: FrameSource + 'static> AnalysisDriver<S> {
    /// The driver's tick as a transport task.
    pub fn task() -> PeriodicTask<Self> {
        Box::new(|driver: &mut Self, now| driver.tick(now))
    }
}

impl<S> std::fmt::Debug for AnalysisDriver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisDriver")
            .field("extractor", &self.extractor)
            .field("snapshots", &self.snapshots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::VideoFrame,
        config::Settings,
        timeline::{Scheduler, Transport},
    };

    struct Blank(Option<VideoFrame>);

    impl FrameSource for Blank {
        fn current_frame(&mut self) -> Option<VideoFrame> {
            self.0.clone()
        }
    }

    #[test]
    fn publishes_only_when_a_frame_exists() {
        let handle = SnapshotHandle::new();
        let mut driver = AnalysisDriver::new(Blank(None), Settings::default(), handle.clone());

        driver.tick(0.0);
        assert!(handle.latest().is_none());

        driver.source_mut().0 = Some(VideoFrame::solid(8, 8, [255, 0, 0]));
        let next = driver.tick(0.1);
        let snap = handle.latest().expect("snapshot after a frame");
        assert_eq!(snap.timestamp, 0.1);
        let rate = Settings::default().analysis.rate();
        assert!((next - 1.0 / f64::from(rate)).abs() < 1e-12);
    }

    #[test]
    fn runs_at_analysis_rate_on_a_transport() {
        let handle = SnapshotHandle::new();
        let mut settings = Settings::default();
        settings.analysis.fps = 10;
        let frame = VideoFrame::solid(8, 8, [0, 255, 0]);
        let mut driver = AnalysisDriver::new(Blank(Some(frame)), settings, handle.clone());

        let mut transport = Transport::new();
        transport.schedule_at(0.0, AnalysisDriver::<Blank>::task());
        let ticks = transport.advance_to(&mut driver, 0.95);
        assert_eq!(ticks, 10);
        assert!(handle.latest().is_some());

        handle.clear();
        assert!(handle.latest().is_none());
    }
}
