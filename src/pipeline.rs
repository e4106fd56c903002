// THEORY:
// The `pipeline` module is the top-level API of the engine. A `MotionPipeline` is
// one camera session: it owns the detector, the event tracker and the notification
// gate, and pushes every frame through them in a fixed order.
//
// Per frame:
// 1.  **Validation**: the first accepted frame fixes the session geometry. Frames
//     with other dimensions, or with a timestamp earlier than the last accepted
//     one, are rejected before they touch any state.
// 2.  **Detection**: preprocess, then ask the configured detector for a mask and
//     regions.
// 3.  **Behavior**: the tracker folds the motion flag into the event lifecycle.
// 4.  **Hand-off**: frames seen while an event is open, and every completed event
//     with the gate's decision, go to the `EventSink`. The sink must not block.
//
// The pipeline is synchronous and `&mut self` throughout. Concurrency lives in the
// runner and the dispatcher, never in here.

use crate::config::{DetectionConfig, SessionConfig};
use crate::core_modules::event_tracker::{EventTracker, Phase, Transition};
use crate::core_modules::mask::ForegroundMask;
use crate::core_modules::motion_detector::{MotionDetector, build_detector};
use crate::core_modules::notification_gate::NotificationGate;
use crate::core_modules::preprocessor::preprocess;
use crate::dispatch::{EventSink, NoopSink};
use crate::error::{ConfigError, InputError};
use crate::stats::SessionStats;
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::event_tracker::{MotionEvent, Timestamp};
pub use crate::core_modules::frame::Frame;
pub use crate::core_modules::region_extractor::Region;

/// What one processed frame produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub motion: bool,
    pub mask: ForegroundMask,
    pub regions: Vec<Region>,
    /// Set on the frame whose quiet streak closed an event.
    pub completed_event: Option<MotionEvent>,
    pub warming_up: bool,
}

/// One detection session over a single frame source.
pub struct MotionPipeline<S: EventSink = NoopSink> {
    config: SessionConfig,
    detector: Box<dyn MotionDetector>,
    tracker: EventTracker,
    gate: NotificationGate,
    stats: SessionStats,
    geometry: Option<(u32, u32, u8)>,
    sink: S,
}

impl MotionPipeline<NoopSink> {
    /// A session whose output is only returned, never handed off.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_sink(config, NoopSink)
    }
}

impl<S: EventSink> MotionPipeline<S> {
    pub fn with_sink(config: SessionConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            algorithm = ?config.detection.algorithm,
            sensitivity = config.detection.sensitivity,
            min_area = config.detection.min_area,
            "motion pipeline created"
        );
        Ok(Self {
            detector: build_detector(&config.detection),
            tracker: EventTracker::new(config.tracker.clone()),
            gate: NotificationGate::new(&config.notifications),
            stats: SessionStats::default(),
            geometry: None,
            sink,
            config,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Swaps detection parameters mid-session. The detector restarts from scratch
    /// (a background model warms up again); any open event stays open.
    pub fn configure(&mut self, detection: DetectionConfig) -> Result<(), ConfigError> {
        detection.validate()?;
        self.detector = build_detector(&detection);
        info!(
            algorithm = ?detection.algorithm,
            sensitivity = detection.sensitivity,
            min_area = detection.min_area,
            "detection reconfigured"
        );
        self.config.detection = detection;
        Ok(())
    }

    pub fn process_frame(
        &mut self,
        frame: &Frame,
        timestamp: Timestamp,
    ) -> Result<FrameResult, InputError> {
        if let Err(e) = self.accept(frame, timestamp) {
            self.stats.record_rejected();
            warn!(error = %e, ?timestamp, "frame rejected");
            return Err(e);
        }
        self.geometry = Some(frame.geometry());

        let processed = preprocess(frame, &self.config.detection);
        let detection = self.detector.detect(&processed);
        debug!(
            motion = detection.motion,
            regions = detection.regions.len(),
            foreground = detection.mask.count(),
            warming_up = detection.warming_up,
            "frame analysed"
        );

        let transition = self.tracker.update(detection.motion, &detection.regions, timestamp)?;
        self.stats.record_frame(timestamp);

        let completed_event = match transition {
            Transition::None => None,
            Transition::Opened(id) => {
                self.stats.record_start(timestamp);
                self.sink.event_frame(id, frame, timestamp);
                None
            }
            Transition::Extended | Transition::Cooling { .. } => {
                if let Some(id) = self.tracker.open_event().map(|e| e.id) {
                    self.sink.event_frame(id, frame, timestamp);
                }
                None
            }
            Transition::Closed(event) => Some(self.complete(event, timestamp)),
        };

        Ok(FrameResult {
            motion: detection.motion,
            mask: detection.mask,
            regions: detection.regions,
            completed_event,
            warming_up: detection.warming_up,
        })
    }

    /// Ends the session at `at`. An open event is closed at `at` (never before its
    /// last motion frame), gated and handed off, then detector and tracker start
    /// over. Calling it again returns `None`.
    pub fn stop(&mut self, at: Timestamp) -> Option<MotionEvent> {
        let flushed = self.tracker.finish(at).map(|event| {
            let now = event.end_time.map_or(at, |end| end.max(at));
            self.complete(event, now)
        });
        self.tracker.reset();
        self.detector.reset();
        self.gate.reset();
        self.geometry = None;
        info!(flushed = flushed.is_some(), "motion pipeline stopped");
        flushed
    }

    pub fn phase(&self) -> Phase {
        self.tracker.phase()
    }

    pub fn open_event(&self) -> Option<&MotionEvent> {
        self.tracker.open_event()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Recently completed events, oldest first.
    pub fn recent_events(&self) -> impl Iterator<Item = &MotionEvent> {
        self.tracker.history()
    }

    pub fn clear_history(&mut self) {
        self.tracker.clear_history();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn accept(&self, frame: &Frame, timestamp: Timestamp) -> Result<(), InputError> {
        if let Some(expected) = self.geometry {
            if expected != frame.geometry() {
                return Err(InputError::DimensionMismatch {
                    expected,
                    actual: frame.geometry(),
                });
            }
        }
        self.tracker.check_order(timestamp)
    }

    fn complete(&mut self, mut event: MotionEvent, now: Timestamp) -> MotionEvent {
        let notify = self.gate.evaluate(&mut event, now);
        self.stats.record_completed(&event);
        self.sink.event_completed(&event, notify);
        self.tracker.record_completed(event.clone());
        event
    }
}
