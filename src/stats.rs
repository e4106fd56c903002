// THEORY:
// Session statistics are the running counters a host shows next to the live feed:
// how many events, how much total motion time, when the last one started, and how
// fast the pipeline is actually processing frames. They are cheap to keep and
// live with the session. Charting and reports over the event history are left to
// the statistics collaborator.

use crate::core_modules::event_tracker::{MotionEvent, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const FPS_WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Events opened this session.
    pub total_detections: u64,
    /// Events closed this session, by hysteresis or by stop.
    pub completed_events: u64,
    /// Sum of durations of completed events.
    pub total_duration: Duration,
    /// Start time of the most recent event.
    pub last_detection: Option<Timestamp>,
    /// Frames per second over the last completed one-second window.
    pub fps: f64,
    pub frames_processed: u64,
    pub frames_rejected: u64,
    #[serde(skip)]
    window_start: Option<Timestamp>,
    #[serde(skip)]
    window_frames: u32,
}

impl SessionStats {
    pub(crate) fn record_frame(&mut self, timestamp: Timestamp) {
        self.frames_processed += 1;
        let Some(start) = self.window_start else {
            self.window_start = Some(timestamp);
            return;
        };
        self.window_frames += 1;
        let elapsed = timestamp.saturating_sub(start);
        if elapsed >= FPS_WINDOW {
            self.fps = self.window_frames as f64 / elapsed.as_secs_f64();
            self.window_start = Some(timestamp);
            self.window_frames = 0;
        }
    }

    pub(crate) fn record_rejected(&mut self) {
        self.frames_rejected += 1;
    }

    pub(crate) fn record_start(&mut self, timestamp: Timestamp) {
        self.total_detections += 1;
        self.last_detection = Some(timestamp);
    }

    pub(crate) fn record_completed(&mut self, event: &MotionEvent) {
        self.completed_events += 1;
        self.total_duration += event.duration();
    }

    /// Mean duration of completed events, if any completed.
    pub fn average_duration(&self) -> Option<Duration> {
        (self.completed_events > 0)
            .then(|| self.total_duration.div_f64(self.completed_events as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_measured_over_one_second_windows() {
        let mut stats = SessionStats::default();
        for i in 0..=10u64 {
            stats.record_frame(Duration::from_millis(i * 100));
        }
        assert_eq!(stats.frames_processed, 11);
        assert!((stats.fps - 10.0).abs() < 1e-9);
    }

    #[test]
    fn detections_accumulate() {
        let mut stats = SessionStats::default();
        stats.record_start(Duration::from_secs(3));
        stats.record_completed(&MotionEvent {
            id: 1,
            start_time: Duration::from_secs(3),
            end_time: Some(Duration::from_secs(7)),
            regions: Vec::new(),
            triggered_notification: false,
            frame_count: 4,
        });
        assert_eq!(stats.total_detections, 1);
        assert_eq!(stats.last_detection, Some(Duration::from_secs(3)));
        assert_eq!(stats.total_duration, Duration::from_secs(4));
        assert_eq!(stats.completed_events, 1);
        assert_eq!(stats.average_duration(), Some(Duration::from_secs(4)));
    }

    #[test]
    fn average_is_none_until_an_event_completes() {
        let mut stats = SessionStats::default();
        assert_eq!(stats.average_duration(), None);
        for (start, end) in [(0, 2), (10, 16)] {
            stats.record_start(Duration::from_secs(start));
            stats.record_completed(&MotionEvent {
                id: start,
                start_time: Duration::from_secs(start),
                end_time: Some(Duration::from_secs(end)),
                regions: Vec::new(),
                triggered_notification: false,
                frame_count: 1,
            });
        }
        assert_eq!(stats.completed_events, 2);
        assert_eq!(stats.average_duration(), Some(Duration::from_secs(4)));
    }
}
