// THEORY:
// The event tracker is the behavioral layer. It turns the flickering per-frame
// motion flag into a discrete, historical narrative of events, `MotionEvent`s,
// each with a start, an end and the regions seen along the way.
//
// Lifecycle of an event:
// - **Birth**: the first motion frame while `Idle` opens an event stamped with that
//   frame's timestamp.
// - **Growth**: every further motion frame appends its regions and marks itself as
//   the latest moment that still had motion.
// - **Cooling**: motion-free frames are counted, not acted on. Only after
//   `end_hysteresis_frames` consecutive quiet frames does the event close, so a
//   single missed detection does not split one physical event in two. The end
//   time is the last frame that still had motion, not the frame that closed it.
// - **Forced close**: `finish` closes an open event at the stop timestamp, so
//   stopping a session never drops an event.
//
// At most one event is open at a time. Completed events are handed out by value.
// Whoever finalizes them (gate decision included) files them back into a short
// rolling history with `record_completed`.

use crate::config::TrackerConfig;
use crate::core_modules::region_extractor::Region;
use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};

/// Position on the session's monotonic clock.
pub type Timestamp = Duration;

/// One region observed during an event, with the frame it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub timestamp: Timestamp,
    pub region: Region,
}

/// The durable output of the pipeline: one debounced period of motion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub id: u64,
    pub start_time: Timestamp,
    /// `None` while the event is still open.
    pub end_time: Option<Timestamp>,
    /// Regions in frame order.
    pub regions: Vec<RegionSnapshot>,
    pub triggered_notification: bool,
    /// Motion frames that contributed to this event.
    pub frame_count: u32,
}

impl MotionEvent {
    fn open(id: u64, start_time: Timestamp) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            regions: Vec::new(),
            triggered_notification: false,
            frame_count: 0,
        }
    }

    fn record(&mut self, timestamp: Timestamp, regions: &[Region]) {
        self.frame_count += 1;
        self.regions.extend(regions.iter().map(|&region| RegionSnapshot { timestamp, region }));
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// `end_time - start_time`, or zero while the event is open.
    pub fn duration(&self) -> Duration {
        self.end_time
            .map(|end| end.saturating_sub(self.start_time))
            .unwrap_or(Duration::ZERO)
    }

    /// The tabular shape hosts persist in their event logs.
    pub fn log_row(&self) -> EventLogRow {
        EventLogRow {
            id: self.id,
            start_secs: self.start_time.as_secs_f64(),
            end_secs: self.end_time.map(|end| end.as_secs_f64()),
            duration_secs: self.duration().as_secs_f64(),
            region_count: self.regions.len(),
        }
    }
}

/// Flat event summary: id, start, end, duration, region count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogRow {
    pub id: u64,
    pub start_secs: f64,
    pub end_secs: Option<f64>,
    pub duration_secs: f64,
    pub region_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Active,
}

/// What a single `update` did to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Idle and still idle.
    None,
    /// A new event was opened.
    Opened(u64),
    /// The open event absorbed another motion frame.
    Extended,
    /// Motion is absent but the hysteresis window has not elapsed yet.
    Cooling { quiet_frames: u32 },
    /// The open event closed and is returned by value.
    Closed(MotionEvent),
}

pub struct EventTracker {
    config: TrackerConfig,
    open: Option<MotionEvent>,
    quiet_frames: u32,
    last_motion_time: Timestamp,
    last_timestamp: Option<Timestamp>,
    next_id: u64,
    history: VecDeque<MotionEvent>,
}

impl EventTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_len),
            config,
            open: None,
            quiet_frames: 0,
            last_motion_time: Duration::ZERO,
            last_timestamp: None,
            next_id: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.open.is_some() {
            Phase::Active
        } else {
            Phase::Idle
        }
    }

    pub fn open_event(&self) -> Option<&MotionEvent> {
        self.open.as_ref()
    }

    /// Completed events, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &MotionEvent> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Rejects a timestamp earlier than the last accepted one. Equal timestamps pass.
    pub fn check_order(&self, timestamp: Timestamp) -> Result<(), InputError> {
        match self.last_timestamp {
            Some(last) if timestamp < last => Err(InputError::OutOfOrder { timestamp, last }),
            _ => Ok(()),
        }
    }

    /// Feeds one frame's motion result into the state machine.
    pub fn update(
        &mut self,
        motion: bool,
        regions: &[Region],
        timestamp: Timestamp,
    ) -> Result<Transition, InputError> {
        self.check_order(timestamp)?;
        self.last_timestamp = Some(timestamp);

        let transition = match (self.open.as_mut(), motion) {
            (None, false) => Transition::None,
            (None, true) => {
                let mut event = MotionEvent::open(self.next_id, timestamp);
                self.next_id += 1;
                event.record(timestamp, regions);
                self.last_motion_time = timestamp;
                self.quiet_frames = 0;
                info!(event_id = event.id, start = ?timestamp, "motion event started");
                let id = event.id;
                self.open = Some(event);
                Transition::Opened(id)
            }
            (Some(event), true) => {
                event.record(timestamp, regions);
                self.last_motion_time = timestamp;
                self.quiet_frames = 0;
                Transition::Extended
            }
            (Some(_), false) => {
                self.quiet_frames += 1;
                if self.quiet_frames >= self.config.end_hysteresis_frames {
                    let end = self.last_motion_time;
                    self.close(end).map_or(Transition::None, Transition::Closed)
                } else {
                    debug!(quiet_frames = self.quiet_frames, "motion paused");
                    Transition::Cooling {
                        quiet_frames: self.quiet_frames,
                    }
                }
            }
        };

        Ok(transition)
    }

    /// Force-closes the open event at `at`. Returns `None` when already idle.
    ///
    /// The end never precedes the last motion frame, so every region snapshot
    /// lies within `start_time..=end_time`.
    pub fn finish(&mut self, at: Timestamp) -> Option<MotionEvent> {
        let at = at.max(self.last_motion_time);
        self.close(at)
    }

    /// Appends a completed event to the rolling history, evicting the oldest.
    pub fn record_completed(&mut self, event: MotionEvent) {
        if self.config.history_len == 0 {
            return;
        }
        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }

    /// Drops any open event and the timestamp ordering. The id counter and the
    /// history survive, so ids stay unique and past events stay visible.
    pub fn reset(&mut self) {
        self.open = None;
        self.quiet_frames = 0;
        self.last_motion_time = Duration::ZERO;
        self.last_timestamp = None;
    }

    fn close(&mut self, at: Timestamp) -> Option<MotionEvent> {
        let mut event = self.open.take()?;
        event.end_time = Some(at.max(event.start_time));
        self.quiet_frames = 0;
        info!(
            event_id = event.id,
            duration = ?event.duration(),
            regions = event.regions.len(),
            "motion event ended"
        );
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Timestamp {
        Duration::from_millis(millis)
    }

    fn region() -> Region {
        Region { x: 1, y: 2, width: 3, height: 4, area: 12 }
    }

    fn tracker(hysteresis: u32) -> EventTracker {
        EventTracker::new(TrackerConfig {
            end_hysteresis_frames: hysteresis,
            history_len: 3,
        })
    }

    #[test]
    fn motion_burst_becomes_one_event() {
        let mut tracker = tracker(3);
        let mut completed = Vec::new();
        for i in 0..20u64 {
            let motion = (2..=7).contains(&i);
            let regions = if motion { vec![region()] } else { vec![] };
            if let Transition::Closed(event) = tracker.update(motion, &regions, ms(i * 100)).unwrap() {
                completed.push(event);
            }
        }
        assert_eq!(completed.len(), 1);
        let event = &completed[0];
        assert_eq!(event.start_time, ms(200));
        assert_eq!(event.end_time, Some(ms(700)));
        assert_eq!(event.duration(), ms(500));
        assert_eq!(event.frame_count, 6);
        assert_eq!(event.regions.len(), 6);
        assert_eq!(tracker.phase(), Phase::Idle);
    }

    #[test]
    fn short_gap_does_not_split_event() {
        let mut tracker = tracker(3);
        let pattern = [true, true, false, false, true, true, false, false, false];
        let mut transitions = Vec::new();
        for (i, &motion) in pattern.iter().enumerate() {
            transitions.push(tracker.update(motion, &[], ms(i as u64 * 10)).unwrap());
        }
        assert_eq!(transitions[0], Transition::Opened(1));
        assert_eq!(transitions[2], Transition::Cooling { quiet_frames: 1 });
        assert_eq!(transitions[4], Transition::Extended);
        match transitions.last() {
            Some(Transition::Closed(event)) => {
                assert_eq!(event.start_time, ms(0));
                assert_eq!(event.end_time, Some(ms(50)));
            }
            other => panic!("expected a closed event, got {other:?}"),
        }
    }

    #[test]
    fn regions_are_kept_in_frame_order() {
        let mut tracker = tracker(1);
        let a = Region { x: 0, ..region() };
        let b = Region { x: 9, ..region() };
        tracker.update(true, &[a], ms(1)).unwrap();
        tracker.update(true, &[b, a], ms(2)).unwrap();
        let event = tracker.finish(ms(3)).unwrap();
        let seen: Vec<(Timestamp, u32)> =
            event.regions.iter().map(|s| (s.timestamp, s.region.x)).collect();
        assert_eq!(seen, vec![(ms(1), 0), (ms(2), 9), (ms(2), 0)]);
    }

    #[test]
    fn finish_closes_at_stop_time_and_is_idempotent() {
        let mut tracker = tracker(5);
        tracker.update(true, &[region()], ms(1_000)).unwrap();
        tracker.update(false, &[], ms(1_100)).unwrap();
        let event = tracker.finish(ms(1_500)).unwrap();
        assert_eq!(event.end_time, Some(ms(1_500)));
        assert!(tracker.finish(ms(1_600)).is_none());
    }

    #[test]
    fn finish_never_yields_negative_duration() {
        let mut tracker = tracker(5);
        tracker.update(true, &[], ms(2_000)).unwrap();
        let event = tracker.finish(ms(1_000)).unwrap();
        assert_eq!(event.end_time, Some(ms(2_000)));
        assert_eq!(event.duration(), Duration::ZERO);
    }

    #[test]
    fn finish_never_ends_before_the_last_motion_frame() {
        let mut tracker = tracker(5);
        for t in [100, 200, 300, 400] {
            tracker.update(true, &[region()], ms(t)).unwrap();
        }
        let event = tracker.finish(ms(150)).unwrap();
        assert_eq!(event.end_time, Some(ms(400)));
        let last_region = event.regions.last().map(|s| s.timestamp);
        assert!(last_region <= event.end_time);
    }

    #[test]
    fn closing_leaves_history_to_the_caller() {
        let mut tracker = tracker(1);
        tracker.update(true, &[], ms(0)).unwrap();
        let event = tracker.finish(ms(10)).unwrap();
        assert_eq!(tracker.history().count(), 0);
        tracker.record_completed(event);
        assert_eq!(tracker.history().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn out_of_order_frames_are_rejected() {
        let mut tracker = tracker(2);
        tracker.update(true, &[], ms(500)).unwrap();
        let err = tracker.update(true, &[], ms(400)).unwrap_err();
        assert_eq!(err, InputError::OutOfOrder { timestamp: ms(400), last: ms(500) });
        assert!(tracker.update(true, &[], ms(500)).is_ok());
        assert_eq!(tracker.open_event().unwrap().frame_count, 2);
    }

    #[test]
    fn history_is_bounded() {
        let mut tracker = tracker(1);
        for i in 0..5u64 {
            tracker.update(true, &[], ms(i * 100)).unwrap();
            if let Transition::Closed(event) = tracker.update(false, &[], ms(i * 100 + 50)).unwrap() {
                tracker.record_completed(event);
            }
        }
        let ids: Vec<u64> = tracker.history().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        tracker.clear_history();
        assert_eq!(tracker.history().count(), 0);
    }

    #[test]
    fn log_row_summarizes_event() {
        let mut tracker = tracker(1);
        tracker.update(true, &[region(), region()], ms(1_000)).unwrap();
        tracker.update(true, &[region()], ms(3_500)).unwrap();
        let row = tracker.finish(ms(3_500)).unwrap().log_row();
        assert_eq!(row.id, 1);
        assert_eq!(row.start_secs, 1.0);
        assert_eq!(row.end_secs, Some(3.5));
        assert_eq!(row.duration_secs, 2.5);
        assert_eq!(row.region_count, 3);
    }
}
