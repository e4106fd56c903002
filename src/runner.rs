// THEORY:
// The runner is the session loop a host spawns on its runtime. Capture pushes
// frames into a bounded queue; the runner pulls them one at a time and hands each
// to the pipeline. A `watch` flag asks it to stop.
//
// The stop flag is only looked at between frames, never while one is being
// processed, so a frame is either fully accounted for or not seen at all. When
// the flag flips or capture closes the queue, the open event is flushed at the
// last accepted timestamp and the pipeline is handed back so the host can
// recover its sink.

use crate::core_modules::event_tracker::{EventLogRow, Timestamp};
use crate::core_modules::frame::Frame;
use crate::dispatch::EventSink;
use crate::pipeline::MotionPipeline;
use crate::stats::SessionStats;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// A frame as delivered by a capture source.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub frame: Frame,
    pub timestamp: Timestamp,
}

/// How a session ended and what it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Every event completed during the run, including a flushed one.
    pub events: Vec<EventLogRow>,
    pub stats: SessionStats,
    /// `true` when the stop flag ended the run, `false` when capture ran dry.
    pub stopped_by_signal: bool,
}

/// Drives `pipeline` until `stop` reads `true` or `frames` closes.
pub async fn run_session<S: EventSink>(
    mut pipeline: MotionPipeline<S>,
    mut frames: mpsc::Receiver<CapturedFrame>,
    mut stop: watch::Receiver<bool>,
) -> (MotionPipeline<S>, SessionSummary) {
    info!("session started");
    let mut events = Vec::new();
    let mut last_accepted: Option<Timestamp> = None;
    let mut stop_open = true;

    let stopped_by_signal = loop {
        if *stop.borrow_and_update() {
            break true;
        }

        tokio::select! {
            biased;

            changed = stop.changed(), if stop_open => {
                // A dropped sender can no longer ask us to stop; keep draining frames.
                if changed.is_err() {
                    stop_open = false;
                }
            }
            captured = frames.recv() => {
                let Some(captured) = captured else {
                    break false;
                };
                // Rejections are logged and counted by the pipeline itself.
                if let Ok(result) = pipeline.process_frame(&captured.frame, captured.timestamp) {
                    last_accepted = Some(captured.timestamp);
                    if let Some(event) = result.completed_event {
                        events.push(event.log_row());
                    }
                }
            }
        }
    };

    debug!(stopped_by_signal, "session loop exited");
    if let Some(event) = pipeline.stop(last_accepted.unwrap_or_default()) {
        events.push(event.log_row());
    }

    let summary = SessionSummary {
        events,
        stats: pipeline.stats().clone(),
        stopped_by_signal,
    };
    info!(
        events = summary.events.len(),
        frames = summary.stats.frames_processed,
        rejected = summary.stats.frames_rejected,
        average_secs = summary.stats.average_duration().map(|d| d.as_secs_f64()),
        "session finished"
    );
    (pipeline, summary)
}
