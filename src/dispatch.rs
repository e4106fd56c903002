// THEORY:
// The dispatcher is the boundary between the detection loop and everything that
// consumes its output. The loop must never wait on a collaborator: a slow disk or
// a hanging webhook cannot be allowed to eat into the frame budget.
//
// Architecture:
// 1.  **One task per collaborator**: recording, statistics and notification
//     delivery each run in their own spawned Tokio task, fed by its own bounded
//     channel. A stalled collaborator only fills its own queue.
// 2.  **Non-blocking hand-off**: the pipeline talks to the `EventSink` trait, whose
//     methods are synchronous. The dispatcher implements it with `try_send`; when a
//     queue is full or its task is gone the message is dropped, counted and
//     logged. Frames are never queued behind each other across collaborators.
// 3.  **Delivery is fire-and-forget**: the gate has already decided. Delivery
//     failures are logged here and go nowhere else.

use crate::config::ChannelConfig;
use crate::core_modules::event_tracker::{MotionEvent, Timestamp};
use crate::core_modules::frame::Frame;
use crate::error::DeliveryError;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The pipeline's view of its consumers. Implementations must return promptly.
pub trait EventSink: Send {
    /// A frame captured while `event_id` is open.
    fn event_frame(&mut self, event_id: u64, frame: &Frame, timestamp: Timestamp);

    /// A completed event; `notify` is the gate's decision for it.
    fn event_completed(&mut self, event: &MotionEvent, notify: bool);
}

/// Sink for sessions run without collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn event_frame(&mut self, _event_id: u64, _frame: &Frame, _timestamp: Timestamp) {}

    fn event_completed(&mut self, _event: &MotionEvent, _notify: bool) {}
}

/// Receives frames while an event is open, and the event once it closes.
#[async_trait]
pub trait RecordingBridge: Send {
    async fn record_frame(&mut self, event_id: u64, frame: Arc<Frame>, timestamp: Timestamp);
    async fn finish_event(&mut self, event: Arc<MotionEvent>);
}

/// Receives every completed event.
#[async_trait]
pub trait StatisticsSink: Send {
    async fn record_event(&mut self, event: Arc<MotionEvent>);
}

/// Delivers an approved event through one configured channel.
#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    async fn deliver(&self, event: &MotionEvent, channel: &ChannelConfig) -> Result<(), DeliveryError>;
}

enum RecordingMessage {
    Frame {
        event_id: u64,
        frame: Arc<Frame>,
        timestamp: Timestamp,
    },
    Finished(Arc<MotionEvent>),
}

/// Configures which collaborators a dispatcher feeds.
pub struct DispatcherBuilder {
    capacity: usize,
    recording: Option<Box<dyn RecordingBridge>>,
    statistics: Option<Box<dyn StatisticsSink>>,
    delivery: Option<(Arc<dyn NotificationDelivery>, Vec<ChannelConfig>)>,
}

impl DispatcherBuilder {
    pub fn recording(mut self, bridge: impl RecordingBridge + 'static) -> Self {
        self.recording = Some(Box::new(bridge));
        self
    }

    pub fn statistics(mut self, sink: impl StatisticsSink + 'static) -> Self {
        self.statistics = Some(Box::new(sink));
        self
    }

    pub fn notifications(
        mut self,
        delivery: impl NotificationDelivery + 'static,
        channels: Vec<ChannelConfig>,
    ) -> Self {
        self.delivery = Some((Arc::new(delivery), channels));
        self
    }

    /// Spawns one task per configured collaborator. Must run inside a Tokio runtime.
    pub fn spawn(self) -> EventDispatcher {
        let capacity = self.capacity.max(1);
        let mut tasks = Vec::new();

        let recording_tx = self.recording.map(|mut bridge| {
            let (tx, mut rx) = mpsc::channel::<RecordingMessage>(capacity);
            tasks.push(tokio::spawn(async move {
                while let Some(message) = rx.recv().await {
                    match message {
                        RecordingMessage::Frame {
                            event_id,
                            frame,
                            timestamp,
                        } => bridge.record_frame(event_id, frame, timestamp).await,
                        RecordingMessage::Finished(event) => bridge.finish_event(event).await,
                    }
                }
            }));
            tx
        });

        let statistics_tx = self.statistics.map(|mut sink| {
            let (tx, mut rx) = mpsc::channel::<Arc<MotionEvent>>(capacity);
            tasks.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    sink.record_event(event).await;
                }
            }));
            tx
        });

        let notification_tx = self.delivery.map(|(delivery, channels)| {
            let (tx, mut rx) = mpsc::channel::<Arc<MotionEvent>>(capacity);
            tasks.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    for channel in &channels {
                        match delivery.deliver(&event, channel).await {
                            Ok(()) => debug!(event_id = event.id, channel = channel.name(), "notification delivered"),
                            Err(e) => warn!(event_id = event.id, channel = channel.name(), error = %e, "notification delivery failed"),
                        }
                    }
                }
            }));
            tx
        });

        EventDispatcher {
            recording_tx,
            statistics_tx,
            notification_tx,
            dropped: 0,
            tasks,
        }
    }
}

/// Fans pipeline output out to collaborator tasks without blocking.
pub struct EventDispatcher {
    recording_tx: Option<mpsc::Sender<RecordingMessage>>,
    statistics_tx: Option<mpsc::Sender<Arc<MotionEvent>>>,
    notification_tx: Option<mpsc::Sender<Arc<MotionEvent>>>,
    dropped: u64,
    tasks: Vec<JoinHandle<()>>,
}

impl EventDispatcher {
    /// `capacity` bounds every collaborator queue.
    pub fn builder(capacity: usize) -> DispatcherBuilder {
        DispatcherBuilder {
            capacity,
            recording: None,
            statistics: None,
            delivery: None,
        }
    }

    /// Messages dropped because a collaborator queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Closes every queue and waits for the collaborator tasks to drain them.
    pub async fn shutdown(self) -> u64 {
        let EventDispatcher {
            recording_tx,
            statistics_tx,
            notification_tx,
            dropped,
            tasks,
        } = self;
        drop((recording_tx, statistics_tx, notification_tx));
        for result in join_all(tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "collaborator task ended abnormally");
            }
        }
        dropped
    }

    fn offer<T>(dropped: &mut u64, tx: &mpsc::Sender<T>, message: T, collaborator: &str) {
        if let Err(e) = tx.try_send(message) {
            *dropped += 1;
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    warn!(collaborator, "collaborator queue full, dropping message")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!(collaborator, "collaborator stopped, dropping message")
                }
            }
        }
    }
}

impl EventSink for EventDispatcher {
    fn event_frame(&mut self, event_id: u64, frame: &Frame, timestamp: Timestamp) {
        if let Some(tx) = &self.recording_tx {
            let message = RecordingMessage::Frame {
                event_id,
                frame: Arc::new(frame.clone()),
                timestamp,
            };
            Self::offer(&mut self.dropped, tx, message, "recording");
        }
    }

    fn event_completed(&mut self, event: &MotionEvent, notify: bool) {
        let event = Arc::new(event.clone());
        if let Some(tx) = &self.recording_tx {
            Self::offer(&mut self.dropped, tx, RecordingMessage::Finished(Arc::clone(&event)), "recording");
        }
        if let Some(tx) = &self.statistics_tx {
            Self::offer(&mut self.dropped, tx, Arc::clone(&event), "statistics");
        }
        if notify {
            if let Some(tx) = &self.notification_tx {
                Self::offer(&mut self.dropped, tx, event, "notifications");
            }
        }
    }
}
