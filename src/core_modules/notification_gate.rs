// THEORY:
// The notification gate decides *whether* a completed event should be forwarded to
// the delivery collaborators; it never decides *how*. Its only memory is the time
// it last fired. The decision is a pure cooldown check, so the gate behaves the
// same whether delivery later succeeds or fails: failures are reported upward and
// never re-arm or retry the gate.

use crate::config::NotificationConfig;
use crate::core_modules::event_tracker::{MotionEvent, Timestamp};
use std::time::Duration;
use tracing::debug;

/// `true` on the first event of a session, or once `cooldown` has elapsed since
/// `last_fire`.
pub fn should_notify(last_fire: Option<Timestamp>, cooldown: Duration, now: Timestamp) -> bool {
    match last_fire {
        None => true,
        Some(last) => now.saturating_sub(last) >= cooldown,
    }
}

#[derive(Debug, Clone)]
pub struct NotificationGate {
    enabled: bool,
    cooldown: Duration,
    last_fire: Option<Timestamp>,
}

impl NotificationGate {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
            cooldown: config.cooldown(),
            last_fire: None,
        }
    }

    pub fn last_fire(&self) -> Option<Timestamp> {
        self.last_fire
    }

    /// Decides for `event` at `now`. On a positive decision records the fire time
    /// and flags the event.
    pub fn evaluate(&mut self, event: &mut MotionEvent, now: Timestamp) -> bool {
        if !self.enabled || !should_notify(self.last_fire, self.cooldown, now) {
            debug!(event_id = event.id, "notification suppressed");
            return false;
        }
        self.last_fire = Some(now);
        event.triggered_notification = true;
        true
    }

    /// Forgets the last fire time, so the next event is treated as the first.
    pub fn reset(&mut self) {
        self.last_fire = None;
    }
}
