use super::{ProgressBackend, ProgressPayload};
use crate::clock::Clock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Debounced remote progress writer for one lesson.
///
/// `schedule` collapses rapid position updates into at most one network
/// call per debounce window; `flush`/`flush_beacon` bypass the window for
/// seek completions and teardown. Remote failures are logged and swallowed:
/// the local store is the resume source of truth, so a server outage never
/// interrupts playback.
pub struct ProgressSync {
    lesson_id: String,
    backend: Arc<dyn ProgressBackend>,
    clock: Arc<dyn Clock>,
    debounce_interval: Duration,
    completion_threshold: f64,
    pending: Option<ProgressPayload>,
    deadline: Option<Instant>,
    completed: bool,
    last_sent: Option<ProgressPayload>,
}

impl ProgressSync {
    pub fn new(
        lesson_id: impl Into<String>,
        backend: Arc<dyn ProgressBackend>,
        clock: Arc<dyn Clock>,
        debounce_interval: Duration,
        completion_threshold: f64,
    ) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            backend,
            clock,
            debounce_interval,
            completion_threshold,
            pending: None,
            deadline: None,
            completed: false,
            last_sent: None,
        }
    }

    /// Queue a position for the next debounced write.
    ///
    /// The first call in an idle window arms the deadline; later calls just
    /// replace the pending payload, so a burst of updates produces one write.
    pub fn schedule(&mut self, position_seconds: f64, duration_seconds: f64) {
        let payload = self.payload_for(position_seconds, duration_seconds);
        self.pending = Some(payload);
        if self.deadline.is_none() {
            self.deadline = Some(self.clock.now() + self.debounce_interval);
        }
    }

    /// When the pending debounced write should go out, if one is queued.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Send the pending write if its deadline has passed.
    pub async fn run_due(&mut self) {
        let due = self.deadline.is_some_and(|at| self.clock.now() >= at);
        if !due {
            return;
        }
        self.deadline = None;
        if let Some(payload) = self.pending.take() {
            self.send(payload, false).await;
        }
    }

    /// Immediate write, superseding any pending debounce.
    pub async fn flush(&mut self, position_seconds: f64, duration_seconds: f64) {
        let payload = self.payload_for(position_seconds, duration_seconds);
        self.cancel();
        self.send(payload, false).await;
    }

    /// Teardown-time write over the beacon transport, superseding any
    /// pending debounce.
    pub async fn flush_beacon(&mut self, position_seconds: f64, duration_seconds: f64) {
        let payload = self.payload_for(position_seconds, duration_seconds);
        self.cancel();
        self.send(payload, true).await;
    }

    /// Drop any pending write and its deadline.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    /// Whether the completion flag has latched for this session.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Completion latches on and is never reported false again, even if the
    /// position later moves back below the threshold.
    fn payload_for(&mut self, position_seconds: f64, duration_seconds: f64) -> ProgressPayload {
        let mut payload =
            ProgressPayload::at(position_seconds, duration_seconds, self.completion_threshold);
        if self.completed {
            payload.completed = true;
        } else if payload.completed {
            self.completed = true;
        }
        payload
    }

    async fn send(&mut self, payload: ProgressPayload, beacon: bool) {
        if self.last_sent.as_ref() == Some(&payload) {
            debug!(
                "Skipping duplicate progress write for {} at {:.1}s",
                self.lesson_id, payload.position_seconds
            );
            return;
        }

        let result = if beacon {
            self.backend.beacon(&self.lesson_id, &payload).await
        } else {
            self.backend.put(&self.lesson_id, &payload).await
        };

        match result {
            Ok(()) => {
                self.last_sent = Some(payload);
            }
            Err(e) => {
                // Local store still has the position; resync happens on the
                // next successful write
                warn!("Remote progress write failed for {}: {}", self.lesson_id, e);
            }
        }
    }
}
