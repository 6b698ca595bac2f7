use super::{
    Failure, FailureKind, PlaybackErrorKind, PlayerEvent, SessionDescriptor, SessionEvent,
    SessionState,
};
use crate::clock::Clock;
use crate::config::Config;
use crate::player::Player;
use crate::progress::{ProgressBackend, ProgressStore, ProgressSync};
use crate::token::{Credential, TokenProvider, TokenRequest, TokenSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{debug, error, info, warn};

/// State machine for one player mount.
///
/// Owns the credential lifecycle and both progress copies for its lesson.
/// Everything with a side effect (player, HTTP, storage, time) is injected,
/// so tests drive the machine directly; production wraps it in
/// [`SessionService`](super::SessionService).
pub struct SessionController {
    descriptor: SessionDescriptor,
    config: Config,
    state: SessionState,
    player: Arc<dyn Player>,
    clock: Arc<dyn Clock>,
    tokens: TokenProvider,
    backend: Arc<dyn ProgressBackend>,
    store: ProgressStore,
    sync: ProgressSync,
    events_tx: tokio_mpsc::UnboundedSender<SessionEvent>,
    credential: Option<Credential>,
    duration: Option<Duration>,
    position: Duration,
    resume_target: Option<Duration>,
    resume_applied: bool,
    completed: bool,
    paused_for_visibility: bool,
}

impl SessionController {
    pub fn new(
        descriptor: SessionDescriptor,
        player: Arc<dyn Player>,
        token_source: Arc<dyn TokenSource>,
        backend: Arc<dyn ProgressBackend>,
        store: ProgressStore,
        clock: Arc<dyn Clock>,
        config: Config,
        events_tx: tokio_mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let tokens = TokenProvider::new(
            token_source,
            clock.clone(),
            config.token_retry,
            config.renewal_lead,
            config.renewal_floor,
        );
        let sync = ProgressSync::new(
            descriptor.lesson_id.clone(),
            backend.clone(),
            clock.clone(),
            config.debounce_interval,
            config.completion_threshold,
        );

        Self {
            descriptor,
            config,
            state: SessionState::Uninitialized,
            player,
            clock,
            tokens,
            backend,
            store,
            sync,
            events_tx,
            credential: None,
            duration: None,
            position: Duration::ZERO,
            resume_target: None,
            resume_applied: false,
            completed: false,
            paused_for_visibility: false,
        }
    }

    /// Mount sequence: credential (when required), resume point, attach.
    ///
    /// The player is never attached before a credential is available.
    pub async fn initialize(&mut self) {
        info!("Session starting for lesson {}", self.descriptor.lesson_id);

        if self.descriptor.requires_token {
            self.set_state(SessionState::AwaitingCredential);
            match self.tokens.acquire(&self.token_request()).await {
                Ok(credential) => self.credential = Some(credential),
                Err(e) => {
                    error!(
                        "Could not acquire playback credential for {}: {}",
                        self.descriptor.lesson_id, e
                    );
                    self.fail(FailureKind::Auth);
                    return;
                }
            }
        }

        self.resume_target = self.resume_target_from().await;
        self.player.attach(self.credential.as_ref()).await;
        self.set_state(SessionState::Ready);
    }

    /// React to an event reported by the embedding player.
    pub async fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::MetadataLoaded { duration } => {
                self.duration = Some(duration);
                self.recovered_if_retrying();
                self.apply_resume_once().await;
            }
            PlayerEvent::TimeUpdate { position } => {
                self.recovered_if_retrying();
                self.position = position;
                // Transient scrub positions must not be persisted
                if self.state != SessionState::Seeking {
                    self.persist_position();
                }
            }
            PlayerEvent::SeekStarted => {
                if self.state == SessionState::Ready {
                    self.set_state(SessionState::Seeking);
                }
            }
            PlayerEvent::SeekCompleted { position } => {
                self.position = position;
                if self.state == SessionState::Seeking {
                    self.set_state(SessionState::Ready);
                }
                // Exactly one write per seek
                self.store
                    .save(&self.descriptor.lesson_id, position.as_secs_f64());
                if let Some(duration) = self.duration {
                    self.sync
                        .flush(position.as_secs_f64(), duration.as_secs_f64())
                        .await;
                }
                self.check_completion();
            }
            PlayerEvent::Ended => {
                if let Some(duration) = self.duration {
                    self.position = duration;
                }
                self.flush_now(false).await;
                self.check_completion();
            }
            PlayerEvent::Error(kind) => self.handle_player_error(kind).await,
        }
    }

    /// Tab visibility change from the host.
    pub async fn handle_visibility(&mut self, hidden: bool) {
        if hidden {
            // The flush supersedes any pending debounced write
            self.flush_now(true).await;
            if self.config.pause_on_hide && self.state == SessionState::Ready {
                self.player.pause().await;
                self.paused_for_visibility = true;
            }
        } else if self.config.resume_on_show && self.paused_for_visibility {
            self.paused_for_visibility = false;
            self.player.play().await;
        }
    }

    /// Unmount / before-unload: cancel timers, final flush, terminal state.
    pub async fn shutdown(&mut self) {
        if self.state == SessionState::Flushing {
            return;
        }
        info!(
            "Session ending for lesson {} at {:.1}s",
            self.descriptor.lesson_id,
            self.position.as_secs_f64()
        );
        self.set_state(SessionState::Flushing);
        self.tokens.cancel_renewal();
        self.flush_now(true).await;
    }

    /// User-driven retry from the Failed state; re-runs the mount sequence.
    pub async fn retry(&mut self) {
        if !matches!(self.state, SessionState::Failed(_)) {
            debug!("Retry requested outside Failed state, ignoring");
            return;
        }
        info!("Retrying session for lesson {}", self.descriptor.lesson_id);
        self.resume_applied = false;
        self.set_state(SessionState::Uninitialized);
        self.initialize().await;
    }

    /// Earliest pending deadline (credential renewal or debounced sync).
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.tokens.next_renewal(), self.sync.next_deadline()) {
            (Some(renewal), Some(sync)) => Some(renewal.min(sync)),
            (renewal, sync) => renewal.or(sync),
        }
    }

    /// Run whatever scheduled work has come due.
    pub async fn on_deadline(&mut self) {
        if matches!(self.state, SessionState::Flushing | SessionState::Failed(_)) {
            return;
        }
        if self.tokens.renewal_due(self.clock.now()) {
            self.renew_credential().await;
        }
        self.sync.run_due().await;
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    fn token_request(&self) -> TokenRequest {
        TokenRequest {
            playback_id: self.descriptor.playback_id.clone(),
            lesson_id: self.descriptor.lesson_id.clone(),
        }
    }

    /// Resume point for a fresh mount: the larger of the local and server
    /// positions, so forward progress survives an unflushed close. The
    /// flip side is that an unflushed deliberate rewind is also lost.
    async fn resume_target_from(&self) -> Option<Duration> {
        let local = self
            .store
            .load(&self.descriptor.lesson_id)
            .map(|stored| stored.position);
        let server = match self.backend.load(&self.descriptor.lesson_id).await {
            Ok(payload) => payload.map(|p| p.position_seconds),
            Err(e) => {
                warn!(
                    "Server progress unavailable for {}, resuming from local only: {}",
                    self.descriptor.lesson_id, e
                );
                None
            }
        };

        let resume = match (local, server) {
            (Some(local), Some(server)) => Some(local.max(server)),
            (position, None) | (None, position) => position,
        };
        resume
            .filter(|&position| position > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Applied exactly once per mount, after the duration is known.
    async fn apply_resume_once(&mut self) {
        if self.resume_applied {
            return;
        }
        let Some(duration) = self.duration else {
            return;
        };
        self.resume_applied = true;

        let Some(target) = self.resume_target else {
            return;
        };
        if duration.saturating_sub(target) < self.config.end_guard {
            // Seeking to the very end would re-trigger "ended"
            debug!(
                "Resume point {:.1}s is within the end guard for {}, skipping seek",
                target.as_secs_f64(),
                self.descriptor.lesson_id
            );
            return;
        }

        let position = target.min(duration.saturating_sub(self.config.end_guard));
        info!(
            "Resuming lesson {} at {:.1}s",
            self.descriptor.lesson_id,
            position.as_secs_f64()
        );
        self.player.seek(position).await;
        self.position = position;
        self.emit(SessionEvent::ResumeApplied { position });
    }

    fn persist_position(&mut self) {
        let position = self.position.as_secs_f64();
        self.store.save(&self.descriptor.lesson_id, position);
        if let Some(duration) = self.duration {
            self.sync.schedule(position, duration.as_secs_f64());
        }
        self.check_completion();
    }

    async fn flush_now(&mut self, beacon: bool) {
        let position = self.position.as_secs_f64();
        self.store.save(&self.descriptor.lesson_id, position);
        if let Some(duration) = self.duration {
            let duration = duration.as_secs_f64();
            if beacon {
                self.sync.flush_beacon(position, duration).await;
            } else {
                self.sync.flush(position, duration).await;
            }
        }
    }

    fn check_completion(&mut self) {
        if self.completed {
            return;
        }
        let Some(duration) = self.duration else {
            return;
        };
        if duration > Duration::ZERO
            && self.position.as_secs_f64()
                >= self.config.completion_threshold * duration.as_secs_f64()
        {
            self.completed = true;
            self.emit(SessionEvent::Completed {
                lesson_id: self.descriptor.lesson_id.clone(),
            });
        }
    }

    async fn handle_player_error(&mut self, kind: PlaybackErrorKind) {
        match kind {
            PlaybackErrorKind::Authorization => self.reacquire_credential().await,
            PlaybackErrorKind::Network => self.recover_media(FailureKind::Network).await,
            PlaybackErrorKind::Decode => self.recover_media(FailureKind::Decode).await,
        }
    }

    /// The player saw a 403 / token-invalid signal: fetch a fresh credential
    /// and hot-swap it without tearing the player down.
    async fn reacquire_credential(&mut self) {
        if !self.descriptor.requires_token {
            warn!(
                "Authorization error on token-free lesson {}",
                self.descriptor.lesson_id
            );
            self.fail(FailureKind::Auth);
            return;
        }

        // An in-flight seek picks up where it left off after the swap
        let return_to = if self.state == SessionState::Seeking {
            SessionState::Seeking
        } else {
            SessionState::Ready
        };
        self.set_state(SessionState::AwaitingCredential);
        self.tokens.cancel_renewal();

        match self.tokens.acquire(&self.token_request()).await {
            Ok(fresh) => {
                if self.credential.as_ref() != Some(&fresh) {
                    self.player.swap_credential(&fresh).await;
                    self.credential = Some(fresh);
                    self.emit(SessionEvent::CredentialRenewed);
                } else {
                    debug!("Re-acquired credential is unchanged, swap skipped");
                }
                self.set_state(return_to);
            }
            Err(e) => {
                error!(
                    "Credential re-acquisition failed for {}: {}",
                    self.descriptor.lesson_id, e
                );
                self.fail(FailureKind::Auth);
            }
        }
    }

    /// Bounded reload ladder for transient media errors. Recovery is
    /// detected when the player produces data again (metadata or a time
    /// update); another error while Retrying consumes the next attempt.
    async fn recover_media(&mut self, kind: FailureKind) {
        let prior = match &self.state {
            SessionState::Retrying { attempts, .. } => *attempts,
            _ => 0,
        };
        if self.config.media_retry.exhausted(prior) {
            self.fail(kind);
            return;
        }

        let attempts = prior + 1;
        let delay = self.config.media_retry.delay_for(prior);
        warn!(
            "Playback error ({:?}) on {}, reload attempt {} in {:?}",
            kind, self.descriptor.lesson_id, attempts, delay
        );
        self.set_state(SessionState::Retrying { attempts, kind });
        self.clock.sleep(delay).await;

        match kind {
            // Decode problems get a full remount, network blips a reload
            FailureKind::Decode => self.player.attach(self.credential.as_ref()).await,
            _ => self.player.reload().await,
        }
    }

    fn recovered_if_retrying(&mut self) {
        if let SessionState::Retrying { attempts, .. } = self.state {
            info!(
                "Playback recovered for {} after {} reload attempts",
                self.descriptor.lesson_id, attempts
            );
            self.set_state(SessionState::Ready);
        }
    }

    fn fail(&mut self, kind: FailureKind) {
        let failure = Failure::for_kind(kind);
        self.tokens.cancel_renewal();
        self.sync.cancel();
        self.set_state(SessionState::Failed(failure.clone()));
        self.emit(SessionEvent::Failed { failure });
    }

    async fn renew_credential(&mut self) {
        // Re-armed by a successful acquire; a failed one stays disarmed so
        // renewal can't spin
        self.tokens.cancel_renewal();
        match self.tokens.acquire(&self.token_request()).await {
            Ok(fresh) => {
                if self.credential.as_ref() != Some(&fresh) {
                    self.player.swap_credential(&fresh).await;
                    self.credential = Some(fresh);
                    self.emit(SessionEvent::CredentialRenewed);
                }
            }
            Err(e) => {
                // The player keeps the old credential; if it expires the
                // resulting auth error takes the reactive path
                warn!(
                    "Proactive credential renewal failed for {}: {}",
                    self.descriptor.lesson_id, e
                );
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!(
            "Session {}: {:?} -> {:?}",
            self.descriptor.lesson_id, self.state, state
        );
        self.state = state.clone();
        self.emit(SessionEvent::StateChanged { state });
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}
