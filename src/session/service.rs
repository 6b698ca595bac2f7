use super::{
    PlayerEvent, SessionController, SessionDescriptor, SessionEvent, SessionEventsHandle,
};
use crate::clock::Clock;
use crate::config::Config;
use crate::player::Player;
use crate::progress::{ProgressBackend, ProgressStore};
use crate::token::TokenSource;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc as tokio_mpsc;
use tracing::info;

/// Commands sent to a running session
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Player(PlayerEvent),
    VisibilityChanged { hidden: bool },
    Retry,
    Shutdown,
}

/// Handle to a running session for sending commands
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: tokio_mpsc::UnboundedSender<SessionCommand>,
    events_handle: SessionEventsHandle,
}

impl SessionHandle {
    /// Forward an event reported by the player element.
    pub fn player_event(&self, event: PlayerEvent) {
        let _ = self.command_tx.send(SessionCommand::Player(event));
    }

    pub fn visibility_changed(&self, hidden: bool) {
        let _ = self
            .command_tx
            .send(SessionCommand::VisibilityChanged { hidden });
    }

    /// User-driven retry after a terminal failure.
    pub fn retry(&self) {
        let _ = self.command_tx.send(SessionCommand::Retry);
    }

    /// Unmount: flush and end the session.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }

    pub fn subscribe(&self) -> tokio_mpsc::UnboundedReceiver<SessionEvent> {
        self.events_handle.subscribe()
    }
}

/// Drives a [`SessionController`] on a task of its own, multiplexing host
/// commands with the controller's scheduled work (credential renewal,
/// debounced progress writes).
pub struct SessionService {
    controller: SessionController,
    command_rx: tokio_mpsc::UnboundedReceiver<SessionCommand>,
}

impl SessionService {
    /// Spawn a session for one player mount and return its handle.
    pub fn spawn(
        descriptor: SessionDescriptor,
        player: Arc<dyn Player>,
        token_source: Arc<dyn TokenSource>,
        backend: Arc<dyn ProgressBackend>,
        store: ProgressStore,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> SessionHandle {
        let (command_tx, command_rx) = tokio_mpsc::unbounded_channel();
        let (events_tx, events_rx) = tokio_mpsc::unbounded_channel();

        let events_handle = SessionEventsHandle::new(events_rx);
        let handle = SessionHandle {
            command_tx,
            events_handle,
        };

        let controller = SessionController::new(
            descriptor,
            player,
            token_source,
            backend,
            store,
            clock.clone(),
            config,
            events_tx,
        );

        let service = SessionService {
            controller,
            command_rx,
        };
        tokio::spawn(service.run(clock));

        handle
    }

    async fn run(mut self, clock: Arc<dyn Clock>) {
        self.controller.initialize().await;

        loop {
            let deadline = self.controller.next_deadline();
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Player(event)) => {
                            self.controller.handle_player_event(event).await;
                        }
                        Some(SessionCommand::VisibilityChanged { hidden }) => {
                            self.controller.handle_visibility(hidden).await;
                        }
                        Some(SessionCommand::Retry) => {
                            self.controller.retry().await;
                        }
                        Some(SessionCommand::Shutdown) | None => {
                            // Dropped handle counts as unmount
                            self.controller.shutdown().await;
                            break;
                        }
                    }
                }
                _ = wait_until(clock.as_ref(), deadline) => {
                    self.controller.on_deadline().await;
                }
            }
        }

        info!("Session service stopped");
    }
}

/// Sleep until `deadline` on the injected clock; pend forever when nothing
/// is scheduled.
async fn wait_until(clock: &dyn Clock, deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            let wait = deadline.saturating_duration_since(clock.now());
            clock.sleep(wait).await;
        }
        None => std::future::pending().await,
    }
}
