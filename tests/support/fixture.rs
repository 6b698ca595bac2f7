use playhead::config::Config;
use playhead::progress::ProgressStore;
use playhead::session::{PlayerEvent, SessionController, SessionDescriptor, SessionEvent};
use playhead::test_support::{ManualClock, MockPlayer, MockProgressBackend, MockTokenSource};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const LESSON: &str = "lesson-1";

/// Test fixture wiring a session controller to mocks and a manual clock.
///
/// Tests drive the controller directly (no actor task), so every transition
/// is deterministic and timer behavior is driven by advancing the clock.
pub struct SessionFixture {
    pub controller: SessionController,
    pub player: Arc<MockPlayer>,
    pub tokens: Arc<MockTokenSource>,
    pub backend: Arc<MockProgressBackend>,
    pub clock: Arc<ManualClock>,
    pub events_rx: UnboundedReceiver<SessionEvent>,
    temp_dir: TempDir,
}

impl SessionFixture {
    pub fn new() -> Self {
        Self::with_config(Config::default(), true)
    }

    pub fn without_token() -> Self {
        Self::with_config(Config::default(), false)
    }

    pub fn with_config(config: Config, requires_token: bool) -> Self {
        super::tracing_init();

        let temp_dir = TempDir::new().unwrap();
        let player = Arc::new(MockPlayer::new());
        let tokens = Arc::new(MockTokenSource::new());
        let backend = Arc::new(MockProgressBackend::new());
        let clock = Arc::new(ManualClock::new());

        let descriptor = SessionDescriptor {
            lesson_id: LESSON.to_string(),
            playback_id: "pb-1".to_string(),
            requires_token,
        };

        let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
        let store = ProgressStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        let controller = SessionController::new(
            descriptor,
            player.clone(),
            tokens.clone(),
            backend.clone(),
            store,
            clock.clone(),
            config,
            events_tx,
        );

        SessionFixture {
            controller,
            player,
            tokens,
            backend,
            clock,
            events_rx,
            temp_dir,
        }
    }

    /// A second handle onto the same on-disk store, for seeding and
    /// asserting local progress.
    pub fn local_store(&self) -> ProgressStore {
        ProgressStore::with_dir(self.temp_dir.path().to_path_buf()).unwrap()
    }

    pub async fn mount(&mut self) {
        self.controller.initialize().await;
    }

    /// Mount and deliver the metadata event that unlocks resume.
    pub async fn mount_with_duration(&mut self, duration_secs: u64) {
        self.mount().await;
        self.controller
            .handle_player_event(PlayerEvent::MetadataLoaded {
                duration: Duration::from_secs(duration_secs),
            })
            .await;
    }

    /// All events emitted so far.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }
}
