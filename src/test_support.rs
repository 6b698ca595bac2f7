// Test support utilities for both unit and integration tests

use crate::clock::Clock;
use crate::player::Player;
use crate::progress::{ProgressBackend, ProgressPayload, SyncError};
use crate::token::{Credential, TokenRequest, TokenResponse, TokenSource, TokenSourceError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Deterministic clock for driving the session state machine in tests.
///
/// `sleep` advances the clock instead of waiting and records the requested
/// duration, so backoff ladders can be asserted without real timers.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        ManualClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without anyone sleeping
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
    }

    /// Every duration passed to `sleep`, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Mock token source with a scripted response queue.
///
/// Queued responses are consumed first; once the queue is empty every fetch
/// succeeds with the default token.
pub struct MockTokenSource {
    responses: Mutex<VecDeque<Result<TokenResponse, TokenSourceError>>>,
    default_token: Mutex<(String, u64)>,
    calls: Mutex<u32>,
}

impl Default for MockTokenSource {
    fn default() -> Self {
        MockTokenSource {
            responses: Mutex::new(VecDeque::new()),
            default_token: Mutex::new(("test-token".to_string(), 300)),
            calls: Mutex::new(0),
        }
    }
}

impl MockTokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token returned once the scripted queue is drained
    pub fn set_default_token(&self, token: impl Into<String>, expires_in_secs: u64) {
        *self.default_token.lock().unwrap() = (token.into(), expires_in_secs);
    }

    pub fn enqueue_token(&self, token: impl Into<String>, expires_in_secs: u64) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(TokenResponse::Single {
                token: token.into(),
                expires_in: expires_in_secs,
            }));
    }

    pub fn enqueue_status(&self, status: u16) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TokenSourceError::Status(status)));
    }

    pub fn enqueue_transport_error(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TokenSourceError::Transport(
                "connection refused".to_string(),
            )));
    }

    /// Number of fetches observed
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl TokenSource for MockTokenSource {
    async fn fetch(&self, _request: &TokenRequest) -> Result<TokenResponse, TokenSourceError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return response;
        }
        let (token, expires_in) = self.default_token.lock().unwrap().clone();
        Ok(TokenResponse::Single { token, expires_in })
    }
}

/// Mock progress backend recording writes in memory.
pub struct MockProgressBackend {
    server_payload: Mutex<Option<ProgressPayload>>,
    puts: Mutex<Vec<ProgressPayload>>,
    beacons: Mutex<Vec<ProgressPayload>>,
    fail_writes: Mutex<bool>,
    fail_loads: Mutex<bool>,
}

impl Default for MockProgressBackend {
    fn default() -> Self {
        MockProgressBackend {
            server_payload: Mutex::new(None),
            puts: Mutex::new(Vec::new()),
            beacons: Mutex::new(Vec::new()),
            fail_writes: Mutex::new(false),
            fail_loads: Mutex::new(false),
        }
    }
}

impl MockProgressBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the server-side copy used for resume
    pub fn set_server_payload(&self, payload: ProgressPayload) {
        *self.server_payload.lock().unwrap() = Some(payload);
    }

    /// Server-side copy after all writes so far
    pub fn server_payload(&self) -> Option<ProgressPayload> {
        self.server_payload.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<ProgressPayload> {
        self.puts.lock().unwrap().clone()
    }

    pub fn beacons(&self) -> Vec<ProgressPayload> {
        self.beacons.lock().unwrap().clone()
    }

    /// All writes regardless of transport, in order
    pub fn writes(&self) -> Vec<ProgressPayload> {
        let mut all = self.puts();
        all.extend(self.beacons());
        all
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    pub fn fail_loads(&self, fail: bool) {
        *self.fail_loads.lock().unwrap() = fail;
    }
}

#[async_trait::async_trait]
impl ProgressBackend for MockProgressBackend {
    async fn put(&self, _lesson_id: &str, payload: &ProgressPayload) -> Result<(), SyncError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(SyncError::Status(500));
        }
        self.puts.lock().unwrap().push(payload.clone());
        *self.server_payload.lock().unwrap() = Some(payload.clone());
        Ok(())
    }

    async fn beacon(&self, _lesson_id: &str, payload: &ProgressPayload) -> Result<(), SyncError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(SyncError::Status(500));
        }
        self.beacons.lock().unwrap().push(payload.clone());
        *self.server_payload.lock().unwrap() = Some(payload.clone());
        Ok(())
    }

    async fn load(&self, _lesson_id: &str) -> Result<Option<ProgressPayload>, SyncError> {
        if *self.fail_loads.lock().unwrap() {
            return Err(SyncError::Status(500));
        }
        Ok(self.server_payload.lock().unwrap().clone())
    }
}

/// Calls observed by [`MockPlayer`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Attach { with_credential: bool },
    SwapCredential { token: String },
    Seek { position: Duration },
    Reload,
    Pause,
    Play,
}

/// Mock player recording every command it receives.
#[derive(Default)]
pub struct MockPlayer {
    calls: Mutex<Vec<PlayerCall>>,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: PlayerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Player for MockPlayer {
    async fn attach(&self, credential: Option<&Credential>) {
        self.record(PlayerCall::Attach {
            with_credential: credential.is_some(),
        });
    }

    async fn swap_credential(&self, credential: &Credential) {
        self.record(PlayerCall::SwapCredential {
            token: credential.playback.clone(),
        });
    }

    async fn seek(&self, position: Duration) {
        self.record(PlayerCall::Seek { position });
    }

    async fn reload(&self) {
        self.record(PlayerCall::Reload);
    }

    async fn pause(&self) {
        self.record(PlayerCall::Pause);
    }

    async fn play(&self) {
        self.record(PlayerCall::Play);
    }
}
