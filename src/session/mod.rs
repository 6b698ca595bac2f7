pub mod controller;
pub mod events;
pub mod service;

pub use controller::SessionController;
pub use events::SessionEventsHandle;
pub use service::{SessionCommand, SessionHandle, SessionService};

use std::time::Duration;

/// Identifies what a session plays and whether it needs a credential
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    pub lesson_id: String,
    pub playback_id: String,
    pub requires_token: bool,
}

/// Lifecycle of one player mount.
///
/// `Flushing` and `Failed` are terminal for the mount; a fresh mount creates
/// a new session that resumes from the larger of the local and server
/// positions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Uninitialized,
    AwaitingCredential,
    Ready,
    Seeking,
    Retrying { attempts: u32, kind: FailureKind },
    Flushing,
    Failed(Failure),
}

/// What ultimately broke, for user-facing reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Auth,
    Network,
    Decode,
}

/// Terminal failure surfaced to the host UI.
///
/// Carries the message to display and supports a manual retry; no automatic
/// attempts happen once a session has failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn auth() -> Self {
        Self {
            kind: FailureKind::Auth,
            message: "Unable to load this video. Please refresh the page.".into(),
        }
    }

    pub fn network() -> Self {
        Self {
            kind: FailureKind::Network,
            message: "Playback was interrupted. Check your connection and try again.".into(),
        }
    }

    pub fn decode() -> Self {
        Self {
            kind: FailureKind::Decode,
            message: "A playback issue occurred. Try again.".into(),
        }
    }

    pub fn for_kind(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Auth => Self::auth(),
            FailureKind::Network => Self::network(),
            FailureKind::Decode => Self::decode(),
        }
    }
}

/// Error classification reported by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackErrorKind {
    /// 403 / token-invalid signal: credential refresh, not teardown
    Authorization,
    Network,
    Decode,
}

/// Events the embedding player feeds into the session
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    MetadataLoaded { duration: Duration },
    TimeUpdate { position: Duration },
    SeekStarted,
    SeekCompleted { position: Duration },
    Ended,
    Error(PlaybackErrorKind),
}

/// Session updates fanned out to subscribers (UI state, diagnostics)
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged { state: SessionState },
    ResumeApplied { position: Duration },
    CredentialRenewed,
    Completed { lesson_id: String },
    Failed { failure: Failure },
}
