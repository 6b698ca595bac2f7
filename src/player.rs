use crate::token::Credential;
use std::time::Duration;

/// Commands the session controller issues to the embedding player.
///
/// Commands are fire-and-forget: a real player reports failures
/// asynchronously as [`PlayerEvent`](crate::session::PlayerEvent)s, not as
/// return values, so the controller's error handling has a single path.
#[async_trait::async_trait]
pub trait Player: Send + Sync {
    /// Bind the media source, with a credential when access is restricted.
    async fn attach(&self, credential: Option<&Credential>);

    /// Replace the credential on the live player without reconstructing it.
    async fn swap_credential(&self, credential: &Credential);

    async fn seek(&self, position: Duration);

    /// Reload the media source after a transient network error.
    async fn reload(&self);

    async fn pause(&self);

    async fn play(&self);
}
