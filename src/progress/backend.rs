use super::ProgressPayload;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("progress endpoint returned status {0}")]
    Status(u16),
    #[error("progress request failed: {0}")]
    Transport(String),
    #[error("malformed progress response: {0}")]
    Decode(String),
}

/// Remote progress persistence (allows mocking for tests).
///
/// `put` is the primary transport. `beacon` is the teardown-time variant:
/// it must be safe to fire while the page/process is going away, so
/// implementations keep it short and fall back to `put` when the beacon
/// transport is unavailable.
#[async_trait::async_trait]
pub trait ProgressBackend: Send + Sync {
    async fn put(&self, lesson_id: &str, payload: &ProgressPayload) -> Result<(), SyncError>;

    async fn beacon(&self, lesson_id: &str, payload: &ProgressPayload) -> Result<(), SyncError>;

    async fn load(&self, lesson_id: &str) -> Result<Option<ProgressPayload>, SyncError>;
}

/// Production backend: per-lesson progress URLs under a base path.
pub struct HttpProgressBackend {
    client: Client,
    beacon_client: Client,
    base_url: String,
}

impl HttpProgressBackend {
    /// `base_url` is the collection path; lesson URLs are `{base_url}/{lesson_id}`.
    pub fn new(base_url: impl Into<String>) -> Self {
        // Teardown writes can't wait on slow servers
        let beacon_client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();

        Self {
            client: Client::new(),
            beacon_client,
            base_url: base_url.into(),
        }
    }

    fn lesson_url(&self, lesson_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), lesson_id)
    }
}

#[async_trait::async_trait]
impl ProgressBackend for HttpProgressBackend {
    async fn put(&self, lesson_id: &str, payload: &ProgressPayload) -> Result<(), SyncError> {
        let response = self
            .client
            .put(self.lesson_url(lesson_id))
            .json(payload)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }

        debug!(
            "Progress stored for {}: {:.1}s",
            lesson_id, payload.position_seconds
        );
        Ok(())
    }

    async fn beacon(&self, lesson_id: &str, payload: &ProgressPayload) -> Result<(), SyncError> {
        // Fire-and-forget POST on the short-timeout client; fall back to the
        // primary transport if it can't get through
        let result = self
            .beacon_client
            .post(format!("{}/beacon", self.lesson_url(lesson_id)))
            .json(payload)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                warn!(
                    "Beacon transport rejected progress for {} (status {}), falling back",
                    lesson_id,
                    response.status()
                );
                self.put(lesson_id, payload).await
            }
            Err(e) => {
                warn!(
                    "Beacon transport unavailable for {} ({}), falling back",
                    lesson_id, e
                );
                self.put(lesson_id, payload).await
            }
        }
    }

    async fn load(&self, lesson_id: &str) -> Result<Option<ProgressPayload>, SyncError> {
        let response = self
            .client
            .get(self.lesson_url(lesson_id))
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }

        response
            .json::<ProgressPayload>()
            .await
            .map(Some)
            .map_err(|e| SyncError::Decode(e.to_string()))
    }
}
