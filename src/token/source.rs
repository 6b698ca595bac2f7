use super::{TokenRequest, TokenResponse};
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TokenSourceError {
    #[error("token endpoint returned status {0}")]
    Status(u16),
    #[error("token request failed: {0}")]
    Transport(String),
    #[error("malformed token response: {0}")]
    Decode(String),
}

impl TokenSourceError {
    /// True when the backend actively refused the request (4xx), as opposed
    /// to being unreachable or broken.
    pub fn is_denial(&self) -> bool {
        matches!(self, TokenSourceError::Status(status) if (400..500).contains(status))
    }
}

/// Where signed playback credentials come from (allows mocking for tests)
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self, request: &TokenRequest) -> Result<TokenResponse, TokenSourceError>;
}

/// Production token source: POSTs to the backend token endpoint.
pub struct HttpTokenSource {
    client: Client,
    endpoint: String,
}

impl HttpTokenSource {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Use an existing client (shared connection pool).
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenSource for HttpTokenSource {
    async fn fetch(&self, request: &TokenRequest) -> Result<TokenResponse, TokenSourceError> {
        debug!(
            "Requesting playback token for lesson {} (playback id {})",
            request.lesson_id, request.playback_id
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| TokenSourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenSourceError::Status(status.as_u16()));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| TokenSourceError::Decode(e.to_string()))
    }
}
