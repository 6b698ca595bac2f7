pub mod provider;
pub mod source;

pub use provider::{TokenError, TokenProvider};
pub use source::{HttpTokenSource, TokenSource, TokenSourceError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Signed playback credential.
///
/// Replaced wholesale on renewal, never mutated; equality on the token text
/// is what makes repeated identical hot-swaps no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub playback: String,
    pub thumbnail: Option<String>,
    pub storyboard: Option<String>,
}

impl Credential {
    pub fn playback_only(token: impl Into<String>) -> Self {
        Self {
            playback: token.into(),
            thumbnail: None,
            storyboard: None,
        }
    }
}

/// Request body for the token endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    #[serde(rename = "playbackId")]
    pub playback_id: String,
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
}

/// Per-variant tokens in the multi-token response shape
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub playback: String,
    pub thumbnail: Option<String>,
    pub storyboard: Option<String>,
}

/// Token endpoint response.
///
/// The backend has two deployed shapes: `{tokens: {...}, expiresIn}` and the
/// older `{token, expiresIn}`. Both decode here.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TokenResponse {
    Multi {
        tokens: TokenSet,
        #[serde(rename = "expiresIn")]
        expires_in: u64,
    },
    Single {
        token: String,
        #[serde(rename = "expiresIn")]
        expires_in: u64,
    },
}

impl TokenResponse {
    /// Split the response into the credential and its lifetime.
    pub fn into_parts(self) -> (Credential, Duration) {
        match self {
            TokenResponse::Multi { tokens, expires_in } => (
                Credential {
                    playback: tokens.playback,
                    thumbnail: tokens.thumbnail,
                    storyboard: tokens.storyboard,
                },
                Duration::from_secs(expires_in),
            ),
            TokenResponse::Single { token, expires_in } => (
                Credential::playback_only(token),
                Duration::from_secs(expires_in),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_multi_token_shape() {
        let json = r#"{"tokens":{"playback":"p","thumbnail":"t","storyboard":"s"},"expiresIn":300}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let (credential, expires_in) = response.into_parts();
        assert_eq!(credential.playback, "p");
        assert_eq!(credential.thumbnail.as_deref(), Some("t"));
        assert_eq!(credential.storyboard.as_deref(), Some("s"));
        assert_eq!(expires_in, Duration::from_secs(300));
    }

    #[test]
    fn decodes_single_token_shape() {
        let json = r#"{"token":"p","expiresIn":120}"#;
        let response: TokenResponse = serde_json::from_str(json).unwrap();
        let (credential, expires_in) = response.into_parts();
        assert_eq!(credential, Credential::playback_only("p"));
        assert_eq!(expires_in, Duration::from_secs(120));
    }

    #[test]
    fn request_serializes_with_camel_case_keys() {
        let request = TokenRequest {
            playback_id: "pb".into(),
            lesson_id: "l1".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["playbackId"], "pb");
        assert_eq!(json["lessonId"], "l1");
    }
}
