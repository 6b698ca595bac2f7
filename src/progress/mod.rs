pub mod backend;
pub mod store;
pub mod sync;

pub use backend::{HttpProgressBackend, ProgressBackend, SyncError};
pub use store::{ProgressStore, StoreError, StoredPosition};
pub use sync::ProgressSync;

use serde::{Deserialize, Serialize};

/// Wire payload for the remote progress endpoint.
///
/// The remote write is idempotent on its contents, which is what makes the
/// debounce/flush race on page hide tolerable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(rename = "positionSeconds")]
    pub position_seconds: f64,
    #[serde(rename = "durationSeconds")]
    pub duration_seconds: f64,
    pub completed: bool,
}

impl ProgressPayload {
    /// Build a payload, deriving `completed` from the threshold.
    pub fn at(position_seconds: f64, duration_seconds: f64, completion_threshold: f64) -> Self {
        let completed =
            duration_seconds > 0.0 && position_seconds >= completion_threshold * duration_seconds;
        Self {
            position_seconds,
            duration_seconds,
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_at_threshold() {
        assert!(!ProgressPayload::at(539.9, 600.0, 0.9).completed);
        assert!(ProgressPayload::at(540.0, 600.0, 0.9).completed);
        assert!(ProgressPayload::at(600.0, 600.0, 0.9).completed);
    }

    #[test]
    fn zero_duration_never_completes() {
        assert!(!ProgressPayload::at(10.0, 0.0, 0.9).completed);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let payload = ProgressPayload::at(250.0, 600.0, 0.9);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["positionSeconds"], 250.0);
        assert_eq!(json["durationSeconds"], 600.0);
        assert_eq!(json["completed"], false);
    }
}
