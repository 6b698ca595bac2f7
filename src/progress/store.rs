use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur reading or writing the on-device store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("No usable storage directory")]
    NoStorageDir,
}

/// One stored entry per lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPosition {
    pub position: f64,
    pub timestamp: DateTime<Utc>,
}

/// Device-scoped last-known-position store, one JSON file per lesson.
///
/// Writes are optimistic and synchronous; any failure is logged and
/// swallowed so storage problems never block playback. `load` degrades to
/// `None` on unreadable or corrupt entries.
pub struct ProgressStore {
    dir: PathBuf,
}

impl ProgressStore {
    /// Open the store at the default location (`~/.playhead/progress`).
    pub fn new() -> Result<Self, StoreError> {
        let home_dir = dirs::home_dir().ok_or(StoreError::NoStorageDir)?;
        Self::with_dir(home_dir.join(".playhead").join("progress"))
    }

    /// Open the store at a custom directory.
    pub fn with_dir(dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Record the last known position for a lesson. Never fails the caller.
    pub fn save(&self, lesson_id: &str, position: f64) {
        if let Err(e) = self.try_save(lesson_id, position) {
            warn!("Failed to persist local progress for {}: {}", lesson_id, e);
        }
    }

    /// Last stored position for a lesson, if any.
    pub fn load(&self, lesson_id: &str) -> Option<StoredPosition> {
        let path = self.path_for(lesson_id);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read local progress for {}: {}", lesson_id, e);
                return None;
            }
        };

        match serde_json::from_str(&data) {
            Ok(stored) => Some(stored),
            Err(e) => {
                // Corrupt entry - drop it so the next save starts clean
                warn!("Corrupt local progress entry for {}: {}", lesson_id, e);
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    fn try_save(&self, lesson_id: &str, position: f64) -> Result<(), StoreError> {
        let entry = StoredPosition {
            position,
            timestamp: Utc::now(),
        };
        let path = self.path_for(lesson_id);
        fs::write(&path, serde_json::to_string(&entry)?)?;
        debug!("Saved local progress for {}: {:.1}s", lesson_id, position);
        Ok(())
    }

    /// Lesson ids come from the backend; keep the file name filesystem-safe.
    fn path_for(&self, lesson_id: &str) -> PathBuf {
        let safe: String = lesson_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProgressStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        store.save("lesson-1", 120.5);
        let stored = store.load("lesson-1").unwrap();
        assert_eq!(stored.position, 120.5);
    }

    #[test]
    fn load_missing_lesson_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProgressStore::with_dir(temp_dir.path().to_path_buf()).unwrap();
        assert!(store.load("never-played").is_none());
    }

    #[test]
    fn corrupt_entry_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProgressStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        std::fs::write(temp_dir.path().join("lesson-1.json"), "not json").unwrap();
        assert!(store.load("lesson-1").is_none());
        assert!(!temp_dir.path().join("lesson-1.json").exists());
    }

    #[test]
    fn unsafe_characters_in_lesson_ids_are_sanitized() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProgressStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        store.save("../../etc/passwd", 10.0);
        assert!(store.load("../../etc/passwd").is_some());
        assert!(temp_dir.path().join("______etc_passwd.json").exists());
    }

    #[test]
    fn save_overwrites_previous_position() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProgressStore::with_dir(temp_dir.path().to_path_buf()).unwrap();

        store.save("lesson-1", 10.0);
        store.save("lesson-1", 20.0);
        assert_eq!(store.load("lesson-1").unwrap().position, 20.0);
    }
}
