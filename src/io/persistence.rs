// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Persisted state documents in the user-data directory.
//!
//! Two JSON documents live side by side: the configuration
//! (`app-config.json`) and the application state (`app-state.json`),
//! each independently loadable and clearable, plus a `drafts/`
//! subdirectory holding one autosaved mask draft per video. Writes go
//! through a temp-file-and-rename step so an interrupted process never
//! leaves a torn document behind.

use crate::models::keyframe::DraftSnapshot;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "app-config.json";
const APP_STATE_FILE: &str = "app-state.json";
const DRAFTS_DIR: &str = "drafts";

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The serialized app state exceeds the configured byte ceiling.
    /// Nothing is written; the caller decides how to remediate.
    #[error("app state is {size} bytes, exceeding the {limit} byte limit")]
    Oversized { size: usize, limit: usize },
}

/// Filesystem-backed storage for the persisted documents.
#[derive(Debug, Clone)]
pub struct StateStorage {
    dir: PathBuf,
}

impl StateStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ---- config document ----

    pub fn save_config(&self, config: &Value) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(config)?;
        self.write_atomic(&self.dir.join(CONFIG_FILE), &json)?;
        log::info!("Saved configuration to {}", self.dir.display());
        Ok(())
    }

    /// Load the config document; `None` when no config has been saved yet.
    pub fn load_config(&self) -> Result<Option<Value>, PersistError> {
        read_json(&self.dir.join(CONFIG_FILE))
    }

    // ---- app-state document ----

    /// Persist the app-state document, enforcing the byte ceiling.
    ///
    /// When the encoded state exceeds `limit_bytes` nothing is written
    /// and [`PersistError::Oversized`] is returned.
    pub fn save_app_state(&self, state: &Value, limit_bytes: usize) -> Result<(), PersistError> {
        let json = serde_json::to_string(state)?;
        if json.len() > limit_bytes {
            log::warn!(
                "App state is {} bytes, over the {} byte limit; refusing to write",
                json.len(),
                limit_bytes
            );
            return Err(PersistError::Oversized {
                size: json.len(),
                limit: limit_bytes,
            });
        }
        self.write_atomic(&self.dir.join(APP_STATE_FILE), &json)?;
        log::debug!("Saved app state ({} bytes)", json.len());
        Ok(())
    }

    /// Load the app-state document; `None` when none exists.
    pub fn load_app_state(&self) -> Result<Option<Value>, PersistError> {
        read_json(&self.dir.join(APP_STATE_FILE))
    }

    /// Delete the persisted app state. Deleting a missing file succeeds.
    pub fn clear_app_state(&self) -> Result<(), PersistError> {
        let path = self.dir.join(APP_STATE_FILE);
        if path.exists() {
            std::fs::remove_file(&path)?;
            log::info!("Cleared persisted app state");
        }
        Ok(())
    }

    pub fn app_state_exists(&self) -> bool {
        self.dir.join(APP_STATE_FILE).exists()
    }

    // ---- video mask drafts ----

    pub fn save_draft(&self, video: &str, draft: &DraftSnapshot) -> Result<(), PersistError> {
        let json = serde_json::to_string(draft)?;
        self.write_atomic(&self.draft_path(video), &json)?;
        log::debug!("Saved mask draft for {}", video);
        Ok(())
    }

    pub fn load_draft(&self, video: &str) -> Result<Option<DraftSnapshot>, PersistError> {
        let path = self.draft_path(video);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    pub fn delete_draft(&self, video: &str) -> Result<(), PersistError> {
        let path = self.draft_path(video);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Delete every persisted draft whose autosave time is before
    /// `cutoff_ms`. Returns the number of drafts removed. Unreadable
    /// draft files are skipped, not deleted.
    pub fn purge_drafts_older_than(&self, cutoff_ms: i64) -> Result<usize, PersistError> {
        let drafts_dir = self.dir.join(DRAFTS_DIR);
        if !drafts_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&drafts_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let draft: DraftSnapshot = match std::fs::read_to_string(&path)
                .map_err(PersistError::Io)
                .and_then(|s| serde_json::from_str(&s).map_err(PersistError::Json))
            {
                Ok(draft) => draft,
                Err(e) => {
                    log::warn!("Skipping unreadable draft {}: {}", path.display(), e);
                    continue;
                }
            };
            if draft.auto_save_time < cutoff_ms {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            log::info!("Purged {} expired mask draft(s)", removed);
        }
        Ok(removed)
    }

    // ---- helpers ----

    fn draft_path(&self, video: &str) -> PathBuf {
        self.dir
            .join(DRAFTS_DIR)
            .join(format!("{}.json", sanitize_file_stem(video)))
    }

    /// Write via a temporary file in the same directory, then rename.
    fn write_atomic(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents.as_bytes())?;
        std::fs::rename(&temp_path, path).inspect_err(|_| {
            let _ = std::fs::remove_file(&temp_path);
        })
    }
}

fn read_json(path: &Path) -> Result<Option<Value>, PersistError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Reduce an arbitrary video identifier to a safe file stem.
fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keyframe::{MaskKeyframe, SetMetadata};
    use crate::models::mask::MaskShape;
    use serde_json::json;

    fn scratch_storage(label: &str) -> StateStorage {
        let dir = std::env::temp_dir().join(format!("mist_persist_{label}"));
        let _ = std::fs::remove_dir_all(&dir);
        StateStorage::new(dir)
    }

    fn sample_draft(auto_save_time: i64) -> DraftSnapshot {
        DraftSnapshot {
            keyframes: vec![MaskKeyframe {
                id: "kf-1".into(),
                frame: 0,
                shape: MaskShape::rectangle(0.0, 0.0, 0.5, 0.5),
                captured_at: auto_save_time,
            }],
            metadata: SetMetadata {
                created: auto_save_time,
                modified: auto_save_time,
                total_frames: 100,
            },
            auto_save_time,
        }
    }

    #[test]
    fn test_app_state_roundtrip() {
        let storage = scratch_storage("state_roundtrip");
        assert!(!storage.app_state_exists());
        assert!(storage.load_app_state().unwrap().is_none());

        let state = json!({"activePage": "image", "isInitialized": true});
        storage.save_app_state(&state, 1024 * 1024).unwrap();
        assert!(storage.app_state_exists());
        assert_eq!(storage.load_app_state().unwrap().unwrap(), state);

        storage.clear_app_state().unwrap();
        assert!(!storage.app_state_exists());
        // Clearing twice is fine.
        storage.clear_app_state().unwrap();

        let _ = std::fs::remove_dir_all(storage.dir());
    }

    #[test]
    fn test_oversized_state_is_not_written() {
        let storage = scratch_storage("oversized");
        let state = json!({"blob": "x".repeat(512)});

        let err = storage.save_app_state(&state, 64).unwrap_err();
        assert!(matches!(err, PersistError::Oversized { limit: 64, .. }));
        assert!(!storage.app_state_exists());

        let _ = std::fs::remove_dir_all(storage.dir());
    }

    #[test]
    fn test_config_roundtrip() {
        let storage = scratch_storage("config");
        assert!(storage.load_config().unwrap().is_none());

        let config = json!({"general": {"backendPort": 9090}});
        storage.save_config(&config).unwrap();
        assert_eq!(storage.load_config().unwrap().unwrap(), config);

        let _ = std::fs::remove_dir_all(storage.dir());
    }

    #[test]
    fn test_draft_roundtrip_and_delete() {
        let storage = scratch_storage("draft");
        let draft = sample_draft(1000);

        storage.save_draft("clip one.mp4", &draft).unwrap();
        assert_eq!(storage.load_draft("clip one.mp4").unwrap().unwrap(), draft);

        storage.delete_draft("clip one.mp4").unwrap();
        assert!(storage.load_draft("clip one.mp4").unwrap().is_none());

        let _ = std::fs::remove_dir_all(storage.dir());
    }

    #[test]
    fn test_purge_old_drafts() {
        let storage = scratch_storage("purge");
        storage.save_draft("old.mp4", &sample_draft(1_000)).unwrap();
        storage.save_draft("new.mp4", &sample_draft(9_000)).unwrap();

        let removed = storage.purge_drafts_older_than(5_000).unwrap();
        assert_eq!(removed, 1);
        assert!(storage.load_draft("old.mp4").unwrap().is_none());
        assert!(storage.load_draft("new.mp4").unwrap().is_some());

        let _ = std::fs::remove_dir_all(storage.dir());
    }

    #[test]
    fn test_no_temp_residue_after_save() {
        let storage = scratch_storage("atomic");
        storage
            .save_app_state(&json!({"ok": true}), 1024)
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(storage.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let _ = std::fs::remove_dir_all(storage.dir());
    }
}
