// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application state store.
//!
//! Serializes the per-page (image vs. video) file manager and UI state
//! into a persistable snapshot, restores it on launch, and guards
//! persistence with an oversized-state check so an overgrown snapshot
//! is surfaced to the caller instead of silently truncated.

use crate::io::persistence::{PersistError, StateStorage};
use crate::models::file::FileManagerSnapshot;
use serde::{Deserialize, Serialize};

/// The two page scopes whose state is partitioned independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    #[default]
    Image,
    Video,
}

/// Which files an action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionScope {
    #[default]
    Current,
    Selected,
    All,
}

/// Per-page UI preferences that survive restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiPrefs {
    pub left_drawer_open: bool,
    pub right_drawer_open: bool,
    pub current_model: String,
    pub show_mask_tools: bool,
    pub action_scope: ActionScope,
    pub select_all: bool,
    pub save_path: String,
    pub folder_path: String,
    pub mask_folder_path: String,
    pub ocr_lang: String,
    pub auto_layout: bool,
    pub showing_original: bool,
    pub dont_show_max_history_warning: bool,
    pub dont_show_backend_warning: bool,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self {
            left_drawer_open: false,
            right_drawer_open: false,
            current_model: "lama".into(),
            show_mask_tools: true,
            action_scope: ActionScope::Current,
            select_all: false,
            save_path: String::new(),
            folder_path: String::new(),
            mask_folder_path: String::new(),
            ocr_lang: "en".into(),
            auto_layout: true,
            showing_original: false,
            dont_show_max_history_warning: false,
            dont_show_backend_warning: false,
        }
    }
}

/// One page's slice of the application snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageState {
    #[serde(rename = "fileManager")]
    pub file_manager: FileManagerSnapshot,
    pub ui: UiPrefs,
}

/// The full application snapshot, round-trippable through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSnapshot {
    #[serde(rename = "activePage")]
    pub active_page: Page,
    #[serde(rename = "isInitialized")]
    pub is_initialized: bool,
    #[serde(rename = "imageState")]
    pub image_state: PageState,
    #[serde(rename = "videoState")]
    pub video_state: PageState,
}

impl Default for AppSnapshot {
    fn default() -> Self {
        Self {
            active_page: Page::Image,
            is_initialized: true,
            image_state: PageState::default(),
            video_state: PageState::default(),
        }
    }
}

/// Loaded top-level fields, merged shallowly over the default shape.
#[derive(Debug, Default, Deserialize)]
struct PartialSnapshot {
    #[serde(rename = "activePage")]
    active_page: Option<Page>,
    #[serde(rename = "isInitialized")]
    is_initialized: Option<bool>,
    #[serde(rename = "imageState")]
    image_state: Option<PageState>,
    #[serde(rename = "videoState")]
    video_state: Option<PageState>,
}

/// Result of a persistence attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The encoded state exceeded the byte ceiling; nothing was
    /// written and the caller decides how to remediate.
    Oversized { size: usize, limit: usize },
}

/// Result of a load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// No persisted state exists yet; defaults remain in place.
    NoData,
}

/// Snapshot store with page-scoped partitioning and persistence.
pub struct AppStateStore {
    state: AppSnapshot,
    storage: StateStorage,
    save_limit_bytes: usize,
}

impl AppStateStore {
    pub fn new(storage: StateStorage) -> Self {
        Self {
            state: AppSnapshot::default(),
            storage,
            save_limit_bytes: 100 * 1024 * 1024,
        }
    }

    /// Set the state-size ceiling from config (`state_save_limit`, MB).
    pub fn set_save_limit_mb(&mut self, limit_mb: u32) {
        self.save_limit_bytes = limit_mb as usize * 1024 * 1024;
    }

    pub fn state(&self) -> &AppSnapshot {
        &self.state
    }

    pub fn active_page(&self) -> Page {
        self.state.active_page
    }

    pub fn set_initialized(&mut self, value: bool) {
        self.state.is_initialized = value;
    }

    fn page_state_mut(&mut self, page: Page) -> &mut PageState {
        match page {
            Page::Image => &mut self.state.image_state,
            Page::Video => &mut self.state.video_state,
        }
    }

    fn page_state(&self, page: Page) -> &PageState {
        match page {
            Page::Image => &self.state.image_state,
            Page::Video => &self.state.video_state,
        }
    }

    /// Stash a file manager snapshot into the page's slot.
    pub fn save_file_manager_state(&mut self, page: Page, snapshot: FileManagerSnapshot) {
        self.page_state_mut(page).file_manager = snapshot;
    }

    /// The file manager snapshot stored for a page.
    pub fn restore_file_manager_state(&self, page: Page) -> FileManagerSnapshot {
        self.page_state(page).file_manager.clone()
    }

    pub fn save_ui_state(&mut self, page: Page, ui: UiPrefs) {
        self.page_state_mut(page).ui = ui;
    }

    pub fn restore_ui_state(&self, page: Page) -> UiPrefs {
        self.page_state(page).ui.clone()
    }

    /// Replace a page's whole slice.
    pub fn update_page_state(&mut self, page: Page, state: PageState) {
        *self.page_state_mut(page) = state;
    }

    /// Persist the snapshot.
    ///
    /// An oversized snapshot is a distinct outcome, not an error: the
    /// write is skipped and the caller chooses the remediation (e.g.
    /// prompting to clear old state).
    pub fn save_state(&self) -> Result<SaveOutcome, PersistError> {
        let value = serde_json::to_value(&self.state)?;
        match self.storage.save_app_state(&value, self.save_limit_bytes) {
            Ok(()) => Ok(SaveOutcome::Saved),
            Err(PersistError::Oversized { size, limit }) => {
                Ok(SaveOutcome::Oversized { size, limit })
            }
            Err(e) => Err(e),
        }
    }

    /// Load persisted state, merging it shallowly over the defaults.
    ///
    /// Missing top-level fields keep their defaults; a missing file is
    /// success with [`LoadOutcome::NoData`].
    pub fn load_state(&mut self) -> Result<LoadOutcome, PersistError> {
        let Some(value) = self.storage.load_app_state()? else {
            return Ok(LoadOutcome::NoData);
        };

        let partial: PartialSnapshot = serde_json::from_value(value)?;
        if let Some(active_page) = partial.active_page {
            self.state.active_page = active_page;
        }
        if let Some(is_initialized) = partial.is_initialized {
            self.state.is_initialized = is_initialized;
        }
        if let Some(image_state) = partial.image_state {
            self.state.image_state = image_state;
        }
        if let Some(video_state) = partial.video_state {
            self.state.video_state = video_state;
        }
        log::info!("Restored persisted app state");
        Ok(LoadOutcome::Loaded)
    }

    /// Reset to the default shape and request deletion of the
    /// persisted state.
    ///
    /// Always reports success from the store's perspective: a deletion
    /// failure is logged upstream, not surfaced here.
    pub fn restart(&mut self) {
        self.state = AppSnapshot::default();
        if let Err(e) = self.storage.clear_app_state() {
            log::error!("Failed to clear persisted state on restart: {}", e);
        }
        log::info!("App state reset to defaults");
    }

    /// Switch the active page, persisting the current state first.
    ///
    /// When the save reports oversized the switch itself is aborted
    /// and the outcome propagated; page transitions are never lossy.
    pub fn switch_page(&mut self, new_page: Page) -> Result<SaveOutcome, PersistError> {
        match self.save_state()? {
            SaveOutcome::Saved => {
                self.state.active_page = new_page;
                Ok(SaveOutcome::Saved)
            }
            oversized => Ok(oversized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_store(label: &str) -> AppStateStore {
        let dir = std::env::temp_dir().join(format!("mist_app_state_{label}"));
        let _ = std::fs::remove_dir_all(&dir);
        AppStateStore::new(StateStorage::new(dir))
    }

    fn snapshot_with_selection() -> FileManagerSnapshot {
        FileManagerSnapshot {
            selected_file_ids: vec![crate::models::file::FileId::new()],
            ..FileManagerSnapshot::default()
        }
    }

    #[test]
    fn test_default_shape() {
        let store = scratch_store("default");
        assert_eq!(store.active_page(), Page::Image);
        assert!(store.state().is_initialized);
        assert_eq!(store.state().image_state.ui.current_model, "lama");
    }

    #[test]
    fn test_page_partitioning() {
        let mut store = scratch_store("partition");
        let image_snapshot = snapshot_with_selection();

        store.save_file_manager_state(Page::Image, image_snapshot.clone());
        assert_eq!(store.restore_file_manager_state(Page::Image), image_snapshot);
        // The video slot is untouched.
        assert_eq!(
            store.restore_file_manager_state(Page::Video),
            FileManagerSnapshot::default()
        );
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut store = scratch_store("roundtrip");
        store.save_file_manager_state(Page::Video, snapshot_with_selection());
        let mut ui = UiPrefs::default();
        ui.current_model = "sd".into();
        store.save_ui_state(Page::Image, ui);
        assert_eq!(store.save_state().unwrap(), SaveOutcome::Saved);

        let mut reloaded = AppStateStore::new(store.storage.clone());
        assert_eq!(reloaded.load_state().unwrap(), LoadOutcome::Loaded);
        assert_eq!(
            reloaded.restore_file_manager_state(Page::Video),
            store.restore_file_manager_state(Page::Video)
        );
        assert_eq!(reloaded.restore_ui_state(Page::Image).current_model, "sd");

        let _ = std::fs::remove_dir_all(store.storage.dir());
    }

    #[test]
    fn test_load_without_file_is_no_data() {
        let mut store = scratch_store("nodata");
        assert_eq!(store.load_state().unwrap(), LoadOutcome::NoData);
        assert_eq!(store.state(), &AppSnapshot::default());
    }

    #[test]
    fn test_load_merges_shallowly_over_defaults() {
        let store = scratch_store("shallow");
        store
            .storage
            .save_app_state(&json!({"activePage": "video"}), usize::MAX)
            .unwrap();

        let mut reloaded = AppStateStore::new(store.storage.clone());
        reloaded.load_state().unwrap();
        assert_eq!(reloaded.active_page(), Page::Video);
        // Missing pages keep their default shape.
        assert_eq!(reloaded.state().image_state, PageState::default());

        let _ = std::fs::remove_dir_all(store.storage.dir());
    }

    #[test]
    fn test_oversized_save_writes_nothing() {
        let mut store = scratch_store("oversized");
        store.set_save_limit_mb(0);

        match store.save_state().unwrap() {
            SaveOutcome::Oversized { limit, .. } => assert_eq!(limit, 0),
            other => panic!("expected oversized, got {other:?}"),
        }
        assert!(!store.storage.app_state_exists());
    }

    #[test]
    fn test_switch_page_saves_first() {
        let mut store = scratch_store("switch");
        assert_eq!(store.switch_page(Page::Video).unwrap(), SaveOutcome::Saved);
        assert_eq!(store.active_page(), Page::Video);
        assert!(store.storage.app_state_exists());

        let _ = std::fs::remove_dir_all(store.storage.dir());
    }

    #[test]
    fn test_oversized_switch_is_aborted() {
        let mut store = scratch_store("switch_oversized");
        store.set_save_limit_mb(0);

        let outcome = store.switch_page(Page::Video).unwrap();
        assert!(matches!(outcome, SaveOutcome::Oversized { .. }));
        assert_eq!(store.active_page(), Page::Image, "switch must not happen");
    }

    #[test]
    fn test_restart_resets_and_clears() {
        let mut store = scratch_store("restart");
        store.save_file_manager_state(Page::Image, snapshot_with_selection());
        store.save_state().unwrap();
        assert!(store.storage.app_state_exists());

        store.restart();
        assert_eq!(store.state(), &AppSnapshot::default());
        assert!(!store.storage.app_state_exists());
    }

    #[test]
    fn test_snapshot_json_field_names() {
        let snapshot = AppSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["activePage"], "image");
        assert_eq!(json["isInitialized"], true);
        assert!(json["imageState"]["fileManager"].is_object());
        assert!(json["videoState"]["ui"].is_object());
    }
}
