// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application shell.
//!
//! Owns the stores, the persistence layer, the backend clients, and
//! the process supervisor, and wires them together: configuration is
//! loaded and applied first, then the persisted session is restored,
//! then backend work can run. Cross-store ordering (a mask is cleared
//! only after its processing result has landed in history) is enforced
//! by sequencing inside one async chain.

use crate::backend::client::InpaintClient;
use crate::backend::process::BackendSupervisor;
use crate::backend::video::{ProcessingState, VideoInpaintClient, VideoInpaintRequest};
use crate::config::ConfigStore;
use crate::io::persistence::{PersistError, StateStorage};
use crate::io::serialization::{self, MaskSetDocument};
use crate::stores::app_state::{AppStateStore, Page, SaveOutcome};
use crate::stores::file_manager::FileManagerStore;
use crate::stores::video_mask::VideoMaskStore;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Summary of a completed batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub processed: u32,
    pub succeeded: u32,
    pub total_time: f64,
}

/// Top-level application state and wiring.
pub struct App {
    config: ConfigStore,
    storage: StateStorage,
    file_manager: FileManagerStore,
    video_masks: VideoMaskStore,
    app_state: AppStateStore,
    supervisor: BackendSupervisor,
    client: InpaintClient,
    video_client: VideoInpaintClient,
    video_processing: ProcessingState,
}

impl App {
    /// Create an application rooted at the given user-data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let storage = StateStorage::new(data_dir);
        let config = ConfigStore::new();
        let port = config.config().general.backend_port;

        Self {
            supervisor: BackendSupervisor::new(
                &config.config().general.backend_project_path,
                port,
                config.config().general.launch_mode,
            ),
            client: InpaintClient::from_port(port),
            video_client: VideoInpaintClient::from_port(port),
            video_processing: ProcessingState::default(),
            file_manager: FileManagerStore::new(),
            video_masks: VideoMaskStore::new(),
            app_state: AppStateStore::new(storage.clone()),
            storage,
            config,
        }
    }

    // ---- lifecycle ----

    /// Load configuration, restore the persisted session, and clean up
    /// expired drafts.
    pub fn initialize(&mut self) -> Result<()> {
        match self.storage.load_config() {
            Ok(Some(user_config)) => self.config.load_from_value(&user_config),
            Ok(None) => log::info!("No saved configuration, using defaults"),
            Err(e) => log::error!("Failed to load configuration, using defaults: {}", e),
        }
        self.apply_config();

        match self.app_state.load_state() {
            Ok(outcome) => log::info!("Session restore: {:?}", outcome),
            Err(e) => log::error!("Failed to restore session: {}", e),
        }
        let page = self.app_state.active_page();
        self.file_manager
            .restore(self.app_state.restore_file_manager_state(page));

        let retention = self.config.config().video.max_draft_retention;
        self.video_masks.cleanup_expired_drafts(retention);
        Ok(())
    }

    /// Re-derive every config-dependent collaborator.
    fn apply_config(&mut self) {
        let config = self.config.config().clone();
        self.file_manager.init_processing_config(&config);
        self.app_state
            .set_save_limit_mb(config.advanced.state_save_limit);
        self.video_masks.set_storage(self.storage.clone());

        let port = config.general.backend_port;
        self.client = InpaintClient::from_port(port);
        self.video_client = VideoInpaintClient::from_port(port);
        self.supervisor = BackendSupervisor::new(
            &config.general.backend_project_path,
            port,
            config.general.launch_mode,
        );
    }

    /// Validate, adopt, and persist a new configuration document.
    pub fn save_config(&mut self, new_config: &serde_json::Value) -> Result<(), Vec<String>> {
        self.config.save(new_config)?;
        if let Err(e) = self.storage.save_config(self.config.raw()) {
            return Err(vec![format!("Failed to persist configuration: {}", e)]);
        }
        self.apply_config();
        Ok(())
    }

    /// Persist the session and stop the backend.
    pub async fn shutdown(&mut self) {
        let page = self.app_state.active_page();
        self.app_state
            .save_file_manager_state(page, self.file_manager.snapshot());
        match self.app_state.save_state() {
            Ok(SaveOutcome::Saved) => {}
            Ok(SaveOutcome::Oversized { size, limit }) => log::warn!(
                "Session not saved on shutdown: {} bytes exceeds the {} byte limit",
                size,
                limit
            ),
            Err(e) => log::error!("Failed to save session on shutdown: {}", e),
        }
        if let Err(e) = self.supervisor.stop().await {
            log::error!("Failed to stop backend: {}", e);
        }
        self.file_manager.clear_files();
    }

    // ---- page switching ----

    /// Switch pages, persisting the outgoing page's state first.
    ///
    /// An oversized save aborts the switch; the current page stays
    /// active and the outcome is propagated for remediation.
    pub fn switch_page(&mut self, page: Page) -> Result<SaveOutcome, PersistError> {
        let current = self.app_state.active_page();
        self.app_state
            .save_file_manager_state(current, self.file_manager.snapshot());

        let outcome = self.app_state.switch_page(page)?;
        if outcome == SaveOutcome::Saved {
            self.file_manager
                .restore(self.app_state.restore_file_manager_state(page));
        }
        Ok(outcome)
    }

    // ---- backend process ----

    pub async fn start_backend(&mut self) -> Result<()> {
        self.supervisor.start().await?;
        Ok(())
    }

    pub async fn stop_backend(&mut self) -> Result<()> {
        self.supervisor.stop().await?;
        Ok(())
    }

    // ---- batch processing ----

    /// Run batch inpainting over every processable file (or the
    /// selection when one exists) and fold results into history.
    ///
    /// Each file's mask is cleared only after its result has landed in
    /// history, at the end of the round-trip.
    pub async fn run_batch(&mut self) -> Result<BatchSummary> {
        let selected = self.file_manager.selected_processable_files();
        let candidates = if selected.is_empty() {
            self.file_manager.processable_files()
        } else {
            selected
        };
        let ids: Vec<_> = candidates.iter().map(|f| f.id).collect();
        if ids.is_empty() {
            return Err(anyhow!("no files with masks to process"));
        }

        let folder = self
            .config
            .config()
            .file_management
            .image_folder_name
            .clone();
        let request = self.file_manager.prepare_batch_inpaint_data(&ids, &folder)?;
        let response = self
            .client
            .batch_inpaint(&request)
            .await
            .context("batch inpainting failed")?;

        for item in &response.results {
            let Some(id) = ids.iter().find(|id| id.to_string() == item.id) else {
                log::warn!("Backend returned unknown file id {}", item.id);
                continue;
            };
            if item.success {
                if let Some(result) = &item.result {
                    if let Err(e) = self.file_manager.add_processing_result(*id, result) {
                        log::error!("Failed to record result for {}: {}", id, e);
                        continue;
                    }
                    self.file_manager.clear_file_mask(*id);
                }
            } else {
                log::error!(
                    "Inpainting failed for {}: {}",
                    item.id,
                    item.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        Ok(BatchSummary {
            processed: response.processed_count,
            succeeded: response.success_count,
            total_time: response.total_time,
        })
    }

    /// Run folder-scoped batch inpainting: the backend reads images and
    /// masks directly from the given directories.
    pub async fn run_folder_batch(
        &self,
        image_folder: &Path,
        mask_folder: &Path,
        output_folder: &Path,
    ) -> Result<serde_json::Value> {
        let request = serde_json::json!({
            "image_folder": image_folder.to_string_lossy(),
            "mask_folder": mask_folder.to_string_lossy(),
            "output_folder": output_folder.to_string_lossy(),
        });
        let response = self
            .client
            .batch_inpaint_by_folder(&request)
            .await
            .context("folder batch inpainting failed")?;
        Ok(response)
    }

    // ---- video processing ----

    /// Submit a video inpainting job and track it locally.
    pub async fn run_video_job(
        &mut self,
        video_path: &Path,
        request: VideoInpaintRequest,
    ) -> Result<Option<String>> {
        self.video_processing.begin(None);
        match self.video_client.process_video(video_path, &request).await {
            Ok(response) => {
                self.video_processing.task_id = response.task_id.clone();
                if response.task_id.is_none() {
                    self.video_processing.complete();
                }
                Ok(response.output_path)
            }
            Err(e) => {
                self.video_processing.fail(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Poll the running video job and update the local progress flags.
    pub async fn poll_video_status(&mut self) -> Result<()> {
        let Some(task_id) = self.video_processing.task_id.clone() else {
            return Ok(());
        };
        let status = self.video_client.status(&task_id).await?;
        if let Some(progress) = status.progress {
            self.video_processing.update_progress(progress);
        }
        match status.status.as_deref() {
            Some("completed") => self.video_processing.complete(),
            Some("error") => self
                .video_processing
                .fail(status.message.unwrap_or_else(|| "processing failed".into())),
            _ => {}
        }
        Ok(())
    }

    /// Cancel the running video job.
    ///
    /// Local flags flip to cancelled immediately; the backend signal is
    /// best-effort and may not stop the operation mid-flight.
    pub async fn cancel_video_job(&mut self) {
        self.video_processing.cancel();
        if let Some(task_id) = self.video_processing.task_id.clone() {
            if let Err(e) = self.video_client.cancel(&task_id).await {
                log::warn!("Backend cancel signal failed: {}", e);
            }
        }
    }

    // ---- mask interchange ----

    /// Export a video's mask set to YAML or JSON, chosen by extension.
    pub fn export_masks(&self, video: &str, path: &Path) -> Result<()> {
        let document = MaskSetDocument {
            video: video.to_string(),
            mask_set: self.video_masks.get_video_masks(video),
        };
        let extension = path.extension().and_then(|s| s.to_str());
        match extension {
            Some("yaml") | Some("yml") => serialization::export_yaml(&document, path)?,
            Some("json") => serialization::export_json(&document, path)?,
            _ => return Err(anyhow!("unsupported file extension: {:?}", extension)),
        }
        log::info!("Exported masks for {} to {}", video, path.display());
        Ok(())
    }

    /// Import a mask set document, replacing the video's live set.
    /// Returns the video identifier from the document.
    pub fn import_masks(&mut self, path: &Path) -> Result<String> {
        let extension = path.extension().and_then(|s| s.to_str());
        let document = match extension {
            Some("yaml") | Some("yml") => serialization::import_yaml(path)?,
            Some("json") => serialization::import_json(path)?,
            _ => return Err(anyhow!("unsupported file extension: {:?}", extension)),
        };
        log::info!(
            "Imported {} keyframe(s) for {}",
            document.mask_set.keyframes.len(),
            document.video
        );
        self.video_masks
            .set_video_masks(&document.video, document.mask_set);
        Ok(document.video)
    }

    // ---- store access ----

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn file_manager(&self) -> &FileManagerStore {
        &self.file_manager
    }

    pub fn file_manager_mut(&mut self) -> &mut FileManagerStore {
        &mut self.file_manager
    }

    pub fn video_masks(&self) -> &VideoMaskStore {
        &self.video_masks
    }

    pub fn video_masks_mut(&mut self) -> &mut VideoMaskStore {
        &mut self.video_masks
    }

    pub fn app_state(&self) -> &AppStateStore {
        &self.app_state
    }

    pub fn supervisor_mut(&mut self) -> &mut BackendSupervisor {
        &mut self.supervisor
    }

    pub fn video_processing(&self) -> &ProcessingState {
        &self.video_processing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::file::SourceFile;
    use crate::models::mask::MaskShape;

    fn scratch_app(label: &str) -> App {
        let dir = std::env::temp_dir().join(format!("mist_app_{label}"));
        let _ = std::fs::remove_dir_all(&dir);
        App::new(dir)
    }

    #[test]
    fn test_initialize_without_saved_state() {
        let mut app = scratch_app("fresh");
        app.initialize().unwrap();
        assert_eq!(app.app_state().active_page(), Page::Image);
        assert!(app.file_manager().files().is_empty());
        assert_eq!(app.config().config().general.backend_port, 8080);
    }

    #[test]
    fn test_switch_page_partitions_file_state() {
        let mut app = scratch_app("switch");
        app.initialize().unwrap();

        let source = SourceFile::from_bytes("a.png", "image/png", b"pixels".to_vec());
        app.file_manager_mut().add_file(source).unwrap();

        app.switch_page(Page::Video).unwrap();
        assert!(app.file_manager().files().is_empty(), "video page starts empty");

        app.switch_page(Page::Image).unwrap();
        assert_eq!(app.file_manager().files().len(), 1);

        let _ = std::fs::remove_dir_all(app.storage.dir());
    }

    #[test]
    fn test_save_config_rejects_invalid() {
        let mut app = scratch_app("config");
        let errors = app
            .save_config(&serde_json::json!({"general": {"backendPort": 80}}))
            .unwrap_err();
        assert!(!errors.is_empty());
        assert_eq!(app.config().config().general.backend_port, 8080);
    }

    #[test]
    fn test_save_config_applies_and_persists() {
        let mut app = scratch_app("config_ok");
        let mut doc = crate::config::AppConfig::default_value();
        doc["general"]["backendPort"] = serde_json::json!(9191);

        app.save_config(&doc).unwrap();
        assert_eq!(app.config().config().general.backend_port, 9191);
        assert!(app.client.base_url().ends_with(":9191"));
        assert!(app.storage.load_config().unwrap().is_some());

        let _ = std::fs::remove_dir_all(app.storage.dir());
    }

    #[test]
    fn test_mask_export_import_roundtrip() {
        let dir = std::env::temp_dir().join("mist_app_masks_export");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let mut app = scratch_app("masks");
        app.video_masks_mut()
            .save_keyframe_mask("clip.mp4", 3, MaskShape::rectangle(0.1, 0.1, 0.2, 0.2))
            .unwrap();

        let path = dir.join("clip_masks.json");
        app.export_masks("clip.mp4", &path).unwrap();

        let mut fresh = scratch_app("masks_import");
        let video = fresh.import_masks(&path).unwrap();
        assert_eq!(video, "clip.mp4");
        assert_eq!(fresh.video_masks().keyframe_count("clip.mp4"), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_export_masks_rejects_unknown_extension() {
        let app = scratch_app("bad_ext");
        let err = app
            .export_masks("clip.mp4", Path::new("/tmp/masks.xml"))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
