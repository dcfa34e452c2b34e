// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! File manager store.
//!
//! Owns the list of user files with their image payloads, mask
//! annotations, and edit history; tracks the current file and the
//! selection set; and assembles the batch envelope sent to the
//! inpainting backend. Payloads are kept either inline-encoded or as
//! filesystem paths, per the configured processing method.

use crate::backend::client::{BatchInpaintItem, BatchInpaintRequest};
use crate::config::AppConfig;
use crate::io::media;
use crate::models::file::{
    FileId, FileManagerSnapshot, FileRecord, HistoryEntry, Payload, PayloadKind,
    ProcessingConfig, SourceFile,
};
use crate::stores::{StoreError, StoreResult};
use crate::util::encoding;
use crate::util::preview::PreviewRegistry;
use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Mask input accepted by [`FileManagerStore::update_file_mask`]:
/// either a raw encoded string or a `{data}`-shaped object.
#[derive(Debug, Clone)]
pub enum MaskInput {
    Raw(String),
    Framed { data: String },
}

impl From<&str> for MaskInput {
    fn from(value: &str) -> Self {
        MaskInput::Raw(value.to_string())
    }
}

impl From<String> for MaskInput {
    fn from(value: String) -> Self {
        MaskInput::Raw(value)
    }
}

/// Per-file image/mask/history records and batch assembly.
pub struct FileManagerStore {
    files: Vec<FileRecord>,
    current_file_id: Option<FileId>,
    selected_file_ids: Vec<FileId>,
    processing_config: ProcessingConfig,
    previews: PreviewRegistry,
    history_limit: usize,
}

impl Default for FileManagerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileManagerStore {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            current_file_id: None,
            selected_file_ids: Vec::new(),
            processing_config: ProcessingConfig::default(),
            previews: PreviewRegistry::new(),
            history_limit: 10,
        }
    }

    /// Derive the processing configuration from the app config.
    ///
    /// Images and responses follow the configured processing method;
    /// masks always travel inline.
    pub fn init_processing_config(&mut self, config: &AppConfig) {
        let method = config.advanced.image_processing_method;
        self.processing_config = ProcessingConfig {
            image_type: method,
            mask_type: PayloadKind::Base64,
            response_type: method,
            temp_path: config.file_management.temp_path.clone(),
        };
        self.history_limit = config.advanced.image_history_limit.max(1);
    }

    pub fn processing_config(&self) -> &ProcessingConfig {
        &self.processing_config
    }

    pub fn previews_mut(&mut self) -> &mut PreviewRegistry {
        &mut self.previews
    }

    // ---- accessors ----

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn current_file_id(&self) -> Option<FileId> {
        self.current_file_id
    }

    pub fn current_file(&self) -> Option<&FileRecord> {
        self.current_file_id.and_then(|id| self.file(id))
    }

    /// The topmost history entry of the current file.
    pub fn current_display_image(&self) -> Option<&HistoryEntry> {
        self.current_file().and_then(|f| f.latest_history())
    }

    /// Whether the current file carries results beyond the original.
    pub fn has_processed_images(&self) -> bool {
        self.current_file()
            .map(|f| f.has_processed_images())
            .unwrap_or(false)
    }

    pub fn selected_file_ids(&self) -> &[FileId] {
        &self.selected_file_ids
    }

    pub fn selected_files(&self) -> Vec<&FileRecord> {
        self.files
            .iter()
            .filter(|f| self.selected_file_ids.contains(&f.id))
            .collect()
    }

    /// Files eligible for processing: those carrying a mask.
    pub fn processable_files(&self) -> Vec<&FileRecord> {
        self.files.iter().filter(|f| f.is_processable()).collect()
    }

    /// Selected files eligible for processing.
    pub fn selected_processable_files(&self) -> Vec<&FileRecord> {
        self.selected_files()
            .into_iter()
            .filter(|f| f.is_processable())
            .collect()
    }

    // ---- mutations ----

    /// Add a file and seed its history with the original image.
    ///
    /// The payload is path-form only when the processing method is
    /// `path` and the source has a filesystem handle; otherwise the
    /// source is encoded inline. The first file added becomes current.
    pub fn add_file(&mut self, source: SourceFile) -> Result<FileId> {
        let payload = match (&source.path, self.processing_config.image_type) {
            (Some(path), PayloadKind::Path) => media::path_payload(path),
            _ => media::inline_payload(&source)?,
        };

        let id = FileId::new();
        let mime_type = if source.mime_type.is_empty() {
            "image/jpeg".to_string()
        } else {
            source.mime_type.clone()
        };

        self.previews.register(&id.to_string(), payload.display_url());
        let record = FileRecord {
            id,
            name: source.name.clone(),
            mime_type,
            size: source.size,
            original: source,
            image: payload.clone(),
            mask: None,
            history: vec![HistoryEntry::original(payload)],
            created_at: chrono::Utc::now(),
        };
        self.files.push(record);

        if self.files.len() == 1 {
            self.current_file_id = Some(id);
        }
        log::info!("Added file {}, total files: {}", id, self.files.len());
        Ok(id)
    }

    pub fn set_current_file(&mut self, id: FileId) {
        self.current_file_id = Some(id);
    }

    /// Set a file's mask annotation.
    ///
    /// Accepts a raw encoded string or a `{data}`-shaped object and
    /// always stores the mask inline, regardless of the file's own
    /// payload kind. Malformed input is logged and leaves the file
    /// untouched.
    pub fn update_file_mask(&mut self, id: FileId, mask: impl Into<MaskInput>) -> bool {
        let data_url = match mask.into() {
            MaskInput::Raw(s) => s,
            MaskInput::Framed { data } => data,
        };
        if data_url.is_empty() {
            log::error!("Invalid mask data for file {}: empty input", id);
            return false;
        }

        let Some(file) = self.files.iter_mut().find(|f| f.id == id) else {
            log::error!("Cannot set mask: file {} not found", id);
            return false;
        };

        file.mask = Some(Payload::Inline {
            data: encoding::strip_data_url(&data_url).to_string(),
            display_url: data_url,
        });
        true
    }

    /// Clear a file's mask, typically after its processing result has
    /// been folded into history.
    pub fn clear_file_mask(&mut self, id: FileId) -> bool {
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                file.mask = None;
                true
            }
            None => false,
        }
    }

    /// Append a processing result to a file's history.
    ///
    /// The entry is path-form only when the configured response type is
    /// `path` and the result is a bare path rather than a data URL.
    /// History is trimmed to the configured limit, dropping the oldest
    /// entries. The consumed mask is not cleared here; that is the
    /// caller's step once the whole round-trip has completed.
    pub fn add_processing_result(&mut self, id: FileId, result: &str) -> StoreResult<()> {
        let response_type = self.processing_config.response_type;
        let limit = self.history_limit;
        let file = self
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("file {} not found", id)))?;

        let payload = if response_type == PayloadKind::Path && !encoding::is_data_url(result) {
            let normalized = result.replace('\\', "/");
            Payload::FsPath {
                display_url: format!("file://{}", normalized),
                data: result.to_string(),
            }
        } else {
            let display_url = if encoding::is_data_url(result) {
                result.to_string()
            } else {
                format!("data:image/png;base64,{}", result)
            };
            Payload::Inline {
                data: encoding::strip_data_url(result).to_string(),
                display_url,
            }
        };

        file.history.push(HistoryEntry::result(payload));
        if file.history.len() > limit {
            let excess = file.history.len() - limit;
            file.history.drain(..excess);
        }
        log::info!(
            "Added processing result for {}, history depth: {}",
            id,
            file.history.len()
        );
        Ok(())
    }

    /// Drop the topmost processing result, back to the previous image.
    /// The seeded original is never popped.
    pub fn undo_processing(&mut self, id: FileId) -> bool {
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) if file.history.len() > 1 => {
                file.history.pop();
                true
            }
            _ => false,
        }
    }

    /// Remove a file, fixing up the current file and selection set and
    /// releasing its preview references.
    pub fn remove_file(&mut self, id: FileId) -> bool {
        let Some(index) = self.files.iter().position(|f| f.id == id) else {
            return false;
        };
        self.files.remove(index);
        self.previews.release_for(&id.to_string());

        if self.current_file_id == Some(id) {
            self.current_file_id = self.files.first().map(|f| f.id);
        }
        self.selected_file_ids.retain(|&selected| selected != id);
        log::info!("Removed file {}, remaining: {}", id, self.files.len());
        true
    }

    /// Drop every file and release all preview references.
    pub fn clear_files(&mut self) {
        self.files.clear();
        self.current_file_id = None;
        self.selected_file_ids.clear();
        self.previews.release_all();
    }

    pub fn toggle_file_selection(&mut self, id: FileId) {
        match self.selected_file_ids.iter().position(|&s| s == id) {
            Some(index) => {
                self.selected_file_ids.remove(index);
            }
            None => self.selected_file_ids.push(id),
        }
    }

    /// Select every image file, or clear the selection.
    pub fn select_all_files(&mut self, select: bool) {
        if select {
            self.selected_file_ids = self
                .files
                .iter()
                .filter(|f| f.original.mime_type.starts_with("image/"))
                .map(|f| f.id)
                .collect();
        } else {
            self.selected_file_ids.clear();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_file_ids.clear();
    }

    /// Copy one file's mask onto a set of target files.
    pub fn apply_mask_to_files(&mut self, source_id: FileId, target_ids: &[FileId]) -> bool {
        let Some(mask_url) = self
            .file(source_id)
            .and_then(|f| f.mask.as_ref())
            .map(|mask| mask.display_url().to_string())
        else {
            return false;
        };

        for &target in target_ids {
            if target != source_id {
                self.update_file_mask(target, mask_url.as_str());
            }
        }
        true
    }

    // ---- batch assembly ----

    /// Assemble the batch envelope for the given files.
    ///
    /// Image payloads are resolved per the configured image type; the
    /// inline case re-encodes the original source when the latest
    /// history entry is not already inline. Fails the whole batch when
    /// a file lacks a mask.
    pub fn prepare_batch_inpaint_data(
        &self,
        ids: &[FileId],
        image_folder_name: &str,
    ) -> Result<BatchInpaintRequest> {
        let temp_path = join_temp_path(&self.processing_config.temp_path, image_folder_name);

        let mut items = Vec::with_capacity(ids.len());
        for &id in ids {
            let file = self
                .file(id)
                .ok_or_else(|| anyhow!("file {} not found", id))?;

            let image = match self.processing_config.image_type {
                PayloadKind::Base64 => match file.latest_history() {
                    Some(entry) if entry.payload.is_inline() => entry.payload.data().to_string(),
                    _ => media::inline_payload(&file.original)
                        .with_context(|| format!("failed to encode {}", file.name))?
                        .data()
                        .to_string(),
                },
                PayloadKind::Path => file
                    .original
                    .path
                    .as_ref()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_else(|| file.name.clone()),
            };

            let mask_payload = file
                .mask
                .as_ref()
                .ok_or_else(|| anyhow!("file {} has no mask", file.name))?;
            let mask = match self.processing_config.mask_type {
                PayloadKind::Base64 => mask_payload.data().to_string(),
                PayloadKind::Path => format!("mask_{}.png", file.id),
            };

            items.push(BatchInpaintItem {
                id: file.id.to_string(),
                image,
                mask,
            });
        }

        Ok(BatchInpaintRequest {
            data: items,
            image_type: self.processing_config.image_type,
            mask_type: self.processing_config.mask_type,
            response_type: self.processing_config.response_type,
            temp_path,
        })
    }

    // ---- saving ----

    /// Save a file's latest image to `target_path`.
    ///
    /// Path payloads are copied; inline payloads are decoded and
    /// written. Never propagates: failures are logged and reported as
    /// `false`.
    pub fn save_file(&self, id: FileId, target_path: &Path) -> bool {
        let Some(file) = self.file(id) else {
            return false;
        };
        let Some(latest) = file.latest_history() else {
            return false;
        };

        let outcome = if self.processing_config.response_type == PayloadKind::Path
            && !latest.payload.is_inline()
        {
            media::copy_file(Path::new(latest.payload.data()), target_path)
        } else {
            media::write_decoded(latest.payload.data(), target_path)
        };

        match outcome {
            Ok(written) => {
                log::info!("Saved {} to {}", file.name, written.display());
                true
            }
            Err(e) => {
                log::error!("Failed to save {}: {}", file.name, e);
                false
            }
        }
    }

    // ---- snapshot / restore ----

    /// A plain-data snapshot of the store. Live byte handles are
    /// dropped; only metadata substitutes survive.
    pub fn snapshot(&self) -> FileManagerSnapshot {
        let files = self
            .files
            .iter()
            .map(|file| {
                let mut file = file.clone();
                file.original.bytes = None;
                file
            })
            .collect();
        FileManagerSnapshot {
            files,
            current_file_id: self.current_file_id,
            selected_file_ids: self.selected_file_ids.clone(),
            processing_config: self.processing_config.clone(),
        }
    }

    /// Replace the store contents from a snapshot.
    pub fn restore(&mut self, snapshot: FileManagerSnapshot) {
        self.files = snapshot.files;
        self.current_file_id = snapshot.current_file_id;
        self.selected_file_ids = snapshot.selected_file_ids;
        self.processing_config = snapshot.processing_config;
    }
}

/// Join the temp path and image folder with forward slashes, matching
/// the path form the backend expects.
fn join_temp_path(temp_path: &str, image_folder_name: &str) -> String {
    if temp_path.is_empty() {
        return String::new();
    }
    let normalized = temp_path.replace('\\', "/");
    format!("{}/{}", normalized.trim_end_matches('/'), image_folder_name)
}
