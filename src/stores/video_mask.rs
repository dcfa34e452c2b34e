// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Video mask store.
//!
//! Tracks the mask keyframe set of every open video, resolves
//! conflicting edits at the same frame, generates the dense per-frame
//! mask sequence consumed by the backend, and keeps an autosaved draft
//! per video for recovery. Sets are independent across videos.

use crate::io::persistence::StateStorage;
use crate::models::keyframe::{DraftSnapshot, FrameMask, MaskKeyframe, VideoMaskSet};
use crate::models::mask::MaskShape;
use crate::stores::{StoreError, StoreResult};
use crate::util::geometry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// How duplicate keyframes at one frame are reconciled.
///
/// Duplicates only arise when the upsert path is bypassed, e.g. when
/// concurrent remote edits are merged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    Merge,
    UseOld,
    UseNew,
}

/// Pluggable merge function for the [`ConflictPolicy::Merge`] policy.
/// Called with at least two shapes.
pub type MaskMergeFn = Box<dyn Fn(&[MaskShape]) -> MaskShape + Send>;

/// Per-video mask keyframe collections with draft autosave.
pub struct VideoMaskStore {
    video_masks: HashMap<String, VideoMaskSet>,
    draft_saves: HashMap<String, DraftSnapshot>,
    storage: Option<StateStorage>,
    merge_fn: MaskMergeFn,
}

impl Default for VideoMaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoMaskStore {
    pub fn new() -> Self {
        Self {
            video_masks: HashMap::new(),
            draft_saves: HashMap::new(),
            storage: None,
            // Real mask merging is an extension point; keeping the first
            // shape matches the upsert-replaces-in-place contract.
            merge_fn: Box::new(|shapes| shapes[0].clone()),
        }
    }

    /// Inject the draft persistence collaborator.
    pub fn set_storage(&mut self, storage: StateStorage) {
        self.storage = Some(storage);
    }

    /// Replace the mask merge function used by [`ConflictPolicy::Merge`].
    pub fn set_merge_fn(&mut self, merge_fn: MaskMergeFn) {
        self.merge_fn = merge_fn;
    }

    /// The mask set for a video, or an empty default for unknown videos.
    pub fn get_video_masks(&self, video: &str) -> VideoMaskSet {
        self.video_masks
            .get(video)
            .cloned()
            .unwrap_or_else(|| VideoMaskSet::new(now_ms()))
    }

    /// Number of keyframes stored for a video.
    pub fn keyframe_count(&self, video: &str) -> usize {
        self.video_masks
            .get(video)
            .map(|set| set.keyframes.len())
            .unwrap_or(0)
    }

    /// Replace a video's mask set wholesale, e.g. from an import.
    pub fn set_video_masks(&mut self, video: &str, set: VideoMaskSet) {
        self.video_masks.insert(video.to_string(), set);
        self.auto_save(video);
    }

    /// Record the probed frame count for a video.
    pub fn set_total_frames(&mut self, video: &str, total_frames: u32) {
        let set = self
            .video_masks
            .entry(video.to_string())
            .or_insert_with(|| VideoMaskSet::new(now_ms()));
        set.metadata.total_frames = total_frames;
    }

    /// Save a keyframe mask, replacing any keyframe at the same frame.
    ///
    /// The replaced keyframe keeps its id. Triggers a best-effort draft
    /// autosave; persistence failures are logged, not propagated.
    pub fn save_keyframe_mask(
        &mut self,
        video: &str,
        frame: i64,
        shape: MaskShape,
    ) -> StoreResult<MaskKeyframe> {
        if video.is_empty() {
            return Err(StoreError::InvalidArgument("video name is empty".into()));
        }
        if frame < 0 {
            return Err(StoreError::InvalidArgument(format!(
                "frame index {} is negative",
                frame
            )));
        }
        let frame = frame as u32;
        let now = now_ms();

        let set = self
            .video_masks
            .entry(video.to_string())
            .or_insert_with(|| VideoMaskSet::new(now));

        let keyframe = match set.keyframes.iter_mut().find(|kf| kf.frame == frame) {
            Some(existing) => {
                existing.shape = shape;
                existing.captured_at = now;
                existing.clone()
            }
            None => {
                let keyframe = MaskKeyframe {
                    id: Uuid::new_v4().to_string(),
                    frame,
                    shape,
                    captured_at: now,
                };
                set.keyframes.push(keyframe.clone());
                keyframe
            }
        };
        set.sort_keyframes();
        set.metadata.modified = now;
        log::info!(
            "Saved keyframe mask for {} at frame {}, total keyframes: {}",
            video,
            frame,
            set.keyframes.len()
        );

        self.auto_save(video);
        Ok(keyframe)
    }

    /// Delete a keyframe by id.
    pub fn delete_keyframe(&mut self, video: &str, keyframe_id: &str) -> StoreResult<()> {
        let set = self
            .video_masks
            .get_mut(video)
            .ok_or_else(|| StoreError::NotFound(format!("no mask data for video {}", video)))?;

        let index = set
            .keyframes
            .iter()
            .position(|kf| kf.id == keyframe_id)
            .ok_or_else(|| StoreError::NotFound(format!("keyframe {} not found", keyframe_id)))?;

        set.keyframes.remove(index);
        set.metadata.modified = now_ms();
        log::info!(
            "Deleted keyframe {} from {}, remaining: {}",
            keyframe_id,
            video,
            set.keyframes.len()
        );

        self.auto_save(video);
        Ok(())
    }

    /// Reconcile multiple keyframes at the same frame.
    ///
    /// A no-op success when at most one keyframe occupies the frame.
    pub fn resolve_mask_conflict(
        &mut self,
        video: &str,
        frame: u32,
        policy: ConflictPolicy,
    ) -> StoreResult<()> {
        let set = self
            .video_masks
            .get_mut(video)
            .ok_or_else(|| StoreError::NotFound(format!("no mask data for video {}", video)))?;

        let conflicting: Vec<usize> = set
            .keyframes
            .iter()
            .enumerate()
            .filter(|(_, kf)| kf.frame == frame)
            .map(|(i, _)| i)
            .collect();
        if conflicting.len() <= 1 {
            return Ok(());
        }

        let keep_index = match policy {
            ConflictPolicy::Merge => {
                let shapes: Vec<MaskShape> = conflicting
                    .iter()
                    .map(|&i| set.keyframes[i].shape.clone())
                    .collect();
                let merged = (self.merge_fn)(&shapes);
                let first = conflicting[0];
                set.keyframes[first].shape = merged;
                first
            }
            ConflictPolicy::UseOld => conflicting
                .iter()
                .copied()
                .min_by_key(|&i| set.keyframes[i].captured_at)
                .unwrap_or(conflicting[0]),
            ConflictPolicy::UseNew => conflicting
                .iter()
                .copied()
                .max_by_key(|&i| set.keyframes[i].captured_at)
                .unwrap_or(conflicting[0]),
        };

        let keep_id = set.keyframes[keep_index].id.clone();
        set.keyframes
            .retain(|kf| kf.frame != frame || kf.id == keep_id);
        set.sort_keyframes();
        set.metadata.modified = now_ms();
        log::info!(
            "Resolved mask conflict at frame {} of {} with {:?}",
            frame,
            video,
            policy
        );

        self.auto_save(video);
        Ok(())
    }

    /// Generate the per-frame mask sequence for processing.
    ///
    /// For every frame in `[0, total_frames)` the result carries either
    /// the exact keyframe shape or the interpolation between the
    /// bounding keyframes. Frames before the first keyframe or after
    /// the last yield no entry.
    pub fn generate_processing_masks(&self, video: &str) -> Vec<FrameMask> {
        let set = match self.video_masks.get(video) {
            Some(set) if !set.keyframes.is_empty() => set,
            _ => return Vec::new(),
        };

        let mut sorted = set.keyframes.clone();
        sorted.sort_by_key(|kf| kf.frame);

        let mut masks = Vec::new();
        for frame in 0..set.metadata.total_frames {
            if let Some(keyframe) = sorted.iter().find(|kf| kf.frame == frame) {
                masks.push(FrameMask {
                    frame,
                    shape: keyframe.shape.clone(),
                });
            } else if let Some(shape) = interpolate_between(&sorted, frame) {
                masks.push(FrameMask { frame, shape });
            }
        }
        masks
    }

    // ---- draft lifecycle ----

    /// Autosave the video's current set as a draft. Best effort: a
    /// persistence failure is logged, never surfaced to the caller.
    pub fn auto_save(&mut self, video: &str) {
        let Some(set) = self.video_masks.get(video) else {
            return;
        };
        let draft = DraftSnapshot {
            keyframes: set.keyframes.clone(),
            metadata: set.metadata,
            auto_save_time: now_ms(),
        };
        self.draft_saves.insert(video.to_string(), draft.clone());

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save_draft(video, &draft) {
                log::error!("Draft autosave for {} failed: {}", video, e);
            }
        }
    }

    /// Load a video's persisted draft into the draft cache.
    pub fn load_draft(&mut self, video: &str) -> Option<DraftSnapshot> {
        let storage = self.storage.as_ref()?;
        match storage.load_draft(video) {
            Ok(Some(draft)) => {
                self.draft_saves.insert(video.to_string(), draft.clone());
                Some(draft)
            }
            Ok(None) => None,
            Err(e) => {
                log::error!("Failed to load draft for {}: {}", video, e);
                None
            }
        }
    }

    /// Replace a video's live keyframe set with its cached draft.
    pub fn restore_draft(&mut self, video: &str) -> bool {
        match self.draft_saves.get(video) {
            Some(draft) => {
                self.video_masks.insert(
                    video.to_string(),
                    VideoMaskSet {
                        keyframes: draft.keyframes.clone(),
                        metadata: draft.metadata,
                    },
                );
                log::info!(
                    "Restored draft for {} ({} keyframes)",
                    video,
                    draft.keyframes.len()
                );
                true
            }
            None => false,
        }
    }

    /// Drop drafts older than the retention window. Best effort: any
    /// persistence failure is logged only.
    pub fn cleanup_expired_drafts(&mut self, retention_days: u32) {
        let cutoff = now_ms() - i64::from(retention_days) * 24 * 60 * 60 * 1000;

        let expired: Vec<String> = self
            .draft_saves
            .iter()
            .filter(|(_, draft)| draft.auto_save_time < cutoff)
            .map(|(video, _)| video.clone())
            .collect();
        for video in &expired {
            self.draft_saves.remove(video);
            if let Some(storage) = &self.storage {
                if let Err(e) = storage.delete_draft(video) {
                    log::error!("Failed to delete expired draft for {}: {}", video, e);
                }
            }
        }

        // Persisted drafts from earlier sessions are purged by age too.
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.purge_drafts_older_than(cutoff) {
                log::error!("Draft cleanup failed: {}", e);
            }
        }
    }

    /// Drop a video's keyframes and draft.
    pub fn clear_video_masks(&mut self, video: &str) {
        self.video_masks.remove(video);
        self.draft_saves.remove(video);
    }
}

/// Interpolate the mask for a frame strictly between two keyframes.
fn interpolate_between(sorted: &[MaskKeyframe], frame: u32) -> Option<MaskShape> {
    for pair in sorted.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if frame > current.frame && frame < next.frame {
            let ratio = f64::from(frame - current.frame) / f64::from(next.frame - current.frame);
            return Some(geometry::interpolate_shapes(
                &current.shape,
                &next.shape,
                ratio,
            ));
        }
    }
    None
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
