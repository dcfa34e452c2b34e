// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Video mask keyframe data structures.
//!
//! A keyframe anchors a mask shape to a specific video frame index;
//! intermediate frames are derived by interpolation. Each video file
//! owns one [`VideoMaskSet`] of keyframes plus metadata.

use crate::models::mask::MaskShape;
use serde::{Deserialize, Serialize};

/// A mask shape anchored to a video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskKeyframe {
    pub id: String,
    pub frame: u32,
    #[serde(rename = "maskData")]
    pub shape: MaskShape,
    /// Capture time in epoch milliseconds. Used to order conflicting edits.
    #[serde(rename = "timestamp")]
    pub captured_at: i64,
}

/// Bookkeeping metadata for a video's mask set.
///
/// `total_frames` is set externally from a video probe; it is never
/// derived from persisted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMetadata {
    pub created: i64,
    pub modified: i64,
    #[serde(rename = "totalFrames")]
    pub total_frames: u32,
}

/// All mask keyframes for one video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMaskSet {
    pub keyframes: Vec<MaskKeyframe>,
    pub metadata: SetMetadata,
}

impl VideoMaskSet {
    /// Create an empty set stamped with the given creation time (epoch ms).
    pub fn new(now_ms: i64) -> Self {
        Self {
            keyframes: Vec::new(),
            metadata: SetMetadata {
                created: now_ms,
                modified: now_ms,
                total_frames: 0,
            },
        }
    }

    /// The keyframe exactly at `frame`, if any.
    pub fn keyframe_at(&self, frame: u32) -> Option<&MaskKeyframe> {
        self.keyframes.iter().find(|kf| kf.frame == frame)
    }

    /// Restore the ascending-by-frame ordering invariant after a mutation.
    pub fn sort_keyframes(&mut self) {
        self.keyframes.sort_by_key(|kf| kf.frame);
    }
}

/// An autosaved snapshot of a video's mask set, used for recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub keyframes: Vec<MaskKeyframe>,
    pub metadata: SetMetadata,
    #[serde(rename = "autoSaveTime")]
    pub auto_save_time: i64,
}

/// One entry of the dense per-frame mask sequence sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMask {
    pub frame: u32,
    #[serde(rename = "maskData")]
    pub shape: MaskShape,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_keyframes() {
        let mut set = VideoMaskSet::new(0);
        for frame in [30u32, 0, 10] {
            set.keyframes.push(MaskKeyframe {
                id: format!("kf-{frame}"),
                frame,
                shape: MaskShape::rectangle(0.0, 0.0, 0.5, 0.5),
                captured_at: 0,
            });
        }
        set.sort_keyframes();
        let frames: Vec<u32> = set.keyframes.iter().map(|kf| kf.frame).collect();
        assert_eq!(frames, vec![0, 10, 30]);
    }

    #[test]
    fn test_keyframe_document_field_names() {
        let kf = MaskKeyframe {
            id: "kf-1".into(),
            frame: 3,
            shape: MaskShape::rectangle(0.0, 0.0, 0.5, 0.5),
            captured_at: 1700000000000,
        };
        let json = serde_json::to_value(&kf).unwrap();
        assert!(json.get("maskData").is_some());
        assert!(json.get("timestamp").is_some());
        assert!(json.get("shape").is_none());
    }
}
