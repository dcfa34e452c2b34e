// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Mask set serialization and deserialization.
//!
//! This module handles exporting and importing a video's mask keyframe
//! set in YAML and JSON formats, for interchange between installations.

use crate::models::keyframe::VideoMaskSet;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete mask set document for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskSetDocument {
    pub video: String,
    #[serde(flatten)]
    pub mask_set: VideoMaskSet,
}

/// Export a mask set document to YAML format.
pub fn export_yaml(data: &MaskSetDocument, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Export a mask set document to JSON format.
pub fn export_json(data: &MaskSetDocument, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Import a mask set document from YAML format.
pub fn import_yaml(path: &Path) -> Result<MaskSetDocument> {
    let yaml = std::fs::read_to_string(path)?;
    let data = serde_yaml::from_str(&yaml)?;
    Ok(data)
}

/// Import a mask set document from JSON format.
pub fn import_json(path: &Path) -> Result<MaskSetDocument> {
    let json = std::fs::read_to_string(path)?;
    let data = serde_json::from_str(&json)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::keyframe::{MaskKeyframe, VideoMaskSet};
    use crate::models::mask::MaskShape;

    fn sample_document() -> MaskSetDocument {
        let mut mask_set = VideoMaskSet::new(1_700_000_000_000);
        mask_set.metadata.total_frames = 120;
        mask_set.keyframes.push(MaskKeyframe {
            id: "kf-1".into(),
            frame: 12,
            shape: MaskShape::rectangle(0.25, 0.25, 0.5, 0.5),
            captured_at: 1_700_000_000_000,
        });
        MaskSetDocument {
            video: "clip.mp4".into(),
            mask_set,
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = std::env::temp_dir().join("mist_serialization_json");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("masks.json");

        let doc = sample_document();
        export_json(&doc, &path).unwrap();
        let loaded = import_json(&path).unwrap();
        assert_eq!(loaded, doc);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = std::env::temp_dir().join("mist_serialization_yaml");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("masks.yaml");

        let doc = sample_document();
        export_yaml(&doc, &path).unwrap();
        let loaded = import_yaml(&path).unwrap();
        assert_eq!(loaded, doc);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
