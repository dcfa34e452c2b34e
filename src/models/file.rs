// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! File record data structures.
//!
//! A [`FileRecord`] tracks one user file: its source, the current image
//! payload, an optional mask annotation, and the edit history. Payloads
//! come in two interchangeable representations: inline-encoded (base64)
//! or a filesystem path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Opaque unique token identifying a file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which payload representation an operation should produce or expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Base64,
    Path,
}

/// An image or mask payload.
///
/// Exactly one representation is active. `data` holds encoded bytes for
/// the inline variant and a filesystem path for the path variant;
/// `display_url` is the reference handed to preview layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    #[serde(rename = "base64")]
    Inline {
        data: String,
        #[serde(rename = "displayUrl")]
        display_url: String,
    },
    #[serde(rename = "path")]
    FsPath {
        data: String,
        #[serde(rename = "displayUrl")]
        display_url: String,
    },
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Inline { .. } => PayloadKind::Base64,
            Payload::FsPath { .. } => PayloadKind::Path,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Payload::Inline { .. })
    }

    pub fn data(&self) -> &str {
        match self {
            Payload::Inline { data, .. } | Payload::FsPath { data, .. } => data,
        }
    }

    pub fn display_url(&self) -> &str {
        match self {
            Payload::Inline { display_url, .. } | Payload::FsPath { display_url, .. } => {
                display_url
            }
        }
    }
}

/// One entry in a file's edit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    /// An entry without a timestamp (the seeded original image).
    pub fn original(payload: Payload) -> Self {
        Self {
            payload,
            timestamp: None,
        }
    }

    /// An entry stamped with the current time (a processing result).
    pub fn result(payload: Payload) -> Self {
        Self {
            payload,
            timestamp: Some(Utc::now()),
        }
    }
}

/// Serializable stand-in for the user's source file.
///
/// The in-memory `bytes` handle never survives serialization; only the
/// metadata and optional path do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(
        rename = "lastModified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<i64>,
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
}

impl SourceFile {
    /// A source backed by in-memory bytes (no filesystem handle).
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: bytes.len() as u64,
            path: None,
            last_modified: None,
            bytes: Some(bytes),
        }
    }

    /// A source backed by a filesystem path.
    pub fn from_path(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        path: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            path: Some(path),
            last_modified: None,
            bytes: None,
        }
    }
}

/// A managed file with its image, mask, and edit history.
///
/// `history` is seeded with the original image and is never empty for a
/// live record; its length is capped by the configured history limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub size: u64,
    #[serde(rename = "originalFileInfo")]
    pub original: SourceFile,
    pub image: Payload,
    pub mask: Option<Payload>,
    pub history: Vec<HistoryEntry>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// The topmost history entry, i.e. the image currently displayed.
    pub fn latest_history(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    /// Whether the file carries results beyond the seeded original.
    pub fn has_processed_images(&self) -> bool {
        self.history.len() > 1
    }

    /// Whether the file has a mask and can be sent for processing.
    pub fn is_processable(&self) -> bool {
        self.mask.is_some()
    }
}

/// Global payload-representation settings for processing requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    #[serde(rename = "imageType")]
    pub image_type: PayloadKind,
    #[serde(rename = "maskType")]
    pub mask_type: PayloadKind,
    #[serde(rename = "responseType")]
    pub response_type: PayloadKind,
    #[serde(rename = "tempPath", default)]
    pub temp_path: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            image_type: PayloadKind::Base64,
            mask_type: PayloadKind::Base64,
            response_type: PayloadKind::Base64,
            temp_path: String::new(),
        }
    }
}

/// Plain-data snapshot of the file manager, round-trippable through JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileManagerSnapshot {
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(rename = "currentFileId", default)]
    pub current_file_id: Option<FileId>,
    #[serde(rename = "selectedFileIds", default)]
    pub selected_file_ids: Vec<FileId>,
    #[serde(rename = "processingConfig", default)]
    pub processing_config: ProcessingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_document_form() {
        let payload = Payload::Inline {
            data: "aGVsbG8=".into(),
            display_url: "data:image/png;base64,aGVsbG8=".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "base64");
        assert_eq!(json["displayUrl"], "data:image/png;base64,aGVsbG8=");

        let back: Payload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_history_entry_flattens_payload() {
        let entry = HistoryEntry::result(Payload::FsPath {
            data: "/tmp/out.png".into(),
            display_url: "file:///tmp/out.png".into(),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "path");
        assert_eq!(json["data"], "/tmp/out.png");
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_source_file_bytes_do_not_serialize() {
        let source = SourceFile::from_bytes("a.png", "image/png", vec![1, 2, 3]);
        let json = serde_json::to_value(&source).unwrap();
        assert!(json.get("bytes").is_none());
        assert_eq!(json["size"], 3);

        let back: SourceFile = serde_json::from_value(json).unwrap();
        assert!(back.bytes.is_none());
        assert_eq!(back.size, 3);
    }

    #[test]
    fn test_snapshot_defaults() {
        let snapshot: FileManagerSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.files.is_empty());
        assert!(snapshot.current_file_id.is_none());
        assert_eq!(snapshot.processing_config, ProcessingConfig::default());
    }
}
