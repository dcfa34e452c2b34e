// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Media payload I/O.
//!
//! This module converts user source files into image payloads (inline
//! or path form) and writes payloads back out to disk for the save
//! path. Encoding helpers propagate errors; the stores absorb them into
//! logged failure flags.

use crate::models::file::{Payload, SourceFile};
use crate::util::encoding;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// The raw bytes of a source file, from memory if held, else from disk.
pub fn source_bytes(source: &SourceFile) -> Result<Vec<u8>> {
    if let Some(bytes) = &source.bytes {
        return Ok(bytes.clone());
    }
    if let Some(path) = &source.path {
        return std::fs::read(path)
            .with_context(|| format!("Failed to read source file {}", path.display()));
    }
    Err(anyhow!("Source {} has neither bytes nor a path", source.name))
}

/// Encode a source file as an inline payload with a data-URL preview.
pub fn inline_payload(source: &SourceFile) -> Result<Payload> {
    let bytes = source_bytes(source)?;
    let mime = if source.mime_type.is_empty() {
        encoding::sniff_mime(&bytes)
    } else {
        &source.mime_type
    };
    Ok(Payload::Inline {
        display_url: encoding::to_data_url(mime, &bytes),
        data: encoding::encode_bytes(&bytes),
    })
}

/// Build a path payload referencing a file on disk.
///
/// Paths are normalized to forward slashes, matching the form the
/// backend and persisted documents expect.
pub fn path_payload(path: &Path) -> Payload {
    let normalized = path.to_string_lossy().replace('\\', "/");
    Payload::FsPath {
        display_url: format!("file://{}", normalized),
        data: normalized,
    }
}

/// Decode inline payload data and write it to `target`.
///
/// Parent directories are created as needed. An existing file at the
/// target is preserved: the new file gets a timestamp suffix instead.
/// Returns the path actually written.
pub fn write_decoded(data: &str, target: &Path) -> Result<PathBuf> {
    let bytes = encoding::decode_base64(encoding::strip_data_url(data))
        .context("Payload data is not valid base64")?;

    let target = unique_target(target);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&target, bytes)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(target)
}

/// Copy a payload file to `target`, with the same collision policy as
/// [`write_decoded`]. Returns the path actually written.
pub fn copy_file(source: &Path, target: &Path) -> Result<PathBuf> {
    let target = unique_target(target);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::copy(source, &target).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            source.display(),
            target.display()
        )
    })?;
    Ok(target)
}

/// Append a timestamp to the file stem when the target already exists.
fn unique_target(target: &Path) -> PathBuf {
    if !target.exists() {
        return target.to_path_buf();
    }
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let timestamp = chrono::Utc::now()
        .format("%Y-%m-%dT%H-%M-%S%.3f")
        .to_string()
        .replace('.', "-");
    let mut name = format!("{}_{}", stem, timestamp);
    if let Some(ext) = target.extension().and_then(|s| s.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    target.with_file_name(name)
}
