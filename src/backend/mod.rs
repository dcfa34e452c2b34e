// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! External inpainting backend: HTTP clients and process supervision.

pub mod client;
pub mod process;
pub mod video;

use thiserror::Error;

/// Errors from the backend HTTP layer.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status or a failure response.
    /// The message comes from the server payload when present.
    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    /// A payload could not be read from disk for upload.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Derive a human-readable message from a backend error body.
///
/// Uses the `message` field of a JSON payload when present, the raw
/// body when not, and a generic connectivity message when empty.
pub(crate) fn message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    if body.trim().is_empty() {
        "backend service is unreachable or returned no details".to_string()
    } else {
        body.to_string()
    }
}
