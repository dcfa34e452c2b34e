// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! HTTP client for the batch inpainting endpoints.
//!
//! Wraps the backend's `/api/v1/batch_inpaint` and
//! `/api/v1/batch_inpaint_by_folder` endpoints using [`reqwest`].
//! Server-side (5xx) failures are retried with exponential backoff,
//! capped at three attempts; client errors and unreachable hosts
//! surface immediately.

use crate::backend::{message_from_body, BackendError};
use crate::models::file::PayloadKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum retry attempts for server-side failures.
const MAX_RETRIES: u32 = 3;

/// Upper bound for one batch call, model load included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One file/mask pair of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInpaintItem {
    pub id: String,
    pub image: String,
    pub mask: String,
}

/// The batch envelope sent to `/api/v1/batch_inpaint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInpaintRequest {
    pub data: Vec<BatchInpaintItem>,
    pub image_type: PayloadKind,
    pub mask_type: PayloadKind,
    pub response_type: PayloadKind,
    pub temp_path: String,
}

/// Per-file outcome within a batch response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchItemResult {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub index: u32,
}

/// Response of a batch inpainting call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchInpaintResponse {
    pub processed_count: u32,
    pub success_count: u32,
    pub total_time: f64,
    pub results: Vec<BatchItemResult>,
}

/// HTTP client for one backend instance.
pub struct InpaintClient {
    client: reqwest::Client,
    base_url: String,
}

impl InpaintClient {
    /// Create a client for a backend at the given base URL,
    /// e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a client for a local backend on the given port.
    pub fn from_port(port: u32) -> Self {
        Self::new(format!("http://localhost:{}", port))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a batch of file/mask pairs for inpainting.
    pub async fn batch_inpaint(
        &self,
        request: &BatchInpaintRequest,
    ) -> Result<BatchInpaintResponse, BackendError> {
        log::info!(
            "Submitting batch inpaint of {} file(s) ({:?} payloads)",
            request.data.len(),
            request.image_type
        );
        self.post_json("/api/v1/batch_inpaint", request).await
    }

    /// Submit a folder-scoped batch job. Body and response are opaque
    /// passthrough documents.
    pub async fn batch_inpaint_by_folder(
        &self,
        request: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        self.post_json("/api/v1/batch_inpaint_by_folder", request).await
    }

    /// POST a JSON body with 5xx-only retry and parse the JSON response.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            let response = self
                .client
                .post(&url)
                .timeout(REQUEST_TIMEOUT)
                .json(body)
                .send()
                .await?;
            let status = response.status();

            if status.is_server_error() && attempt < MAX_RETRIES {
                attempt += 1;
                let delay = retry_delay(attempt);
                log::warn!(
                    "{} returned {}, retry {}/{} in {:?}",
                    path,
                    status,
                    attempt,
                    MAX_RETRIES,
                    delay
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BackendError::Api {
                    status: status.as_u16(),
                    message: message_from_body(&body),
                });
            }

            return Ok(response.json::<T>().await?);
        }
    }
}

/// Exponential backoff: 2^attempt seconds.
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}
