// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! HTTP client and local state for video inpainting jobs.
//!
//! A job uploads the video plus a JSON request describing per-mask
//! frame ranges, offsets, and processing/model parameters, then polls
//! the status endpoint until the backend finishes. Cancellation is
//! cooperative: the local state flags flip immediately while the
//! backend is only signalled best-effort.

use crate::backend::{message_from_body, BackendError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound for a synchronous video job round-trip.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Upper bound for status and cancel calls.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-frame placement adjustment of a mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameOffset {
    pub frame_index: u32,
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub rotation: f64,
    pub opacity: f64,
}

impl Default for FrameOffset {
    fn default() -> Self {
        Self {
            frame_index: 0,
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            opacity: 1.0,
        }
    }
}

/// One mask track of a video inpainting request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMaskSpec {
    pub id: String,
    pub mask_data: String,
    pub mask_type: String,
    pub start_frame: u32,
    pub end_frame: u32,
    pub interpolate_offsets: bool,
    #[serde(default)]
    pub offsets: Vec<FrameOffset>,
}

impl VideoMaskSpec {
    /// Whether the mask's visibility window covers `frame`.
    pub fn contains_frame(&self, frame: u32) -> bool {
        self.start_frame <= frame && frame <= self.end_frame
    }
}

/// Encoder and pipeline parameters of a video job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProcessingParams {
    pub fps: Option<u32>,
    pub quality: u32,
    pub audio_codec: String,
    pub video_codec: String,
    pub preserve_audio: bool,
    pub temp_cleanup: bool,
    pub max_workers: u32,
    pub frame_format: String,
}

impl Default for VideoProcessingParams {
    fn default() -> Self {
        Self {
            fps: None,
            quality: 23,
            audio_codec: "aac".into(),
            video_codec: "libx264".into(),
            preserve_audio: true,
            temp_cleanup: true,
            max_workers: 4,
            frame_format: "png".into(),
        }
    }
}

/// The JSON `request` part of a video inpainting upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInpaintRequest {
    pub output_path: String,
    pub temp_path: String,
    pub masks: Vec<VideoMaskSpec>,
    pub processing_config: VideoProcessingParams,
    pub prompt: String,
    pub negative_prompt: String,
    pub sd_steps: u32,
    pub sd_guidance_scale: f64,
    pub sd_strength: f64,
    pub sd_seed: i64,
}

impl Default for VideoInpaintRequest {
    fn default() -> Self {
        Self {
            output_path: String::new(),
            temp_path: String::new(),
            masks: Vec::new(),
            processing_config: VideoProcessingParams::default(),
            prompt: String::new(),
            negative_prompt: String::new(),
            sd_steps: 20,
            sd_guidance_scale: 7.5,
            sd_strength: 0.8,
            sd_seed: -1,
        }
    }
}

/// Response of a video inpainting submission.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoInpaintResponse {
    pub success: bool,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Progress report for a running job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessingProgress {
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub details: String,
}

/// Response of the status polling endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VideoStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<ProcessingProgress>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Local lifecycle of a video job as the UI sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Idle,
    Processing,
    Completed,
    Cancelled,
    Error,
}

/// Client-side processing state flags.
///
/// Transitions happen immediately on local events; the backend is not
/// consulted. `cancel` in particular flips to `Cancelled` regardless of
/// whether the backend honors the signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingState {
    pub status: ProcessingStatus,
    pub progress: ProcessingProgress,
    pub task_id: Option<String>,
    pub error: Option<String>,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            status: ProcessingStatus::Idle,
            progress: ProcessingProgress::default(),
            task_id: None,
            error: None,
        }
    }
}

impl ProcessingState {
    pub fn is_processing(&self) -> bool {
        self.status == ProcessingStatus::Processing
    }

    pub fn begin(&mut self, task_id: Option<String>) {
        self.status = ProcessingStatus::Processing;
        self.progress = ProcessingProgress::default();
        self.task_id = task_id;
        self.error = None;
    }

    pub fn update_progress(&mut self, progress: ProcessingProgress) {
        self.progress = progress;
    }

    pub fn complete(&mut self) {
        self.status = ProcessingStatus::Completed;
    }

    pub fn cancel(&mut self) {
        self.status = ProcessingStatus::Cancelled;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ProcessingStatus::Error;
        self.error = Some(message.into());
    }

    pub fn reset(&mut self) {
        *self = ProcessingState::default();
    }
}

/// HTTP client for the video inpainting endpoints.
pub struct VideoInpaintClient {
    client: reqwest::Client,
    base_url: String,
}

impl VideoInpaintClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn from_port(port: u32) -> Self {
        Self::new(format!("http://localhost:{}", port))
    }

    /// Upload a video and its inpainting request.
    ///
    /// The multipart body carries the video file under `video` and the
    /// JSON request under `request`. A `success: false` response is
    /// surfaced as an error carrying the server's message.
    pub async fn process_video(
        &self,
        video_path: &Path,
        request: &VideoInpaintRequest,
    ) -> Result<VideoInpaintResponse, BackendError> {
        let bytes = tokio::fs::read(video_path).await?;
        let file_name = video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let request_json =
            serde_json::to_string(request).unwrap_or_else(|_| "{}".to_string());

        let form = reqwest::multipart::Form::new()
            .part(
                "video",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("request", request_json);

        log::info!(
            "Uploading {} for video inpainting ({} mask track(s))",
            video_path.display(),
            request.masks.len()
        );

        let response = self
            .client
            .post(format!("{}/api/video_inpaint", self.base_url))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: message_from_body(&body),
            });
        }

        let parsed: VideoInpaintResponse = response.json().await?;
        if !parsed.success {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: parsed
                    .message
                    .unwrap_or_else(|| "video processing failed".to_string()),
            });
        }
        Ok(parsed)
    }

    /// Poll the status of a running job.
    pub async fn status(&self, task_id: &str) -> Result<VideoStatusResponse, BackendError> {
        let response = self
            .client
            .get(format!(
                "{}/api/video_inpaint/status/{}",
                self.base_url, task_id
            ))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: message_from_body(&body),
            });
        }
        Ok(response.json().await?)
    }

    /// Ask the backend to cancel a job. Best effort: the backend may
    /// finish the operation anyway.
    pub async fn cancel(&self, task_id: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(format!(
                "{}/api/video_inpaint/cancel/{}",
                self.base_url, task_id
            ))
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: message_from_body(&body),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_spec_visibility_window() {
        let spec = VideoMaskSpec {
            id: "m1".into(),
            mask_data: String::new(),
            mask_type: "base64".into(),
            start_frame: 10,
            end_frame: 20,
            interpolate_offsets: true,
            offsets: Vec::new(),
        };
        assert!(spec.contains_frame(10));
        assert!(spec.contains_frame(15));
        assert!(spec.contains_frame(20));
        assert!(!spec.contains_frame(9));
        assert!(!spec.contains_frame(21));
    }

    #[test]
    fn test_request_wire_defaults() {
        let request = VideoInpaintRequest::default();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["sd_steps"], 20);
        assert_eq!(json["sd_seed"], -1);
        assert_eq!(json["processing_config"]["quality"], 23);
        assert_eq!(json["processing_config"]["video_codec"], "libx264");
        assert_eq!(json["processing_config"]["fps"], serde_json::Value::Null);
    }

    #[test]
    fn test_processing_state_lifecycle() {
        let mut state = ProcessingState::default();
        assert_eq!(state.status, ProcessingStatus::Idle);

        state.begin(Some("task-1".into()));
        assert!(state.is_processing());
        assert_eq!(state.task_id.as_deref(), Some("task-1"));

        state.update_progress(ProcessingProgress {
            stage: "extracting frames".into(),
            progress: 40.0,
            details: String::new(),
        });
        state.complete();
        assert_eq!(state.status, ProcessingStatus::Completed);

        state.reset();
        assert_eq!(state, ProcessingState::default());
    }

    #[test]
    fn test_cancel_flips_state_immediately() {
        let mut state = ProcessingState::default();
        state.begin(None);
        state.cancel();
        assert_eq!(state.status, ProcessingStatus::Cancelled);
        assert!(!state.is_processing());
    }

    #[test]
    fn test_failure_records_message() {
        let mut state = ProcessingState::default();
        state.begin(None);
        state.fail("backend crashed");
        assert_eq!(state.status, ProcessingStatus::Error);
        assert_eq!(state.error.as_deref(), Some("backend crashed"));
    }

    #[test]
    fn test_status_response_tolerates_sparse_payload() {
        let response: VideoStatusResponse = serde_json::from_str(r#"{"status": "running"}"#).unwrap();
        assert_eq!(response.status.as_deref(), Some("running"));
        assert!(response.progress.is_none());
    }
}
