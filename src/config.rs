// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application configuration: schema defaults, deep merge, validation.
//!
//! Configuration is persisted as a JSON document. Loading merges the
//! user's document over the defaults (nested objects merge key-by-key,
//! everything else replaces wholesale); saving runs the whole document
//! through the validation gate first and rejects it with the full list
//! of violations.

use crate::models::file::PayloadKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the backend process is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchMode {
    Cuda,
    Cpu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    pub backend_port: u32,
    pub launch_mode: LaunchMode,
    pub model_path: String,
    pub backend_project_path: String,
    pub default_model: String,
    pub auto_start: bool,
    pub language: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            backend_port: 8080,
            launch_mode: LaunchMode::Cuda,
            model_path: String::new(),
            backend_project_path: String::new(),
            default_model: "lama".into(),
            auto_start: true,
            language: "en-US".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileManagementConfig {
    pub download_path: String,
    pub temp_path: String,
    pub image_folder_name: String,
    pub video_folder_name: String,
    pub auto_clean_temp: bool,
}

impl Default for FileManagementConfig {
    fn default() -> Self {
        Self {
            download_path: String::new(),
            temp_path: String::new(),
            image_folder_name: "images".into(),
            video_folder_name: "videos".into(),
            auto_clean_temp: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedConfig {
    /// Maximum number of history entries kept per file.
    pub image_history_limit: usize,
    /// Size in MB above which an image triggers a warning.
    pub image_warning_size: u32,
    /// Ceiling in MB for the persisted app-state document.
    pub state_save_limit: u32,
    pub max_concurrent_tasks: u32,
    pub enable_debug_mode: bool,
    pub log_level: String,
    pub image_processing_method: PayloadKind,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            image_history_limit: 10,
            image_warning_size: 50,
            state_save_limit: 100,
            max_concurrent_tasks: 3,
            enable_debug_mode: false,
            log_level: "info".into(),
            image_processing_method: PayloadKind::Base64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiConfig {
    pub theme: String,
    pub show_welcome_dialog: bool,
    pub confirm_before_exit: bool,
    /// Auto-save interval for the app state, in milliseconds.
    pub auto_save_interval: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "auto".into(),
            show_welcome_dialog: true,
            confirm_before_exit: true,
            auto_save_interval: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoConfig {
    pub max_frame_count: u32,
    pub frame_extraction_format: String,
    pub default_frame_rate: u32,
    pub max_keyframes: u32,
    /// Auto-advance interval when stepping frames, in seconds.
    pub auto_next_frame_interval: f64,
    pub temp_frames_path: String,
    pub supported_formats: Vec<String>,
    pub max_concurrent_frame_processing: u32,
    pub enable_frame_skipping: bool,
    pub memory_optimization: bool,
    /// Draft auto-save interval, in seconds.
    pub auto_save_interval: u32,
    /// Days a draft is retained before cleanup.
    pub max_draft_retention: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_frame_count: 10_000,
            frame_extraction_format: "png".into(),
            default_frame_rate: 30,
            max_keyframes: 100,
            auto_next_frame_interval: 0.1,
            temp_frames_path: String::new(),
            supported_formats: ["mp4", "mov", "avi", "mkv", "wmv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_concurrent_frame_processing: 4,
            enable_frame_skipping: true,
            memory_optimization: true,
            auto_save_interval: 30,
            max_draft_retention: 7,
        }
    }
}

/// The full application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub file_management: FileManagementConfig,
    pub advanced: AdvancedConfig,
    pub ui: UiConfig,
    pub video: VideoConfig,
}

impl AppConfig {
    /// The defaults as a JSON document, the base for merging.
    pub fn default_value() -> Value {
        serde_json::to_value(AppConfig::default()).unwrap_or(Value::Object(Default::default()))
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Recursively merge `source` over `target`.
///
/// Plain-object values merge key-by-key; every other value type
/// (arrays, null, scalars) replaces the target value wholesale.
pub fn deep_merge(target: Value, source: &Value) -> Value {
    match (target, source) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_object() {
                    let nested = base.remove(key).unwrap_or(Value::Object(Default::default()));
                    base.insert(key.clone(), deep_merge(nested, value));
                } else {
                    base.insert(key.clone(), value.clone());
                }
            }
            Value::Object(base)
        }
        (_, source) => source.clone(),
    }
}

/// Merge a user configuration document over the defaults.
pub fn merge_with_default(user_config: &Value) -> Value {
    deep_merge(AppConfig::default_value(), user_config)
}

/// Validate a configuration document, returning every violation found.
///
/// An empty list means the document is acceptable. Fields not covered
/// by a rule are passed through untouched.
pub fn validate_config(config: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let port = config
        .pointer("/general/backendPort")
        .and_then(Value::as_u64);
    match port {
        Some(p) if (1024..=65535).contains(&p) => {}
        _ => errors.push("Backend port must be within 1024-65535".to_string()),
    }

    let launch_mode = config
        .pointer("/general/launchMode")
        .and_then(Value::as_str);
    if !matches!(launch_mode, Some("cuda") | Some("cpu")) {
        errors.push("Launch mode must be cuda or cpu".to_string());
    }

    if let Some(path) = config.pointer("/general/backendProjectPath") {
        if !path.is_string() {
            errors.push("Backend project path must be a string".to_string());
        }
    }

    let numeric_rules = [
        ("/advanced/imageHistoryLimit", "Image history limit", 1u64),
        ("/advanced/imageWarningSize", "Image warning size", 1),
        ("/advanced/stateSaveLimit", "State save limit", 10),
    ];
    for (pointer, name, min) in numeric_rules {
        match config.pointer(pointer).and_then(Value::as_u64) {
            Some(v) if v >= min => {}
            _ => errors.push(format!("{} must be a number of at least {}", name, min)),
        }
    }

    if let Some(method) = config
        .pointer("/advanced/imageProcessingMethod")
        .and_then(Value::as_str)
    {
        if !matches!(method, "base64" | "path") {
            errors.push("Image processing method must be base64 or path".to_string());
        }
    }

    errors
}

/// In-memory configuration store guarding all persisted configuration.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: AppConfig,
    raw: Value,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            raw: AppConfig::default_value(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The merged configuration document as persisted.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Adopt a loaded user document, merging it over the defaults.
    ///
    /// A document that cannot be read into the typed schema falls back
    /// to the defaults rather than failing the launch.
    pub fn load_from_value(&mut self, user_config: &Value) {
        let merged = merge_with_default(user_config);
        match AppConfig::from_value(merged.clone()) {
            Ok(config) => {
                self.config = config;
                self.raw = merged;
            }
            Err(e) => {
                log::error!("Failed to read configuration, using defaults: {}", e);
                self.config = AppConfig::default();
                self.raw = AppConfig::default_value();
            }
        }
    }

    /// Validate and adopt a new configuration document.
    ///
    /// Returns the violation list on failure; no partial update occurs.
    pub fn save(&mut self, new_config: &Value) -> Result<(), Vec<String>> {
        let errors = validate_config(new_config);
        if !errors.is_empty() {
            return Err(errors);
        }

        let merged = merge_with_default(new_config);
        match AppConfig::from_value(merged.clone()) {
            Ok(config) => {
                self.config = config;
                self.raw = merged;
                log::info!("Configuration updated");
                Ok(())
            }
            Err(e) => Err(vec![format!("Configuration is not readable: {}", e)]),
        }
    }

    pub fn reset_to_default(&mut self) {
        self.config = AppConfig::default();
        self.raw = AppConfig::default_value();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_empty_is_default() {
        let merged = merge_with_default(&json!({}));
        assert_eq!(merged, AppConfig::default_value());
    }

    #[test]
    fn test_merge_preserves_sibling_defaults() {
        let merged = merge_with_default(&json!({"general": {"backendPort": 9999}}));
        assert_eq!(merged["general"]["backendPort"], 9999);
        // Every other default field survives untouched.
        assert_eq!(merged["general"]["launchMode"], "cuda");
        assert_eq!(merged["general"]["defaultModel"], "lama");
        assert_eq!(merged["advanced"]["imageHistoryLimit"], 10);
        assert_eq!(merged["video"]["maxDraftRetention"], 7);
    }

    #[test]
    fn test_merge_replaces_arrays_wholesale() {
        let merged = merge_with_default(&json!({"video": {"supportedFormats": ["webm"]}}));
        assert_eq!(merged["video"]["supportedFormats"], json!(["webm"]));
    }

    #[test]
    fn test_merge_replaces_scalar_with_null() {
        let merged = merge_with_default(&json!({"general": {"modelPath": null}}));
        assert_eq!(merged["general"]["modelPath"], Value::Null);
    }

    #[test]
    fn test_validate_default_config_is_clean() {
        assert!(validate_config(&AppConfig::default_value()).is_empty());
    }

    #[test]
    fn test_validate_rejects_privileged_port() {
        let config = json!({
            "general": {"backendPort": 80, "launchMode": "cuda"},
            "fileManagement": {},
            "advanced": {"imageHistoryLimit": 10, "imageWarningSize": 50, "stateSaveLimit": 100}
        });
        let errors = validate_config(&config);
        assert!(!errors.is_empty());
        assert!(errors.iter().any(|e| e.contains("1024-65535")));
    }

    #[test]
    fn test_validate_collects_all_violations() {
        let config = json!({
            "general": {"backendPort": 70000, "launchMode": "tpu"},
            "advanced": {"imageHistoryLimit": 0, "imageWarningSize": 50, "stateSaveLimit": 5}
        });
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_validate_rejects_bad_processing_method() {
        let mut config = AppConfig::default_value();
        config["advanced"]["imageProcessingMethod"] = json!("ftp");
        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| e.contains("base64 or path")));
    }

    #[test]
    fn test_store_save_rejects_invalid_without_mutation() {
        let mut store = ConfigStore::new();
        let before = store.config().clone();

        let result = store.save(&json!({"general": {"backendPort": 80}}));
        assert!(result.is_err());
        assert_eq!(store.config(), &before);
    }

    #[test]
    fn test_store_save_accepts_valid_override() {
        let mut store = ConfigStore::new();
        let mut doc = AppConfig::default_value();
        doc["general"]["backendPort"] = json!(9090);

        store.save(&doc).unwrap();
        assert_eq!(store.config().general.backend_port, 9090);
        assert_eq!(store.config().general.default_model, "lama");
    }

    #[test]
    fn test_store_load_falls_back_on_unreadable() {
        let mut store = ConfigStore::new();
        // launchMode with a wrong type merges in but cannot deserialize.
        store.load_from_value(&json!({"general": {"launchMode": 42}}));
        assert_eq!(store.config(), &AppConfig::default());
    }
}
