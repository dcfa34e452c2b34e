// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application stores: plain owned state behind explicit operations.
//!
//! External components interact with the collections only through the
//! store methods, never by reaching into them directly.

pub mod app_state;
pub mod file_manager;
pub mod video_mask;

use thiserror::Error;

/// Errors reported by store mutators.
///
/// Stores prefer explicit failure results over panics so callers can
/// render inline feedback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The operation received arguments it cannot act on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced file, keyframe, or video is unknown.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
