// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O operations for media payloads and persisted state.

pub mod media;
pub mod persistence;
pub mod serialization;
