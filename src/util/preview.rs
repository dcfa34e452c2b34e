// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Registry of preview display references.
//!
//! Display references created for previews are browser/OS-level
//! resources that must be released when their owning record is removed
//! or the store is cleared. The registry tracks every created reference
//! per owner and runs a pluggable release hook when they are dropped.

use std::collections::HashMap;

/// Callback invoked with each reference as it is released.
pub type ReleaseHook = Box<dyn Fn(&str) + Send>;

/// Tracks created preview references by owner id.
#[derive(Default)]
pub struct PreviewRegistry {
    refs: HashMap<String, Vec<String>>,
    release_hook: Option<ReleaseHook>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the hook that actually revokes a released reference.
    pub fn set_release_hook(&mut self, hook: ReleaseHook) {
        self.release_hook = Some(hook);
    }

    /// Record a reference created on behalf of `owner`.
    pub fn register(&mut self, owner: &str, reference: impl Into<String>) {
        let reference = reference.into();
        let entries = self.refs.entry(owner.to_string()).or_default();
        if !entries.contains(&reference) {
            entries.push(reference);
        }
    }

    /// Release every reference owned by `owner`. Returns the count released.
    pub fn release_for(&mut self, owner: &str) -> usize {
        match self.refs.remove(owner) {
            Some(entries) => {
                for reference in &entries {
                    self.release(reference);
                }
                entries.len()
            }
            None => 0,
        }
    }

    /// Release every tracked reference. Returns the count released.
    pub fn release_all(&mut self) -> usize {
        let owners: Vec<String> = self.refs.keys().cloned().collect();
        let mut released = 0;
        for owner in owners {
            released += self.release_for(&owner);
        }
        released
    }

    /// Number of tracked references across all owners.
    pub fn len(&self) -> usize {
        self.refs.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, reference: &str) {
        if let Some(hook) = &self.release_hook {
            hook(reference);
        }
        log::debug!("Released preview reference {}", reference);
    }
}
