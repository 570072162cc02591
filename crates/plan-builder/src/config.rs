// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-build compilation configuration.

use crate::{BuildSettings, PrecisionMode, SettingsError, WorkspaceBudget};

/// Default workspace budget: 16 MiB.
pub const DEFAULT_WORKSPACE_BYTES: usize = 16 << 20;

/// Default minimum timing iterations per tactic.
pub const DEFAULT_MIN_FIND_ITERATIONS: u32 = 3;

/// Default averaged timing iterations per tactic.
pub const DEFAULT_AVG_FIND_ITERATIONS: u32 = 2;

/// Everything the compiler needs besides the network. Fixed for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub max_batch_size: usize,
    pub workspace: WorkspaceBudget,
    pub precision: PrecisionMode,
    pub min_find_iterations: u32,
    pub avg_find_iterations: u32,
    pub debug_sync: bool,
}

impl BuildConfig {
    /// Configuration with the default workspace and iteration hints.
    pub fn new(max_batch_size: usize, precision: PrecisionMode) -> Self {
        Self {
            max_batch_size,
            workspace: WorkspaceBudget::from_bytes(DEFAULT_WORKSPACE_BYTES),
            precision,
            min_find_iterations: DEFAULT_MIN_FIND_ITERATIONS,
            avg_find_iterations: DEFAULT_AVG_FIND_ITERATIONS,
            debug_sync: false,
        }
    }

    /// Configuration taking budget, hints and debug flag from `settings`.
    pub fn from_settings(
        settings: &BuildSettings,
        max_batch_size: usize,
        precision: PrecisionMode,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            max_batch_size,
            workspace: settings.workspace_budget()?,
            precision,
            min_find_iterations: settings.min_find_iterations,
            avg_find_iterations: settings.avg_find_iterations,
            debug_sync: settings.debug_sync,
        })
    }

    pub fn with_workspace(mut self, workspace: WorkspaceBudget) -> Self {
        self.workspace = workspace;
        self
    }
}
