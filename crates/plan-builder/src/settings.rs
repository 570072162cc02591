// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Build settings loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! workspace = "16M"
//! min_find_iterations = 3
//! avg_find_iterations = 2
//! allow_reduced_precision = true
//! debug_sync = false
//! ```
//!
//! Every key is optional.

use crate::{SettingsError, WorkspaceBudget};
use std::path::Path;

/// User-tunable knobs for engine building.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    /// Workspace budget (human-readable, e.g. `"16M"`).
    pub workspace: String,
    /// Minimum timing iterations per tactic candidate.
    pub min_find_iterations: u32,
    /// Averaged timing iterations per tactic candidate.
    pub avg_find_iterations: u32,
    /// Build in half precision when the hardware supports it.
    pub allow_reduced_precision: bool,
    /// Synchronise after every step at run time.
    pub debug_sync: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            workspace: "16M".to_string(),
            min_find_iterations: 3,
            avg_find_iterations: 2,
            allow_reduced_precision: true,
            debug_sync: false,
        }
    }
}

impl BuildSettings {
    /// Loads settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates settings from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(toml_str)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every value without building anything.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.workspace_budget()?;
        if self.min_find_iterations == 0 {
            return Err(SettingsError::InvalidValue {
                key: "min_find_iterations",
                detail: "must be at least 1".into(),
            });
        }
        if self.avg_find_iterations == 0 {
            return Err(SettingsError::InvalidValue {
                key: "avg_find_iterations",
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn workspace_budget(&self) -> Result<WorkspaceBudget, SettingsError> {
        WorkspaceBudget::parse(&self.workspace)
    }
}
