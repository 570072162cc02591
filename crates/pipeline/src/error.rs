// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the compilation pipeline.

use crate::Stage;
use std::path::PathBuf;

/// A model descriptor that cannot describe a valid run.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("maximum batch size must be at least 1")]
    ZeroBatchSize,

    #[error("at least one output name is required")]
    NoOutputs,
}

/// A fatal failure of one compilation run.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Build settings failed validation before anything was imported.
    #[error("invalid build settings: {0}")]
    Settings(#[from] plan_builder::SettingsError),

    #[error("import failed: {0}")]
    Import(#[source] net_import::ImportError),

    /// None of the requested output names exists in the network.
    #[error("none of the requested outputs could be resolved: {}", requested.join(", "))]
    NoOutputsResolved { requested: Vec<String> },

    #[error("engine build failed: {0}")]
    Build(#[source] plan_builder::BuildError),

    #[error("engine serialization failed: {0}")]
    Serialize(#[source] plan_builder::SerializeError),
}

impl CompileError {
    /// The stage the run was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            CompileError::Settings(_) => Stage::Idle,
            CompileError::Import(_) => Stage::Importing,
            CompileError::NoOutputsResolved { .. } => Stage::Resolving,
            CompileError::Build(_) => Stage::Building,
            CompileError::Serialize(_) => Stage::Serializing,
        }
    }
}

/// Failure to write the artifact to disk.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("cannot create '{}': {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
