// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! What to compile.

use crate::DescriptorError;
use std::path::{Path, PathBuf};

/// The inputs of one compilation run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    description: PathBuf,
    weights: PathBuf,
    max_batch_size: usize,
    outputs: Vec<String>,
}

impl ModelDescriptor {
    /// Validates and builds a descriptor. Duplicate output names are kept;
    /// they resolve to the same tensor.
    pub fn new(
        description: impl Into<PathBuf>,
        weights: impl Into<PathBuf>,
        max_batch_size: usize,
        outputs: Vec<String>,
    ) -> Result<Self, DescriptorError> {
        if max_batch_size == 0 {
            return Err(DescriptorError::ZeroBatchSize);
        }
        if outputs.is_empty() {
            return Err(DescriptorError::NoOutputs);
        }
        Ok(Self {
            description: description.into(),
            weights: weights.into(),
            max_batch_size,
            outputs,
        })
    }

    /// Path of the structural description (e.g. a `.prototxt`).
    pub fn description(&self) -> &Path {
        &self.description
    }

    /// Path of the trained weights (e.g. a `.caffemodel`).
    pub fn weights(&self) -> &Path {
        &self.weights
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Requested output names, in request order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }
}
