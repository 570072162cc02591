// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for network graph construction.

use crate::Dims;

/// Errors raised while building or editing a [`crate::NetworkDefinition`].
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// A tensor handle does not belong to this network.
    #[error("tensor handle {0} is out of range")]
    UnknownTensor(usize),

    /// A network input with the same name was already declared.
    #[error("duplicate network input '{0}'")]
    DuplicateInput(String),

    /// The layer received the wrong number of input tensors.
    #[error("layer '{layer}' expects {expected} input(s), got {actual}")]
    InputArity {
        layer: String,
        expected: &'static str,
        actual: usize,
    },

    /// The layer declares a different number of output names than it produces.
    #[error("layer '{layer}' produces {expected} output(s), {actual} named")]
    OutputArity {
        layer: String,
        expected: usize,
        actual: usize,
    },

    /// The input shape cannot be processed by the layer.
    #[error("invalid shape for layer '{layer}': {detail}")]
    InvalidShape { layer: String, detail: String },

    /// A layer parameter is out of range or unsupported.
    #[error("invalid parameter for layer '{layer}': {detail}")]
    InvalidParameter { layer: String, detail: String },

    /// The layer was given a different number of weight blobs than it needs.
    #[error("layer '{layer}' expects {expected} weight blob(s), got {actual}")]
    WeightCount {
        layer: String,
        expected: usize,
        actual: usize,
    },

    /// A weight blob's shape disagrees with the layer definition.
    #[error("weight blob {index} of layer '{layer}' has shape {actual}, expected {expected}")]
    WeightShape {
        layer: String,
        index: usize,
        expected: Dims,
        actual: Dims,
    },

    /// A weight blob's element count disagrees with its declared shape.
    #[error("weight blob {index} of layer '{layer}' holds {values} values for shape {dims}")]
    WeightData {
        layer: String,
        index: usize,
        dims: Dims,
        values: usize,
    },
}
