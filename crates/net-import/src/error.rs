// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for network import.

use std::path::PathBuf;

/// Errors that can occur while importing a network description and its weights.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// A description or weights file could not be opened or read.
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text description is not well-formed.
    #[error("syntax error on line {line}: {detail}")]
    Syntax { line: usize, detail: String },

    /// A field is present but holds a value of the wrong kind.
    #[error("invalid value for field '{field}': {detail}")]
    Field { field: String, detail: String },

    /// The binary weights file is not a valid `NetParameter`.
    #[error("malformed weights data: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A weight blob decoded but its shape is unusable.
    #[error("invalid blob in layer '{layer}': {detail}")]
    Blob { layer: String, detail: String },

    /// The description declares no network input.
    #[error("network declares no inputs")]
    NoInputs,

    /// The layer type has no equivalent in the network IR.
    #[error("layer '{layer}' has unsupported type '{kind}'")]
    UnsupportedLayer { layer: String, kind: String },

    /// The layer type is supported but this parameter combination is not.
    #[error("layer '{layer}': unsupported parameter: {detail}")]
    UnsupportedParameter { layer: String, detail: String },

    /// A layer reads a blob that no earlier layer or input produced.
    #[error("layer '{layer}' reads unknown blob '{blob}'")]
    UnknownBlob { layer: String, blob: String },

    /// A layer that needs trained parameters has none in the weights file.
    #[error("no weights found for layer '{layer}'")]
    MissingWeights { layer: String },

    /// The network IR rejected the layer (shape or weight mismatch).
    #[error("layer '{layer}' rejected: {source}")]
    Layer {
        layer: String,
        #[source]
        source: network_ir::NetworkError,
    },

    /// The source format is recognised but has no importer yet.
    #[error("{0} import is not implemented")]
    Unimplemented(crate::SourceFormat),
}
