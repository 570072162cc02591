// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for engine building, serialization and build settings.

use std::path::PathBuf;

/// Errors raised while compiling a network into an engine.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A configuration value is out of range.
    #[error("invalid build configuration: {0}")]
    InvalidConfiguration(String),

    /// The configuration asks for something the hardware cannot do.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The network has no marked outputs.
    #[error("network '{0}' has no marked outputs")]
    NoOutputs(String),

    /// No tactic for a step fits the workspace budget.
    #[error(
        "layer '{layer}' needs at least {required} bytes of workspace for the maximum batch, \
         but the budget is {available} bytes"
    )]
    InsufficientWorkspace {
        layer: String,
        required: usize,
        available: usize,
    },

    /// The network handed to the builder is internally inconsistent.
    #[error("malformed network: {0}")]
    MalformedNetwork(String),
}

/// Errors raised while turning an engine into bytes, or bytes into a plan.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// The plan references tensors it does not define.
    #[error("inconsistent plan: {0}")]
    Inconsistent(String),

    /// The encoded plan is larger than the format allows.
    #[error("serialized plan is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// bincode could not encode or decode the payload.
    #[error("plan encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    /// The bytes are not a plan produced by this serializer.
    #[error("not a plan artifact: {0}")]
    BadHeader(String),
}

/// Errors raised while loading build settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialise error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A workspace size string could not be parsed.
    #[error("invalid workspace size '{value}': {detail}")]
    InvalidWorkspace { value: String, detail: String },

    /// A numeric setting is out of range.
    #[error("invalid value for '{key}': {detail}")]
    InvalidValue { key: &'static str, detail: String },
}
