// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Engine serialization.
//!
//! Artifact layout:
//!
//! ```text
//! offset  size  content
//! 0       8     magic b"NN2PLAN\0"
//! 8       4     format version, little-endian u32
//! 12      ..    bincode-encoded EnginePlan
//! ```

use crate::{Engine, EnginePlan, SerializeError};
use std::ops::Deref;

/// Leading bytes of every plan artifact.
pub const PLAN_MAGIC: &[u8; 8] = b"NN2PLAN\0";

/// Current artifact format version.
pub const PLAN_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = PLAN_MAGIC.len() + 4;

/// Largest artifact the format accepts: 2 GiB.
pub const MAX_PLAN_BYTES: u64 = 2 << 30;

/// Serialized engine bytes, owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMemory {
    bytes: Vec<u8>,
}

impl HostMemory {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl Deref for HostMemory {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Turns an engine into bytes.
pub trait EngineSerializer {
    fn serialize(&self, engine: &Engine<'_>) -> Result<HostMemory, SerializeError>;
}

/// The built-in plan format.
#[derive(Debug, Clone)]
pub struct PlanSerializer {
    limit: u64,
}

impl PlanSerializer {
    pub fn new() -> Self {
        Self {
            limit: MAX_PLAN_BYTES,
        }
    }

    /// A serializer with a smaller size limit.
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit: limit.min(MAX_PLAN_BYTES),
        }
    }
}

impl Default for PlanSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSerializer for PlanSerializer {
    fn serialize(&self, engine: &Engine<'_>) -> Result<HostMemory, SerializeError> {
        let plan = engine.plan();
        if let Some(problem) = plan.find_inconsistency() {
            return Err(SerializeError::Inconsistent(problem));
        }

        let size = HEADER_LEN as u64 + bincode::serialized_size(plan)?;
        if size > self.limit {
            return Err(SerializeError::TooLarge {
                size,
                limit: self.limit,
            });
        }

        let mut bytes = Vec::with_capacity(size as usize);
        bytes.extend_from_slice(PLAN_MAGIC);
        bytes.extend_from_slice(&PLAN_FORMAT_VERSION.to_le_bytes());
        bincode::serialize_into(&mut bytes, plan)?;
        tracing::debug!(bytes = bytes.len(), "engine serialized");
        Ok(HostMemory::new(bytes))
    }
}

impl EnginePlan {
    /// Decodes an artifact produced by [`PlanSerializer`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializeError> {
        if bytes.len() < HEADER_LEN || &bytes[..PLAN_MAGIC.len()] != PLAN_MAGIC {
            return Err(SerializeError::BadHeader("missing NN2PLAN magic".into()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[PLAN_MAGIC.len()..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != PLAN_FORMAT_VERSION {
            return Err(SerializeError::BadHeader(format!(
                "format version {version}, expected {PLAN_FORMAT_VERSION}"
            )));
        }
        let plan: EnginePlan = bincode::deserialize(&bytes[HEADER_LEN..])?;
        if let Some(problem) = plan.find_inconsistency() {
            return Err(SerializeError::Inconsistent(problem));
        }
        Ok(plan)
    }
}
