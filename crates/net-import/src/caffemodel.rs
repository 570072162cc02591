// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Trained weights from a binary `.caffemodel` file.
//!
//! The file is a serialized `NetParameter`; see [`crate::proto`] for the
//! decoded subset. Both the current `layer` list and the legacy `layers`
//! list are read. Blob shapes come from `shape` when present and from the
//! legacy `num`/`channels`/`height`/`width` fields otherwise; values come
//! from `data` or, failing that, `double_data`.

use crate::proto::{BlobProto, NetParameter};
use crate::ImportError;
use network_ir::{Dims, WeightBlob};
use prost::Message;
use std::collections::HashMap;
use std::path::Path;

/// Parameter blobs of every layer in a weights file, keyed by layer name.
#[derive(Debug, Default)]
pub struct CaffeWeights {
    layers: HashMap<String, Vec<WeightBlob>>,
}

impl CaffeWeights {
    /// Memory-maps and decodes a weights file.
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        let read_err = |source| ImportError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = std::fs::File::open(path).map_err(read_err)?;
        let len = file.metadata().map_err(read_err)?.len();
        if len == 0 {
            tracing::warn!(path = %path.display(), "weights file is empty");
            return Ok(Self::default());
        }

        // SAFETY: the map is read-only and dropped before this function
        // returns; decoded values are copied out.
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(read_err)?;
        tracing::debug!(
            "caffemodel: mmap'd {} ({:.2} MB)",
            path.display(),
            mmap.len() as f64 / (1024.0 * 1024.0)
        );
        Self::from_bytes(&mmap[..])
    }

    /// Decodes an in-memory `NetParameter`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImportError> {
        let net = NetParameter::decode(bytes)?;
        let current = net.layer.into_iter().map(|l| (l.name, l.blobs));
        let legacy = net.layers.into_iter().map(|l| (l.name, l.blobs));

        let mut layers = HashMap::new();
        for (name, blobs) in current.chain(legacy) {
            if blobs.is_empty() {
                continue;
            }
            let name = name.unwrap_or_default();
            let blobs = blobs
                .into_iter()
                .map(|b| to_weight_blob(&name, b))
                .collect::<Result<Vec<_>, _>>()?;
            tracing::trace!(layer = %name, blobs = blobs.len(), "weights decoded");
            layers.insert(name, blobs);
        }
        Ok(Self { layers })
    }

    /// Removes and returns the blobs of `layer`.
    pub fn take(&mut self, layer: &str) -> Option<Vec<WeightBlob>> {
        self.layers.remove(layer)
    }

    pub fn get(&self, layer: &str) -> Option<&[WeightBlob]> {
        self.layers.get(layer).map(Vec::as_slice)
    }

    /// Number of layers that carry at least one blob.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

fn to_weight_blob(layer: &str, blob: BlobProto) -> Result<WeightBlob, ImportError> {
    let dim = |v: i64| {
        usize::try_from(v).map_err(|_| ImportError::Blob {
            layer: layer.to_string(),
            detail: format!("dimension {v} is negative"),
        })
    };
    let legacy = [blob.num, blob.channels, blob.height, blob.width];
    let values = if blob.data.is_empty() {
        blob.double_data.iter().map(|&v| v as f32).collect()
    } else {
        blob.data
    };

    let dims = match blob.shape {
        Some(shape) => shape.dim.into_iter().map(dim).collect::<Result<Vec<_>, _>>()?,
        None if legacy.iter().any(Option::is_some) => legacy
            .iter()
            .map(|d| dim(i64::from(d.unwrap_or(1))))
            .collect::<Result<Vec<_>, _>>()?,
        // No shape at all: treat the data as a flat vector.
        None => vec![values.len()],
    };
    Ok(WeightBlob::new(Dims::new(dims), values))
}

/// Builders for weights files in tests.
#[cfg(test)]
pub(crate) mod fixture {
    use super::*;
    use crate::proto::{BlobShape, LayerParameter};

    /// A `BlobProto` with a `shape` message.
    pub fn blob(dims: &[usize], values: &[f32]) -> BlobProto {
        BlobProto {
            shape: Some(BlobShape {
                dim: dims.iter().map(|&d| d as i64).collect(),
            }),
            data: values.to_vec(),
            ..Default::default()
        }
    }

    /// Appends one encoded `layer` entry to a serialized `NetParameter`.
    pub fn layer(net: &mut Vec<u8>, name: &str, blobs: &[BlobProto]) {
        let entry = NetParameter {
            layer: vec![LayerParameter {
                name: Some(name.to_string()),
                r#type: Some("Convolution".into()),
                blobs: blobs.to_vec(),
            }],
            ..Default::default()
        };
        net.extend(entry.encode_to_vec());
    }
}
