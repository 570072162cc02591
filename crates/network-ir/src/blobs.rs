// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Name-to-tensor lookup produced by an importer.

use crate::TensorHandle;
use std::collections::HashMap;

/// Maps blob names from the source description to network tensors.
///
/// Populated once during import and read-only afterwards. When a layer
/// writes in place (its output blob has the same name as its input), the
/// name resolves to the most recently produced tensor, i.e. the value a
/// consumer of that name would observe after the layer ran.
#[derive(Debug, Clone, Default)]
pub struct BlobNameToTensor {
    map: HashMap<String, TensorHandle>,
}

impl BlobNameToTensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records (or rebinds) `name` to `tensor`.
    pub fn insert(&mut self, name: impl Into<String>, tensor: TensorHandle) {
        self.map.insert(name.into(), tensor);
    }

    /// Looks up the tensor currently bound to `name`.
    pub fn find(&self, name: &str) -> Option<TensorHandle> {
        self.map.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates the known blob names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }
}
