// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensors as they appear in a network graph.

use crate::{DType, Dims};
use std::fmt;

/// Opaque reference to a tensor inside one [`crate::NetworkDefinition`].
///
/// Handles are only meaningful for the network that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorHandle(pub(crate) usize);

impl TensorHandle {
    /// Position of the tensor in the network's tensor table.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A value flowing between layers.
#[derive(Debug, Clone)]
pub struct Tensor {
    /// Blob name from the source description. Several tensors may share a
    /// name when a layer writes its result in place.
    pub name: String,
    /// Per-sample dimensions.
    pub dims: Dims,
    pub dtype: DType,
    /// Index of the producing layer; `None` for network inputs.
    pub producer: Option<usize>,
}

impl Tensor {
    /// Returns `true` if the tensor is fed from outside the network.
    pub fn is_network_input(&self) -> bool {
        self.producer.is_none()
    }
}
