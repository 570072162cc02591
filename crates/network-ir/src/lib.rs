// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # network-ir
//!
//! In-memory representation of an imported neural network, prior to
//! compilation into an execution plan.
//!
//! - [`NetworkDefinition`] — tensors, layers in topological order, inputs and
//!   marked outputs, with a **type-state** (`Open` → `Sealed`) that freezes the
//!   graph before it reaches the plan builder.
//! - [`LayerOp`] — supported layer operations, each with its own shape and
//!   weight rules.
//! - [`BlobNameToTensor`] — the importer's name lookup, used to resolve the
//!   output names a caller asks for.
//! - [`Dims`] and [`DType`] — per-sample shapes (implicit batch) and element
//!   types.
//!
//! # Example
//! ```
//! use network_ir::{Activation, Dims, LayerOp, LayerSpec, NetworkDefinition};
//!
//! let mut net = NetworkDefinition::new("tiny");
//! let data = net.add_input("data", Dims::chw(3, 4, 4)).unwrap();
//! let out = net
//!     .add_layer(LayerSpec {
//!         name: "act".into(),
//!         op: LayerOp::Activation(Activation::Sigmoid),
//!         inputs: vec![data],
//!         output: "act".into(),
//!         weights: vec![],
//!     })
//!     .unwrap();
//! net.mark_output(out).unwrap();
//! let sealed = net.seal();
//! assert_eq!(sealed.outputs().len(), 1);
//! ```

mod blobs;
mod dims;
mod dtype;
mod error;
pub mod graph;
mod layer;
mod tensor;

pub use blobs::BlobNameToTensor;
pub use dims::Dims;
pub use dtype::DType;
pub use error::NetworkError;
pub use graph::{LayerSpec, NetworkDefinition, Open, Sealed};
pub use layer::{
    Activation, ConvolutionParams, EltwiseOp, Layer, LayerOp, LrnParams, PoolKind, PoolingParams,
    WeightBlob, Window,
};
pub use tensor::{Tensor, TensorHandle};
