// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The network graph with a type-state for output marking.
//!
//! ```text
//! NetworkDefinition<Open>    — importer adds inputs and layers,
//!       │                      output resolver marks outputs.
//!       │  .seal()
//!       ▼
//! NetworkDefinition<Sealed>  — read-only, accepted by the plan builder.
//! ```
//!
//! Sealing consumes the open graph, so nothing can mark outputs (or add
//! layers) once the graph has been handed to compilation.

use crate::{DType, Dims, Layer, LayerOp, NetworkError, Tensor, TensorHandle, WeightBlob};
use std::fmt;

// ── Type-state markers ─────────────────────────────────────────────

/// Marker: graph is still being populated.
#[derive(Debug, Clone)]
pub struct Open;

/// Marker: graph is frozen and ready for compilation.
#[derive(Debug, Clone)]
pub struct Sealed;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Open {}
impl GraphState for Sealed {}

/// Everything needed to append one layer to an open network.
#[derive(Debug, Clone)]
pub struct LayerSpec {
    pub name: String,
    pub op: LayerOp,
    pub inputs: Vec<TensorHandle>,
    /// Blob name of the produced tensor.
    pub output: String,
    pub weights: Vec<WeightBlob>,
}

// ── NetworkDefinition ──────────────────────────────────────────────

/// An imported network: tensors, layers in topological order, declared
/// inputs, and the outputs the engine must produce.
#[derive(Debug, Clone)]
pub struct NetworkDefinition<S: GraphState = Open> {
    name: String,
    tensors: Vec<Tensor>,
    layers: Vec<Layer>,
    inputs: Vec<TensorHandle>,
    /// Marked outputs in marking order, without duplicates.
    outputs: Vec<TensorHandle>,
    _state: std::marker::PhantomData<S>,
}

// ── Open state ─────────────────────────────────────────────────────

impl NetworkDefinition<Open> {
    /// Creates an empty network.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tensors: Vec::new(),
            layers: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            _state: std::marker::PhantomData,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Declares a network input with per-sample `dims`.
    pub fn add_input(&mut self, name: &str, dims: Dims) -> Result<TensorHandle, NetworkError> {
        check_addressable(name, &dims)?;
        if self
            .inputs
            .iter()
            .any(|&h| self.tensors[h.0].name == name)
        {
            return Err(NetworkError::DuplicateInput(name.to_string()));
        }
        let handle = self.push_tensor(Tensor {
            name: name.to_string(),
            dims,
            dtype: DType::F32,
            producer: None,
        });
        self.inputs.push(handle);
        Ok(handle)
    }

    /// Appends a layer, inferring its output shape and checking its weights.
    ///
    /// Returns the handle of the produced tensor.
    pub fn add_layer(&mut self, spec: LayerSpec) -> Result<TensorHandle, NetworkError> {
        let LayerSpec {
            name,
            op,
            inputs,
            output,
            weights,
        } = spec;

        for &h in &inputs {
            self.check_handle(h)?;
        }
        let input_dims: Vec<&Dims> = inputs.iter().map(|h| &self.tensors[h.0].dims).collect();
        let out_dims = op.infer_output(&name, &input_dims)?;
        check_addressable(&name, &out_dims)?;

        let expected = op.weight_shapes(&input_dims);
        if expected.len() != weights.len() {
            return Err(NetworkError::WeightCount {
                layer: name,
                expected: expected.len(),
                actual: weights.len(),
            });
        }
        for (index, (want, blob)) in expected.iter().zip(&weights).enumerate() {
            if !blob.dims.matches_ignoring_leading_ones(want) {
                return Err(NetworkError::WeightShape {
                    layer: name,
                    index,
                    expected: want.clone(),
                    actual: blob.dims.clone(),
                });
            }
            if blob.dims.volume() != Some(blob.values.len()) {
                return Err(NetworkError::WeightData {
                    layer: name,
                    index,
                    dims: blob.dims.clone(),
                    values: blob.values.len(),
                });
            }
        }

        let layer_index = self.layers.len();
        let out = self.push_tensor(Tensor {
            name: output,
            dims: out_dims,
            dtype: DType::F32,
            producer: Some(layer_index),
        });
        tracing::trace!(layer = %name, op = op.kind(), output = %out, "layer added");
        self.layers.push(Layer {
            name,
            op,
            inputs,
            outputs: vec![out],
            weights,
        });
        Ok(out)
    }

    /// Marks a tensor as a required network output.
    ///
    /// Returns `true` if the tensor was newly marked and `false` if it was
    /// already an output; marking twice has no further effect.
    pub fn mark_output(&mut self, tensor: TensorHandle) -> Result<bool, NetworkError> {
        self.check_handle(tensor)?;
        if self.outputs.contains(&tensor) {
            return Ok(false);
        }
        self.outputs.push(tensor);
        Ok(true)
    }

    /// Freezes the graph. No further layers or output marks are possible.
    pub fn seal(self) -> NetworkDefinition<Sealed> {
        NetworkDefinition {
            name: self.name,
            tensors: self.tensors,
            layers: self.layers,
            inputs: self.inputs,
            outputs: self.outputs,
            _state: std::marker::PhantomData,
        }
    }

    fn push_tensor(&mut self, tensor: Tensor) -> TensorHandle {
        self.tensors.push(tensor);
        TensorHandle(self.tensors.len() - 1)
    }

    fn check_handle(&self, h: TensorHandle) -> Result<(), NetworkError> {
        if h.0 < self.tensors.len() {
            Ok(())
        } else {
            Err(NetworkError::UnknownTensor(h.0))
        }
    }
}

// ── Sealed state ───────────────────────────────────────────────────

impl NetworkDefinition<Sealed> {
    /// Returns a one-line description of the network.
    pub fn summary(&self) -> String {
        let weights: usize = self.layers.iter().map(Layer::weight_count).sum();
        format!(
            "network '{}': {} layers, {} inputs, {} outputs, {:.2} MB weights",
            self.name,
            self.layers.len(),
            self.inputs.len(),
            self.outputs.len(),
            (weights * DType::F32.size_bytes()) as f64 / (1024.0 * 1024.0),
        )
    }
}

// ── Shared accessors ───────────────────────────────────────────────

impl<S: GraphState> NetworkDefinition<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tensor behind a handle, if it belongs to this network.
    pub fn tensor(&self, h: TensorHandle) -> Option<&Tensor> {
        self.tensors.get(h.0)
    }

    pub fn num_tensors(&self) -> usize {
        self.tensors.len()
    }

    /// Iterates all tensors with their handles.
    pub fn tensors(&self) -> impl Iterator<Item = (TensorHandle, &Tensor)> {
        self.tensors
            .iter()
            .enumerate()
            .map(|(i, t)| (TensorHandle(i), t))
    }

    /// Layers in topological (insertion) order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn inputs(&self) -> &[TensorHandle] {
        &self.inputs
    }

    /// Marked outputs in the order they were marked.
    pub fn outputs(&self) -> &[TensorHandle] {
        &self.outputs
    }

    pub fn is_output(&self, h: TensorHandle) -> bool {
        self.outputs.contains(&h)
    }

    /// Indices of layers that read `h`.
    pub fn consumers(&self, h: TensorHandle) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.inputs.contains(&h))
            .map(|(i, _)| i)
            .collect()
    }
}

impl<S: GraphState> fmt::Display for NetworkDefinition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NetworkDefinition '{}' ({} layers):", self.name, self.layers.len())?;
        for &h in &self.inputs {
            let t = &self.tensors[h.0];
            writeln!(f, "  input {} '{}' {}", h, t.name, t.dims)?;
        }
        for (i, layer) in self.layers.iter().enumerate() {
            let out = &self.tensors[layer.outputs[0].0];
            writeln!(
                f,
                "  [{i}] {} ({}) -> '{}' {}",
                layer.name,
                layer.op.kind(),
                out.name,
                out.dims,
            )?;
        }
        Ok(())
    }
}

/// Rejects tensors whose single-sample byte size overflows `usize`.
fn check_addressable(name: &str, dims: &Dims) -> Result<(), NetworkError> {
    match dims.size_bytes(DType::F32) {
        Some(_) => Ok(()),
        None => Err(NetworkError::InvalidShape {
            layer: name.to_string(),
            detail: format!("{dims} is too large to address"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Activation, ConvolutionParams, Window};

    fn conv_spec(input: TensorHandle, out_c: usize, in_c: usize) -> LayerSpec {
        LayerSpec {
            name: "conv1".into(),
            op: LayerOp::Convolution(ConvolutionParams {
                num_output: out_c,
                window: Window::square(3, 1, 1),
                group: 1,
                bias: true,
            }),
            inputs: vec![input],
            output: "conv1".into(),
            weights: vec![
                WeightBlob::new(
                    Dims::new(vec![out_c, in_c, 3, 3]),
                    vec![0.5; out_c * in_c * 9],
                ),
                WeightBlob::new(Dims::new(vec![out_c]), vec![0.0; out_c]),
            ],
        }
    }

    fn small_net() -> (NetworkDefinition<Open>, TensorHandle, TensorHandle) {
        let mut net = NetworkDefinition::new("small");
        let data = net.add_input("data", Dims::chw(3, 8, 8)).unwrap();
        let conv = net.add_layer(conv_spec(data, 4, 3)).unwrap();
        let relu = net
            .add_layer(LayerSpec {
                name: "relu1".into(),
                op: LayerOp::Activation(Activation::Relu {
                    negative_slope: 0.0,
                }),
                inputs: vec![conv],
                output: "conv1".into(),
                weights: vec![],
            })
            .unwrap();
        (net, conv, relu)
    }

    #[test]
    fn test_add_layer_infers_dims() {
        let (net, conv, relu) = small_net();
        assert_eq!(net.tensor(conv).unwrap().dims, Dims::chw(4, 8, 8));
        assert_eq!(net.tensor(relu).unwrap().producer, Some(1));
        assert_eq!(net.num_layers(), 2);
        assert_eq!(net.consumers(conv), vec![1]);
    }

    #[test]
    fn test_duplicate_input() {
        let mut net = NetworkDefinition::new("dup");
        net.add_input("data", Dims::chw(1, 1, 1)).unwrap();
        assert!(matches!(
            net.add_input("data", Dims::chw(1, 1, 1)),
            Err(NetworkError::DuplicateInput(_))
        ));
    }

    #[test]
    fn test_weight_count_checked() {
        let mut net = NetworkDefinition::new("w");
        let data = net.add_input("data", Dims::chw(3, 8, 8)).unwrap();
        let mut spec = conv_spec(data, 4, 3);
        spec.weights.pop();
        assert!(matches!(
            net.add_layer(spec),
            Err(NetworkError::WeightCount {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_weight_shape_checked() {
        let mut net = NetworkDefinition::new("w");
        let data = net.add_input("data", Dims::chw(3, 8, 8)).unwrap();
        let mut spec = conv_spec(data, 4, 3);
        spec.weights[0] = WeightBlob::new(Dims::new(vec![4, 3, 5, 5]), vec![0.0; 4 * 3 * 25]);
        assert!(matches!(
            net.add_layer(spec),
            Err(NetworkError::WeightShape { index: 0, .. })
        ));
    }

    #[test]
    fn test_weight_data_checked() {
        let mut net = NetworkDefinition::new("w");
        let data = net.add_input("data", Dims::chw(3, 8, 8)).unwrap();
        let mut spec = conv_spec(data, 4, 3);
        spec.weights[1].values.pop();
        assert!(matches!(
            net.add_layer(spec),
            Err(NetworkError::WeightData { index: 1, .. })
        ));
    }

    #[test]
    fn test_mark_output_idempotent() {
        let (mut net, _, relu) = small_net();
        assert!(net.mark_output(relu).unwrap());
        assert!(!net.mark_output(relu).unwrap());
        assert_eq!(net.outputs(), &[relu]);
    }

    #[test]
    fn test_mark_output_unknown_handle() {
        let (mut net, _, _) = small_net();
        assert!(matches!(
            net.mark_output(TensorHandle(99)),
            Err(NetworkError::UnknownTensor(99))
        ));
    }

    #[test]
    fn test_seal_keeps_outputs() {
        let (mut net, conv, relu) = small_net();
        net.mark_output(relu).unwrap();
        net.mark_output(conv).unwrap();
        let sealed = net.seal();
        assert_eq!(sealed.outputs(), &[relu, conv]);
        assert!(sealed.is_output(conv));
        assert!(sealed.summary().contains("2 layers"));
    }

    #[test]
    fn test_display() {
        let (net, _, _) = small_net();
        let text = net.to_string();
        assert!(text.contains("input %0 'data' [3, 8, 8]"));
        assert!(text.contains("relu1 (relu)"));
    }
}
