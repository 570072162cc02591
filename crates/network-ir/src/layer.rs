// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer operations, their parameters, and per-op shape rules.
//!
//! Each [`LayerOp`] knows how to derive its output dims from its input dims
//! and which weight blobs it expects. The graph uses both when a layer is
//! added, so an importer cannot produce a layer whose shapes or weights are
//! inconsistent.

use crate::{Dims, NetworkError, TensorHandle};

/// Pooling reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolKind {
    Max,
    Average,
}

/// Element-wise activation function.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Rectified linear unit; a non-zero slope gives a leaky ReLU.
    Relu { negative_slope: f32 },
    Sigmoid,
    Tanh,
}

/// Element-wise combination of two or more inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EltwiseOp {
    Sum,
    Prod,
    Max,
}

/// A 2-D window: kernel, stride, padding and dilation per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Window {
    pub kernel: (usize, usize),
    pub stride: (usize, usize),
    pub pad: (usize, usize),
    pub dilation: (usize, usize),
}

impl Window {
    /// Square window with unit dilation.
    pub fn square(kernel: usize, stride: usize, pad: usize) -> Self {
        Self {
            kernel: (kernel, kernel),
            stride: (stride, stride),
            pad: (pad, pad),
            dilation: (1, 1),
        }
    }

    /// Kernel extent once dilation is applied; `None` for a zero kernel or
    /// on overflow.
    pub fn effective_kernel(&self) -> Option<(usize, usize)> {
        let extent = |dilation: usize, kernel: usize| {
            dilation.checked_mul(kernel.checked_sub(1)?)?.checked_add(1)
        };
        Some((
            extent(self.dilation.0, self.kernel.0)?,
            extent(self.dilation.1, self.kernel.1)?,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConvolutionParams {
    pub num_output: usize,
    pub window: Window,
    pub group: usize,
    pub bias: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolingParams {
    pub kind: PoolKind,
    pub window: Window,
    /// Pool over the whole spatial extent; `window.kernel` is ignored.
    pub global: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LrnParams {
    pub local_size: usize,
    pub alpha: f32,
    pub beta: f32,
    pub k: f32,
}

/// The computation a layer performs.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerOp {
    Convolution(ConvolutionParams),
    Pooling(PoolingParams),
    InnerProduct { num_output: usize, bias: bool },
    Activation(Activation),
    Softmax,
    Lrn(LrnParams),
    /// Concatenation along the channel dimension.
    Concat,
    Eltwise(EltwiseOp),
    Dropout { ratio: f32 },
    BatchNorm { eps: f32 },
    Scale { bias: bool },
    Flatten,
}

impl LayerOp {
    /// Short label used in summaries and plan dumps.
    pub fn kind(&self) -> &'static str {
        match self {
            LayerOp::Convolution(_) => "convolution",
            LayerOp::Pooling(_) => "pooling",
            LayerOp::InnerProduct { .. } => "inner_product",
            LayerOp::Activation(Activation::Relu { .. }) => "relu",
            LayerOp::Activation(Activation::Sigmoid) => "sigmoid",
            LayerOp::Activation(Activation::Tanh) => "tanh",
            LayerOp::Softmax => "softmax",
            LayerOp::Lrn(_) => "lrn",
            LayerOp::Concat => "concat",
            LayerOp::Eltwise(_) => "eltwise",
            LayerOp::Dropout { .. } => "dropout",
            LayerOp::BatchNorm { .. } => "batch_norm",
            LayerOp::Scale { .. } => "scale",
            LayerOp::Flatten => "flatten",
        }
    }

    /// Derives the output dims for the given inputs.
    ///
    /// Every supported op produces exactly one output tensor.
    pub fn infer_output(&self, layer: &str, inputs: &[&Dims]) -> Result<Dims, NetworkError> {
        match self {
            LayerOp::Concat => {
                require_inputs(layer, inputs, 1, "at least 1")?;
                concat_output(layer, inputs)
            }
            LayerOp::Eltwise(_) => {
                require_inputs(layer, inputs, 2, "at least 2")?;
                let first = inputs[0];
                if let Some(other) = inputs.iter().find(|d| **d != first) {
                    return Err(NetworkError::InvalidShape {
                        layer: layer.to_string(),
                        detail: format!("eltwise inputs differ: {first} vs {other}"),
                    });
                }
                Ok(first.clone())
            }
            _ => {
                if inputs.len() != 1 {
                    return Err(NetworkError::InputArity {
                        layer: layer.to_string(),
                        expected: "exactly 1",
                        actual: inputs.len(),
                    });
                }
                self.infer_unary(layer, inputs[0])
            }
        }
    }

    fn infer_unary(&self, layer: &str, input: &Dims) -> Result<Dims, NetworkError> {
        match self {
            LayerOp::Convolution(p) => {
                let (c, h, w) = feature_map(layer, input)?;
                if p.num_output == 0 || p.group == 0 {
                    return Err(invalid_param(layer, "num_output and group must be positive"));
                }
                if c % p.group != 0 || p.num_output % p.group != 0 {
                    return Err(invalid_param(
                        layer,
                        format!(
                            "group {} must divide input channels {c} and num_output {}",
                            p.group, p.num_output
                        ),
                    ));
                }
                let (oh, ow) = conv_spatial(layer, &p.window, h, w)?;
                Ok(Dims::chw(p.num_output, oh, ow))
            }
            LayerOp::Pooling(p) => {
                let (c, h, w) = feature_map(layer, input)?;
                if p.global {
                    return Ok(Dims::chw(c, 1, 1));
                }
                let (oh, ow) = pool_spatial(layer, &p.window, h, w)?;
                Ok(Dims::chw(c, oh, ow))
            }
            LayerOp::InnerProduct { num_output, .. } => {
                if *num_output == 0 {
                    return Err(invalid_param(layer, "num_output must be positive"));
                }
                Ok(Dims::chw(*num_output, 1, 1))
            }
            LayerOp::Flatten => input
                .volume()
                .map(|n| Dims::new(vec![n]))
                .ok_or_else(|| too_large(layer, input)),
            LayerOp::Lrn(p) => {
                if p.local_size == 0 || p.local_size % 2 == 0 {
                    return Err(invalid_param(layer, "local_size must be odd"));
                }
                Ok(input.clone())
            }
            LayerOp::Activation(_)
            | LayerOp::Softmax
            | LayerOp::Dropout { .. }
            | LayerOp::BatchNorm { .. }
            | LayerOp::Scale { .. } => Ok(input.clone()),
            LayerOp::Concat | LayerOp::Eltwise(_) => unreachable!("multi-input ops handled above"),
        }
    }

    /// Shapes of the weight blobs this op expects, in blob order.
    pub fn weight_shapes(&self, inputs: &[&Dims]) -> Vec<Dims> {
        let input = inputs.first().map(|d| (*d).clone()).unwrap_or_else(|| Dims::new(vec![]));
        match self {
            LayerOp::Convolution(p) => {
                let per_group = input.channels() / p.group.max(1);
                let (kh, kw) = p.window.kernel;
                let mut shapes = vec![Dims::new(vec![p.num_output, per_group, kh, kw])];
                if p.bias {
                    shapes.push(Dims::new(vec![p.num_output]));
                }
                shapes
            }
            LayerOp::InnerProduct { num_output, bias } => {
                let mut shapes = vec![Dims::new(vec![*num_output, input.volume().unwrap_or(usize::MAX)])];
                if *bias {
                    shapes.push(Dims::new(vec![*num_output]));
                }
                shapes
            }
            LayerOp::BatchNorm { .. } => {
                let c = input.channels();
                vec![Dims::new(vec![c]), Dims::new(vec![c]), Dims::new(vec![1])]
            }
            LayerOp::Scale { bias } => {
                let c = input.channels();
                let mut shapes = vec![Dims::new(vec![c])];
                if *bias {
                    shapes.push(Dims::new(vec![c]));
                }
                shapes
            }
            _ => Vec::new(),
        }
    }

    /// Returns `true` if the op carries trained weights.
    pub fn has_weights(&self) -> bool {
        matches!(
            self,
            LayerOp::Convolution(_)
                | LayerOp::InnerProduct { .. }
                | LayerOp::BatchNorm { .. }
                | LayerOp::Scale { .. }
        )
    }
}

/// A trained parameter blob (row-major `f32` values).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WeightBlob {
    pub dims: Dims,
    pub values: Vec<f32>,
}

impl WeightBlob {
    pub fn new(dims: Dims, values: Vec<f32>) -> Self {
        Self { dims, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A layer as stored in the network.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Unique name from the source description.
    pub name: String,
    pub op: LayerOp,
    pub inputs: Vec<TensorHandle>,
    pub outputs: Vec<TensorHandle>,
    pub weights: Vec<WeightBlob>,
}

impl Layer {
    /// Total number of weight values across all blobs.
    pub fn weight_count(&self) -> usize {
        self.weights.iter().map(WeightBlob::len).sum()
    }
}

fn require_inputs(
    layer: &str,
    inputs: &[&Dims],
    min: usize,
    expected: &'static str,
) -> Result<(), NetworkError> {
    if inputs.len() < min {
        return Err(NetworkError::InputArity {
            layer: layer.to_string(),
            expected,
            actual: inputs.len(),
        });
    }
    Ok(())
}

fn invalid_param(layer: &str, detail: impl Into<String>) -> NetworkError {
    NetworkError::InvalidParameter {
        layer: layer.to_string(),
        detail: detail.into(),
    }
}

fn feature_map(layer: &str, input: &Dims) -> Result<(usize, usize, usize), NetworkError> {
    match input.as_slice() {
        [c, h, w] => Ok((*c, *h, *w)),
        _ => Err(NetworkError::InvalidShape {
            layer: layer.to_string(),
            detail: format!("expected a [C, H, W] feature map, got {input}"),
        }),
    }
}

fn check_window(layer: &str, window: &Window) -> Result<(), NetworkError> {
    let Window {
        kernel,
        stride,
        dilation,
        ..
    } = window;
    if kernel.0 == 0 || kernel.1 == 0 || stride.0 == 0 || stride.1 == 0 {
        return Err(invalid_param(layer, "kernel and stride must be positive"));
    }
    if dilation.0 == 0 || dilation.1 == 0 {
        return Err(invalid_param(layer, "dilation must be positive"));
    }
    Ok(())
}

/// Convolution output extent: `(in + 2·pad − dilated_kernel) / stride + 1`, floored.
fn conv_spatial(
    layer: &str,
    window: &Window,
    h: usize,
    w: usize,
) -> Result<(usize, usize), NetworkError> {
    check_window(layer, window)?;
    let (ekh, ekw) = window
        .effective_kernel()
        .ok_or_else(|| invalid_param(layer, "dilated kernel extent overflows"))?;
    let axis = |input: usize, pad: usize, k: usize, stride: usize| {
        let padded = padded_extent(layer, input, pad)?;
        if padded < k {
            Err(NetworkError::InvalidShape {
                layer: layer.to_string(),
                detail: format!("kernel extent {k} exceeds padded input {padded}"),
            })
        } else {
            Ok((padded - k) / stride + 1)
        }
    };
    Ok((
        axis(h, window.pad.0, ekh, window.stride.0)?,
        axis(w, window.pad.1, ekw, window.stride.1)?,
    ))
}

/// Pooling output extent with ceil rounding; the last window must start
/// inside the (left-padded) input.
fn pool_spatial(
    layer: &str,
    window: &Window,
    h: usize,
    w: usize,
) -> Result<(usize, usize), NetworkError> {
    check_window(layer, window)?;
    let axis = |input: usize, pad: usize, k: usize, stride: usize| {
        let padded = padded_extent(layer, input, pad)?;
        if padded < k {
            return Err(NetworkError::InvalidShape {
                layer: layer.to_string(),
                detail: format!("pooling kernel {k} exceeds padded input {padded}"),
            });
        }
        let mut out = (padded - k).div_ceil(stride) + 1;
        let last_start = (out - 1).checked_mul(stride).unwrap_or(usize::MAX);
        if pad > 0 && last_start >= input + pad {
            out -= 1;
        }
        Ok(out)
    };
    Ok((
        axis(h, window.pad.0, window.kernel.0, window.stride.0)?,
        axis(w, window.pad.1, window.kernel.1, window.stride.1)?,
    ))
}

/// `input + 2·pad`, rejecting overflow.
fn padded_extent(layer: &str, input: usize, pad: usize) -> Result<usize, NetworkError> {
    pad.checked_mul(2)
        .and_then(|p| p.checked_add(input))
        .ok_or_else(|| invalid_param(layer, format!("padding {pad} overflows the input extent")))
}

fn too_large(layer: &str, dims: &Dims) -> NetworkError {
    NetworkError::InvalidShape {
        layer: layer.to_string(),
        detail: format!("{dims} has more elements than can be addressed"),
    }
}

fn concat_output(layer: &str, inputs: &[&Dims]) -> Result<Dims, NetworkError> {
    let first = inputs[0];
    if first.rank() == 0 {
        return Err(NetworkError::InvalidShape {
            layer: layer.to_string(),
            detail: "cannot concatenate scalars".into(),
        });
    }
    let mut channels = 0;
    for d in inputs {
        if d.rank() != first.rank() || d.as_slice()[1..] != first.as_slice()[1..] {
            return Err(NetworkError::InvalidShape {
                layer: layer.to_string(),
                detail: format!("concat inputs differ outside the channel axis: {first} vs {d}"),
            });
        }
        channels = d
            .channels()
            .checked_add(channels)
            .ok_or_else(|| too_large(layer, d))?;
    }
    let mut dims = first.as_slice().to_vec();
    dims[0] = channels;
    Ok(Dims::new(dims))
}
