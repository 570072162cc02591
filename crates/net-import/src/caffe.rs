// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Caffe importer: deploy `.prototxt` plus trained `.caffemodel`.
//!
//! The description provides topology and hyper-parameters; the weights file
//! provides parameter blobs, matched to layers by name. Layers are appended
//! to the network in description order, which Caffe already requires to be
//! topological.

use crate::caffemodel::CaffeWeights;
use crate::prototxt::TextMessage;
use crate::{ImportError, ImportedNetwork, Importer, SourceFormat};
use network_ir::{
    Activation, BlobNameToTensor, ConvolutionParams, Dims, EltwiseOp, LayerOp, LayerSpec,
    LrnParams, NetworkDefinition, PoolKind, PoolingParams, Window,
};
use std::path::Path;

/// Imports Caffe models.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaffeImporter;

impl CaffeImporter {
    pub fn new() -> Self {
        Self
    }

    /// Builds a network from an already-parsed description and decoded weights.
    pub fn build(
        &self,
        deploy: &TextMessage,
        mut weights: CaffeWeights,
    ) -> Result<ImportedNetwork, ImportError> {
        let mut network = NetworkDefinition::new(deploy.string("name")?.unwrap_or_default());
        let mut blobs = BlobNameToTensor::new();

        for (name, dims) in declared_inputs(deploy)? {
            let handle = network
                .add_input(&name, dims)
                .map_err(|source| ImportError::Layer {
                    layer: name.clone(),
                    source,
                })?;
            blobs.insert(name, handle);
        }

        let current: Vec<&TextMessage> = deploy.messages("layer").collect();
        let legacy: Vec<&TextMessage> = deploy.messages("layers").collect();
        if !current.is_empty() && !legacy.is_empty() {
            return Err(ImportError::Field {
                field: "layer".into(),
                detail: "cannot mix 'layer' and legacy 'layers' entries".into(),
            });
        }
        let layers = if legacy.is_empty() { current } else { legacy };

        for layer in layers {
            if skipped_in_test_phase(layer)? {
                let name = layer.string("name")?.unwrap_or_default();
                tracing::debug!(layer = %name, "skipping training-only layer");
                continue;
            }
            add_layer(&mut network, &mut blobs, &mut weights, layer)?;
        }

        if network.inputs().is_empty() {
            return Err(ImportError::NoInputs);
        }
        tracing::info!(
            network = network.name(),
            layers = network.num_layers(),
            blobs = blobs.len(),
            "caffe network imported"
        );
        Ok(ImportedNetwork { network, blobs })
    }
}

impl Importer for CaffeImporter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Caffe
    }

    fn import(&self, description: &Path, weights: &Path) -> Result<ImportedNetwork, ImportError> {
        let text = std::fs::read_to_string(description).map_err(|source| ImportError::Read {
            path: description.to_path_buf(),
            source,
        })?;
        let deploy = TextMessage::parse(&text)?;
        let weights = CaffeWeights::open(weights)?;
        let mut imported = self.build(&deploy, weights)?;
        if imported.network.name().is_empty() {
            if let Some(stem) = description.file_stem() {
                imported.network.set_name(stem.to_string_lossy());
            }
        }
        Ok(imported)
    }
}

// ── Inputs ─────────────────────────────────────────────────────────

/// Network-level inputs: `input` with `input_shape` or `input_dim`.
fn declared_inputs(deploy: &TextMessage) -> Result<Vec<(String, Dims)>, ImportError> {
    let names = deploy.strings("input")?;
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let shapes: Vec<&TextMessage> = deploy.messages("input_shape").collect();
    let flat_dims = deploy.uints("input_dim")?;

    let full_shapes: Vec<Vec<usize>> = if !shapes.is_empty() {
        shapes
            .iter()
            .map(|s| s.uints("dim"))
            .collect::<Result<_, _>>()?
    } else if !flat_dims.is_empty() {
        if flat_dims.len() != names.len() * 4 {
            return Err(ImportError::Field {
                field: "input_dim".into(),
                detail: format!(
                    "expected 4 values per input ({} inputs), found {}",
                    names.len(),
                    flat_dims.len()
                ),
            });
        }
        flat_dims.chunks(4).map(<[usize]>::to_vec).collect()
    } else {
        return Err(ImportError::Field {
            field: "input".into(),
            detail: "inputs declared without input_shape or input_dim".into(),
        });
    };

    if full_shapes.len() != names.len() {
        return Err(ImportError::Field {
            field: "input_shape".into(),
            detail: format!("{} inputs but {} shapes", names.len(), full_shapes.len()),
        });
    }
    names
        .into_iter()
        .zip(full_shapes)
        .map(|(name, shape)| {
            let dims = per_sample(&name, &shape)?;
            Ok((name, dims))
        })
        .collect()
}

/// Drops the leading batch dimension.
fn per_sample(name: &str, shape: &[usize]) -> Result<Dims, ImportError> {
    if shape.len() < 2 || shape[1..].contains(&0) {
        return Err(ImportError::Field {
            field: name.to_string(),
            detail: format!("input shape {shape:?} needs a batch dimension and positive sizes"),
        });
    }
    Ok(Dims::new(shape[1..].to_vec()))
}

// ── Layers ─────────────────────────────────────────────────────────

/// Returns `true` for layers that only run in the training phase.
fn skipped_in_test_phase(layer: &TextMessage) -> Result<bool, ImportError> {
    for include in layer.messages("include") {
        if let Some(phase) = include.string("phase")? {
            if phase == "TRAIN" {
                return Ok(true);
            }
        }
    }
    for exclude in layer.messages("exclude") {
        if let Some(phase) = exclude.string("phase")? {
            if phase == "TEST" {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn add_layer(
    network: &mut NetworkDefinition,
    blobs: &mut BlobNameToTensor,
    weights: &mut CaffeWeights,
    layer: &TextMessage,
) -> Result<(), ImportError> {
    let name = layer.string("name")?.unwrap_or_default();
    let kind = layer.string("type")?.ok_or_else(|| ImportError::Field {
        field: "type".into(),
        detail: format!("layer '{name}' has no type"),
    })?;
    let bottoms = layer.strings("bottom")?;
    let tops = layer.strings("top")?;

    if normalize_type(&kind) == "Input" {
        return add_input_layer(network, blobs, &name, layer, &tops);
    }

    let op = parse_op(&name, &kind, layer)?;

    let mut inputs = Vec::with_capacity(bottoms.len());
    for bottom in &bottoms {
        let handle = blobs.find(bottom).ok_or_else(|| ImportError::UnknownBlob {
            layer: name.clone(),
            blob: bottom.clone(),
        })?;
        inputs.push(handle);
    }

    let [top] = tops.as_slice() else {
        return Err(ImportError::Layer {
            layer: name.clone(),
            source: network_ir::NetworkError::OutputArity {
                layer: name.clone(),
                expected: 1,
                actual: tops.len(),
            },
        });
    };

    let layer_weights = if op.has_weights() {
        weights
            .take(&name)
            .ok_or_else(|| ImportError::MissingWeights { layer: name.clone() })?
    } else {
        Vec::new()
    };

    let output = network
        .add_layer(LayerSpec {
            name: name.clone(),
            op,
            inputs,
            output: top.clone(),
            weights: layer_weights,
        })
        .map_err(|source| ImportError::Layer {
            layer: name.clone(),
            source,
        })?;
    blobs.insert(top.clone(), output);
    Ok(())
}

fn add_input_layer(
    network: &mut NetworkDefinition,
    blobs: &mut BlobNameToTensor,
    name: &str,
    layer: &TextMessage,
    tops: &[String],
) -> Result<(), ImportError> {
    let shapes: Vec<&TextMessage> = layer
        .message("input_param")
        .map(|p| p.messages("shape").collect())
        .unwrap_or_default();
    if shapes.is_empty() {
        return Err(ImportError::Field {
            field: "input_param".into(),
            detail: format!("input layer '{name}' declares no shape"),
        });
    }
    for (i, top) in tops.iter().enumerate() {
        // A single shape applies to every top.
        let shape = shapes.get(i).or(shapes.last()).map(|s| s.uints("dim")).transpose()?;
        let dims = per_sample(top, &shape.unwrap_or_default())?;
        let handle = network
            .add_input(top, dims)
            .map_err(|source| ImportError::Layer {
                layer: name.to_string(),
                source,
            })?;
        blobs.insert(top.clone(), handle);
    }
    Ok(())
}

/// Maps legacy upper-case enum names onto current type strings.
fn normalize_type(kind: &str) -> &str {
    match kind {
        "CONVOLUTION" => "Convolution",
        "POOLING" => "Pooling",
        "INNER_PRODUCT" => "InnerProduct",
        "RELU" => "ReLU",
        "SIGMOID" => "Sigmoid",
        "TANH" => "TanH",
        "SOFTMAX" => "Softmax",
        "LRN" => "LRN",
        "CONCAT" => "Concat",
        "ELTWISE" => "Eltwise",
        "DROPOUT" => "Dropout",
        "FLATTEN" => "Flatten",
        other => other,
    }
}

fn parse_op(name: &str, kind: &str, layer: &TextMessage) -> Result<LayerOp, ImportError> {
    let empty = TextMessage::default();
    let param = |key: &str| layer.message(key).unwrap_or(&empty);
    let unsupported = |detail: String| ImportError::UnsupportedParameter {
        layer: name.to_string(),
        detail,
    };

    let op = match normalize_type(kind) {
        "Convolution" => {
            let p = param("convolution_param");
            let num_output = p.uint("num_output")?.ok_or_else(|| ImportError::Field {
                field: "num_output".into(),
                detail: format!("convolution '{name}' needs num_output"),
            })?;
            LayerOp::Convolution(ConvolutionParams {
                num_output,
                window: window(name, p, 0, 1)?,
                group: p.uint("group")?.unwrap_or(1),
                bias: p.boolean("bias_term")?.unwrap_or(true),
            })
        }
        "Pooling" => {
            let p = param("pooling_param");
            let kind = match p.string("pool")?.as_deref() {
                None | Some("MAX") => PoolKind::Max,
                Some("AVE") => PoolKind::Average,
                Some(other) => return Err(unsupported(format!("pooling method {other}"))),
            };
            let global = p.boolean("global_pooling")?.unwrap_or(false);
            let window = if global {
                Window::square(1, 1, 0)
            } else {
                window(name, p, 0, 1)?
            };
            LayerOp::Pooling(PoolingParams {
                kind,
                window,
                global,
            })
        }
        "InnerProduct" => {
            let p = param("inner_product_param");
            if p.uint("axis")?.unwrap_or(1) != 1 || p.boolean("transpose")?.unwrap_or(false) {
                return Err(unsupported("inner product must use axis 1 without transpose".into()));
            }
            let num_output = p.uint("num_output")?.ok_or_else(|| ImportError::Field {
                field: "num_output".into(),
                detail: format!("inner product '{name}' needs num_output"),
            })?;
            LayerOp::InnerProduct {
                num_output,
                bias: p.boolean("bias_term")?.unwrap_or(true),
            }
        }
        "ReLU" => LayerOp::Activation(Activation::Relu {
            negative_slope: param("relu_param").float("negative_slope")?.unwrap_or(0.0),
        }),
        "Sigmoid" => LayerOp::Activation(Activation::Sigmoid),
        "TanH" => LayerOp::Activation(Activation::Tanh),
        "Softmax" => {
            if param("softmax_param").uint("axis")?.unwrap_or(1) != 1 {
                return Err(unsupported("softmax must run over the channel axis".into()));
            }
            LayerOp::Softmax
        }
        "LRN" => {
            let p = param("lrn_param");
            if let Some(region) = p.string("norm_region")? {
                if region != "ACROSS_CHANNELS" {
                    return Err(unsupported(format!("LRN norm region {region}")));
                }
            }
            LayerOp::Lrn(LrnParams {
                local_size: p.uint("local_size")?.unwrap_or(5),
                alpha: p.float("alpha")?.unwrap_or(1.0),
                beta: p.float("beta")?.unwrap_or(0.75),
                k: p.float("k")?.unwrap_or(1.0),
            })
        }
        "Concat" => {
            let p = param("concat_param");
            let axis = match p.uint("axis")? {
                Some(axis) => axis,
                None => p.uint("concat_dim")?.unwrap_or(1),
            };
            if axis != 1 {
                return Err(unsupported(format!("concat along axis {axis}")));
            }
            LayerOp::Concat
        }
        "Eltwise" => {
            let p = param("eltwise_param");
            if p.floats("coeff")?.iter().any(|&c| c != 1.0) {
                return Err(unsupported("eltwise coefficients".into()));
            }
            LayerOp::Eltwise(match p.string("operation")?.as_deref() {
                None | Some("SUM") => EltwiseOp::Sum,
                Some("PROD") => EltwiseOp::Prod,
                Some("MAX") => EltwiseOp::Max,
                Some(other) => return Err(unsupported(format!("eltwise operation {other}"))),
            })
        }
        "Dropout" => LayerOp::Dropout {
            ratio: param("dropout_param").float("dropout_ratio")?.unwrap_or(0.5),
        },
        "BatchNorm" => LayerOp::BatchNorm {
            eps: param("batch_norm_param").float("eps")?.unwrap_or(1e-5),
        },
        "Scale" => {
            let p = param("scale_param");
            if p.uint("axis")?.unwrap_or(1) != 1 {
                return Err(unsupported("scale must apply per channel".into()));
            }
            LayerOp::Scale {
                bias: p.boolean("bias_term")?.unwrap_or(false),
            }
        }
        "Flatten" => {
            if param("flatten_param").uint("axis")?.unwrap_or(1) != 1 {
                return Err(unsupported("flatten must start at axis 1".into()));
            }
            LayerOp::Flatten
        }
        _ => {
            return Err(ImportError::UnsupportedLayer {
                layer: name.to_string(),
                kind: kind.to_string(),
            })
        }
    };
    Ok(op)
}

/// Reads kernel, stride, pad and dilation for convolution and pooling.
///
/// Each accepts either a repeated field (one value for both axes or one per
/// axis) or explicit `_h`/`_w` variants.
fn window(
    name: &str,
    p: &TextMessage,
    default_pad: usize,
    default_stride: usize,
) -> Result<Window, ImportError> {
    let kernel = pair(name, p, "kernel_size", "kernel_h", "kernel_w", None)?;
    let stride = pair(name, p, "stride", "stride_h", "stride_w", Some(default_stride))?;
    let pad = pair(name, p, "pad", "pad_h", "pad_w", Some(default_pad))?;
    let dilation = pair(name, p, "dilation", "dilation_h", "dilation_w", Some(1))?;
    if kernel.0 == 0 || kernel.1 == 0 || stride.0 == 0 || stride.1 == 0 {
        return Err(ImportError::Field {
            field: "kernel_size".into(),
            detail: format!("layer '{name}' has a zero kernel or stride"),
        });
    }
    Ok(Window {
        kernel,
        stride,
        pad,
        dilation,
    })
}

fn pair(
    name: &str,
    p: &TextMessage,
    key: &str,
    key_h: &str,
    key_w: &str,
    default: Option<usize>,
) -> Result<(usize, usize), ImportError> {
    if let (Some(h), Some(w)) = (p.uint(key_h)?, p.uint(key_w)?) {
        return Ok((h, w));
    }
    match p.uints(key)?.as_slice() {
        [] => default.map(|d| (d, d)).ok_or_else(|| ImportError::Field {
            field: key.to_string(),
            detail: format!("layer '{name}' needs {key} or {key_h}/{key_w}"),
        }),
        [v] => Ok((*v, *v)),
        [h, w] => Ok((*h, *w)),
        more => Err(ImportError::Field {
            field: key.to_string(),
            detail: format!("layer '{name}' gives {} values; at most 2 are supported", more.len()),
        }),
    }
}
