// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Graph-level optimization passes.
//!
//! Passes rewrite a flat list of [`WorkStep`]s taken from a sealed network.
//! Tensors keep their network indices; the builder compacts them afterwards.
//! Each pass returns how many steps it removed or changed.

use crate::StepOp;
use network_ir::{Activation, Layer, LayerOp, WeightBlob};
use std::collections::HashSet;

/// A step under construction.
#[derive(Debug, Clone)]
pub(crate) struct WorkStep {
    pub name: String,
    pub op: StepOp,
    pub inputs: Vec<usize>,
    pub output: usize,
    pub weights: Vec<WeightBlob>,
    pub fused: Option<Activation>,
}

impl WorkStep {
    pub fn from_layer(layer: &Layer) -> Self {
        Self {
            name: layer.name.clone(),
            op: StepOp::Layer(layer.op.clone()),
            inputs: layer.inputs.iter().map(|h| h.index()).collect(),
            output: layer.outputs.first().map(|h| h.index()).unwrap_or(usize::MAX),
            weights: layer.weights.clone(),
            fused: None,
        }
    }

    fn layer_op(&self) -> Option<&LayerOp> {
        match &self.op {
            StepOp::Layer(op) => Some(op),
            StepOp::Identity => None,
        }
    }
}

/// Drops steps whose output does not contribute to any marked output.
pub(crate) fn eliminate_dead_steps(steps: &mut Vec<WorkStep>, outputs: &[usize]) -> usize {
    let mut live: HashSet<usize> = outputs.iter().copied().collect();
    let mut keep = vec![false; steps.len()];
    for (i, step) in steps.iter().enumerate().rev() {
        if live.contains(&step.output) {
            keep[i] = true;
            live.extend(step.inputs.iter().copied());
        }
    }
    let before = steps.len();
    let mut flags = keep.into_iter();
    steps.retain(|_| flags.next().unwrap_or(false));
    before - steps.len()
}

/// Removes inference-time dropout.
///
/// Consumers are rewired to the dropout's input. A dropout whose output is
/// marked becomes an identity copy so the output tensor still exists.
pub(crate) fn eliminate_dropout(steps: &mut Vec<WorkStep>, outputs: &[usize]) -> usize {
    let mut changed = 0;
    let mut i = 0;
    while i < steps.len() {
        if !matches!(steps[i].layer_op(), Some(LayerOp::Dropout { .. })) {
            i += 1;
            continue;
        }
        changed += 1;
        let (from, to) = (steps[i].output, steps[i].inputs.first().copied());
        if outputs.contains(&from) {
            steps[i].op = StepOp::Identity;
            i += 1;
            continue;
        }
        if let Some(to) = to {
            for later in steps.iter_mut().skip(i + 1) {
                for input in later.inputs.iter_mut().filter(|t| **t == from) {
                    *input = to;
                }
            }
        }
        steps.remove(i);
    }
    changed
}

/// Folds single-consumer activations into the preceding convolution, inner
/// product or eltwise step.
pub(crate) fn fuse_activations(steps: &mut Vec<WorkStep>, outputs: &[usize]) -> usize {
    let mut fused = 0;
    let mut i = 0;
    while i < steps.len() {
        let Some(LayerOp::Activation(act)) = steps[i].layer_op().cloned() else {
            i += 1;
            continue;
        };
        let [source] = steps[i].inputs[..] else {
            i += 1;
            continue;
        };
        let consumers = steps.iter().filter(|s| s.inputs.contains(&source)).count();
        let producer = steps[..i].iter().position(|s| s.output == source);
        let fusable = producer.filter(|&p| {
            steps[p].fused.is_none()
                && consumers == 1
                && !outputs.contains(&source)
                && matches!(
                    steps[p].layer_op(),
                    Some(LayerOp::Convolution(_) | LayerOp::InnerProduct { .. } | LayerOp::Eltwise(_))
                )
        });
        match fusable {
            Some(p) => {
                tracing::trace!(producer = %steps[p].name, activation = %steps[i].name, "activation fused");
                steps[p].fused = Some(act);
                steps[p].output = steps[i].output;
                steps.remove(i);
                fused += 1;
            }
            None => i += 1,
        }
    }
    fused
}

/// Pre-divides Caffe batch-norm statistics by their stored scale factor.
///
/// Caffe keeps running mean and variance multiplied by a factor in the
/// third blob; the engine wants the plain statistics and a factor of 1.
pub(crate) fn normalize_batch_norm(steps: &mut [WorkStep]) -> usize {
    let mut normalized = 0;
    for step in steps.iter_mut() {
        if !matches!(step.layer_op(), Some(LayerOp::BatchNorm { .. })) || step.weights.len() != 3 {
            continue;
        }
        let factor = step.weights[2].values.first().copied().unwrap_or(1.0);
        let scale = if factor == 0.0 { 0.0 } else { 1.0 / factor };
        for blob in &mut step.weights[..2] {
            for v in &mut blob.values {
                *v *= scale;
            }
        }
        if let Some(v) = step.weights[2].values.first_mut() {
            *v = 1.0;
        }
        normalized += 1;
    }
    normalized
}
