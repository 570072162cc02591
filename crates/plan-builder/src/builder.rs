// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The engine compiler.
//!
//! ```text
//! NetworkDefinition<Sealed> + BuildConfig
//!     │  check configuration
//!     │  eliminate dead steps, dropout
//!     │  fuse activations, normalise batch-norm statistics
//!     │  assign precision, convert weights
//!     │  select tactics against the workspace
//!     ▼
//! Engine<'c> (EnginePlan borrowing the builder's hardware context)
//! ```

use crate::optimizer::{self, WorkStep};
use crate::tactics::{self, Candidate};
use crate::{
    Binding, BindingRole, BuildConfig, BuildError, Engine, EnginePlan, HardwareContext,
    PlanWeightBlob, PlanWeights, PrecisionMode, Step, StepOp, Tactic, TensorDesc,
};
use network_ir::{DType, LayerOp, NetworkDefinition, Sealed, Tensor, WeightBlob};
use std::collections::HashMap;

/// Compiles sealed networks into engines for one hardware target.
pub trait EngineCompiler {
    /// The target every engine from this compiler is built for.
    fn hardware(&self) -> &HardwareContext;

    fn build_engine(
        &self,
        network: &NetworkDefinition<Sealed>,
        config: &BuildConfig,
    ) -> Result<Engine<'_>, BuildError>;
}

/// The built-in compiler.
#[derive(Debug, Clone)]
pub struct Builder {
    hardware: HardwareContext,
}

impl Builder {
    pub fn new(hardware: HardwareContext) -> Self {
        Self { hardware }
    }

    /// A builder for the detected host.
    pub fn for_host() -> Self {
        Self::new(HardwareContext::detect())
    }

    fn check_config(
        &self,
        network: &NetworkDefinition<Sealed>,
        config: &BuildConfig,
    ) -> Result<(), BuildError> {
        if config.max_batch_size == 0 {
            return Err(BuildError::InvalidConfiguration(
                "max batch size must be at least 1".into(),
            ));
        }
        if config.workspace.as_bytes() == 0 {
            return Err(BuildError::InvalidConfiguration(
                "workspace budget must be larger than zero".into(),
            ));
        }
        if config.min_find_iterations == 0 || config.avg_find_iterations == 0 {
            return Err(BuildError::InvalidConfiguration(
                "find iterations must be at least 1".into(),
            ));
        }
        if config.precision == PrecisionMode::Reduced && !self.hardware.has_fast_fp16() {
            return Err(BuildError::UnsupportedConfiguration(format!(
                "{} has no native FP16 support",
                self.hardware.name()
            )));
        }
        if network.outputs().is_empty() {
            return Err(BuildError::NoOutputs(network.name().to_string()));
        }
        Ok(())
    }
}

impl EngineCompiler for Builder {
    fn hardware(&self) -> &HardwareContext {
        &self.hardware
    }

    fn build_engine(
        &self,
        network: &NetworkDefinition<Sealed>,
        config: &BuildConfig,
    ) -> Result<Engine<'_>, BuildError> {
        self.check_config(network, config)?;
        tracing::debug!(
            network = network.name(),
            layers = network.num_layers(),
            precision = %config.precision,
            max_batch = config.max_batch_size,
            workspace = %config.workspace,
            "building engine"
        );

        let outputs: Vec<usize> = network.outputs().iter().map(|h| h.index()).collect();
        let mut steps: Vec<WorkStep> = network.layers().iter().map(WorkStep::from_layer).collect();
        if let Some(bad) = steps.iter().find(|s| s.output >= network.num_tensors()) {
            return Err(BuildError::MalformedNetwork(format!(
                "layer '{}' produces no tensor",
                bad.name
            )));
        }

        let dead = optimizer::eliminate_dead_steps(&mut steps, &outputs);
        let dropout = optimizer::eliminate_dropout(&mut steps, &outputs);
        let fused = optimizer::fuse_activations(&mut steps, &outputs);
        optimizer::normalize_batch_norm(&mut steps);
        tracing::debug!(dead, dropout, fused, remaining = steps.len(), "graph optimized");

        let layout = TensorLayout::new(network, &steps, &outputs);
        let network_tensors: Vec<&Tensor> = network.tensors().map(|(_, t)| t).collect();
        let mut plan_steps = Vec::with_capacity(steps.len());
        let mut peak_scratch = 0usize;

        for step in steps {
            let precision = step_precision(&step.op, config.precision);
            let candidate = choose_tactic(&network_tensors, &step, precision, config)?;
            peak_scratch = peak_scratch.max(candidate.scratch_per_sample.saturating_mul(config.max_batch_size));
            let out_channels = network_tensors[step.output].dims.channels();

            plan_steps.push(Step {
                paired_half: precision == DType::F16 && out_channels % 2 == 0,
                tactic: candidate.tactic,
                fused_activation: step.fused,
                precision,
                inputs: step.inputs.iter().map(|t| layout.index(*t)).collect(),
                outputs: vec![layout.index(step.output)],
                weights: step.weights.iter().map(|w| convert_weights(w, precision)).collect(),
                scratch_per_sample: candidate.scratch_per_sample,
                name: step.name,
                op: step.op,
            });
        }

        let tensors = layout.describe(network, &plan_steps);
        let bindings = layout.bindings(network, &outputs);
        let plan = EnginePlan {
            name: network.name().to_string(),
            hardware: self.hardware.name().to_string(),
            precision: config.precision,
            max_batch_size: config.max_batch_size,
            workspace_bytes: config.workspace.as_bytes(),
            peak_scratch_bytes: peak_scratch,
            min_find_iterations: config.min_find_iterations,
            avg_find_iterations: config.avg_find_iterations,
            debug_sync: config.debug_sync,
            tensors,
            bindings,
            steps: plan_steps,
        };
        tracing::info!(
            steps = plan.steps.len(),
            bindings = plan.num_bindings(),
            weight_mb = plan.weight_bytes() as f64 / (1024.0 * 1024.0),
            peak_scratch = plan.peak_scratch_bytes,
            "engine built"
        );
        Ok(Engine::new(plan, &self.hardware))
    }
}

/// Softmax keeps full precision; everything else follows the build mode.
fn step_precision(op: &StepOp, mode: PrecisionMode) -> DType {
    match (mode, op) {
        (PrecisionMode::Standard, _) => DType::F32,
        (PrecisionMode::Reduced, StepOp::Layer(LayerOp::Softmax)) => DType::F32,
        (PrecisionMode::Reduced, _) => DType::F16,
    }
}

fn choose_tactic(
    tensors: &[&Tensor],
    step: &WorkStep,
    precision: DType,
    config: &BuildConfig,
) -> Result<Candidate, BuildError> {
    let candidates = match &step.op {
        StepOp::Layer(LayerOp::Convolution(p)) => {
            let input = step
                .inputs
                .first()
                .and_then(|&t| tensors.get(t))
                .ok_or_else(|| BuildError::MalformedNetwork(format!("convolution '{}' has no input", step.name)))?;
            tactics::convolution_candidates(&step.name, p, &input.dims, &tensors[step.output].dims, precision)?
        }
        StepOp::Layer(LayerOp::InnerProduct { .. }) => vec![tactics::fixed(Tactic::Gemm)],
        _ => vec![tactics::fixed(Tactic::Direct)],
    };
    tactics::select(&step.name, &candidates, config.max_batch_size, config.workspace)
}

fn convert_weights(blob: &WeightBlob, precision: DType) -> PlanWeightBlob {
    let data = match precision {
        DType::F32 => PlanWeights::F32(blob.values.clone()),
        DType::F16 => PlanWeights::F16(
            blob.values
                .iter()
                .map(|&v| half::f16::from_f32(v).to_bits())
                .collect(),
        ),
    };
    PlanWeightBlob {
        dims: blob.dims.clone(),
        data,
    }
}

/// Maps network tensor indices to compact plan indices.
struct TensorLayout {
    order: Vec<usize>,
    index_of: HashMap<usize, usize>,
}

impl TensorLayout {
    /// Inputs, then step tensors in execution order, then any marked output
    /// not produced by a step.
    fn new(network: &NetworkDefinition<Sealed>, steps: &[WorkStep], outputs: &[usize]) -> Self {
        let mut layout = Self {
            order: Vec::new(),
            index_of: HashMap::new(),
        };
        for h in network.inputs() {
            layout.push(h.index());
        }
        for step in steps {
            for &t in step.inputs.iter().chain(std::iter::once(&step.output)) {
                layout.push(t);
            }
        }
        for &t in outputs {
            layout.push(t);
        }
        layout
    }

    fn push(&mut self, t: usize) {
        if !self.index_of.contains_key(&t) {
            self.index_of.insert(t, self.order.len());
            self.order.push(t);
        }
    }

    fn index(&self, t: usize) -> usize {
        self.index_of.get(&t).copied().unwrap_or(usize::MAX)
    }

    /// Bound tensors stay in single precision; internal ones take the
    /// precision of their producing step.
    fn describe(&self, network: &NetworkDefinition<Sealed>, steps: &[Step]) -> Vec<TensorDesc> {
        let all: Vec<_> = network.tensors().map(|(_, t)| t).collect();
        let bound: Vec<usize> = network
            .inputs()
            .iter()
            .chain(network.outputs())
            .map(|h| self.index(h.index()))
            .collect();
        self.order
            .iter()
            .enumerate()
            .filter_map(|(plan_index, &t)| {
                let tensor = all.get(t)?;
                let produced = steps
                    .iter()
                    .find(|s| s.outputs.contains(&plan_index))
                    .map(|s| s.precision)
                    .unwrap_or(DType::F32);
                let dtype = if bound.contains(&plan_index) { DType::F32 } else { produced };
                Some(TensorDesc {
                    name: tensor.name.clone(),
                    dims: tensor.dims.clone(),
                    dtype,
                })
            })
            .collect()
    }

    fn bindings(&self, network: &NetworkDefinition<Sealed>, outputs: &[usize]) -> Vec<Binding> {
        let names: Vec<&str> = network.tensors().map(|(_, t)| t.name.as_str()).collect();
        let name = |t: usize| names.get(t).map(|n| n.to_string()).unwrap_or_default();
        let inputs = network.inputs().iter().map(|h| (h.index(), BindingRole::Input));
        let outs = outputs.iter().map(|&t| (t, BindingRole::Output));
        inputs
            .chain(outs)
            .map(|(t, role)| Binding {
                name: name(t),
                role,
                tensor: self.index(t),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WorkspaceBudget;
    use network_ir::{
        Activation, ConvolutionParams, Dims, LayerSpec, NetworkDefinition, PoolKind,
        PoolingParams, Window,
    };

    /// data[1,6,6] → conv3x3(4) → relu → pool2 → drop → ip(3) → prob
    fn lenet_like() -> NetworkDefinition<Sealed> {
        let mut net = NetworkDefinition::new("lenet-like");
        let data = net.add_input("data", Dims::chw(1, 6, 6)).unwrap();
        let conv = net
            .add_layer(LayerSpec {
                name: "conv1".into(),
                op: LayerOp::Convolution(ConvolutionParams {
                    num_output: 4,
                    window: Window::square(3, 1, 1),
                    group: 1,
                    bias: true,
                }),
                inputs: vec![data],
                output: "conv1".into(),
                weights: vec![
                    WeightBlob::new(Dims::new(vec![4, 1, 3, 3]), vec![0.5; 36]),
                    WeightBlob::new(Dims::new(vec![4]), vec![0.25; 4]),
                ],
            })
            .unwrap();
        let relu = net
            .add_layer(LayerSpec {
                name: "relu1".into(),
                op: LayerOp::Activation(Activation::Relu { negative_slope: 0.0 }),
                inputs: vec![conv],
                output: "conv1".into(),
                weights: vec![],
            })
            .unwrap();
        let pool = net
            .add_layer(LayerSpec {
                name: "pool1".into(),
                op: LayerOp::Pooling(PoolingParams {
                    kind: PoolKind::Max,
                    window: Window::square(2, 2, 0),
                    global: false,
                }),
                inputs: vec![relu],
                output: "pool1".into(),
                weights: vec![],
            })
            .unwrap();
        let drop = net
            .add_layer(LayerSpec {
                name: "drop1".into(),
                op: LayerOp::Dropout { ratio: 0.5 },
                inputs: vec![pool],
                output: "pool1".into(),
                weights: vec![],
            })
            .unwrap();
        let ip = net
            .add_layer(LayerSpec {
                name: "ip1".into(),
                op: LayerOp::InnerProduct { num_output: 3, bias: false },
                inputs: vec![drop],
                output: "ip1".into(),
                weights: vec![WeightBlob::new(Dims::new(vec![3, 36]), vec![0.1; 108])],
            })
            .unwrap();
        let prob = net
            .add_layer(LayerSpec {
                name: "prob".into(),
                op: LayerOp::Softmax,
                inputs: vec![ip],
                output: "prob".into(),
                weights: vec![],
            })
            .unwrap();
        net.mark_output(prob).unwrap();
        net.seal()
    }

    fn fp16_builder() -> Builder {
        Builder::new(HardwareContext::new("test-fp16", true))
    }

    #[test]
    fn test_build_standard_precision() {
        let net = lenet_like();
        let builder = fp16_builder();
        let engine = builder
            .build_engine(&net, &BuildConfig::new(4, PrecisionMode::Standard))
            .unwrap();
        let plan = engine.plan();

        let kinds: Vec<&str> = plan.steps.iter().map(|s| s.op.kind()).collect();
        assert_eq!(kinds, vec!["convolution", "pooling", "inner_product", "softmax"]);
        assert!(matches!(plan.steps[0].fused_activation, Some(Activation::Relu { .. })));
        assert_eq!(plan.steps[0].tactic, Tactic::Winograd);
        assert_eq!(plan.steps[2].tactic, Tactic::Gemm);
        assert!(plan.steps.iter().all(|s| s.precision == DType::F32));
        assert_eq!(plan.output_names(), vec!["prob"]);
        assert_eq!(plan.bindings[0].role, BindingRole::Input);
        assert_eq!(plan.max_batch_size, 4);
        assert_eq!(plan.hardware, "test-fp16");
        assert!(plan.find_inconsistency().is_none());
        assert!(plan.peak_scratch_bytes <= plan.workspace_bytes);
    }

    #[test]
    fn test_build_reduced_precision() {
        let net = lenet_like();
        let builder = fp16_builder();
        let engine = builder
            .build_engine(&net, &BuildConfig::new(1, PrecisionMode::Reduced))
            .unwrap();
        let plan = engine.plan();
        assert_eq!(plan.precision, PrecisionMode::Reduced);

        let conv = &plan.steps[0];
        assert_eq!(conv.precision, DType::F16);
        assert!(conv.paired_half);
        assert_eq!(conv.weights[0].data, PlanWeights::F16(vec![half::f16::from_f32(0.5).to_bits(); 36]));

        let ip = &plan.steps[2];
        assert!(!ip.paired_half, "3 channels cannot be paired");
        let softmax = plan.steps.last().unwrap();
        assert_eq!(softmax.precision, DType::F32);

        let prob = plan.binding("prob").unwrap();
        assert_eq!(plan.tensors[prob.tensor].dtype, DType::F32);
    }

    #[test]
    fn test_reduced_precision_needs_hardware_support() {
        let builder = Builder::new(HardwareContext::new("no-fp16", false));
        let err = builder
            .build_engine(&lenet_like(), &BuildConfig::new(1, PrecisionMode::Reduced))
            .unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedConfiguration(_)));
    }

    #[test]
    fn test_invalid_configuration() {
        let builder = fp16_builder();
        let net = lenet_like();
        let err = builder
            .build_engine(&net, &BuildConfig::new(0, PrecisionMode::Standard))
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfiguration(_)));

        let zero_ws = BuildConfig::new(1, PrecisionMode::Standard).with_workspace(WorkspaceBudget::from_bytes(0));
        assert!(matches!(
            builder.build_engine(&net, &zero_ws),
            Err(BuildError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_no_outputs() {
        let mut net = NetworkDefinition::new("bare");
        net.add_input("data", Dims::chw(1, 1, 1)).unwrap();
        let err = fp16_builder()
            .build_engine(&net.seal(), &BuildConfig::new(1, PrecisionMode::Standard))
            .unwrap_err();
        assert!(matches!(err, BuildError::NoOutputs(ref name) if name == "bare"));
    }

    #[test]
    fn test_workspace_too_small() {
        let config = BuildConfig::new(64, PrecisionMode::Standard).with_workspace(WorkspaceBudget::from_bytes(64));
        let err = fp16_builder().build_engine(&lenet_like(), &config).unwrap_err();
        assert!(matches!(err, BuildError::InsufficientWorkspace { ref layer, .. } if layer == "conv1"));
    }

    #[test]
    fn test_builds_are_deterministic() {
        let net = lenet_like();
        let builder = fp16_builder();
        let config = BuildConfig::new(2, PrecisionMode::Reduced);
        let a = builder.build_engine(&net, &config).unwrap();
        let b = builder.build_engine(&net, &config).unwrap();
        assert_eq!(a.plan(), b.plan());
    }

    #[test]
    fn test_input_marked_as_output() {
        let mut net = NetworkDefinition::new("passthrough");
        let data = net.add_input("data", Dims::chw(2, 1, 1)).unwrap();
        net.mark_output(data).unwrap();
        let net = net.seal();
        let builder = fp16_builder();
        let engine = builder
            .build_engine(&net, &BuildConfig::new(1, PrecisionMode::Standard))
            .unwrap();
        let plan = engine.plan();
        assert!(plan.steps.is_empty());
        assert_eq!(plan.num_bindings(), 2);
        assert_eq!(plan.bindings[0].tensor, plan.bindings[1].tensor);
    }
}
