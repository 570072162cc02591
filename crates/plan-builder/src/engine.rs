// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Compiled engines and the plan they carry.
//!
//! An [`EnginePlan`] is plain data: tensors, bindings and steps in execution
//! order. An [`Engine`] wraps a plan together with a borrow of the hardware
//! context of the compiler that built it, so the compiler cannot be dropped
//! while one of its engines is alive.

use crate::{HardwareContext, PrecisionMode, Tactic};
use network_ir::{Activation, DType, Dims, LayerOp};
use std::fmt;

/// A tensor as the runtime sees it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TensorDesc {
    pub name: String,
    /// Per-sample dims; the batch dimension is implicit.
    pub dims: Dims,
    pub dtype: DType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRole {
    Input,
    Output,
}

/// A tensor the caller supplies or reads back at run time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Binding {
    pub name: String,
    pub role: BindingRole,
    /// Index into [`EnginePlan::tensors`].
    pub tensor: usize,
}

/// Converted weight storage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PlanWeights {
    F32(Vec<f32>),
    /// IEEE half values as raw bits.
    F16(Vec<u16>),
}

impl PlanWeights {
    pub fn len(&self) -> usize {
        match self {
            PlanWeights::F32(v) => v.len(),
            PlanWeights::F16(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            PlanWeights::F32(_) => DType::F32,
            PlanWeights::F16(_) => DType::F16,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.len() * self.dtype().size_bytes()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PlanWeightBlob {
    pub dims: Dims,
    pub data: PlanWeights,
}

/// What a step computes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOp {
    Layer(LayerOp),
    /// Copies its input unchanged.
    Identity,
}

impl StepOp {
    pub fn kind(&self) -> &'static str {
        match self {
            StepOp::Layer(op) => op.kind(),
            StepOp::Identity => "identity",
        }
    }
}

/// One kernel launch.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Step {
    /// Name of the source layer.
    pub name: String,
    pub op: StepOp,
    pub tactic: Tactic,
    /// Activation applied to the output in the same kernel.
    pub fused_activation: Option<Activation>,
    /// Arithmetic precision of the step.
    pub precision: DType,
    /// Two half values packed per 32-bit lane along the channel axis.
    pub paired_half: bool,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    pub weights: Vec<PlanWeightBlob>,
    /// Scratch needed for one sample, in bytes.
    pub scratch_per_sample: usize,
}

/// The complete compiled plan.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnginePlan {
    pub name: String,
    pub hardware: String,
    pub precision: PrecisionMode,
    pub max_batch_size: usize,
    pub workspace_bytes: usize,
    /// Largest scratch any step needs at the maximum batch size.
    pub peak_scratch_bytes: usize,
    pub min_find_iterations: u32,
    pub avg_find_iterations: u32,
    pub debug_sync: bool,
    pub tensors: Vec<TensorDesc>,
    /// Inputs first, then outputs in marking order.
    pub bindings: Vec<Binding>,
    pub steps: Vec<Step>,
}

impl EnginePlan {
    pub fn num_bindings(&self) -> usize {
        self.bindings.len()
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(|b| b.role == BindingRole::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(|b| b.role == BindingRole::Output)
    }

    /// Names of the output bindings, in marking order.
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs().map(|b| b.name.as_str()).collect()
    }

    /// Total converted weight size in bytes.
    pub fn weight_bytes(&self) -> usize {
        self.steps
            .iter()
            .flat_map(|s| &s.weights)
            .map(|w| w.data.size_bytes())
            .sum()
    }

    /// Returns a description of the first dangling tensor reference, if any.
    pub fn find_inconsistency(&self) -> Option<String> {
        let n = self.tensors.len();
        if let Some(b) = self.bindings.iter().find(|b| b.tensor >= n) {
            return Some(format!("binding '{}' refers to tensor {} of {n}", b.name, b.tensor));
        }
        for step in &self.steps {
            if let Some(t) = step.inputs.iter().chain(&step.outputs).find(|&&t| t >= n) {
                return Some(format!("step '{}' refers to tensor {t} of {n}", step.name));
            }
        }
        None
    }
}

impl fmt::Display for EnginePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "EnginePlan '{}' [{} on {}, batch {}, scratch {}/{} B]:",
            self.name,
            self.precision,
            self.hardware,
            self.max_batch_size,
            self.peak_scratch_bytes,
            self.workspace_bytes
        )?;
        for (i, step) in self.steps.iter().enumerate() {
            write!(f, "  [{i}] {} ({}, {:?}, {})", step.name, step.op.kind(), step.tactic, step.precision)?;
            if let Some(act) = &step.fused_activation {
                write!(f, " +{act:?}")?;
            }
            writeln!(f)?;
        }
        for b in &self.bindings {
            match self.tensors.get(b.tensor) {
                Some(t) => writeln!(f, "  {:?} '{}' {} {}", b.role, b.name, t.dims, t.dtype)?,
                None => writeln!(f, "  {:?} '{}' <missing tensor {}>", b.role, b.name, b.tensor)?,
            }
        }
        Ok(())
    }
}

/// A compiled engine, tied to the compiler that produced it.
#[derive(Debug)]
pub struct Engine<'c> {
    plan: EnginePlan,
    hardware: &'c HardwareContext,
}

impl<'c> Engine<'c> {
    pub fn new(plan: EnginePlan, hardware: &'c HardwareContext) -> Self {
        Self { plan, hardware }
    }

    pub fn plan(&self) -> &EnginePlan {
        &self.plan
    }

    pub fn hardware(&self) -> &HardwareContext {
        self.hardware
    }

    pub fn precision(&self) -> PrecisionMode {
        self.plan.precision
    }

    pub fn num_bindings(&self) -> usize {
        self.plan.num_bindings()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_queries() {
        let plan = fixture::tiny_plan();
        assert_eq!(plan.num_bindings(), 2);
        assert_eq!(plan.output_names(), vec!["prob"]);
        assert_eq!(plan.inputs().count(), 1);
        assert_eq!(plan.binding("data").unwrap().tensor, 0);
        assert!(plan.binding("nope").is_none());
    }

    #[test]
    fn test_weight_bytes() {
        assert_eq!(fixture::tiny_plan().weight_bytes(), 4);
    }

    #[test]
    fn test_consistency_check() {
        let mut plan = fixture::tiny_plan();
        assert!(plan.find_inconsistency().is_none());
        plan.steps[0].outputs = vec![7];
        assert!(plan.find_inconsistency().unwrap().contains("step 'prob'"));
        plan.steps[0].outputs = vec![1];
        plan.bindings[1].tensor = 9;
        assert!(plan.find_inconsistency().unwrap().contains("binding 'prob'"));
    }

    #[test]
    fn test_engine_borrows_hardware() {
        let hw = HardwareContext::new("test", false);
        let engine = Engine::new(fixture::tiny_plan(), &hw);
        assert_eq!(engine.hardware().name(), "test");
        assert_eq!(engine.precision(), PrecisionMode::Standard);
        assert_eq!(engine.num_bindings(), 2);
    }

    #[test]
    fn test_display_lists_steps_and_bindings() {
        let text = fixture::tiny_plan().to_string();
        assert!(text.contains("EnginePlan 'tiny'"));
        assert!(text.contains("[0] prob (sigmoid"));
        assert!(text.contains("Output 'prob'"));
    }
}
