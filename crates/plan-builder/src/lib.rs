// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # plan-builder
//!
//! Compiles a sealed [`network_ir::NetworkDefinition`] into an [`Engine`]
//! and serializes it.
//!
//! - [`HardwareContext`] and [`probe`]: what the target can do.
//! - [`BuildSettings`] / [`BuildConfig`]: workspace budget, precision,
//!   timing hints.
//! - [`EngineCompiler`] and its implementation [`Builder`]: graph passes,
//!   precision assignment, tactic selection.
//! - [`EngineSerializer`] and its implementation [`PlanSerializer`].
//!
//! # Example
//! ```
//! use network_ir::{Activation, Dims, LayerOp, LayerSpec, NetworkDefinition};
//! use plan_builder::{BuildConfig, Builder, EngineCompiler, EngineSerializer,
//!                    EnginePlan, HardwareContext, PlanSerializer, PrecisionMode};
//!
//! let mut net = NetworkDefinition::new("tiny");
//! let data = net.add_input("data", Dims::chw(3, 4, 4)).unwrap();
//! let out = net.add_layer(LayerSpec {
//!     name: "act".into(),
//!     op: LayerOp::Activation(Activation::Tanh),
//!     inputs: vec![data],
//!     output: "act".into(),
//!     weights: vec![],
//! }).unwrap();
//! net.mark_output(out).unwrap();
//! let net = net.seal();
//!
//! let builder = Builder::new(HardwareContext::new("host", false));
//! let engine = builder.build_engine(&net, &BuildConfig::new(4, PrecisionMode::Standard)).unwrap();
//! let bytes = PlanSerializer::new().serialize(&engine).unwrap();
//! assert_eq!(EnginePlan::from_bytes(&bytes).unwrap().output_names(), vec!["act"]);
//! ```

mod budget;
mod builder;
mod capability;
mod config;
mod engine;
mod error;
mod hardware;
mod optimizer;
mod serializer;
mod settings;
mod tactics;

pub use budget::WorkspaceBudget;
pub use builder::{Builder, EngineCompiler};
pub use capability::{probe, PrecisionCapability, PrecisionMode};
pub use config::{
    BuildConfig, DEFAULT_AVG_FIND_ITERATIONS, DEFAULT_MIN_FIND_ITERATIONS, DEFAULT_WORKSPACE_BYTES,
};
pub use engine::{
    Binding, BindingRole, Engine, EnginePlan, PlanWeightBlob, PlanWeights, Step, StepOp,
    TensorDesc,
};
pub use error::{BuildError, SerializeError, SettingsError};
pub use hardware::HardwareContext;
pub use serializer::{
    EngineSerializer, HostMemory, PlanSerializer, MAX_PLAN_BYTES, PLAN_FORMAT_VERSION, PLAN_MAGIC,
};
pub use settings::BuildSettings;
pub use tactics::{Candidate, Tactic};
