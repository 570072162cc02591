// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compilation driver.
//!
//! One run walks the stages strictly forward:
//!
//! ```text
//! Idle → Importing → Resolving → Configuring → Building → Serializing → Done
//! ```
//!
//! The imported graph and blob lookup are owned by the run and dropped
//! before serialization. The engine borrows the compiler, so the compiler
//! outlives every engine it hands out.

use crate::{resolve_outputs, CompileError, ModelDescriptor, OutputBinding};
use diagnostics::{DiagnosticsSink, Severity};
use net_import::Importer;
use plan_builder::{
    probe, BuildConfig, BuildSettings, EngineCompiler, EngineSerializer, HostMemory,
    PrecisionMode,
};
use std::fmt;

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Importing,
    Resolving,
    Configuring,
    Building,
    Serializing,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Importing => "importing",
            Stage::Resolving => "resolving",
            Stage::Configuring => "configuring",
            Stage::Building => "building",
            Stage::Serializing => "serializing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct CompileOutcome {
    /// The serialized engine.
    pub artifact: HostMemory,
    /// One entry per requested output, in request order.
    pub bindings: Vec<OutputBinding>,
    pub precision: PrecisionMode,
    /// Stages entered, `Idle` through `Done`.
    pub stages: Vec<Stage>,
}

impl CompileOutcome {
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(|b| !b.is_resolved())
            .map(|b| b.name.as_str())
    }
}

/// Runs the import → resolve → build → serialize pipeline against the
/// collaborators it is given.
pub struct CompilationDriver<'a> {
    importer: &'a dyn Importer,
    compiler: &'a dyn EngineCompiler,
    serializer: &'a dyn EngineSerializer,
    sink: &'a dyn DiagnosticsSink,
    settings: BuildSettings,
}

impl<'a> CompilationDriver<'a> {
    /// A driver using default build settings.
    pub fn new(
        importer: &'a dyn Importer,
        compiler: &'a dyn EngineCompiler,
        serializer: &'a dyn EngineSerializer,
        sink: &'a dyn DiagnosticsSink,
    ) -> Self {
        Self {
            importer,
            compiler,
            serializer,
            sink,
            settings: BuildSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: BuildSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Compiles one model into serialized engine bytes.
    pub fn compile_model(&self, descriptor: &ModelDescriptor) -> Result<CompileOutcome, CompileError> {
        let mut stages = vec![Stage::Idle];
        self.settings.validate()?;

        stages.push(Stage::Importing);
        self.sink.log(
            Severity::Progress,
            &format!(
                "loading {} {}",
                descriptor.description().display(),
                descriptor.weights().display()
            ),
        );
        let imported = self
            .importer
            .import(descriptor.description(), descriptor.weights())
            .map_err(|e| {
                self.sink.log(
                    Severity::Error,
                    &format!("failed to parse {} network", self.importer.format()),
                );
                tracing::debug!("import error: {e}");
                CompileError::Import(e)
            })?;
        let (mut network, blobs) = (imported.network, imported.blobs);
        tracing::debug!(
            "imported '{}': {} layers, {} blobs",
            network.name(),
            network.num_layers(),
            blobs.len()
        );

        let capability = probe(self.compiler.hardware(), self.sink);
        let precision = capability.select(self.settings.allow_reduced_precision);
        tracing::info!("precision mode: {precision}");

        stages.push(Stage::Resolving);
        let bindings = resolve_outputs(descriptor.outputs(), &blobs, &mut network, self.sink);
        if !bindings.iter().any(OutputBinding::is_resolved) {
            return Err(CompileError::NoOutputsResolved {
                requested: descriptor.outputs().to_vec(),
            });
        }
        let network = network.seal();

        stages.push(Stage::Configuring);
        self.sink.log(Severity::Progress, "configuring engine");
        let config =
            BuildConfig::from_settings(&self.settings, descriptor.max_batch_size(), precision)?;
        tracing::debug!(
            "batch {}, workspace {}, find iterations {}/{}",
            config.max_batch_size,
            config.workspace,
            config.min_find_iterations,
            config.avg_find_iterations
        );

        stages.push(Stage::Building);
        self.sink.log(Severity::Progress, "building engine");
        let engine = self.compiler.build_engine(&network, &config).map_err(|e| {
            self.sink.log(Severity::Error, "failed to build engine");
            CompileError::Build(e)
        })?;
        self.sink.log(Severity::Progress, "completed building engine");
        drop(network);
        drop(blobs);

        stages.push(Stage::Serializing);
        let artifact = self.serializer.serialize(&engine).map_err(|e| {
            self.sink.log(Severity::Error, "failed to serialize engine");
            CompileError::Serialize(e)
        })?;
        drop(engine);
        tracing::info!("serialized engine: {} bytes", artifact.len());

        stages.push(Stage::Done);
        Ok(CompileOutcome {
            artifact,
            bindings,
            precision,
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagnostics::CaptureSink;
    use net_import::{ImportError, ImportedNetwork, SourceFormat};
    use network_ir::{Activation, BlobNameToTensor, Dims, LayerOp, LayerSpec, NetworkDefinition, Sealed};
    use plan_builder::{
        BuildError, Builder, Engine, EnginePlan, HardwareContext, PlanSerializer, SerializeError,
    };
    use std::cell::Cell;
    use std::path::Path;

    /// Hands out a fixed `data → sigmoid → prob` network.
    struct StaticImporter;

    impl Importer for StaticImporter {
        fn format(&self) -> SourceFormat {
            SourceFormat::Caffe
        }

        fn import(&self, _: &Path, _: &Path) -> Result<ImportedNetwork, ImportError> {
            let mut network = NetworkDefinition::new("static");
            let mut blobs = BlobNameToTensor::new();
            let data = network.add_input("data", Dims::chw(2, 4, 4)).unwrap();
            blobs.insert("data", data);
            let prob = network
                .add_layer(LayerSpec {
                    name: "prob".into(),
                    op: LayerOp::Activation(Activation::Sigmoid),
                    inputs: vec![data],
                    output: "prob".into(),
                    weights: vec![],
                })
                .unwrap();
            blobs.insert("prob", prob);
            Ok(ImportedNetwork { network, blobs })
        }
    }

    struct FailingImporter;

    impl Importer for FailingImporter {
        fn format(&self) -> SourceFormat {
            SourceFormat::Caffe
        }

        fn import(&self, _: &Path, _: &Path) -> Result<ImportedNetwork, ImportError> {
            Err(ImportError::NoInputs)
        }
    }

    /// Counts calls and delegates to a real builder.
    struct CountingCompiler {
        inner: Builder,
        calls: Cell<usize>,
    }

    impl CountingCompiler {
        fn new(fp16: bool) -> Self {
            Self {
                inner: Builder::new(HardwareContext::new("test", fp16)),
                calls: Cell::new(0),
            }
        }
    }

    impl EngineCompiler for CountingCompiler {
        fn hardware(&self) -> &HardwareContext {
            self.inner.hardware()
        }

        fn build_engine(
            &self,
            network: &NetworkDefinition<Sealed>,
            config: &BuildConfig,
        ) -> Result<Engine<'_>, BuildError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.build_engine(network, config)
        }
    }

    struct RefusingSerializer;

    impl EngineSerializer for RefusingSerializer {
        fn serialize(&self, _: &Engine<'_>) -> Result<HostMemory, SerializeError> {
            Err(SerializeError::TooLarge { size: 1, limit: 0 })
        }
    }

    fn descriptor(outputs: &[&str]) -> ModelDescriptor {
        let outputs = outputs.iter().map(|s| s.to_string()).collect();
        ModelDescriptor::new("net.prototxt", "net.caffemodel", 4, outputs).unwrap()
    }

    #[test]
    fn test_successful_run_walks_every_stage() {
        let compiler = CountingCompiler::new(false);
        let sink = CaptureSink::new();
        let serializer = PlanSerializer::new();
        let driver = CompilationDriver::new(&StaticImporter, &compiler, &serializer, &sink);
        let outcome = driver.compile_model(&descriptor(&["prob"])).unwrap();

        assert_eq!(
            outcome.stages,
            vec![
                Stage::Idle,
                Stage::Importing,
                Stage::Resolving,
                Stage::Configuring,
                Stage::Building,
                Stage::Serializing,
                Stage::Done
            ]
        );
        assert_eq!(outcome.precision, PrecisionMode::Standard);
        let plan = EnginePlan::from_bytes(&outcome.artifact).unwrap();
        assert_eq!(plan.output_names(), vec!["prob"]);
        assert_eq!(plan.max_batch_size, 4);
        assert_eq!(
            sink.messages(Severity::Progress),
            vec![
                "loading net.prototxt net.caffemodel",
                "platform does not have FP16 support.",
                "retrieved output tensor 'prob'",
                "configuring engine",
                "building engine",
                "completed building engine",
            ]
        );
    }

    #[test]
    fn test_probe_selects_reduced_precision() {
        let compiler = CountingCompiler::new(true);
        let sink = CaptureSink::new();
        let serializer = PlanSerializer::new();
        let driver = CompilationDriver::new(&StaticImporter, &compiler, &serializer, &sink);
        let outcome = driver.compile_model(&descriptor(&["prob"])).unwrap();
        assert_eq!(outcome.precision, PrecisionMode::Reduced);

        let settings = BuildSettings {
            allow_reduced_precision: false,
            ..BuildSettings::default()
        };
        let driver = driver.with_settings(settings);
        let outcome = driver.compile_model(&descriptor(&["prob"])).unwrap();
        assert_eq!(outcome.precision, PrecisionMode::Standard);
    }

    #[test]
    fn test_partial_resolution_continues() {
        let compiler = CountingCompiler::new(false);
        let sink = CaptureSink::new();
        let serializer = PlanSerializer::new();
        let driver = CompilationDriver::new(&StaticImporter, &compiler, &serializer, &sink);
        let outcome = driver.compile_model(&descriptor(&["nope", "prob"])).unwrap();
        assert_eq!(outcome.unresolved().collect::<Vec<_>>(), vec!["nope"]);
        assert!(sink.contains("failed to retrieve tensor for output 'nope'"));
    }

    #[test]
    fn test_zero_resolved_fails_before_build() {
        let compiler = CountingCompiler::new(false);
        let sink = CaptureSink::new();
        let serializer = PlanSerializer::new();
        let driver = CompilationDriver::new(&StaticImporter, &compiler, &serializer, &sink);
        let err = driver.compile_model(&descriptor(&["a", "b"])).unwrap_err();
        assert!(matches!(err, CompileError::NoOutputsResolved { ref requested } if requested.len() == 2));
        assert_eq!(err.stage(), Stage::Resolving);
        assert_eq!(compiler.calls.get(), 0);
    }

    #[test]
    fn test_import_failure_is_fatal() {
        let compiler = CountingCompiler::new(false);
        let sink = CaptureSink::new();
        let serializer = PlanSerializer::new();
        let driver = CompilationDriver::new(&FailingImporter, &compiler, &serializer, &sink);
        let err = driver.compile_model(&descriptor(&["prob"])).unwrap_err();
        assert_eq!(err.stage(), Stage::Importing);
        assert!(sink.contains("failed to parse caffe network"));
        assert_eq!(compiler.calls.get(), 0);
    }

    #[test]
    fn test_invalid_settings_fail_before_import() {
        let compiler = CountingCompiler::new(false);
        let sink = CaptureSink::new();
        let settings = BuildSettings {
            workspace: "0".into(),
            ..BuildSettings::default()
        };
        let serializer = PlanSerializer::new();
        let driver = CompilationDriver::new(&StaticImporter, &compiler, &serializer, &sink)
            .with_settings(settings);
        let err = driver.compile_model(&descriptor(&["prob"])).unwrap_err();
        assert_eq!(err.stage(), Stage::Idle);
        assert!(sink.messages(Severity::Progress).is_empty());
        assert_eq!(compiler.calls.get(), 0);
    }

    #[test]
    fn test_serialize_failure_is_fatal() {
        let compiler = CountingCompiler::new(false);
        let sink = CaptureSink::new();
        let driver = CompilationDriver::new(&StaticImporter, &compiler, &RefusingSerializer, &sink);
        let err = driver.compile_model(&descriptor(&["prob"])).unwrap_err();
        assert_eq!(err.stage(), Stage::Serializing);
        assert!(sink.contains("failed to serialize engine"));
    }
}
