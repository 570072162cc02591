// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! End-to-end runs over real Caffe files written to a scratch directory.

use diagnostics::{CaptureSink, Severity};
use net_import::{importer_for, CaffeImporter, SourceFormat};
use pipeline::{
    ArtifactWriter, CacheFileName, CompilationDriver, CompileError, ModelDescriptor, Stage,
};
use plan_builder::{
    BuildSettings, Builder, EnginePlan, HardwareContext, PlanSerializer, PrecisionMode,
};
use prost::Message;
use std::path::{Path, PathBuf};

const DEPLOY: &str = r#"
name: "net"
input: "data"
input_dim: 1 input_dim: 1 input_dim: 6 input_dim: 6
layer {
  name: "conv1" type: "Convolution" bottom: "data" top: "conv1"
  convolution_param { num_output: 2 kernel_size: 3 pad: 1 }
}
layer { name: "relu1" type: "ReLU" bottom: "conv1" top: "conv1" }
layer {
  name: "pool1" type: "Pooling" bottom: "conv1" top: "pool1"
  pooling_param { pool: MAX kernel_size: 2 stride: 2 }
}
layer {
  name: "ip1" type: "InnerProduct" bottom: "pool1" top: "ip1"
  inner_product_param { num_output: 4 }
}
layer { name: "prob" type: "Softmax" bottom: "ip1" top: "prob" }
"#;

const WIDE_KERNEL: &str = r#"
name: "wide"
input: "data"
input_dim: 1 input_dim: 1 input_dim: 16 input_dim: 16
layer {
  name: "conv1" type: "Convolution" bottom: "data" top: "conv1"
  convolution_param { num_output: 2 kernel_size: 5 pad: 2 bias_term: false }
}
"#;

// ── caffemodel encoding ────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
struct NetParameter {
    #[prost(message, repeated, tag = "100")]
    layer: Vec<LayerParameter>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct LayerParameter {
    #[prost(string, optional, tag = "1")]
    name: Option<String>,
    #[prost(message, repeated, tag = "7")]
    blobs: Vec<BlobProto>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct BlobProto {
    #[prost(float, repeated, tag = "5")]
    data: Vec<f32>,
    #[prost(message, optional, tag = "7")]
    shape: Option<BlobShape>,
}

#[derive(Clone, PartialEq, prost::Message)]
struct BlobShape {
    #[prost(int64, repeated, tag = "1")]
    dim: Vec<i64>,
}

fn blob(dims: &[usize], fill: f32) -> BlobProto {
    BlobProto {
        data: vec![fill; dims.iter().product()],
        shape: Some(BlobShape {
            dim: dims.iter().map(|&d| d as i64).collect(),
        }),
    }
}

fn layer(name: &str, blobs: Vec<BlobProto>) -> LayerParameter {
    LayerParameter {
        name: Some(name.to_string()),
        blobs,
    }
}

fn net_weights() -> Vec<u8> {
    NetParameter {
        layer: vec![
            layer("conv1", vec![blob(&[2, 1, 3, 3], 0.1), blob(&[2], 0.0)]),
            layer("ip1", vec![blob(&[4, 18], 0.05), blob(&[4], 0.0)]),
        ],
    }
    .encode_to_vec()
}

fn wide_weights() -> Vec<u8> {
    NetParameter {
        layer: vec![layer("conv1", vec![blob(&[2, 1, 5, 5], 0.1)])],
    }
    .encode_to_vec()
}

// ── fixtures ───────────────────────────────────────────────────────

struct Scratch(PathBuf);

impl Scratch {
    fn new(tag: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("nn2plan-it-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.0.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(&self.0)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().map_or(false, |e| e == "tensorcache"))
            .collect();
        found.sort();
        found
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn model(scratch: &Scratch, deploy: &str, weights: &[u8], outputs: &[&str]) -> ModelDescriptor {
    let description = scratch.write("net.prototxt", deploy.as_bytes());
    let weights = scratch.write("net.caffemodel", weights);
    let outputs = outputs.iter().map(|s| s.to_string()).collect();
    ModelDescriptor::new(description, weights, 4, outputs).unwrap()
}

/// Compiles and, on success, writes the artifact into the scratch dir.
fn run(
    descriptor: &ModelDescriptor,
    fp16: bool,
    settings: BuildSettings,
    sink: &CaptureSink,
) -> Result<(PathBuf, PrecisionMode), CompileError> {
    let importer = CaffeImporter::new();
    let compiler = Builder::new(HardwareContext::new("test-target", fp16));
    let serializer = PlanSerializer::new();
    let driver = CompilationDriver::new(&importer, &compiler, &serializer, sink).with_settings(settings);
    let outcome = driver.compile_model(descriptor)?;
    let name = CacheFileName::new(descriptor.weights(), descriptor.max_batch_size());
    let base = descriptor.weights().parent().unwrap_or(Path::new("."));
    let path = ArtifactWriter::new(base).write(&outcome.artifact, &name).unwrap();
    Ok((path, outcome.precision))
}

// ── properties ─────────────────────────────────────────────────────

#[test]
fn test_successful_run_writes_one_artifact() {
    let scratch = Scratch::new("success");
    let descriptor = model(&scratch, DEPLOY, &net_weights(), &["prob"]);
    let sink = CaptureSink::new();
    let (path, precision) = run(&descriptor, false, BuildSettings::default(), &sink).unwrap();

    assert_eq!(path, scratch.0.join("net.caffemodel.4.tensorcache"));
    assert_eq!(scratch.artifacts(), vec![path.clone()]);
    let bytes = std::fs::read(&path).unwrap();
    assert!(!bytes.is_empty());

    let plan = EnginePlan::from_bytes(&bytes).unwrap();
    assert_eq!(plan.name, "net");
    assert_eq!(plan.max_batch_size, 4);
    assert_eq!(plan.precision, PrecisionMode::Standard);
    assert_eq!(precision, PrecisionMode::Standard);
    assert_eq!(plan.output_names(), vec!["prob"]);
    assert!(sink.contains("retrieved output tensor 'prob'"));
    assert!(sink.contains("completed building engine"));
}

#[test]
fn test_missing_output_leaves_no_artifact() {
    let scratch = Scratch::new("missing");
    let descriptor = model(&scratch, DEPLOY, &net_weights(), &["nonexistent"]);
    let sink = CaptureSink::new();
    let err = run(&descriptor, false, BuildSettings::default(), &sink).unwrap_err();

    assert!(matches!(err, CompileError::NoOutputsResolved { .. }));
    assert!(scratch.artifacts().is_empty());
    assert_eq!(
        sink.messages(Severity::Error),
        vec!["failed to retrieve tensor for output 'nonexistent'"]
    );
}

#[test]
fn test_duplicate_output_marked_once() {
    let scratch = Scratch::new("duplicate");
    let descriptor = model(&scratch, DEPLOY, &net_weights(), &["prob", "prob"]);
    let (path, _) = run(&descriptor, false, BuildSettings::default(), &CaptureSink::new()).unwrap();
    let plan = EnginePlan::from_bytes(&std::fs::read(path).unwrap()).unwrap();
    assert_eq!(plan.output_names(), vec!["prob"]);
}

#[test]
fn test_probe_decides_precision() {
    let scratch = Scratch::new("precision");
    let descriptor = model(&scratch, DEPLOY, &net_weights(), &["prob"]);

    let sink = CaptureSink::new();
    let (path, precision) = run(&descriptor, true, BuildSettings::default(), &sink).unwrap();
    assert_eq!(precision, PrecisionMode::Reduced);
    assert!(sink.contains("platform has FP16 support."));
    let plan = EnginePlan::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(plan.precision, PrecisionMode::Reduced);

    let sink = CaptureSink::new();
    let (_, precision) = run(&descriptor, false, BuildSettings::default(), &sink).unwrap();
    assert_eq!(precision, PrecisionMode::Standard);
    assert!(sink.contains("platform does not have FP16 support."));
}

#[test]
fn test_identical_inputs_give_identical_artifacts() {
    let scratch = Scratch::new("repeat");
    let descriptor = model(&scratch, DEPLOY, &net_weights(), &["prob", "ip1"]);
    let (path, _) = run(&descriptor, true, BuildSettings::default(), &CaptureSink::new()).unwrap();
    let first = std::fs::read(&path).unwrap();
    let (path, _) = run(&descriptor, true, BuildSettings::default(), &CaptureSink::new()).unwrap();
    let second = std::fs::read(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(scratch.artifacts().len(), 1);
}

#[test]
fn test_parse_failure_leaves_no_artifact() {
    let scratch = Scratch::new("parse");
    let descriptor = model(&scratch, "layer { name: \"broken\"", &net_weights(), &["prob"]);
    let sink = CaptureSink::new();
    let err = run(&descriptor, false, BuildSettings::default(), &sink).unwrap_err();
    assert_eq!(err.stage(), Stage::Importing);
    assert!(sink.contains("failed to parse caffe network"));
    assert!(scratch.artifacts().is_empty());
}

#[test]
fn test_workspace_too_small_fails_build() {
    let scratch = Scratch::new("workspace");
    let descriptor = model(&scratch, WIDE_KERNEL, &wide_weights(), &["conv1"]);
    let settings = BuildSettings {
        workspace: "16B".into(),
        ..BuildSettings::default()
    };
    let sink = CaptureSink::new();
    let err = run(&descriptor, false, settings, &sink).unwrap_err();
    assert_eq!(err.stage(), Stage::Building);
    assert!(sink.contains("failed to build engine"));
    assert!(scratch.artifacts().is_empty());
}

#[test]
fn test_uff_path_is_unimplemented() {
    let scratch = Scratch::new("uff");
    let descriptor = model(&scratch, DEPLOY, &net_weights(), &["prob"]);
    let importer = importer_for(SourceFormat::Uff);
    let compiler = Builder::new(HardwareContext::new("test-target", false));
    let sink = CaptureSink::new();
    let serializer = PlanSerializer::new();
    let driver = CompilationDriver::new(importer.as_ref(), &compiler, &serializer, &sink);
    let err = driver.compile_model(&descriptor).unwrap_err();
    assert_eq!(err.stage(), Stage::Importing);
    assert!(err.to_string().contains("not implemented"));
    assert!(sink.contains("failed to parse uff network"));
}
