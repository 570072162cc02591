// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `nn2plan compile` command: build an engine and write it to disk.

use diagnostics::{ConsoleSink, DiagnosticsSink, Severity};
use net_import::{importer_for, ImportError, SourceFormat};
use pipeline::{ArtifactWriter, CacheFileName, CompilationDriver, ModelDescriptor};
use plan_builder::{BuildSettings, Builder, PlanSerializer};
use std::path::{Path, PathBuf};

#[derive(clap::Args, Debug)]
pub struct CaffeArgs {
    /// Deploy description (.prototxt).
    pub description: PathBuf,

    /// Trained weights (.caffemodel).
    pub weights: PathBuf,

    /// Largest batch the engine will accept.
    #[arg(value_parser = parse_batch_size)]
    pub max_batch_size: usize,

    /// Names of the blobs to expose as engine outputs.
    #[arg(required = true, num_args = 1..)]
    pub outputs: Vec<String>,
}

fn parse_batch_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

pub fn execute_caffe(config: Option<&Path>, verbose: u8, args: &CaffeArgs) -> anyhow::Result<()> {
    let settings = load_settings(config)?;
    let writer = ArtifactWriter::in_current_dir()?;
    let sink = console_sink(verbose);
    let path = compile_caffe(args, settings, &writer, &sink)?;
    sink.log(
        Severity::Progress,
        &format!("completed writing serialized engine (plan) to {}", path.display()),
    );
    Ok(())
}

pub fn execute_uff(verbose: u8) -> anyhow::Result<()> {
    let importer = importer_for(SourceFormat::Uff);
    console_sink(verbose).log(Severity::Error, &format!("failed to parse {} network", importer.format()));
    Err(ImportError::Unimplemented(importer.format()).into())
}

/// Compiles one Caffe model and writes its artifact with `writer`.
pub fn compile_caffe(
    args: &CaffeArgs,
    settings: BuildSettings,
    writer: &ArtifactWriter,
    sink: &dyn DiagnosticsSink,
) -> anyhow::Result<PathBuf> {
    let descriptor = ModelDescriptor::new(
        &args.description,
        &args.weights,
        args.max_batch_size,
        args.outputs.clone(),
    )?;

    let importer = importer_for(SourceFormat::Caffe);
    let compiler = Builder::for_host();
    let serializer = PlanSerializer::new();
    let driver = CompilationDriver::new(importer.as_ref(), &compiler, &serializer, sink)
        .with_settings(settings);
    let outcome = driver
        .compile_model(&descriptor)
        .map_err(|e| anyhow::anyhow!("{} stage: {e}", e.stage()))?;

    let unresolved: Vec<&str> = outcome.unresolved().collect();
    if !unresolved.is_empty() {
        tracing::warn!("outputs left unresolved: {}", unresolved.join(", "));
    }

    let name = CacheFileName::new(descriptor.weights(), descriptor.max_batch_size());
    Ok(writer.write(&outcome.artifact, &name)?)
}

fn load_settings(config: Option<&Path>) -> anyhow::Result<BuildSettings> {
    match config {
        Some(path) => {
            tracing::debug!("loading build settings from {}", path.display());
            Ok(BuildSettings::from_file(path)?)
        }
        None => Ok(BuildSettings::default()),
    }
}

fn console_sink(verbose: u8) -> ConsoleSink {
    if verbose > 0 {
        ConsoleSink::with_threshold(Severity::Info)
    } else {
        ConsoleSink::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagnostics::CaptureSink;

    fn scratch(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nn2plan-cli-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn args(dir: &Path, outputs: &[&str]) -> CaffeArgs {
        CaffeArgs {
            description: dir.join("net.prototxt"),
            weights: dir.join("net.caffemodel"),
            max_batch_size: 2,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    const DEPLOY: &str = r#"
        name: "act"
        input: "data"
        input_dim: 1 input_dim: 3 input_dim: 4 input_dim: 4
        layer { name: "prob" type: "Sigmoid" bottom: "data" top: "prob" }
    "#;

    #[test]
    fn test_batch_size_parser() {
        assert_eq!(parse_batch_size("8"), Ok(8));
        assert!(parse_batch_size("0").is_err());
        assert!(parse_batch_size("x").is_err());
    }

    #[test]
    fn test_compile_writes_artifact() {
        let dir = scratch("ok");
        std::fs::write(dir.join("net.prototxt"), DEPLOY).unwrap();
        std::fs::write(dir.join("net.caffemodel"), b"").unwrap();

        let sink = CaptureSink::new();
        let path = compile_caffe(
            &args(&dir, &["prob"]),
            BuildSettings::default(),
            &ArtifactWriter::new("/unused-base"),
            &sink,
        )
        .unwrap();
        assert_eq!(path, dir.join("net.caffemodel.2.tensorcache"));
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert!(sink.contains("completed building engine"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_files_fail_without_artifact() {
        let dir = scratch("missing");
        let sink = CaptureSink::new();
        let err = compile_caffe(
            &args(&dir, &["prob"]),
            BuildSettings::default(),
            &ArtifactWriter::new(&dir),
            &sink,
        )
        .unwrap_err();
        assert!(err.to_string().contains("importing"));
        assert!(!dir.join("net.caffemodel.2.tensorcache").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_uff_fails() {
        let err = execute_uff(0).unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn test_missing_config_file_fails() {
        assert!(load_settings(Some(Path::new("/nonexistent/build.toml"))).is_err());
        assert_eq!(load_settings(None).unwrap(), BuildSettings::default());
    }
}
