// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # pipeline
//!
//! Drives one compilation run: import the model, probe the target, resolve
//! the requested outputs, build the engine and serialize it. The bytes are
//! then written next to the weights as a `.tensorcache` artifact.
//!
//! The driver only sees the [`net_import::Importer`],
//! [`plan_builder::EngineCompiler`] and [`plan_builder::EngineSerializer`]
//! traits, so every stage can be swapped in tests.
//!
//! # Example
//! ```no_run
//! use diagnostics::ConsoleSink;
//! use net_import::CaffeImporter;
//! use pipeline::{ArtifactWriter, CacheFileName, CompilationDriver, ModelDescriptor};
//! use plan_builder::{Builder, PlanSerializer};
//!
//! let descriptor = ModelDescriptor::new(
//!     "net.prototxt", "net.caffemodel", 4, vec!["prob".to_string()],
//! ).unwrap();
//! let (importer, compiler, serializer, sink) =
//!     (CaffeImporter::new(), Builder::for_host(), PlanSerializer::new(), ConsoleSink::new());
//! let driver = CompilationDriver::new(&importer, &compiler, &serializer, &sink);
//! let outcome = driver.compile_model(&descriptor).unwrap();
//!
//! let name = CacheFileName::new(descriptor.weights(), descriptor.max_batch_size());
//! ArtifactWriter::in_current_dir().unwrap().write(&outcome.artifact, &name).unwrap();
//! ```

mod artifact;
mod descriptor;
mod driver;
mod error;
mod resolver;

pub use artifact::{ArtifactWriter, CacheFileName, ARTIFACT_SUFFIX};
pub use descriptor::ModelDescriptor;
pub use driver::{CompilationDriver, CompileOutcome, Stage};
pub use error::{ArtifactError, CompileError, DescriptorError};
pub use resolver::{resolve_outputs, OutputBinding};
