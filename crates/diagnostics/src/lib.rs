// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # diagnostics
//!
//! The user-facing diagnostic channel of the model compiler.
//!
//! Every pipeline stage reports through a [`DiagnosticsSink`] that is built
//! once at startup and passed down by reference. The CLI uses
//! [`ConsoleSink`], which prints `[GIE]  `-prefixed lines to standard output
//! and hides [`Severity::Info`] unless asked otherwise; tests use
//! [`CaptureSink`] to assert on what was reported.
//!
//! This channel is separate from the internal `tracing` events the library
//! crates emit, which the CLI routes to standard error.
//!
//! # Example
//! ```
//! use diagnostics::{CaptureSink, DiagnosticsSink, Severity};
//!
//! let sink = CaptureSink::new();
//! sink.log(Severity::Progress, "building engine");
//! assert!(sink.contains("building"));
//! ```

mod severity;
mod sink;

pub use severity::Severity;
pub use sink::{CaptureSink, ConsoleSink, DiagnosticsSink, LOG_PREFIX};
