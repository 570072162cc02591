// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Build-target description.
//!
//! The target is the host CPU. Its name and native half-precision support
//! are read from `/proc/cpuinfo`:
//! - x86-64: the `flags` line; `f16c` (conversion) or `avx512fp16`
//!   (arithmetic).
//! - AArch64: the `Features` line; `fphp` and `asimdhp`.
//!
//! When procfs is unavailable (containers, non-Linux hosts) detection
//! degrades to a generic target without reduced precision.

use std::path::Path;

/// Procfs file holding per-core CPU information.
const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// The hardware an engine is compiled for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareContext {
    name: String,
    reduced_precision: bool,
}

impl HardwareContext {
    /// Creates a context with explicit properties.
    pub fn new(name: impl Into<String>, reduced_precision: bool) -> Self {
        Self {
            name: name.into(),
            reduced_precision,
        }
    }

    /// Detects the host CPU. Never fails.
    pub fn detect() -> Self {
        Self::detect_from(Path::new(CPUINFO_PATH))
    }

    /// Detects from a cpuinfo-formatted file.
    pub fn detect_from(path: &Path) -> Self {
        match read_procfs_file(path) {
            Ok(text) => {
                let ctx = Self::from_cpuinfo(&text);
                tracing::debug!(
                    name = %ctx.name,
                    reduced_precision = ctx.reduced_precision,
                    "hardware detected"
                );
                ctx
            }
            Err(e) => {
                tracing::warn!("cannot read {}: {e}; assuming no FP16 support", path.display());
                Self::new(generic_name(), false)
            }
        }
    }

    /// Parses `/proc/cpuinfo` contents. Only the first processor block is
    /// examined; all cores of a host share a feature set.
    pub fn from_cpuinfo(text: &str) -> Self {
        let mut name = None;
        let mut reduced_precision = false;

        for line in text.lines() {
            if line.trim().is_empty() && name.is_some() {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "model name" | "Hardware" | "cpu model" if name.is_none() && !value.is_empty() => {
                    name = Some(value.to_string());
                }
                "flags" => {
                    reduced_precision |= has_flag(value, "f16c") || has_flag(value, "avx512fp16");
                }
                "Features" => {
                    reduced_precision |= has_flag(value, "fphp") && has_flag(value, "asimdhp");
                }
                _ => {}
            }
        }

        Self {
            name: name.unwrap_or_else(generic_name),
            reduced_precision,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the target computes natively in IEEE half precision.
    pub fn has_fast_fp16(&self) -> bool {
        self.reduced_precision
    }
}

fn has_flag(flags: &str, flag: &str) -> bool {
    flags.split_whitespace().any(|f| f == flag)
}

fn generic_name() -> String {
    format!("generic-{}", std::env::consts::ARCH)
}

/// Reads a procfs file, trimming surrounding whitespace.
fn read_procfs_file(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path).map(|s| s.trim().to_string())
}
