// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Capability probe: does the target support reduced precision?

use crate::HardwareContext;
use diagnostics::{DiagnosticsSink, Severity};
use std::fmt;

/// Numeric precision an engine is built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionMode {
    /// 32-bit floating point throughout.
    Standard,
    /// IEEE half precision where the op allows it.
    Reduced,
}

impl PrecisionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PrecisionMode::Standard => "fp32",
            PrecisionMode::Reduced => "fp16",
        }
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the probe found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecisionCapability {
    pub reduced_precision: bool,
}

impl PrecisionCapability {
    /// The precision to build in when `allow_reduced` permits it.
    pub fn select(self, allow_reduced: bool) -> PrecisionMode {
        if self.reduced_precision && allow_reduced {
            PrecisionMode::Reduced
        } else {
            PrecisionMode::Standard
        }
    }
}

/// Queries the target once and reports the result.
pub fn probe(hardware: &HardwareContext, sink: &dyn DiagnosticsSink) -> PrecisionCapability {
    let reduced_precision = hardware.has_fast_fp16();
    let verb = if reduced_precision { "has" } else { "does not have" };
    sink.log(Severity::Progress, &format!("platform {verb} FP16 support."));
    PrecisionCapability { reduced_precision }
}
