// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tactic selection.
//!
//! Each step gets one kernel strategy. Convolutions have several candidates
//! ranked by an analytic cost model; every other op has exactly one.
//! Candidates whose scratch for the maximum batch exceeds the workspace are
//! discarded before ranking.
//!
//! | Tactic       | Applies to                                   | Scratch per sample            |
//! |--------------|----------------------------------------------|-------------------------------|
//! | `Pointwise`  | 1×1 conv, stride 1, no padding               | none                          |
//! | `Winograd`   | 3×3 conv, stride 1, dilation 1, ungrouped    | transformed input + output    |
//! | `Im2colGemm` | any conv                                     | unfolded input patches        |
//! | `Gemm`       | inner product                                | none                          |
//! | `Direct`     | everything else                              | none                          |

use crate::{BuildError, WorkspaceBudget};
use network_ir::{ConvolutionParams, DType, Dims};
use std::fmt;

/// A kernel strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tactic {
    Pointwise,
    Winograd,
    Im2colGemm,
    Gemm,
    Direct,
}

impl Tactic {
    pub fn as_str(self) -> &'static str {
        match self {
            Tactic::Pointwise => "pointwise",
            Tactic::Winograd => "winograd",
            Tactic::Im2colGemm => "im2col_gemm",
            Tactic::Gemm => "gemm",
            Tactic::Direct => "direct",
        }
    }
}

impl fmt::Display for Tactic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tactic with its modelled cost and scratch requirement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub tactic: Tactic,
    /// Relative cost, in multiply-accumulate equivalents per sample.
    pub cost: f64,
    pub scratch_per_sample: usize,
}

impl Candidate {
    fn free(tactic: Tactic) -> Self {
        Self {
            tactic,
            cost: 0.0,
            scratch_per_sample: 0,
        }
    }
}

/// Winograd F(2×2, 3×3) arithmetic relative to direct convolution.
const WINOGRAD_MAC_RATIO: f64 = 4.0 / 9.0;

/// Tile edge of the transformed Winograd domain.
const WINOGRAD_TILE: usize = 4;

/// All applicable convolution tactics, in tactic order.
///
/// Costs are modelled in `f64`; scratch sizes that overflow `usize` make the
/// layer malformed.
pub fn convolution_candidates(
    layer: &str,
    params: &ConvolutionParams,
    input: &Dims,
    output: &Dims,
    dtype: DType,
) -> Result<Vec<Candidate>, BuildError> {
    let overflow = || BuildError::MalformedNetwork(format!("scratch size of '{layer}' overflows"));
    let product = |factors: &[usize]| {
        factors
            .iter()
            .try_fold(1usize, |acc, &f| acc.checked_mul(f))
            .ok_or_else(overflow)
    };
    let elem = dtype.size_bytes();
    let c_in = input.channels();
    let c_out = output.channels();
    let (oh, ow) = output.spatial().unwrap_or((1, 1));
    let (kh, kw) = params.window.kernel;
    let per_group = c_in / params.group.max(1);
    let macs = [c_out, oh, ow, per_group, kh, kw]
        .iter()
        .map(|&f| f as f64)
        .product::<f64>();
    let w = &params.window;

    let mut out = Vec::with_capacity(3);
    if w.kernel == (1, 1) && w.stride == (1, 1) && w.pad == (0, 0) {
        out.push(Candidate {
            tactic: Tactic::Pointwise,
            cost: macs,
            scratch_per_sample: 0,
        });
    }
    if w.kernel == (3, 3) && w.stride == (1, 1) && w.dilation == (1, 1) && params.group == 1 {
        let transformed = product(&[oh.div_ceil(2), ow.div_ceil(2), WINOGRAD_TILE, WINOGRAD_TILE])?;
        let channels = c_in.checked_add(c_out).ok_or_else(overflow)?;
        let elements = product(&[channels, transformed])?;
        out.push(Candidate {
            tactic: Tactic::Winograd,
            cost: macs * WINOGRAD_MAC_RATIO + elements as f64,
            scratch_per_sample: product(&[elements, elem])?,
        });
    }
    let columns = product(&[per_group, kh, kw, oh, ow])?;
    out.push(Candidate {
        tactic: Tactic::Im2colGemm,
        cost: macs + columns as f64,
        scratch_per_sample: product(&[columns, elem])?,
    });
    Ok(out)
}

/// Picks the cheapest candidate that fits the workspace at `max_batch`.
///
/// Ties go to the earlier tactic, so the choice is deterministic.
pub fn select(
    layer: &str,
    candidates: &[Candidate],
    max_batch: usize,
    workspace: WorkspaceBudget,
) -> Result<Candidate, BuildError> {
    let fitting = candidates
        .iter()
        .filter(|c| workspace.fits(c.scratch_per_sample.saturating_mul(max_batch)));
    let best = fitting.fold(None::<&Candidate>, |best, c| match best {
        Some(b) if b.cost <= c.cost => Some(b),
        _ => Some(c),
    });
    match best {
        Some(c) => {
            tracing::trace!(layer, tactic = %c.tactic, cost = c.cost, "tactic selected");
            Ok(*c)
        }
        None => Err(BuildError::InsufficientWorkspace {
            layer: layer.to_string(),
            required: candidates
                .iter()
                .map(|c| c.scratch_per_sample.saturating_mul(max_batch))
                .min()
                .unwrap_or(0),
            available: workspace.as_bytes(),
        }),
    }
}

/// The single tactic for ops without alternatives.
pub fn fixed(tactic: Tactic) -> Candidate {
    Candidate::free(tactic)
}
