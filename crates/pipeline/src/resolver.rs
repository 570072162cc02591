// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Output resolution: requested names to marked network outputs.

use diagnostics::{DiagnosticsSink, Severity};
use network_ir::{BlobNameToTensor, NetworkDefinition, Open, TensorHandle};

/// A requested output name and the tensor it resolved to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBinding {
    pub name: String,
    pub tensor: Option<TensorHandle>,
}

impl OutputBinding {
    pub fn is_resolved(&self) -> bool {
        self.tensor.is_some()
    }
}

/// Looks up each name, in order, and marks every hit as a network output.
///
/// Unknown names yield an unresolved binding and an error diagnostic; they
/// never stop resolution of the remaining names. Marking the same tensor
/// twice has no further effect.
pub fn resolve_outputs(
    outputs: &[String],
    blobs: &BlobNameToTensor,
    network: &mut NetworkDefinition<Open>,
    sink: &dyn DiagnosticsSink,
) -> Vec<OutputBinding> {
    outputs
        .iter()
        .map(|name| {
            let tensor = blobs.find(name).and_then(|h| match network.mark_output(h) {
                Ok(_) => Some(h),
                Err(e) => {
                    tracing::warn!("cannot mark '{name}' as output: {e}");
                    None
                }
            });
            match tensor {
                Some(h) => {
                    let tensor_name = network.tensor(h).map_or(name.as_str(), |t| t.name.as_str());
                    sink.log(Severity::Progress, &format!("retrieved output tensor '{tensor_name}'"));
                }
                None => {
                    sink.log(Severity::Error, &format!("failed to retrieve tensor for output '{name}'"));
                }
            }
            OutputBinding {
                name: name.clone(),
                tensor,
            }
        })
        .collect()
}
