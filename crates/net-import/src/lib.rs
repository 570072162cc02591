// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # net-import
//!
//! Turns a trained model on disk into an open [`NetworkDefinition`] plus the
//! [`BlobNameToTensor`] lookup used to resolve requested outputs.
//!
//! Importers sit behind the [`Importer`] trait so the compilation driver
//! never depends on a concrete source format:
//!
//! - [`CaffeImporter`]: deploy `.prototxt` (protobuf text format) and
//!   `.caffemodel` weights (protobuf wire format, memory mapped).
//! - [`UffImporter`]: accepted but not implemented.
//!
//! # Example
//! ```
//! use net_import::{CaffeImporter, CaffeWeights, TextMessage};
//!
//! let deploy = TextMessage::parse(r#"
//!     input: "data"
//!     input_dim: 1 input_dim: 3 input_dim: 8 input_dim: 8
//!     layer { name: "prob" type: "Softmax" bottom: "data" top: "prob" }
//! "#).unwrap();
//! let imported = CaffeImporter::new().build(&deploy, CaffeWeights::default()).unwrap();
//! assert!(imported.blobs.find("prob").is_some());
//! ```

mod caffe;
mod caffemodel;
mod error;
mod proto;
pub mod prototxt;
mod uff;

pub use caffe::CaffeImporter;
pub use caffemodel::CaffeWeights;
pub use error::ImportError;
pub use prototxt::TextMessage;
pub use uff::UffImporter;

use network_ir::{BlobNameToTensor, NetworkDefinition, Open};
use std::fmt;
use std::path::Path;

/// Model source formats known to the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    Caffe,
    Uff,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Caffe => "caffe",
            SourceFormat::Uff => "uff",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an importer hands back: the graph, still open for output marking,
/// and the name lookup over its blobs.
#[derive(Debug)]
pub struct ImportedNetwork {
    pub network: NetworkDefinition<Open>,
    pub blobs: BlobNameToTensor,
}

/// Reads a model description and its weights into a network definition.
pub trait Importer {
    fn format(&self) -> SourceFormat;

    fn import(&self, description: &Path, weights: &Path) -> Result<ImportedNetwork, ImportError>;
}

/// Returns the importer for a source format.
pub fn importer_for(format: SourceFormat) -> Box<dyn Importer> {
    match format {
        SourceFormat::Caffe => Box::new(CaffeImporter::new()),
        SourceFormat::Uff => Box::new(UffImporter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_importer_for_format() {
        assert_eq!(importer_for(SourceFormat::Caffe).format(), SourceFormat::Caffe);
        assert_eq!(importer_for(SourceFormat::Uff).format(), SourceFormat::Uff);
        assert_eq!(SourceFormat::Uff.to_string(), "uff");
    }
}
