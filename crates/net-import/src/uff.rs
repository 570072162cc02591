// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! UFF importer.
//!
//! The format is recognised on the command line, but there is no parser for
//! it yet; every import fails with [`ImportError::Unimplemented`].

use crate::{ImportError, ImportedNetwork, Importer, SourceFormat};
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct UffImporter;

impl UffImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Importer for UffImporter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Uff
    }

    fn import(&self, description: &Path, _weights: &Path) -> Result<ImportedNetwork, ImportError> {
        tracing::warn!(description = %description.display(), "uff import requested");
        Err(ImportError::Unimplemented(SourceFormat::Uff))
    }
}
