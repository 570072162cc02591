// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Artifact naming and writing.
//!
//! An artifact is named `<weights-path>.<max-batch-size>.tensorcache`, with
//! the weights path exactly as the user gave it, and is resolved against
//! the writer's base directory.

use crate::ArtifactError;
use std::ffi::OsString;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Fixed suffix of every artifact file.
pub const ARTIFACT_SUFFIX: &str = "tensorcache";

/// Artifact file name derived from model identity and batch size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFileName(PathBuf);

impl CacheFileName {
    pub fn new(weights: &Path, max_batch_size: usize) -> Self {
        let mut name = OsString::from(weights.as_os_str());
        name.push(format!(".{max_batch_size}.{ARTIFACT_SUFFIX}"));
        Self(PathBuf::from(name))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CacheFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Writes artifacts below a base directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    base_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// A writer rooted at the process's working directory.
    pub fn in_current_dir() -> Result<Self, ArtifactError> {
        std::env::current_dir()
            .map(Self::new)
            .map_err(ArtifactError::CurrentDir)
    }

    /// Where `name` will be written. Absolute names ignore the base.
    pub fn target(&self, name: &CacheFileName) -> PathBuf {
        self.base_dir.join(name.as_path())
    }

    /// Writes `bytes` in full, replacing any existing file. The bytes go to
    /// a sibling `.partial` file that is synced and then renamed over the
    /// target, so a failed write never leaves a truncated artifact. Returns
    /// the written path.
    pub fn write(&self, bytes: &[u8], name: &CacheFileName) -> Result<PathBuf, ArtifactError> {
        let path = self.target(name);
        let partial = partial_path(&path);
        if let Err(err) = write_synced(&partial, bytes).and_then(|()| {
            std::fs::rename(&partial, &path).map_err(|source| ArtifactError::Write {
                path: path.clone(),
                source,
            })
        }) {
            let _ = std::fs::remove_file(&partial);
            return Err(err);
        }
        tracing::info!("wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let mut file = std::fs::File::create(path).map_err(|source| ArtifactError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let write_err = |source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    };
    file.write_all(bytes).map_err(write_err)?;
    file.flush().map_err(write_err)?;
    file.sync_all().map_err(write_err)
}
