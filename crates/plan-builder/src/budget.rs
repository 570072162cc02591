// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Workspace budget parsing.
//!
//! The workspace is the scratch memory an engine may use at run time on top
//! of its activations. Tactics whose scratch would not fit are rejected at
//! build time.

use crate::SettingsError;
use std::fmt;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// Upper bound on engine scratch memory, in bytes.
///
/// # Parsing
/// - `"16M"` or `"16MB"` → 16 × 1024² bytes
/// - `"1G"` or `"1GB"` → 1 × 1024³ bytes
/// - `"512K"` or `"512KB"` → 512 × 1024 bytes
/// - `"16777216"` → raw byte count
///
/// # Examples
/// ```
/// use plan_builder::WorkspaceBudget;
///
/// let w = WorkspaceBudget::parse("16M").unwrap();
/// assert_eq!(w.as_bytes(), 16 << 20);
/// assert_eq!(w.to_string(), "16 MB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct WorkspaceBudget {
    bytes: usize,
}

impl WorkspaceBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_mb(mb: usize) -> Self {
        Self { bytes: mb * MIB }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns `true` if `scratch` bytes fit in the budget.
    pub fn fits(&self, scratch: usize) -> bool {
        scratch <= self.bytes
    }

    /// Parses a human-readable size. Case-insensitive; zero is rejected.
    pub fn parse(s: &str) -> Result<Self, SettingsError> {
        let invalid = |detail: &str| SettingsError::InvalidWorkspace {
            value: s.to_string(),
            detail: detail.to_string(),
        };
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        const SUFFIXES: [(&str, usize); 7] = [
            ("GB", GIB),
            ("G", GIB),
            ("MB", MIB),
            ("M", MIB),
            ("KB", KIB),
            ("K", KIB),
            ("B", 1),
        ];
        let (digits, multiplier) = SUFFIXES
            .iter()
            .find(|(suffix, _)| upper.ends_with(*suffix))
            .map(|(suffix, m)| (&trimmed[..trimmed.len() - suffix.len()], *m))
            .unwrap_or((trimmed, 1));

        let value: usize = digits
            .trim()
            .parse()
            .map_err(|_| invalid("expected a number followed by an optional K, M or G suffix"))?;
        let bytes = value.checked_mul(multiplier).ok_or_else(|| invalid("size overflows"))?;
        if bytes == 0 {
            return Err(invalid("workspace must be larger than zero"));
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for WorkspaceBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bytes;
        if b >= GIB && b % GIB == 0 {
            write!(f, "{} GB", b / GIB)
        } else if b >= MIB && b % MIB == 0 {
            write!(f, "{} MB", b / MIB)
        } else if b >= KIB && b % KIB == 0 {
            write!(f, "{} KB", b / KIB)
        } else {
            write!(f, "{b} B")
        }
    }
}
