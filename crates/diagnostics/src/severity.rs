// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Diagnostic severities.

use std::fmt;

/// How important a diagnostic is, most severe first.
///
/// The ordering follows declaration order, so `InternalError < Info` and a
/// threshold of `Progress` admits everything except `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// A bug in the compiler itself.
    InternalError,
    /// A failure that affects the result of the run.
    Error,
    /// Something suspicious that does not stop the run.
    Warning,
    /// Pipeline milestones ("building engine", "retrieved output ...").
    Progress,
    /// Detail useful only when investigating a run. Hidden by default.
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::InternalError => "internal error",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Progress => "progress",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Severity::InternalError < Severity::Error);
        assert!(Severity::Warning < Severity::Progress);
        assert!(Severity::Progress < Severity::Info);
    }
}
