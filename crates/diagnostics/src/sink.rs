// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Diagnostic sinks: the console sink used by the CLI and a capturing sink
//! for tests.

use crate::Severity;
use std::io::Write;
use std::sync::Mutex;

/// Prefix printed in front of every console diagnostic.
pub const LOG_PREFIX: &str = "[GIE]  ";

/// Receives severity-tagged messages from every pipeline stage.
///
/// Implementations must never fail: a diagnostic that cannot be delivered is
/// dropped silently.
pub trait DiagnosticsSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

/// Prints diagnostics to standard output, one line per message, each
/// prefixed with [`LOG_PREFIX`].
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    /// Least severe level still printed.
    threshold: Severity,
}

impl ConsoleSink {
    /// Creates a sink that hides [`Severity::Info`].
    pub fn new() -> Self {
        Self {
            threshold: Severity::Progress,
        }
    }

    /// Creates a sink that prints everything up to and including `threshold`.
    pub fn with_threshold(threshold: Severity) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    /// Returns `true` if messages of `severity` are printed.
    pub fn enabled(&self, severity: Severity) -> bool {
        severity <= self.threshold
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsSink for ConsoleSink {
    fn log(&self, severity: Severity, message: &str) {
        if !self.enabled(severity) {
            return;
        }
        // Locked and flushed per line so output is never held back.
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{LOG_PREFIX}{message}");
        let _ = out.flush();
    }
}

/// Records every diagnostic in memory, regardless of severity.
#[derive(Debug, Default)]
pub struct CaptureSink {
    records: Mutex<Vec<(Severity, String)>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything logged so far, in order.
    pub fn records(&self) -> Vec<(Severity, String)> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Messages logged at exactly `severity`.
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m)
            .collect()
    }

    /// Returns `true` if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records().iter().any(|(_, m)| m.contains(needle))
    }
}

impl DiagnosticsSink for CaptureSink {
    fn log(&self, severity: Severity, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push((severity, message.to_string()));
        }
    }
}
