// SPDX-License-Identifier: MIT OR Apache-2.0
//! Diagnostics reporting.
//!
//! The codec only needs to push human-readable messages somewhere. Hosts
//! decide whether they end up in a log, a notification or a test assertion.

/// Message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Progress information
    Info,
    /// Something was skipped or substituted
    Warning,
    /// Something failed to import
    Error,
}

/// A reported message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity of the message
    pub severity: Severity,
    /// Message text
    pub message: String,
}

/// Sink for diagnostics
pub trait DiagnosticSink {
    /// Report a message
    fn report(&mut self, severity: Severity, message: &str);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for &mut T {
    fn report(&mut self, severity: Severity, message: &str) {
        (**self).report(severity, message);
    }
}

/// Default sink: forwards to `tracing` and keeps every message
#[derive(Debug, Default, Clone)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded diagnostics in report order
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Recorded diagnostics at or above a severity
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity >= severity)
    }

    /// Whether any message contains the given text
    pub fn contains(&self, text: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(text))
    }

    /// Take all recorded diagnostics
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn report(&mut self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
        self.entries.push(Diagnostic {
            severity,
            message: message.to_string(),
        });
    }
}
