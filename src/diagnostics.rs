//! Diagnostics collection for the link pipeline.
//!
//! Every pass reports the failures and oddities it encounters through a shared
//! [`Diagnostics`] sink instead of aborting on the first problem, so a single
//! run can surface multiple actionable messages. Each [`Diagnostic`] carries an
//! optional [`Source`] (input path plus optional line) and a severity.
//!
//! The container uses `boxcar::Vec` for append-only, order-preserving storage;
//! the driver renders all entries to stderr in production order once the run
//! finishes (or aborts).
//!
//! # Usage Examples
//!
//! ```rust
//! use reslink::diagnostics::{Diagnostics, Source};
//!
//! let diag = Diagnostics::new();
//! diag.error(Source::new("res/values.arsc.flat"), "duplicate value for string/app_name");
//! diag.warn(None, "can't select products when building static library");
//!
//! assert!(diag.has_errors());
//! assert_eq!(diag.error_count(), 1);
//! ```

use std::fmt;

/// The origin of a diagnostic: an input path and an optional line number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    /// Path of the input the diagnostic refers to.
    pub path: String,
    /// 1-based line within the input, when meaningful (text inputs only).
    pub line: Option<u32>,
}

impl Source {
    /// Create a source without line information.
    pub fn new(path: impl Into<String>) -> Self {
        Source {
            path: path.into(),
            line: None,
        }
    }

    /// Create a source with a 1-based line number.
    pub fn with_line(path: impl Into<String>, line: u32) -> Self {
        Source {
            path: path.into(),
            line: Some(line),
        }
    }

    /// Return a copy of this source pointing at `line`.
    #[must_use]
    pub fn at_line(&self, line: u32) -> Self {
        Source {
            path: self.path.clone(),
            line: Some(line),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path, line),
            None => write!(f, "{}", self.path),
        }
    }
}
/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// The run will fail.
    Error,
    /// Suspicious but not fatal.
    Warning,
    /// Informational (verbose mode).
    Note,
}

/// A single collected diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: DiagnosticSeverity,
    /// Where the problem was observed, if tied to an input.
    pub source: Option<Source>,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warn",
            DiagnosticSeverity::Note => "note",
        };
        match &self.source {
            Some(src) => write!(f, "{src}: {label}: {}", self.message),
            None => write!(f, "{label}: {}", self.message),
        }
    }
}

/// Append-only, order-preserving sink for [`Diagnostic`] entries.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Diagnostics {
            entries: boxcar::Vec::new(),
        }
    }

    /// Record an error-severity diagnostic.
    pub fn error(&self, source: impl Into<Option<Source>>, message: impl Into<String>) {
        self.push(DiagnosticSeverity::Error, source.into(), message.into());
    }

    /// Record a warning-severity diagnostic.
    pub fn warn(&self, source: impl Into<Option<Source>>, message: impl Into<String>) {
        self.push(DiagnosticSeverity::Warning, source.into(), message.into());
    }

    /// Record a note-severity diagnostic.
    pub fn note(&self, source: impl Into<Option<Source>>, message: impl Into<String>) {
        self.push(DiagnosticSeverity::Note, source.into(), message.into());
    }

    fn push(&self, severity: DiagnosticSeverity, source: Option<Source>, message: String) {
        self.entries.push(Diagnostic {
            severity,
            source,
            message,
        });
    }

    /// Number of error-severity entries collected so far.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Error)
            .count()
    }

    /// True if at least one error-severity entry was collected.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Total number of entries collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.count()
    }

    /// True if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate entries in production order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_counting() {
        let diag = Diagnostics::new();
        assert!(!diag.has_errors());

        diag.note(None, "linking package 'com.app'");
        diag.warn(Source::new("res/a.xml"), "unused namespace");
        diag.error(Source::with_line("ids.txt", 3), "invalid resource ID '0xzz'");

        assert!(diag.has_errors());
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.len(), 3);
    }

    #[test]
    fn display_with_source_line() {
        let d = Diagnostic {
            severity: DiagnosticSeverity::Error,
            source: Some(Source::with_line("ids.txt", 7)),
            message: "missing '='".into(),
        };
        assert_eq!(d.to_string(), "ids.txt:7: error: missing '='");
    }
}
