//! Parser diagnostics.
//!
//! Every anomaly the parser or importer tolerates becomes a [`Diagnostic`].
//! Diagnostics are logged through `tracing` the moment they are raised and
//! also kept in a list returned with the document, so callers can forward
//! them to a console with [`Diagnostics::report`] or assert on them in tests.

use std::fmt;

use sim_types::{LogSink, Severity};

use crate::keyword::Keyword;

/// One message attached to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Gravity of the anomaly.
    pub severity: Severity,
    /// 1-based line number, 0 when not tied to a line.
    pub line: usize,
    /// Section that was current when the line was read.
    pub section: Option<Keyword>,
    /// Keyword of the line itself, when it was a directive.
    pub keyword: Option<Keyword>,
    /// Human readable text.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        let section = self.keyword.or(self.section).map_or("none", Keyword::as_str);
        write!(f, "{label} (line {} '{section}'): {}", self.line, self.message)
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log a diagnostic.
    pub fn push(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Info => tracing::debug!("{diag}"),
            Severity::Warning => tracing::warn!("{diag}"),
            Severity::Error | Severity::Fatal => tracing::error!("{diag}"),
        }
        self.items.push(diag);
    }

    /// All diagnostics in the order raised.
    #[must_use]
    pub fn all(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Diagnostics of exactly `severity`.
    pub fn of(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.severity == severity)
    }

    /// Number of diagnostics of exactly `severity`.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.of(severity).count()
    }

    /// First fatal diagnostic, if any.
    #[must_use]
    pub fn first_fatal(&self) -> Option<&Diagnostic> {
        self.of(Severity::Fatal).next()
    }

    /// True when some message contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.items.iter().any(|d| d.message.contains(needle))
    }

    /// Forward every diagnostic to a console sink.
    pub fn report(&self, sink: &dyn LogSink) {
        for diag in &self.items {
            sink.log(diag.severity, &diag.to_string());
        }
    }

    /// Number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<(Severity, String)>>);

    impl LogSink for Capture {
        fn log(&self, severity: Severity, message: &str) {
            if let Ok(mut v) = self.0.lock() {
                v.push((severity, message.to_owned()));
            }
        }
    }

    fn warn(line: usize, msg: &str) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            line,
            section: Some(Keyword::Beams),
            keyword: None,
            message: msg.to_owned(),
        }
    }

    #[test]
    fn display_names_section() {
        assert_eq!(
            warn(4, "Ignoring invalid node option 'c'").to_string(),
            "WARNING (line 4 'beams'): Ignoring invalid node option 'c'"
        );
    }

    #[test]
    fn report_forwards_in_order() {
        let mut diags = Diagnostics::new();
        diags.push(warn(1, "a"));
        diags.push(Diagnostic {
            severity: Severity::Fatal,
            ..warn(2, "b")
        });
        let sink = Capture::default();
        diags.report(&sink);
        let got = sink.0.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].0, Severity::Fatal);
        assert_eq!(diags.count(Severity::Warning), 1);
        assert_eq!(diags.first_fatal().map(|d| d.line), Some(2));
    }
}
