//! Diagnostic sinks.
//!
//! Probes and reports write human-facing diagnostics through an injected
//! [`DiagnosticSink`] instead of a process-wide logger, so a caller can silence
//! or capture one probe without affecting anything else.

use console::style;
use std::sync::{Arc, Mutex, PoisonError};

/// Severity of a diagnostic line, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Plain progress output
    Normal,
    /// A dependency became ready
    Success,
    /// Suspicious but not failing (e.g. loopback public URL)
    Warning,
    /// A dependency is not ready
    Error,
}

/// Write-only, fire-and-forget diagnostic channel.
pub trait DiagnosticSink: Send + Sync {
    /// Emits one line.
    fn emit(&self, severity: Severity, message: &str);
}

/// Shared sink handle passed to probes and the checker.
pub type SharedSink = Arc<dyn DiagnosticSink>;

/// Routes diagnostics into `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Normal | Severity::Success => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
    }
}

/// Prints diagnostics to the terminal, colored by severity.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    colored: bool,
    min_severity: Severity,
}

impl ConsoleSink {
    /// Creates a console sink; `colored` is ignored when stdout is not a tty.
    pub fn new(colored: bool) -> Self {
        Self {
            colored: colored && console::colors_enabled(),
            min_severity: Severity::Normal,
        }
    }

    /// Builder method that drops everything below `Error` when `quiet` is set.
    #[must_use]
    pub const fn with_quiet(mut self, quiet: bool) -> Self {
        if quiet {
            self.min_severity = Severity::Error;
        }
        self
    }

    /// Whether a line of this severity is printed.
    pub fn shows(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }

    /// Formats a line as it would be printed.
    pub fn render(&self, severity: Severity, message: &str) -> String {
        if !self.colored {
            return message.to_string();
        }
        match severity {
            Severity::Normal => message.to_string(),
            Severity::Success => style(message).green().to_string(),
            Severity::Warning => style(message).yellow().to_string(),
            Severity::Error => style(message).red().to_string(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DiagnosticSink for ConsoleSink {
    fn emit(&self, severity: Severity, message: &str) {
        if !self.shows(severity) {
            return;
        }
        let line = self.render(severity, message);
        let term = match severity {
            Severity::Error | Severity::Warning => console::Term::stderr(),
            Severity::Normal | Severity::Success => console::Term::stdout(),
        };
        if let Err(e) = term.write_line(&line) {
            tracing::debug!("Failed to write diagnostic line: {}", e);
        }
    }
}

/// Captures diagnostics in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured lines in emission order.
    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured lines with the given severity.
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, message)| message)
            .collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, severity: Severity, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((severity, message.to_string()));
    }
}
