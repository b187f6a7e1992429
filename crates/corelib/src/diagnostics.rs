//! Diagnostics sink shared between an importer and the delegates it opens.
//!
//! Lines are recorded verbatim (without trailing newline) and forwarded to
//! the `log` facade at the matching level. `render` reproduces the classic
//! one-line-per-message text output.

use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Cheaply cloneable handle; clones append to the same buffer.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Severity::Info, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    fn push(&self, severity: Severity, message: String) {
        match severity {
            Severity::Info => log::info!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
        }
        self.entries.lock().push(Diagnostic { severity, message });
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// All lines of one severity, each terminated by `\n`.
    pub fn render(&self, severity: Severity) -> String {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.severity == severity)
            .fold(String::new(), |mut out, d| {
                out.push_str(&d.message);
                out.push('\n');
                out
            })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
