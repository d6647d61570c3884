use std::sync::Mutex;

/// Process log destination for access lines and their diagnostics.
///
/// Both kinds of line go to the same sink; implementations must never
/// fail the request they are logging for.
pub trait LogSink: Send + Sync {
    fn access(&self, line: &str);

    fn diagnostic(&self, message: &str);
}

/// Emits through `tracing` on the `access` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn access(&self, line: &str) {
        tracing::info!(target: "access", "{line}");
    }

    fn diagnostic(&self, message: &str) {
        tracing::warn!(target: "access", "{message}");
    }
}

/// A line captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Access(String),
    Diagnostic(String),
}

/// Keeps every line in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lock().clone()
    }

    pub fn access_lines(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|l| match l {
                LogLine::Access(s) => Some(s.clone()),
                LogLine::Diagnostic(_) => None,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|l| match l {
                LogLine::Diagnostic(s) => Some(s.clone()),
                LogLine::Access(_) => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogLine>> {
        // A poisoned buffer is still a valid buffer.
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LogSink for MemorySink {
    fn access(&self, line: &str) {
        self.lock().push(LogLine::Access(line.to_string()));
    }

    fn diagnostic(&self, message: &str) {
        self.lock().push(LogLine::Diagnostic(message.to_string()));
    }
}
