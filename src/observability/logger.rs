//! Structured JSON logger
//!
//! - One log line = one event
//! - Keys in deterministic order: `event`, `severity`, then fields sorted
//! - Synchronous, no buffering
//!
//! The logger is a value built once at startup and handed to every
//! component that logs. There is no process-wide switch.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use super::events::Event;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-document detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable, run aborts
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
enum Sink {
    /// INFO and below to stdout, WARN and above to stderr
    Stdio,
    /// Captured lines, for tests
    Memory(Mutex<Vec<String>>),
    /// Drop everything
    Disabled,
}

#[derive(Debug)]
struct Inner {
    threshold: Severity,
    sink: Sink,
}

/// Structured logger handle; clones share the same sink
#[derive(Debug, Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl Logger {
    fn with_sink(threshold: Severity, sink: Sink) -> Self {
        Self {
            inner: Arc::new(Inner { threshold, sink }),
        }
    }

    /// Log to stdout/stderr, dropping events below `threshold`
    pub fn stdio(threshold: Severity) -> Self {
        Self::with_sink(threshold, Sink::Stdio)
    }

    /// Capture every event in memory
    pub fn memory() -> Self {
        Self::with_sink(Severity::Trace, Sink::Memory(Mutex::new(Vec::new())))
    }

    /// Discard every event
    pub fn disabled() -> Self {
        Self::with_sink(Severity::Fatal, Sink::Disabled)
    }

    /// Whether an event of this severity would be emitted
    pub fn enabled(&self, severity: Severity) -> bool {
        !matches!(self.inner.sink, Sink::Disabled) && severity >= self.inner.threshold
    }

    /// Log an event with the given severity and fields
    pub fn log(&self, severity: Severity, event: Event, fields: &[(&str, &str)]) {
        if !self.enabled(severity) {
            return;
        }

        let line = format_line(severity, event.as_str(), fields);
        match &self.inner.sink {
            Sink::Stdio if severity >= Severity::Warn => write_line(&mut io::stderr(), &line),
            Sink::Stdio => write_line(&mut io::stdout(), &line),
            Sink::Memory(lines) => {
                if let Ok(mut lines) = lines.lock() {
                    lines.push(line);
                }
            }
            Sink::Disabled => {}
        }
    }

    /// Log at TRACE level
    pub fn trace(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Trace, event, fields);
    }

    /// Log at INFO level
    pub fn info(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Info, event, fields);
    }

    /// Log at WARN level
    pub fn warn(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Warn, event, fields);
    }

    /// Log at ERROR level
    pub fn error(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Error, event, fields);
    }

    /// Log at FATAL level
    pub fn fatal(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Fatal, event, fields);
    }

    /// Captured lines (empty unless built with `memory()`)
    pub fn lines(&self) -> Vec<String> {
        match &self.inner.sink {
            Sink::Memory(lines) => lines.lock().map(|l| l.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Captured lines whose event matches
    pub fn lines_for(&self, event: Event) -> Vec<String> {
        let needle = format!("{{\"event\":\"{}\"", event.as_str());
        self.lines()
            .into_iter()
            .filter(|l| l.starts_with(&needle))
            .collect()
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) {
    // One write per event
    let _ = writer.write_all(line.as_bytes());
    let _ = writer.flush();
}

fn format_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(256);

    output.push('{');

    output.push_str("\"event\":\"");
    escape_json_string(&mut output, event);
    output.push('"');

    output.push_str(",\"severity\":\"");
    output.push_str(severity.as_str());
    output.push('"');

    let mut sorted_fields: Vec<_> = fields.iter().collect();
    sorted_fields.sort_by_key(|(k, _)| *k);

    for (key, value) in sorted_fields {
        output.push_str(",\"");
        escape_json_string(&mut output, key);
        output.push_str("\":\"");
        escape_json_string(&mut output, value);
        output.push('"');
    }

    output.push('}');
    output.push('\n');
    output
}

fn escape_json_string(output: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => {
                output.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => output.push(c),
        }
    }
}
