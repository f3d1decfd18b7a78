//! Events delivered from the worker to the consumer.

use std::fmt;

use chrono::{DateTime, Local};
use passwall_service::{AddressResult, ServiceState};

/// Timestamp format used by [`LogLine::render`].
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity of a user-facing log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped line for the log view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub text: String,
}

impl LogLine {
    pub fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            text: text.into(),
        }
    }

    /// Renders `[timestamp] LEVEL: text`. Continuation lines of multi-line
    /// text are indented to align under the first line's text.
    pub fn render(&self) -> String {
        let prefix = format!("[{}] ", self.timestamp.format(TIMESTAMP_FORMAT));
        let indent = " ".repeat(prefix.len());
        let mut out = String::new();
        for (i, line) in self.text.lines().enumerate() {
            if i == 0 {
                out.push_str(&prefix);
                out.push_str(self.level.as_str());
                out.push_str(": ");
            } else {
                out.push('\n');
                out.push_str(&indent);
            }
            out.push_str(line);
        }
        if out.is_empty() {
            out = format!("{prefix}{}:", self.level.as_str());
        }
        out
    }
}

/// What the worker reports to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEvent {
    /// First status result, or a status different from the previous one.
    StatusChanged(ServiceState),
    /// First address result, or an address different from the previous one.
    AddressChanged(AddressResult),
    /// Every attempt and outcome.
    Log(LogLine),
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at_noon(level: LogLevel, text: &str) -> LogLine {
        LogLine {
            timestamp: Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            level,
            text: text.into(),
        }
    }

    #[test]
    fn render_single_line() {
        let line = at_noon(LogLevel::Success, "service is ACTIVE");
        assert_eq!(line.render(), "[2024-05-01 12:00:00] SUCCESS: service is ACTIVE");
    }

    #[test]
    fn render_aligns_continuation_lines() {
        let line = at_noon(LogLevel::Error, "command failed\nstderr: not found");
        let rendered = line.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[2024-05-01 12:00:00] ERROR: command failed");
        assert_eq!(lines[1], format!("{}stderr: not found", " ".repeat(22)));
    }

    #[test]
    fn render_empty_text() {
        let line = at_noon(LogLevel::Info, "");
        assert_eq!(line.render(), "[2024-05-01 12:00:00] INFO:");
    }

    #[test]
    fn new_uses_current_time() {
        let before = Local::now();
        let line = LogLine::new(LogLevel::Warning, "slow");
        assert!(line.timestamp >= before);
        assert_eq!(line.level.to_string(), "WARNING");
    }
}
