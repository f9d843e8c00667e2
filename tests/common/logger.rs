//! Test logging infrastructure for structured test output and debugging.
#![allow(dead_code)]
//!
//! `TestLogger` writes phase-tagged lines to stderr (or JSON lines when
//! `TEST_LOG_JSON` is set) so failing pipeline tests show where they
//! stopped.
//!
//! # Environment Variables
//!
//! - `TEST_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! - `TEST_LOG_JSON` - "1" or "true" for JSON output
//! - `NO_COLOR` - disable colored output

use std::cell::RefCell;
use std::env;
use std::fmt::Display;
use std::sync::OnceLock;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::log_capture::TestLogCapture;

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "err" => Some(Self::Error),
            _ => None,
        }
    }

    const fn color_code(self) -> &'static str {
        match self {
            Self::Trace => "\x1b[90m",
            Self::Debug => "\x1b[36m",
            Self::Info => "\x1b[32m",
            Self::Warn => "\x1b[33m",
            Self::Error => "\x1b[31m",
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.pad(s)
    }
}

/// Structured log entry for JSON output mode.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub test: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<&'a str>,
    pub elapsed_ms: u64,
}

fn min_level() -> LogLevel {
    static LEVEL: OnceLock<LogLevel> = OnceLock::new();
    *LEVEL.get_or_init(|| {
        env::var("TEST_LOG_LEVEL")
            .ok()
            .and_then(|s| LogLevel::parse(&s))
            .unwrap_or(LogLevel::Info)
    })
}

fn json_mode() -> bool {
    static JSON: OnceLock<bool> = OnceLock::new();
    *JSON.get_or_init(|| {
        env::var("TEST_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    })
}

fn use_color() -> bool {
    env::var("NO_COLOR").is_err()
}

/// Per-test logger with phase and duration tracking.
pub struct TestLogger {
    name: String,
    started: Instant,
    phase: RefCell<Option<String>>,
}

impl TestLogger {
    #[must_use]
    pub fn new(test_name: &str) -> Self {
        let logger = Self {
            name: test_name.to_string(),
            started: Instant::now(),
            phase: RefCell::new(None),
        };
        logger.debug("start");
        logger
    }

    /// Logger plus a `tracing` capture for the current thread.
    #[must_use]
    pub fn with_capture(test_name: &str) -> (Self, TestLogCapture) {
        let capture = TestLogCapture::start();
        (Self::new(test_name), capture)
    }

    pub fn phase(&self, phase: &str) {
        *self.phase.borrow_mut() = Some(phase.to_string());
        self.log(LogLevel::Debug, &format!("phase: {phase}"));
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Record an outbound call made against a mock.
    pub fn http_request(&self, method: &str, url: &str) {
        self.log(LogLevel::Debug, &format!("{method} {url}"));
    }

    pub fn finish_ok(&self) {
        self.log(LogLevel::Info, &format!("ok in {}ms", self.elapsed_ms()));
    }

    pub fn finish_err(&self, reason: &str) {
        self.log(LogLevel::Error, &format!("failed: {reason}"));
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn log(&self, level: LogLevel, message: &str) {
        if level < min_level() {
            return;
        }
        let phase = self.phase.borrow();
        if json_mode() {
            let entry = LogEntry {
                timestamp: Utc::now(),
                level,
                test: &self.name,
                message,
                phase: phase.as_deref(),
                elapsed_ms: self.elapsed_ms(),
            };
            if let Ok(line) = serde_json::to_string(&entry) {
                eprintln!("{line}");
            }
            return;
        }
        let tag = phase.as_deref().map_or_else(String::new, |p| format!("[{p}] "));
        if use_color() {
            eprintln!(
                "{}{level:<5}\x1b[0m {} {tag}{message}",
                level.color_code(),
                self.name
            );
        } else {
            eprintln!("{level:<5} {} {tag}{message}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_and_order() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("nope"), None);
        assert!(LogLevel::Trace < LogLevel::Error);
    }

    #[test]
    fn entry_serializes_level_uppercase() {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            test: "t",
            message: "m",
            phase: None,
            elapsed_ms: 3,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"INFO\""));
        assert!(!json.contains("phase"));
    }
}
