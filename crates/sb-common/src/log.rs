// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Logging infrastructure for the bootloader
//!
//! Every component logs through the [`LogSink`] trait. On hardware the sink
//! is the diagnostic UART console; on the host the [`LogBuffer`] ring keeps
//! the most recent entries so behaviour can be inspected afterwards.
//!
//! Log output is informational only. Nothing in the boot flow branches on
//! what was logged.

use core::fmt::{self, Write};
use heapless::String;

/// Maximum log message length
pub const MAX_LOG_MESSAGE_LEN: usize = 128;

/// Log buffer size (number of entries)
pub const LOG_BUFFER_SIZE: usize = 64;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Errors that require immediate attention
    Error = 0,
    /// Warnings about potential issues
    Warn = 1,
    /// Informational messages
    Info = 2,
    /// Debug messages (development only)
    Debug = 3,
    /// Trace messages (very verbose, development only)
    Trace = 4,
}

impl LogLevel {
    /// Get the log level name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }

    /// Get a short prefix for the log level
    #[must_use]
    pub const fn prefix(&self) -> char {
        match self {
            Self::Error => 'E',
            Self::Warn => 'W',
            Self::Info => 'I',
            Self::Debug => 'D',
            Self::Trace => 'T',
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Destination for log records
pub trait LogSink {
    /// Record a message at `level` on behalf of `module`
    fn log(&mut self, level: LogLevel, module: &'static str, args: fmt::Arguments<'_>);
}

impl<S: LogSink + ?Sized> LogSink for &mut S {
    fn log(&mut self, level: LogLevel, module: &'static str, args: fmt::Arguments<'_>) {
        (**self).log(level, module, args);
    }
}

/// Log entry structure
#[derive(Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Monotonic sequence number within this boot
    pub sequence: u32,
    /// Module/component name
    pub module: &'static str,
    /// Log message (truncated to `MAX_LOG_MESSAGE_LEN`)
    pub message: String<MAX_LOG_MESSAGE_LEN>,
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:04}] {} [{}] {}",
            self.sequence,
            self.level.prefix(),
            self.module,
            self.message
        )
    }
}

/// Circular log buffer
pub struct LogBuffer {
    entries: [Option<LogEntry>; LOG_BUFFER_SIZE],
    write_index: usize,
    count: usize,
    next_sequence: u32,
    min_level: LogLevel,
}

impl LogBuffer {
    /// Create a new empty log buffer
    #[must_use]
    pub const fn new() -> Self {
        const NONE: Option<LogEntry> = None;
        Self {
            entries: [NONE; LOG_BUFFER_SIZE],
            write_index: 0,
            count: 0,
            next_sequence: 0,
            min_level: LogLevel::Info,
        }
    }

    /// Set the minimum log level
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Get the minimum log level
    #[must_use]
    pub const fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Check if a log level should be recorded
    #[must_use]
    pub const fn should_log(&self, level: LogLevel) -> bool {
        (level as u8) <= (self.min_level as u8)
    }

    /// Get the number of entries
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Check if buffer is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = None;
        }
        self.write_index = 0;
        self.count = 0;
    }

    /// Iterate over entries (oldest first)
    pub fn iter(&self) -> LogBufferIter<'_> {
        LogBufferIter {
            buffer: self,
            index: 0,
            remaining: self.count,
        }
    }

    /// Count entries at `level` whose message contains `needle`
    #[must_use]
    pub fn count_matching(&self, level: LogLevel, needle: &str) -> usize {
        self.iter()
            .filter(|e| e.level == level && e.message.contains(needle))
            .count()
    }

    fn push(&mut self, entry: LogEntry) {
        self.entries[self.write_index] = Some(entry);
        self.write_index = (self.write_index + 1) % LOG_BUFFER_SIZE;
        if self.count < LOG_BUFFER_SIZE {
            self.count += 1;
        }
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for LogBuffer {
    fn log(&mut self, level: LogLevel, module: &'static str, args: fmt::Arguments<'_>) {
        if !self.should_log(level) {
            return;
        }

        // Formatting stops at the first fragment that does not fit
        let mut message = String::<MAX_LOG_MESSAGE_LEN>::new();
        let _ = message.write_fmt(args);

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.push(LogEntry {
            level,
            sequence,
            module,
            message,
        });
    }
}

/// Iterator over log buffer entries
pub struct LogBufferIter<'a> {
    buffer: &'a LogBuffer,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for LogBufferIter<'a> {
    type Item = &'a LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let start_index = if self.buffer.count < LOG_BUFFER_SIZE {
            0
        } else {
            self.buffer.write_index
        };

        let actual_index = (start_index + self.index) % LOG_BUFFER_SIZE;
        self.index += 1;
        self.remaining -= 1;

        self.buffer.entries[actual_index].as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($sink:expr, $module:expr, $($arg:tt)*) => {
        $crate::log::LogSink::log(&mut $sink, $crate::log::LogLevel::Error, $module, format_args!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($sink:expr, $module:expr, $($arg:tt)*) => {
        $crate::log::LogSink::log(&mut $sink, $crate::log::LogLevel::Warn, $module, format_args!($($arg)*))
    };
}

/// Log an informational message
#[macro_export]
macro_rules! log_info {
    ($sink:expr, $module:expr, $($arg:tt)*) => {
        $crate::log::LogSink::log(&mut $sink, $crate::log::LogLevel::Info, $module, format_args!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($sink:expr, $module:expr, $($arg:tt)*) => {
        $crate::log::LogSink::log(&mut $sink, $crate::log::LogLevel::Debug, $module, format_args!($($arg)*))
    };
}

/// Log a trace-level message
#[macro_export]
macro_rules! log_trace {
    ($sink:expr, $module:expr, $($arg:tt)*) => {
        $crate::log::LogSink::log(&mut $sink, $crate::log::LogLevel::Trace, $module, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        let mut log = LogBuffer::new();
        log_debug!(log, "test", "hidden {}", 1);
        assert!(log.is_empty());

        log.set_min_level(LogLevel::Debug);
        log_debug!(log, "test", "shown {}", 2);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_ring_wraps_oldest_first() {
        let mut log = LogBuffer::new();
        for i in 0..(LOG_BUFFER_SIZE + 3) {
            log_info!(log, "test", "entry {}", i);
        }
        assert_eq!(log.len(), LOG_BUFFER_SIZE);

        let first = log.iter().next().map(|e| e.sequence);
        assert_eq!(first, Some(3));
        let last = log.iter().last().map(|e| e.sequence);
        assert_eq!(last, Some((LOG_BUFFER_SIZE + 2) as u32));
    }

    #[test]
    fn test_message_truncated() {
        let mut log = LogBuffer::new();
        let long = [b'x'; MAX_LOG_MESSAGE_LEN + 40];
        let long = core::str::from_utf8(&long).unwrap();
        log_error!(log, "test", "{}", long);
        log_error!(log, "test", "status {}: {}", 9, long);

        // A fragment that does not fit is dropped whole, along with the rest
        let mut entries = log.iter();
        assert_eq!(entries.next().unwrap().message.as_str(), "");
        assert_eq!(entries.next().unwrap().message.as_str(), "status 9: ");
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_macro_through_mut_reference() {
        let mut log = LogBuffer::new();
        {
            let sink: &mut LogBuffer = &mut log;
            log_warn!(*sink, "test", "via reference");
        }
        assert_eq!(log.count_matching(LogLevel::Warn, "via reference"), 1);
    }
}
