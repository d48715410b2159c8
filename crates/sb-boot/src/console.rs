// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Diagnostic console on the bootloader UART
//!
//! Log records are written as `E [module] message` lines terminated with
//! CRLF. Output is best effort: a UART error drops the rest of the record.
//!
//! The console owns the UART. [`Console::quiesce`] consumes it, so nothing
//! can be printed once the UART has been handed back to its reset state.

use core::fmt;

use sb_common::log::{LogLevel, LogSink};
use sb_hal::UartInterface;

/// UART-backed log sink
pub struct Console<U: UartInterface> {
    uart: U,
    min_level: LogLevel,
}

impl<U: UartInterface> Console<U> {
    /// Wrap an initialized UART
    pub const fn new(uart: U) -> Self {
        Self {
            uart,
            min_level: LogLevel::Info,
        }
    }

    /// Set the most verbose level that is printed
    pub fn set_min_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Most verbose level that is printed
    #[must_use]
    pub const fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Wait until every queued byte has left the UART
    pub fn flush(&mut self) {
        let _ = self.uart.flush();
    }

    /// Drain and release the UART
    pub fn quiesce(mut self) {
        let _ = self.uart.flush();
        self.uart.deinit();
    }
}

impl<U: UartInterface> fmt::Write for Console<U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.uart.write(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

impl<U: UartInterface> LogSink for Console<U> {
    fn log(&mut self, level: LogLevel, module: &'static str, args: fmt::Arguments<'_>) {
        if level > self.min_level {
            return;
        }
        let _ = fmt::Write::write_fmt(
            self,
            format_args!("{} [{}] {}\r\n", level.prefix(), module, args),
        );
    }
}
