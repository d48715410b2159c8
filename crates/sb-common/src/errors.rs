// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Error types for the bootloader
//!
//! This module defines the unified error type used by the update controller
//! and the boot validator. All errors are `no_std` compatible and carry no
//! heap data, so they can be logged over the diagnostic UART at any point.

use core::fmt;

/// Result type alias for bootloader operations
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the bootloader
///
/// Driver-specific status codes are not part of this type; they stay in
/// `sb_hal::HalError` and are only ever printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Storage Errors (0x03xx)
    // =========================================================================
    /// Storage medium is absent or not mounted
    StorageNotMounted,
    /// Requested file does not exist
    FileNotFound,
    /// File exists but could not be opened
    FileOpenFailed,
    /// Read from an open file failed
    FileReadFailed,
    /// Renaming a file failed
    RenameFailed,
    /// A file name does not fit the name buffer
    FileNameTooLong,

    // =========================================================================
    // Update Errors (0x04xx)
    // =========================================================================
    /// Preparing flash sectors for write/erase failed
    FlashPrepareFailed,
    /// Erasing the application region failed
    FlashEraseFailed,
    /// Programming a chunk failed
    FlashProgramFailed,
    /// Programmed data did not compare equal to the source chunk
    FlashVerifyMismatch,
    /// Image does not fit in the application region
    ImageTooLarge,

    // =========================================================================
    // HAL Errors (0x08xx)
    // =========================================================================
    /// Hardware initialization failed
    HardwareInitFailed,
    /// Generic flash controller error
    FlashError,
    /// GPIO error
    GpioError,
    /// UART communication error
    UartError,

    // =========================================================================
    // Boot Errors (0x0Axx)
    // =========================================================================
    /// Reset vector is outside the application region
    InvalidEntryPoint,
    /// Flash region or boot configuration is inconsistent
    InvalidBootConfig,

    // =========================================================================
    // General Errors (0xFFxx)
    // =========================================================================
    /// Buffer is too small for operation
    BufferTooSmall,
    /// Invalid parameter provided
    InvalidParameter,
    /// Invalid state for the operation
    InvalidState,
    /// Feature not implemented on this platform
    NotImplemented,
    /// Internal error (should not occur)
    InternalError,
}

impl Error {
    /// Get the error code for this error
    ///
    /// Error codes are organized by category:
    /// - 0x03xx: Storage errors
    /// - 0x04xx: Update errors
    /// - 0x08xx: HAL errors
    /// - 0x0Axx: Boot errors
    /// - 0xFFxx: General errors
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            // Storage errors (0x03xx)
            Self::StorageNotMounted => 0x0301,
            Self::FileNotFound => 0x0302,
            Self::FileOpenFailed => 0x0303,
            Self::FileReadFailed => 0x0304,
            Self::RenameFailed => 0x0305,
            Self::FileNameTooLong => 0x0306,

            // Update errors (0x04xx)
            Self::FlashPrepareFailed => 0x0401,
            Self::FlashEraseFailed => 0x0402,
            Self::FlashProgramFailed => 0x0403,
            Self::FlashVerifyMismatch => 0x0404,
            Self::ImageTooLarge => 0x0405,

            // HAL errors (0x08xx)
            Self::HardwareInitFailed => 0x0801,
            Self::FlashError => 0x0802,
            Self::GpioError => 0x0804,
            Self::UartError => 0x0807,

            // Boot errors (0x0Axx)
            Self::InvalidEntryPoint => 0x0A01,
            Self::InvalidBootConfig => 0x0A02,

            // General errors (0xFFxx)
            Self::BufferTooSmall => 0xFF01,
            Self::InvalidParameter => 0xFF02,
            Self::InvalidState => 0xFF07,
            Self::NotImplemented => 0xFF06,
            Self::InternalError => 0xFFFF,
        }
    }

    /// Get a human-readable description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::StorageNotMounted => "storage not mounted",
            Self::FileNotFound => "file not found",
            Self::FileOpenFailed => "file open failed",
            Self::FileReadFailed => "file read failed",
            Self::RenameFailed => "file rename failed",
            Self::FileNameTooLong => "file name too long",
            Self::FlashPrepareFailed => "flash prepare failed",
            Self::FlashEraseFailed => "flash erase failed",
            Self::FlashProgramFailed => "flash program failed",
            Self::FlashVerifyMismatch => "flash verify mismatch",
            Self::ImageTooLarge => "image larger than application region",
            Self::HardwareInitFailed => "hardware initialization failed",
            Self::FlashError => "flash error",
            Self::GpioError => "GPIO error",
            Self::UartError => "UART error",
            Self::InvalidEntryPoint => "invalid application entry point",
            Self::InvalidBootConfig => "invalid boot configuration",
            Self::BufferTooSmall => "buffer too small",
            Self::InvalidParameter => "invalid parameter",
            Self::InvalidState => "invalid state",
            Self::NotImplemented => "not implemented",
            Self::InternalError => "internal error",
        }
    }

    /// Check if this error belongs to the storage category
    #[must_use]
    pub const fn is_storage_error(&self) -> bool {
        (self.code() >> 8) == 0x03
    }

    /// Check if this error belongs to the update category
    #[must_use]
    pub const fn is_update_error(&self) -> bool {
        (self.code() >> 8) == 0x04
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[0x{:04X}] {}", self.code(), self.description())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "[0x{:04X}] {}", self.code(), self.description());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(Error::FileNotFound.is_storage_error());
        assert!(Error::RenameFailed.is_storage_error());
        assert!(Error::FlashVerifyMismatch.is_update_error());
        assert!(!Error::InvalidEntryPoint.is_update_error());
        assert!(!Error::UartError.is_storage_error());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::StorageNotMounted.code(), 0x0301);
        assert_eq!(Error::FlashEraseFailed.code(), 0x0402);
        assert_eq!(Error::InvalidEntryPoint.code(), 0x0A01);
        assert_eq!(Error::InternalError.code(), 0xFFFF);
    }
}
