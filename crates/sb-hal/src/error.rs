// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL error types
//!
//! Flash and filesystem failures keep the raw status code reported by the
//! underlying driver (IAP return code, FatFs `FRESULT`). The bootloader never
//! interprets these codes; it only prints them.

use core::fmt;

/// HAL error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Hardware not initialized
    NotInitialized,
    /// Hardware initialization failed
    InitFailed,
    /// IAP "prepare sectors" returned a non-zero status
    FlashPrepareFailed(u32),
    /// IAP "erase sectors" returned a non-zero status
    FlashEraseFailed(u32),
    /// IAP "copy RAM to flash" returned a non-zero status
    FlashWriteFailed(u32),
    /// IAP "compare" returned a non-zero status
    FlashVerifyFailed(u32),
    /// Flash address out of bounds
    FlashOutOfBounds,
    /// Storage medium is absent or not mounted
    StorageNotMounted,
    /// File does not exist
    FileNotFound,
    /// Opening a file failed with the given filesystem status
    FileOpenFailed(u32),
    /// Reading a file failed with the given filesystem status
    FileReadFailed(u32),
    /// Renaming a file failed with the given filesystem status
    FileRenameFailed(u32),
    /// File name cannot be represented by the filesystem
    InvalidFileName,
    /// UART error
    UartError,
    /// GPIO error
    GpioError,
    /// Invalid parameter
    InvalidParameter,
    /// Operation not supported
    NotSupported,
}

impl HalError {
    /// Get error code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::NotInitialized => 0x0801,
            Self::InitFailed => 0x0802,
            Self::FlashPrepareFailed(_) => 0x0810,
            Self::FlashEraseFailed(_) => 0x0811,
            Self::FlashWriteFailed(_) => 0x0812,
            Self::FlashVerifyFailed(_) => 0x0813,
            Self::FlashOutOfBounds => 0x0814,
            Self::StorageNotMounted => 0x0820,
            Self::FileNotFound => 0x0821,
            Self::FileOpenFailed(_) => 0x0822,
            Self::FileReadFailed(_) => 0x0823,
            Self::FileRenameFailed(_) => 0x0824,
            Self::InvalidFileName => 0x0825,
            Self::UartError => 0x0870,
            Self::GpioError => 0x0840,
            Self::InvalidParameter => 0x08F0,
            Self::NotSupported => 0x08FF,
        }
    }

    /// Get error description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not initialized",
            Self::InitFailed => "initialization failed",
            Self::FlashPrepareFailed(_) => "flash prepare failed",
            Self::FlashEraseFailed(_) => "flash erase failed",
            Self::FlashWriteFailed(_) => "flash write failed",
            Self::FlashVerifyFailed(_) => "flash verify failed",
            Self::FlashOutOfBounds => "flash address out of bounds",
            Self::StorageNotMounted => "storage not mounted",
            Self::FileNotFound => "file not found",
            Self::FileOpenFailed(_) => "file open failed",
            Self::FileReadFailed(_) => "file read failed",
            Self::FileRenameFailed(_) => "file rename failed",
            Self::InvalidFileName => "invalid file name",
            Self::UartError => "UART error",
            Self::GpioError => "GPIO error",
            Self::InvalidParameter => "invalid parameter",
            Self::NotSupported => "not supported",
        }
    }

    /// Raw driver status carried by this error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u32> {
        match self {
            Self::FlashPrepareFailed(s)
            | Self::FlashEraseFailed(s)
            | Self::FlashWriteFailed(s)
            | Self::FlashVerifyFailed(s)
            | Self::FileOpenFailed(s)
            | Self::FileReadFailed(s)
            | Self::FileRenameFailed(s) => Some(*s),
            _ => None,
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Some(status) => write!(
                f,
                "[0x{:04X}] {} (status {})",
                self.code(),
                self.description(),
                status
            ),
            None => write!(f, "[0x{:04X}] {}", self.code(), self.description()),
        }
    }
}

impl From<HalError> for sb_common::Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::NotInitialized | HalError::InitFailed => Self::HardwareInitFailed,
            HalError::FlashPrepareFailed(_) => Self::FlashPrepareFailed,
            HalError::FlashEraseFailed(_) => Self::FlashEraseFailed,
            HalError::FlashWriteFailed(_) => Self::FlashProgramFailed,
            HalError::FlashVerifyFailed(_) => Self::FlashVerifyMismatch,
            HalError::FlashOutOfBounds => Self::FlashError,
            HalError::StorageNotMounted => Self::StorageNotMounted,
            HalError::FileNotFound => Self::FileNotFound,
            HalError::FileOpenFailed(_) => Self::FileOpenFailed,
            HalError::FileReadFailed(_) => Self::FileReadFailed,
            HalError::FileRenameFailed(_) => Self::RenameFailed,
            HalError::InvalidFileName => Self::FileNameTooLong,
            HalError::UartError => Self::UartError,
            HalError::GpioError => Self::GpioError,
            HalError::InvalidParameter => Self::InvalidParameter,
            HalError::NotSupported => Self::NotImplemented,
        }
    }
}

/// HAL Result type
pub type HalResult<T> = Result<T, HalError>;

/// Status codes returned by the LPC40xx IAP boot ROM
pub mod iap_status {
    /// Command executed successfully
    pub const CMD_SUCCESS: u32 = 0;
    /// Invalid command
    pub const INVALID_COMMAND: u32 = 1;
    /// Source address is not on a word boundary
    pub const SRC_ADDR_ERROR: u32 = 2;
    /// Destination address is not on a correct boundary
    pub const DST_ADDR_ERROR: u32 = 3;
    /// Source address is not mapped in the memory map
    pub const SRC_ADDR_NOT_MAPPED: u32 = 4;
    /// Destination address is not mapped in the memory map
    pub const DST_ADDR_NOT_MAPPED: u32 = 5;
    /// Byte count is not an allowed value
    pub const COUNT_ERROR: u32 = 6;
    /// Sector number is invalid or end < start
    pub const INVALID_SECTOR: u32 = 7;
    /// Sector is not blank
    pub const SECTOR_NOT_BLANK: u32 = 8;
    /// Prepare command was not executed before the write operation
    pub const SECTOR_NOT_PREPARED_FOR_WRITE_OPERATION: u32 = 9;
    /// Source and destination data differ
    pub const COMPARE_ERROR: u32 = 10;
    /// Flash programming interface is busy
    pub const BUSY: u32 = 11;
}

/// Result codes of the FAT filesystem driver (FatFs `FRESULT`)
pub mod fat_status {
    /// Succeeded
    pub const FR_OK: u32 = 0;
    /// Low level disk I/O error
    pub const FR_DISK_ERR: u32 = 1;
    /// Assertion failed inside the driver
    pub const FR_INT_ERR: u32 = 2;
    /// Physical drive cannot work
    pub const FR_NOT_READY: u32 = 3;
    /// Could not find the file
    pub const FR_NO_FILE: u32 = 4;
    /// Could not find the path
    pub const FR_NO_PATH: u32 = 5;
    /// Path name format is invalid
    pub const FR_INVALID_NAME: u32 = 6;
    /// Access denied
    pub const FR_DENIED: u32 = 7;
    /// Access denied because the object already exists
    pub const FR_EXIST: u32 = 8;
    /// No valid FAT volume
    pub const FR_NO_FILESYSTEM: u32 = 13;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_carried() {
        let err = HalError::FlashWriteFailed(iap_status::SECTOR_NOT_PREPARED_FOR_WRITE_OPERATION);
        assert_eq!(err.status(), Some(9));
        assert_eq!(HalError::UartError.status(), None);
    }

    #[test]
    fn test_display_shows_status() {
        let err = HalError::FlashVerifyFailed(iap_status::COMPARE_ERROR);
        assert_eq!(std::format!("{err}"), "[0x0813] flash verify failed (status 10)");
        assert_eq!(
            std::format!("{}", HalError::FileNotFound),
            "[0x0821] file not found"
        );
    }

    #[test]
    fn test_conversion_to_common_error() {
        let err: sb_common::Error = HalError::FlashVerifyFailed(10).into();
        assert_eq!(err, sb_common::Error::FlashVerifyMismatch);
        let err: sb_common::Error = HalError::FileRenameFailed(fat_status::FR_EXIST).into();
        assert_eq!(err, sb_common::Error::RenameFailed);
    }
}
