// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Bootloader configuration
//!
//! All configuration is compile-time. There is no configuration file and no
//! command line: the bootloader runs unconditionally on every reset with the
//! values baked in here.

use crate::constants::{
    CONSUMED_SUFFIX, DEFAULT_CHUNK_SIZE, DEFAULT_IMAGE_NAME, DIAGNOSTIC_BAUD_RATE,
    HALT_REPORT_INTERVAL_MS, PROGRAM_CHUNK_SIZES,
};
use crate::errors::{Error, Result};

/// Program-memory region that receives the application image
///
/// `end_address` is the last byte that belongs to the region, so the range
/// is `start_address..=end_address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRegion {
    /// First byte of the region (vector table location)
    pub start_address: u32,
    /// Last byte of the region (inclusive)
    pub end_address: u32,
    /// First erasable sector covering the region
    pub first_sector: u32,
    /// Last erasable sector covering the region
    pub last_sector: u32,
    /// Bytes transferred per program operation
    pub chunk_size: usize,
}

impl FlashRegion {
    /// LPC4078 application region: everything after the 64KB bootloader
    ///
    /// Sectors 16..=29 are the 32KB sectors of the 512KB part.
    pub const LPC4078_APPLICATION: Self = Self {
        start_address: 0x0001_0000,
        end_address: 0x0007_FFFF,
        first_sector: 16,
        last_sector: 29,
        chunk_size: DEFAULT_CHUNK_SIZE,
    };

    /// Create a region description
    #[must_use]
    pub const fn new(
        start_address: u32,
        end_address: u32,
        first_sector: u32,
        last_sector: u32,
        chunk_size: usize,
    ) -> Self {
        Self {
            start_address,
            end_address,
            first_sector,
            last_sector,
            chunk_size,
        }
    }

    /// Check the region invariants
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBootConfig` if the address or sector range is
    /// empty or reversed, or if the chunk size is not one of
    /// `PROGRAM_CHUNK_SIZES`.
    pub const fn validate(&self) -> Result<()> {
        if self.start_address >= self.end_address {
            return Err(Error::InvalidBootConfig);
        }
        if self.first_sector > self.last_sector {
            return Err(Error::InvalidBootConfig);
        }
        let mut i = 0;
        while i < PROGRAM_CHUNK_SIZES.len() {
            if PROGRAM_CHUNK_SIZES[i] == self.chunk_size {
                return Ok(());
            }
            i += 1;
        }
        Err(Error::InvalidBootConfig)
    }

    /// Check whether `address` lies inside the region (both ends inclusive)
    #[must_use]
    pub const fn contains(&self, address: u32) -> bool {
        address >= self.start_address && address <= self.end_address
    }

    /// Check whether `len` bytes starting at `address` fit inside the region
    #[must_use]
    pub const fn fits(&self, address: u32, len: usize) -> bool {
        if len == 0 {
            return self.contains(address);
        }
        let last = (address as u64) + (len as u64) - 1;
        self.contains(address) && last <= self.end_address as u64
    }

    /// Region size in bytes
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.end_address - self.start_address + 1
    }
}

/// What the update controller does when a flash operation reports failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the status code and carry on with the next step
    ///
    /// A failed erase is followed by programming anyway, and a failed chunk
    /// is followed by the next chunk. The image is still marked consumed.
    #[default]
    Tolerate,
    /// Stop at the first failed erase or chunk and leave the image in place
    AbortOnError,
}

/// Update controller configuration
#[derive(Debug, Clone, Copy)]
pub struct UpdateConfig {
    /// File name of the firmware image on the SD card
    pub image_name: &'static str,
    /// Suffix appended to the image name after a complete copy
    pub consumed_suffix: &'static str,
    /// Rename the image after a complete copy
    pub mark_consumed: bool,
    /// Reaction to non-zero flash driver status
    pub failure_policy: FailurePolicy,
}

impl UpdateConfig {
    /// Default update configuration
    pub const DEFAULT: Self = Self {
        image_name: DEFAULT_IMAGE_NAME,
        consumed_suffix: CONSUMED_SUFFIX,
        mark_consumed: true,
        failure_policy: FailurePolicy::Tolerate,
    };
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Whole-bootloader configuration
#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    /// Application region
    pub region: FlashRegion,
    /// Update controller settings
    pub update: UpdateConfig,
    /// Interval between diagnostics while halted (ms)
    pub halt_report_interval_ms: u32,
    /// Diagnostic UART baud rate
    pub uart_baud_rate: u32,
}

impl BootConfig {
    /// Default configuration for the LPC4078 board
    pub const DEFAULT: Self = Self {
        region: FlashRegion::LPC4078_APPLICATION,
        update: UpdateConfig::DEFAULT,
        halt_report_interval_ms: HALT_REPORT_INTERVAL_MS,
        uart_baud_rate: DIAGNOSTIC_BAUD_RATE,
    };
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
