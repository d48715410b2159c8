// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! System-wide constants for the bootloader
//!
//! Fixed values of the program-memory layout, the vector table and the image
//! file on the SD card. All sizes are chosen for the LPC40xx IAP routines.

// =============================================================================
// Flash Programming Constants
// =============================================================================

/// Value of an erased flash byte; also used to pad a short final chunk
pub const FLASH_FILL_BYTE: u8 = 0xFF;

/// Largest chunk a single IAP "copy RAM to flash" command accepts
pub const MAX_CHUNK_SIZE: usize = 4096;

/// Default chunk size used for each program operation
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Byte counts the IAP "copy RAM to flash" command accepts
pub const PROGRAM_CHUNK_SIZES: [usize; 4] = [256, 512, 1024, 4096];

// =============================================================================
// Vector Table Constants
// =============================================================================

/// Offset of the initial stack pointer word in the vector table
pub const VECTOR_TABLE_SP_OFFSET: u32 = 0;

/// Offset of the reset handler word in the vector table
pub const VECTOR_TABLE_RESET_OFFSET: u32 = 4;

/// Writable bits of the Cortex-M4 VTOR register (TBLOFF, 128-byte aligned)
pub const VTOR_TBLOFF_MASK: u32 = 0xFFFF_FF80;

// =============================================================================
// Image File Constants
// =============================================================================

/// Name of the firmware image on the SD card
pub const DEFAULT_IMAGE_NAME: &str = "lpc40xx_application.bin";

/// Suffix appended to the image name once it has been programmed
pub const CONSUMED_SUFFIX: &str = ".flashed";

/// Longest file name (including suffix) handled by the update controller
pub const MAX_FILE_NAME_LEN: usize = 64;

// =============================================================================
// Diagnostic Constants
// =============================================================================

/// Diagnostic UART baud rate
pub const DIAGNOSTIC_BAUD_RATE: u32 = 115_200;

/// Interval between repeated diagnostics while halted (ms)
pub const HALT_REPORT_INTERVAL_MS: u32 = 3_000;
