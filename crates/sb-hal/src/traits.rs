// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! HAL trait definitions
//!
//! This module defines the platform-agnostic capability traits the
//! bootloader core is written against. Each target platform (and the host
//! simulation) implements them on owned driver handles.

use crate::error::HalResult;

/// Directory entry information returned by [`FileStorage::stat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    /// File size in bytes
    pub size: u32,
    /// Entry is a directory
    pub is_dir: bool,
}

/// Removable storage with a FAT filesystem
pub trait FileStorage {
    /// Open file handle
    type File;

    /// Look up a directory entry
    ///
    /// Returns `Ok(None)` when no entry with that name exists.
    fn stat(&mut self, name: &str) -> HalResult<Option<FileInfo>>;

    /// Open a file for reading
    fn open(&mut self, name: &str) -> HalResult<Self::File>;

    /// Read up to `buffer.len()` bytes, returning the number read
    ///
    /// A return value of zero means end of file.
    fn read(&mut self, file: &mut Self::File, buffer: &mut [u8]) -> HalResult<usize>;

    /// Close a file
    fn close(&mut self, file: Self::File);

    /// Rename a directory entry
    fn rename(&mut self, old_name: &str, new_name: &str) -> HalResult<()>;
}

/// In-application programming interface to on-chip flash
///
/// Operations mirror the boot ROM primitives: sectors must be prepared
/// before every erase or program, and programming copies a RAM buffer into
/// previously erased flash.
pub trait IapFlash {
    /// Unlock sectors `first..=last` for the next erase or program
    fn prepare_sectors(&mut self, first: u32, last: u32) -> HalResult<()>;

    /// Erase sectors `first..=last`
    fn erase_sectors(&mut self, first: u32, last: u32) -> HalResult<()>;

    /// Program `data` at `address`
    ///
    /// # Notes
    /// `address` must be aligned to the program granularity and `data.len()`
    /// must be one of the sizes supported by the device (256, 512, 1024 or
    /// 4096 on LPC40xx).
    fn program(&mut self, address: u32, data: &[u8]) -> HalResult<()>;

    /// Compare flash contents at `address` with `data`
    fn verify(&mut self, address: u32, data: &[u8]) -> HalResult<()>;

    /// Read flash contents
    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()>;

    /// Sector number containing `address`, if it is inside flash
    fn sector_of(&self, address: u32) -> Option<u32>;

    /// Read a little-endian 32-bit word
    fn read_word(&self, address: u32) -> HalResult<u32> {
        let mut buf = [0u8; 4];
        self.read(address, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// GPIO interface
pub trait GpioPin {
    /// Set pin high
    fn set_high(&mut self) -> HalResult<()>;

    /// Set pin low
    fn set_low(&mut self) -> HalResult<()>;

    /// Read pin state
    fn is_high(&self) -> HalResult<bool>;

    /// Toggle pin
    fn toggle(&mut self) -> HalResult<()>;
}

/// UART serial interface (transmit only, polled)
pub trait UartInterface {
    /// Initialize the UART with the given baud rate
    fn init(&mut self, baud_rate: u32) -> HalResult<()>;

    /// Write a byte (blocking)
    fn write_byte(&mut self, byte: u8) -> HalResult<()>;

    /// Write a buffer of bytes (blocking)
    fn write(&mut self, data: &[u8]) -> HalResult<()> {
        for &byte in data {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Check if transmitter is ready
    fn is_tx_ready(&self) -> bool;

    /// Wait until every queued byte has left the shift register
    fn flush(&mut self) -> HalResult<()>;

    /// Return the UART to its reset state
    fn deinit(&mut self);
}

/// Blocking delay
pub trait DelayInterface {
    /// Busy-wait for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);
}

/// Teardown and transfer of control to the application
///
/// Steps are called by the launcher in a fixed order; see
/// `sb_boot::launch`.
pub trait HandoffInterface {
    /// Mask bootloader interrupt sources and stop its timers
    fn disable_interrupts(&mut self);

    /// Return peripheral clock configuration to its reset value
    fn uninit_clocks(&mut self);

    /// Return bootloader-owned pins to plain GPIO function
    fn uninit_board_io(&mut self);

    /// Point the vector table offset register at `base`
    fn relocate_vector_table(&mut self, base: u32);

    /// Load the stack pointers and branch to `entry`
    fn start_application(self, stack_pointer: u32, entry: u32) -> !
    where
        Self: Sized;
}
