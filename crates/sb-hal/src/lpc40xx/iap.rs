// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! LPC40xx In-Application Programming driver
//!
//! Flash is erased and programmed through the IAP routines in boot ROM. Each
//! call passes a five-word command table and receives a five-word result
//! table whose first word is the status code (see
//! [`iap_status`](crate::error::iap_status)).
//!
//! # LPC4078 Flash Characteristics
//!
//! - Total: 512KB
//! - Sectors 0-15: 4KB each
//! - Sectors 16-29: 32KB each
//! - Program sizes: 256, 512, 1024 or 4096 bytes from word-aligned RAM
//!
//! # Safety
//!
//! The ROM routines use the top 32 bytes of on-chip SRAM, which the linker
//! script keeps free. Interrupts are masked for the duration of each call
//! since flash is not readable while it is being written.

use sb_common::constants::PROGRAM_CHUNK_SIZES;

use crate::error::{iap_status, HalError, HalResult};
use crate::traits::IapFlash;

// =============================================================================
// Flash Memory Map
// =============================================================================

/// Flash base address
pub const FLASH_BASE: u32 = 0x0000_0000;

/// Total flash size (512KB)
pub const FLASH_TOTAL_SIZE: u32 = 512 * 1024;

/// Size of the small sectors at the bottom of flash
pub const SMALL_SECTOR_SIZE: u32 = 4 * 1024;

/// Size of the large sectors above 64KB
pub const LARGE_SECTOR_SIZE: u32 = 32 * 1024;

/// Number of small sectors
pub const SMALL_SECTOR_COUNT: u32 = 16;

/// Number of the last sector
pub const LAST_SECTOR: u32 = 29;

/// Address of the first large sector
const LARGE_SECTOR_BASE: u32 = SMALL_SECTOR_SIZE * SMALL_SECTOR_COUNT;

// =============================================================================
// IAP Commands
// =============================================================================

/// Thumb entry point of the IAP routine
const IAP_LOCATION: u32 = 0x1FFF_1FF1;

const CMD_PREPARE_SECTORS: u32 = 50;
const CMD_COPY_RAM_TO_FLASH: u32 = 51;
const CMD_ERASE_SECTORS: u32 = 52;
const CMD_COMPARE: u32 = 56;

/// Invoke the boot ROM with `command`, returning the status word
fn iap_call(command: &[u32; 5]) -> u32 {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "arm")] {
            type IapEntry = unsafe extern "C" fn(*const u32, *mut u32);
            let mut result = [0u32; 5];
            cortex_m::interrupt::free(|_| {
                // SAFETY: IAP_LOCATION is the documented ROM entry point; both
                // tables outlive the call.
                unsafe {
                    let entry: IapEntry = core::mem::transmute(IAP_LOCATION as usize);
                    entry(command.as_ptr(), result.as_mut_ptr());
                }
            });
            result[0]
        } else {
            let _ = (command, IAP_LOCATION);
            iap_status::INVALID_COMMAND
        }
    }
}

// =============================================================================
// LPC40xx IAP Driver
// =============================================================================

/// LPC40xx flash driver backed by the IAP boot ROM
pub struct Lpc40xxIap {
    /// CPU clock in kHz, required by erase and program commands
    cclk_khz: u32,
}

impl Lpc40xxIap {
    /// Create a driver for a CPU running at `cclk_hz`
    #[must_use]
    pub const fn new(cclk_hz: u32) -> Self {
        Self {
            cclk_khz: cclk_hz / 1000,
        }
    }

    /// Sector number for an address
    #[must_use]
    pub const fn sector_for(address: u32) -> Option<u32> {
        if address < LARGE_SECTOR_BASE {
            Some(address / SMALL_SECTOR_SIZE)
        } else if address < FLASH_BASE + FLASH_TOTAL_SIZE {
            Some(SMALL_SECTOR_COUNT + (address - LARGE_SECTOR_BASE) / LARGE_SECTOR_SIZE)
        } else {
            None
        }
    }

    /// Check if an address range lies inside flash
    #[must_use]
    pub const fn is_valid_range(address: u32, len: usize) -> bool {
        let end = address as u64 + len as u64;
        end <= (FLASH_BASE + FLASH_TOTAL_SIZE) as u64
    }

    fn check_sectors(first: u32, last: u32) -> Result<(), u32> {
        if first > last || last > LAST_SECTOR {
            Err(iap_status::INVALID_SECTOR)
        } else {
            Ok(())
        }
    }
}

impl IapFlash for Lpc40xxIap {
    fn prepare_sectors(&mut self, first: u32, last: u32) -> HalResult<()> {
        Self::check_sectors(first, last).map_err(HalError::FlashPrepareFailed)?;
        match iap_call(&[CMD_PREPARE_SECTORS, first, last, 0, 0]) {
            iap_status::CMD_SUCCESS => Ok(()),
            status => Err(HalError::FlashPrepareFailed(status)),
        }
    }

    fn erase_sectors(&mut self, first: u32, last: u32) -> HalResult<()> {
        Self::check_sectors(first, last).map_err(HalError::FlashEraseFailed)?;
        match iap_call(&[CMD_ERASE_SECTORS, first, last, self.cclk_khz, 0]) {
            iap_status::CMD_SUCCESS => Ok(()),
            status => Err(HalError::FlashEraseFailed(status)),
        }
    }

    fn program(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
        if !PROGRAM_CHUNK_SIZES.contains(&data.len()) {
            return Err(HalError::FlashWriteFailed(iap_status::COUNT_ERROR));
        }
        if data.as_ptr() as usize % 4 != 0 {
            return Err(HalError::FlashWriteFailed(iap_status::SRC_ADDR_ERROR));
        }
        if !Self::is_valid_range(address, data.len()) {
            return Err(HalError::FlashWriteFailed(iap_status::DST_ADDR_NOT_MAPPED));
        }
        // Checked against PROGRAM_CHUNK_SIZES above
        #[allow(clippy::cast_possible_truncation)]
        let len = data.len() as u32;
        let source = data.as_ptr() as u32;
        match iap_call(&[CMD_COPY_RAM_TO_FLASH, address, source, len, self.cclk_khz]) {
            iap_status::CMD_SUCCESS => Ok(()),
            status => Err(HalError::FlashWriteFailed(status)),
        }
    }

    fn verify(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
        if !Self::is_valid_range(address, data.len()) {
            return Err(HalError::FlashVerifyFailed(iap_status::DST_ADDR_NOT_MAPPED));
        }
        let len = u32::try_from(data.len())
            .map_err(|_| HalError::FlashVerifyFailed(iap_status::COUNT_ERROR))?;
        let source = data.as_ptr() as u32;
        match iap_call(&[CMD_COMPARE, address, source, len, 0]) {
            iap_status::CMD_SUCCESS => Ok(()),
            status => Err(HalError::FlashVerifyFailed(status)),
        }
    }

    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
        if address == FLASH_BASE || !Self::is_valid_range(address, buffer.len()) {
            return Err(HalError::FlashOutOfBounds);
        }
        for (offset, byte) in buffer.iter_mut().enumerate() {
            // SAFETY: range checked above; flash is always mapped and readable
            *byte = unsafe { core::ptr::read_volatile((address as usize + offset) as *const u8) };
        }
        Ok(())
    }

    fn sector_of(&self, address: u32) -> Option<u32> {
        Self::sector_for(address)
    }
}
