// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! SD card FAT filesystem adapter
//!
//! The FAT driver and the SSP2/SD card transport come from the board
//! support package and are linked in as C objects. The package exports a
//! small shim over FatFs: paths are NUL-terminated, open files are referred
//! to by an index into the shim's own file table, and every call returns a
//! FatFs `FRESULT`.

use heapless::String;
use sb_common::constants::MAX_FILE_NAME_LEN;

use super::gpio::{Lpc40xxGpioPin, SD_CARD_DETECT};
use crate::error::{fat_status, HalError, HalResult};
use crate::traits::{FileInfo, FileStorage, GpioPin};

/// FatFs directory attribute
const AM_DIR: u8 = 0x10;

#[cfg(target_arch = "arm")]
use shim::*;

#[cfg(target_arch = "arm")]
mod shim {
    extern "C" {
        pub fn sb_fat_mount() -> u32;
        pub fn sb_fat_stat(path: *const u8, size: *mut u32, attributes: *mut u8) -> u32;
        pub fn sb_fat_open(path: *const u8, handle: *mut u32) -> u32;
        pub fn sb_fat_read(handle: u32, buffer: *mut u8, len: u32, read: *mut u32) -> u32;
        pub fn sb_fat_close(handle: u32) -> u32;
        pub fn sb_fat_rename(old_path: *const u8, new_path: *const u8) -> u32;
    }
}

// Host builds have no card slot: every call reports the drive as not ready.
#[cfg(not(target_arch = "arm"))]
use host_shim::*;

#[cfg(not(target_arch = "arm"))]
#[allow(clippy::missing_safety_doc, clippy::unnecessary_wraps)]
mod host_shim {
    use crate::error::fat_status::FR_NOT_READY;

    pub unsafe fn sb_fat_mount() -> u32 {
        FR_NOT_READY
    }
    pub unsafe fn sb_fat_stat(_: *const u8, _: *mut u32, _: *mut u8) -> u32 {
        FR_NOT_READY
    }
    pub unsafe fn sb_fat_open(_: *const u8, _: *mut u32) -> u32 {
        FR_NOT_READY
    }
    pub unsafe fn sb_fat_read(_: u32, _: *mut u8, _: u32, _: *mut u32) -> u32 {
        FR_NOT_READY
    }
    pub unsafe fn sb_fat_close(_: u32) -> u32 {
        FR_NOT_READY
    }
    pub unsafe fn sb_fat_rename(_: *const u8, _: *const u8) -> u32 {
        FR_NOT_READY
    }
}

/// NUL-terminated copy of a path
type CPath = String<{ MAX_FILE_NAME_LEN + 1 }>;

fn c_path(name: &str) -> HalResult<CPath> {
    if name.contains('\0') {
        return Err(HalError::InvalidFileName);
    }
    let mut path = CPath::new();
    path.push_str(name).map_err(|()| HalError::InvalidFileName)?;
    path.push('\0').map_err(|()| HalError::InvalidFileName)?;
    Ok(path)
}

/// Open file on the SD card
#[derive(Debug)]
pub struct SdFile {
    handle: u32,
}

/// FAT volume on the SD card
pub struct SdFileSystem {
    card_detect: Lpc40xxGpioPin,
    mounted: bool,
}

impl SdFileSystem {
    /// Bind the card-detect pin
    ///
    /// # Errors
    ///
    /// Propagates pin configuration failures.
    pub fn new() -> HalResult<Self> {
        let card_detect = Lpc40xxGpioPin::new(SD_CARD_DETECT.0, SD_CARD_DETECT.1)?.into_input();
        Ok(Self {
            card_detect,
            mounted: false,
        })
    }

    /// Volume handle before board bring-up
    pub(crate) const fn unbound() -> Self {
        Self {
            card_detect: Lpc40xxGpioPin::new_unconfigured(SD_CARD_DETECT.0, SD_CARD_DETECT.1),
            mounted: false,
        }
    }

    /// Check the card-detect switch (active low)
    #[must_use]
    pub fn card_present(&self) -> bool {
        matches!(self.card_detect.is_high(), Ok(false))
    }

    /// Check whether the volume is mounted
    #[must_use]
    pub const fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Mount the volume on the inserted card
    ///
    /// # Errors
    ///
    /// Returns `HalError::StorageNotMounted` when no card is inserted or the
    /// card carries no readable FAT volume.
    pub fn mount(&mut self) -> HalResult<()> {
        if !self.card_present() {
            return Err(HalError::StorageNotMounted);
        }
        // SAFETY: the shim keeps its FATFS object in static storage
        let status = unsafe { sb_fat_mount() };
        self.mounted = status == fat_status::FR_OK;
        if self.mounted {
            Ok(())
        } else {
            Err(HalError::StorageNotMounted)
        }
    }

    fn check_mounted(&self) -> HalResult<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(HalError::StorageNotMounted)
        }
    }
}

impl FileStorage for SdFileSystem {
    type File = SdFile;

    fn stat(&mut self, name: &str) -> HalResult<Option<FileInfo>> {
        self.check_mounted()?;
        let path = c_path(name)?;
        let mut size = 0u32;
        let mut attributes = 0u8;
        // SAFETY: path is NUL-terminated; out-pointers are valid locals
        let status = unsafe { sb_fat_stat(path.as_ptr(), &mut size, &mut attributes) };
        match status {
            fat_status::FR_OK => Ok(Some(FileInfo {
                size,
                is_dir: attributes & AM_DIR != 0,
            })),
            fat_status::FR_NO_FILE | fat_status::FR_NO_PATH => Ok(None),
            fat_status::FR_NOT_READY | fat_status::FR_NO_FILESYSTEM => {
                Err(HalError::StorageNotMounted)
            }
            status => Err(HalError::FileOpenFailed(status)),
        }
    }

    fn open(&mut self, name: &str) -> HalResult<SdFile> {
        self.check_mounted()?;
        let path = c_path(name)?;
        let mut handle = 0u32;
        // SAFETY: path is NUL-terminated; handle is a valid local
        match unsafe { sb_fat_open(path.as_ptr(), &mut handle) } {
            fat_status::FR_OK => Ok(SdFile { handle }),
            status => Err(HalError::FileOpenFailed(status)),
        }
    }

    fn read(&mut self, file: &mut SdFile, buffer: &mut [u8]) -> HalResult<usize> {
        let len = u32::try_from(buffer.len()).map_err(|_| HalError::InvalidParameter)?;
        let mut read = 0u32;
        // SAFETY: buffer is valid for `len` bytes; handle came from `open`
        match unsafe { sb_fat_read(file.handle, buffer.as_mut_ptr(), len, &mut read) } {
            fat_status::FR_OK => Ok(read as usize),
            status => Err(HalError::FileReadFailed(status)),
        }
    }

    fn close(&mut self, file: SdFile) {
        // SAFETY: handle came from `open` and is not used after this call.
        // A failed close of a read-only file loses nothing.
        let _ = unsafe { sb_fat_close(file.handle) };
    }

    fn rename(&mut self, old_name: &str, new_name: &str) -> HalResult<()> {
        self.check_mounted()?;
        let old_path = c_path(old_name)?;
        let new_path = c_path(new_name)?;
        // SAFETY: both paths are NUL-terminated
        match unsafe { sb_fat_rename(old_path.as_ptr(), new_path.as_ptr()) } {
            fat_status::FR_OK => Ok(()),
            status => Err(HalError::FileRenameFailed(status)),
        }
    }
}
