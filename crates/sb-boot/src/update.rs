// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Firmware update from removable storage
//!
//! On every boot the update controller looks for the image file on the SD
//! card. When it is present:
//!
//! 1. the whole application region is erased,
//! 2. the file is streamed into flash one chunk at a time, each chunk
//!    prepared, programmed and compared,
//! 3. after a complete copy the file is renamed with the consumed suffix so
//!    the next boot does not flash it again.
//!
//! When it is absent nothing is touched. The rename is the only record that
//! an image has been applied.
//!
//! # Failure policy
//!
//! Flash driver failures are logged with their raw status code. Under
//! [`FailurePolicy::Tolerate`] the controller carries on regardless: a
//! failed erase is followed by programming, a failed chunk by the next
//! chunk, and the image is still renamed. [`FailurePolicy::AbortOnError`]
//! stops at the first failure and leaves the image on the card.
//!
//! The boot decision that follows never looks at any of this; it only
//! inspects the vector table left in flash.

use core::fmt;

use heapless::String;
use sb_common::constants::{FLASH_FILL_BYTE, MAX_CHUNK_SIZE, MAX_FILE_NAME_LEN};
use sb_common::log::LogSink;
use sb_common::{log_error, log_info, log_warn, FailurePolicy, FlashRegion, UpdateConfig};
use sb_hal::{FileStorage, HalError, IapFlash};

/// Log module tag
const MODULE: &str = "update";

// =============================================================================
// Types
// =============================================================================

/// Result of one update run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No image was found, or it produced no chunks
    NoImageFound,
    /// Every chunk of the image was written and the copy reached end of file
    Applied,
    /// Some chunks were written but the copy stopped early
    PartiallyApplied,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoImageFound => "no image found",
            Self::Applied => "applied",
            Self::PartiallyApplied => "partially applied",
        };
        f.write_str(text)
    }
}

/// Status of a single chunk transfer
///
/// Failure variants carry the driver status of the first step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Prepared, programmed and compared successfully
    Ok,
    /// Sector preparation failed
    PrepareFailed(u32),
    /// Programming failed
    ProgramFailed(u32),
    /// Flash contents differ from the chunk
    VerifyMismatch(u32),
}

impl WriteStatus {
    /// Check for success
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// One chunk transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOperation {
    /// Flash address the chunk was programmed at
    pub destination_address: u32,
    /// Bytes taken from the file, before padding
    pub length: usize,
    /// Transfer status
    pub status: WriteStatus,
}

/// Why the copy loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyEnd {
    /// A read returned zero bytes
    EndOfFile,
    /// A read failed with the given filesystem status
    ReadFailed(u32),
    /// The next chunk would have crossed the end of the region
    RegionFull,
    /// A flash failure stopped the copy under `FailurePolicy::AbortOnError`
    Aborted,
}

/// Statistics of one update run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    /// Overall outcome
    pub outcome: UpdateOutcome,
    /// Size reported by the directory entry
    pub image_size: Option<u32>,
    /// Erase of the region was attempted
    pub erase_attempted: bool,
    /// Driver status of a failed prepare/erase
    pub erase_failure: Option<u32>,
    /// Chunks programmed (successful or not)
    pub chunks_written: usize,
    /// Chunks whose transfer reported a failure
    pub chunks_failed: usize,
    /// Bytes taken from the file
    pub bytes_copied: usize,
    /// How the copy loop ended, if it ran
    pub copy_end: Option<CopyEnd>,
    /// The image was renamed to its consumed name
    pub renamed: bool,
}

impl UpdateReport {
    const fn empty() -> Self {
        Self {
            outcome: UpdateOutcome::NoImageFound,
            image_size: None,
            erase_attempted: false,
            erase_failure: None,
            chunks_written: 0,
            chunks_failed: 0,
            bytes_copied: 0,
            copy_end: None,
            renamed: false,
        }
    }

    fn record(&mut self, op: &WriteOperation) {
        self.chunks_written += 1;
        self.bytes_copied += op.length;
        if !op.status.is_ok() {
            self.chunks_failed += 1;
        }
    }

    fn finish(mut self) -> Self {
        self.outcome = match (self.chunks_written, self.copy_end) {
            (0, _) => UpdateOutcome::NoImageFound,
            (_, Some(CopyEnd::EndOfFile)) => UpdateOutcome::Applied,
            _ => UpdateOutcome::PartiallyApplied,
        };
        self
    }
}

impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} chunks ({} failed), {} bytes",
            self.outcome, self.chunks_written, self.chunks_failed, self.bytes_copied
        )?;
        if self.renamed {
            f.write_str(", image marked consumed")?;
        }
        Ok(())
    }
}

/// Word-aligned chunk buffer, as required by the IAP copy command
#[repr(C, align(4))]
struct ChunkBuffer([u8; MAX_CHUNK_SIZE]);

/// Driver status for logging; errors without one report their HAL code
fn status_of(error: HalError) -> u32 {
    error.status().unwrap_or_else(|| u32::from(error.code()))
}

// =============================================================================
// Update controller
// =============================================================================

/// Apply the image named `image_name` with the default update settings
///
/// Returns only the outcome; see [`apply_update`] for the full report.
pub fn run_update<F, S, L>(
    flash: &mut F,
    storage: &mut S,
    region: &FlashRegion,
    image_name: &'static str,
    log: &mut L,
) -> UpdateOutcome
where
    F: IapFlash,
    S: FileStorage,
    L: LogSink,
{
    let config = UpdateConfig {
        image_name,
        ..UpdateConfig::DEFAULT
    };
    apply_update(flash, storage, region, &config, log).outcome
}

/// Look for the image on storage and program it into `region`
pub fn apply_update<F, S, L>(
    flash: &mut F,
    storage: &mut S,
    region: &FlashRegion,
    config: &UpdateConfig,
    log: &mut L,
) -> UpdateReport
where
    F: IapFlash,
    S: FileStorage,
    L: LogSink,
{
    let mut report = UpdateReport::empty();
    let name = config.image_name;

    if let Err(e) = region.validate() {
        log_error!(*log, MODULE, "invalid flash region: {}", e);
        return report;
    }

    // Absence is the normal case and must not touch flash
    match storage.stat(name) {
        Ok(Some(info)) if info.is_dir => {
            log_warn!(*log, MODULE, "{} is a directory, ignoring", name);
            return report;
        }
        Ok(Some(info)) => {
            log_info!(*log, MODULE, "found {} ({} bytes)", name, info.size);
            if info.size > region.size() {
                log_warn!(
                    *log,
                    MODULE,
                    "image is larger than the {} byte region",
                    region.size()
                );
            }
            report.image_size = Some(info.size);
        }
        Ok(None) => {
            log_info!(*log, MODULE, "no {} on storage", name);
            return report;
        }
        Err(e) => {
            log_warn!(*log, MODULE, "storage unavailable: {}", e);
            return report;
        }
    }

    report.erase_attempted = true;
    if let Err(e) = erase_region(flash, region, log) {
        report.erase_failure = Some(status_of(e));
        if config.failure_policy == FailurePolicy::AbortOnError {
            log_error!(*log, MODULE, "erase failed, update abandoned");
            return report;
        }
    }

    let mut file = match storage.open(name) {
        Ok(file) => file,
        Err(e) => {
            log_error!(*log, MODULE, "cannot open {}: {}", name, e);
            return report;
        }
    };

    let end = copy_image(flash, storage, &mut file, region, config.failure_policy, &mut report, log);
    storage.close(file);
    report.copy_end = Some(end);

    if end == CopyEnd::EndOfFile && config.mark_consumed {
        report.renamed = mark_consumed(storage, config, log);
    }

    let report = report.finish();
    log_info!(*log, MODULE, "{}", report);
    report
}

/// Prepare and erase every sector of the region
fn erase_region<F: IapFlash, L: LogSink>(
    flash: &mut F,
    region: &FlashRegion,
    log: &mut L,
) -> Result<(), HalError> {
    let (first, last) = (region.first_sector, region.last_sector);
    log_info!(*log, MODULE, "erasing sectors {}..={}", first, last);

    // The ROM only erases sectors prepared by the immediately preceding call,
    // so a failed prepare is reported but the erase is still issued.
    let prepared = flash.prepare_sectors(first, last);
    if let Err(e) = prepared {
        log_error!(*log, MODULE, "prepare sectors {}..={} failed: status {}", first, last, status_of(e));
    }
    let erased = flash.erase_sectors(first, last);
    if let Err(e) = erased {
        log_error!(*log, MODULE, "erase sectors {}..={} failed: status {}", first, last, status_of(e));
    }
    prepared.and(erased)
}

/// Stream the file into flash, returning why the loop stopped
fn copy_image<F, S, L>(
    flash: &mut F,
    storage: &mut S,
    file: &mut S::File,
    region: &FlashRegion,
    policy: FailurePolicy,
    report: &mut UpdateReport,
    log: &mut L,
) -> CopyEnd
where
    F: IapFlash,
    S: FileStorage,
    L: LogSink,
{
    let mut buffer = ChunkBuffer([FLASH_FILL_BYTE; MAX_CHUNK_SIZE]);
    let chunk = &mut buffer.0[..region.chunk_size];
    let mut destination = region.start_address;

    loop {
        // A short final chunk keeps the erased-state tail
        chunk.fill(FLASH_FILL_BYTE);
        let length = match fill_chunk(storage, file, chunk) {
            Ok(0) => return CopyEnd::EndOfFile,
            Ok(length) => length,
            Err(e) => {
                log_error!(*log, MODULE, "read failed at 0x{:08X}: {}", destination, e);
                return CopyEnd::ReadFailed(status_of(e));
            }
        };

        if !region.fits(destination, chunk.len()) {
            log_error!(
                *log,
                MODULE,
                "image does not fit: chunk at 0x{:08X} crosses 0x{:08X}",
                destination,
                region.end_address
            );
            return CopyEnd::RegionFull;
        }

        let op = write_chunk(flash, region, destination, chunk, length, policy, log);
        report.record(&op);
        if !op.status.is_ok() && policy == FailurePolicy::AbortOnError {
            return CopyEnd::Aborted;
        }

        // No retry: the next chunk goes to the next slot whatever happened
        destination = destination.saturating_add(region.chunk_size as u32);
    }
}

/// Read until `chunk` is full or the file ends
fn fill_chunk<S: FileStorage>(
    storage: &mut S,
    file: &mut S::File,
    chunk: &mut [u8],
) -> Result<usize, HalError> {
    let mut filled = 0;
    while filled < chunk.len() {
        let count = storage.read(file, &mut chunk[filled..])?;
        if count == 0 {
            break;
        }
        filled += count;
    }
    Ok(filled)
}

/// Prepare, program and compare one chunk
///
/// Every step runs even if an earlier one failed, unless the policy is
/// `AbortOnError`. The reported status is that of the first failure.
fn write_chunk<F: IapFlash, L: LogSink>(
    flash: &mut F,
    region: &FlashRegion,
    destination: u32,
    chunk: &[u8],
    length: usize,
    policy: FailurePolicy,
    log: &mut L,
) -> WriteOperation {
    let last_byte = destination + (chunk.len() as u32 - 1);
    let (first, last) = match (flash.sector_of(destination), flash.sector_of(last_byte)) {
        (Some(first), Some(last)) => (first, last),
        _ => (region.first_sector, region.last_sector),
    };

    let mut status = WriteStatus::Ok;
    let abort = policy == FailurePolicy::AbortOnError;

    if let Err(e) = flash.prepare_sectors(first, last) {
        let code = status_of(e);
        log_error!(*log, MODULE, "prepare for 0x{:08X} failed: status {}", destination, code);
        status = WriteStatus::PrepareFailed(code);
    }

    if status.is_ok() || !abort {
        if let Err(e) = flash.program(destination, chunk) {
            let code = status_of(e);
            log_error!(*log, MODULE, "program 0x{:08X} failed: status {}", destination, code);
            if status.is_ok() {
                status = WriteStatus::ProgramFailed(code);
            }
        }
    }

    if status.is_ok() || !abort {
        if let Err(e) = flash.verify(destination, chunk) {
            let code = status_of(e);
            log_error!(*log, MODULE, "verify 0x{:08X} failed: status {}", destination, code);
            if status.is_ok() {
                status = WriteStatus::VerifyMismatch(code);
            }
        }
    }

    WriteOperation {
        destination_address: destination,
        length,
        status,
    }
}

/// Rename the image to `<name><suffix>`, returning whether it worked
fn mark_consumed<S: FileStorage, L: LogSink>(
    storage: &mut S,
    config: &UpdateConfig,
    log: &mut L,
) -> bool {
    let mut consumed = String::<MAX_FILE_NAME_LEN>::new();
    if consumed.push_str(config.image_name).is_err()
        || consumed.push_str(config.consumed_suffix).is_err()
    {
        log_error!(
            *log,
            MODULE,
            "consumed name for {} exceeds {} bytes",
            config.image_name,
            MAX_FILE_NAME_LEN
        );
        return false;
    }

    match storage.rename(config.image_name, &consumed) {
        Ok(()) => {
            log_info!(*log, MODULE, "renamed {} to {}", config.image_name, consumed);
            true
        }
        Err(e) => {
            log_error!(*log, MODULE, "rename of {} failed: {}", config.image_name, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_common::LogBuffer;
    use sb_hal::sim::{SimFlash, SimStorage};

    const NAME: &str = "lpc40xx_application.bin";

    #[test]
    fn test_outcome_rules() {
        let mut report = UpdateReport::empty();
        report.copy_end = Some(CopyEnd::EndOfFile);
        assert_eq!(report.finish().outcome, UpdateOutcome::NoImageFound);

        report.chunks_written = 1;
        assert_eq!(report.finish().outcome, UpdateOutcome::Applied);

        report.copy_end = Some(CopyEnd::ReadFailed(1));
        assert_eq!(report.finish().outcome, UpdateOutcome::PartiallyApplied);
    }

    #[test]
    fn test_fill_chunk_collects_short_reads() {
        let mut storage = SimStorage::new();
        storage.insert_file(NAME, &[7u8; 600]);
        storage.limit_read(100);
        let mut file = storage.open(NAME).unwrap();
        let mut chunk = [0u8; 512];
        assert_eq!(fill_chunk(&mut storage, &mut file, &mut chunk).unwrap(), 512);
        assert_eq!(fill_chunk(&mut storage, &mut file, &mut chunk).unwrap(), 88);
        assert_eq!(fill_chunk(&mut storage, &mut file, &mut chunk).unwrap(), 0);
    }

    #[test]
    fn test_write_chunk_reports_first_failure() {
        let mut flash = SimFlash::lpc4078();
        let region = FlashRegion::LPC4078_APPLICATION;
        let mut log = LogBuffer::new();
        flash.fail_program_at(region.start_address, 11);
        let chunk = [0u8; 4096];
        let op = write_chunk(
            &mut flash,
            &region,
            region.start_address,
            &chunk,
            4096,
            FailurePolicy::Tolerate,
            &mut log,
        );
        assert_eq!(op.status, WriteStatus::ProgramFailed(11));
        // Compare still ran and failed against the erased flash
        assert_eq!(log.count_matching(sb_common::LogLevel::Error, "verify"), 1);
    }

    #[test]
    fn test_consumed_name_overflow_skips_rename() {
        let mut storage = SimStorage::new();
        let long: &'static str = "a_very_long_application_image_name_that_fills_the_buffer.bin";
        storage.insert_file(long, &[0u8; 4]);
        let config = UpdateConfig {
            image_name: long,
            ..UpdateConfig::DEFAULT
        };
        let mut log = LogBuffer::new();
        assert!(!mark_consumed(&mut storage, &config, &mut log));
        assert!(storage.exists(long));
    }
}
