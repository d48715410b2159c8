// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Host simulation of the bootloader's hardware
//!
//! In-memory stand-ins for every capability trait, so the update controller
//! and the launcher can run under `cargo test`. The models follow the real
//! device closely enough to catch ordering mistakes:
//!
//! - flash must be prepared before each erase or program, programming can
//!   only clear bits, and program sizes/alignment follow the IAP rules
//! - the SD card returns `FRESULT`-style status codes and may deliver short
//!   reads
//!
//! Diverging operations cannot return in a test, so they panic with a typed
//! payload instead ([`Handoff`], [`DelayBudgetExhausted`]) which tests
//! recover with `std::panic::catch_unwind`.
//!
//! Devices that the boot path consumes by value (UART, LED, delay, handoff)
//! share their state through an `Rc`, so a test keeps a clone to inspect
//! after the call.

use core::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec;
use std::vec::Vec;

use sb_common::constants::PROGRAM_CHUNK_SIZES;

use crate::error::{fat_status, iap_status, HalError, HalResult};
use crate::traits::{
    DelayInterface, FileInfo, FileStorage, GpioPin, HandoffInterface, IapFlash, UartInterface,
};

// =============================================================================
// Shared event trace
// =============================================================================

/// Observable side effect recorded by the simulated devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// Interrupts and timers disabled
    DisableInterrupts,
    /// Peripheral clocks returned to reset configuration
    UninitClocks,
    /// UART flushed
    UartFlush,
    /// UART returned to reset state
    UartDeinit,
    /// Board pins returned to GPIO function
    UninitBoardIo,
    /// Vector table relocated
    RelocateVectorTable(u32),
    /// Control transferred to the application
    StartApplication {
        /// Initial main/process stack pointer
        stack_pointer: u32,
        /// Branch target
        entry: u32,
    },
    /// Status pin toggled
    PinToggle,
    /// Busy wait
    Delay(u32),
}

/// Ordered log of [`SimEvent`]s shared between devices
#[derive(Debug, Clone, Default)]
pub struct SimTrace(Rc<RefCell<Vec<SimEvent>>>);

impl SimTrace {
    /// Create an empty trace
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn record(&self, event: SimEvent) {
        self.0.borrow_mut().push(event);
    }

    /// Copy of all events recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<SimEvent> {
        self.0.borrow().clone()
    }

    /// Position of the first occurrence of `event`
    #[must_use]
    pub fn position(&self, event: SimEvent) -> Option<usize> {
        self.0.borrow().iter().position(|e| *e == event)
    }

    /// Number of occurrences of `event`
    #[must_use]
    pub fn count(&self, event: SimEvent) -> usize {
        self.0.borrow().iter().filter(|e| **e == event).count()
    }
}

// =============================================================================
// Flash
// =============================================================================

/// Flash operation recorded by [`SimFlash`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    /// Prepare sectors `first..=last`
    Prepare {
        /// First sector
        first: u32,
        /// Last sector
        last: u32,
    },
    /// Erase sectors `first..=last`
    Erase {
        /// First sector
        first: u32,
        /// Last sector
        last: u32,
    },
    /// Program `len` bytes at `address`
    Program {
        /// Destination address
        address: u32,
        /// Byte count
        len: usize,
    },
    /// Compare `len` bytes at `address`
    Verify {
        /// Compared address
        address: u32,
        /// Byte count
        len: usize,
    },
}


/// Simulated on-chip flash with IAP semantics
#[derive(Debug, Clone)]
pub struct SimFlash {
    base: u32,
    memory: Vec<u8>,
    /// `(start offset, size)` of every sector
    sectors: Vec<(u32, u32)>,
    prepared: Option<(u32, u32)>,
    ops: Vec<FlashOp>,
    prepare_status: Option<u32>,
    erase_status: Option<u32>,
    program_failures: BTreeMap<u32, u32>,
    verify_failures: BTreeMap<u32, u32>,
}

impl SimFlash {
    /// Flash with the given sector sizes, starting at `base`, fully erased
    #[must_use]
    pub fn new(base: u32, sector_sizes: &[u32]) -> Self {
        let mut sectors = Vec::with_capacity(sector_sizes.len());
        let mut offset = 0u32;
        for &size in sector_sizes {
            sectors.push((offset, size));
            offset += size;
        }
        Self {
            base,
            memory: vec![0xFF; offset as usize],
            sectors,
            prepared: None,
            ops: Vec::new(),
            prepare_status: None,
            erase_status: None,
            program_failures: BTreeMap::new(),
            verify_failures: BTreeMap::new(),
        }
    }

    /// 512KB LPC4078 layout: sixteen 4KB sectors followed by fourteen 32KB
    #[must_use]
    pub fn lpc4078() -> Self {
        let mut sizes = [32 * 1024u32; 30];
        for size in sizes.iter_mut().take(16) {
            *size = 4 * 1024;
        }
        Self::new(0x0000_0000, &sizes)
    }

    /// Flash size in bytes
    #[must_use]
    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Bytes currently stored at `address..address + len`
    ///
    /// # Panics
    ///
    /// Panics if the range is outside flash.
    #[must_use]
    pub fn contents(&self, address: u32, len: usize) -> &[u8] {
        let offset = (address - self.base) as usize;
        &self.memory[offset..offset + len]
    }

    /// Store `data` at `address` directly, bypassing IAP rules
    ///
    /// # Panics
    ///
    /// Panics if the range is outside flash.
    pub fn load(&mut self, address: u32, data: &[u8]) {
        let offset = (address - self.base) as usize;
        self.memory[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Operations performed so far
    #[must_use]
    pub fn ops(&self) -> &[FlashOp] {
        &self.ops
    }

    /// Forget recorded operations
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Number of program operations performed
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, FlashOp::Program { .. }))
            .count()
    }

    /// Number of erase operations performed
    #[must_use]
    pub fn erase_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, FlashOp::Erase { .. }))
            .count()
    }

    /// Make every prepare command fail with `status`
    pub fn fail_prepare(&mut self, status: u32) {
        self.prepare_status = Some(status);
    }

    /// Make every erase command fail with `status`
    pub fn fail_erase(&mut self, status: u32) {
        self.erase_status = Some(status);
    }

    /// Make programming at `address` fail with `status`
    pub fn fail_program_at(&mut self, address: u32, status: u32) {
        self.program_failures.insert(address, status);
    }

    /// Make comparing at `address` fail with `status`
    pub fn fail_verify_at(&mut self, address: u32, status: u32) {
        self.verify_failures.insert(address, status);
    }

    fn sector_range(&self, first: u32, last: u32) -> Option<(usize, usize)> {
        if first > last {
            return None;
        }
        let (start, _) = *self.sectors.get(first as usize)?;
        let (last_start, last_size) = *self.sectors.get(last as usize)?;
        Some((start as usize, (last_start + last_size) as usize))
    }

    fn offset_of(&self, address: u32, len: usize) -> Option<usize> {
        let offset = address.checked_sub(self.base)? as usize;
        (offset + len <= self.memory.len()).then_some(offset)
    }

    fn is_prepared(&self, first: u32, last: u32) -> bool {
        matches!(self.prepared, Some((p_first, p_last)) if p_first <= first && last <= p_last)
    }
}

impl IapFlash for SimFlash {
    fn prepare_sectors(&mut self, first: u32, last: u32) -> HalResult<()> {
        self.ops.push(FlashOp::Prepare { first, last });
        if let Some(status) = self.prepare_status {
            return Err(HalError::FlashPrepareFailed(status));
        }
        if self.sector_range(first, last).is_none() {
            return Err(HalError::FlashPrepareFailed(iap_status::INVALID_SECTOR));
        }
        self.prepared = Some((first, last));
        Ok(())
    }

    fn erase_sectors(&mut self, first: u32, last: u32) -> HalResult<()> {
        self.ops.push(FlashOp::Erase { first, last });
        let prepared = self.is_prepared(first, last);
        self.prepared = None;
        if let Some(status) = self.erase_status {
            return Err(HalError::FlashEraseFailed(status));
        }
        let (start, end) = self
            .sector_range(first, last)
            .ok_or(HalError::FlashEraseFailed(iap_status::INVALID_SECTOR))?;
        if !prepared {
            return Err(HalError::FlashEraseFailed(
                iap_status::SECTOR_NOT_PREPARED_FOR_WRITE_OPERATION,
            ));
        }
        self.memory[start..end].fill(0xFF);
        Ok(())
    }

    fn program(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
        self.ops.push(FlashOp::Program {
            address,
            len: data.len(),
        });
        let prepared = self.prepared.take();
        if let Some(&status) = self.program_failures.get(&address) {
            return Err(HalError::FlashWriteFailed(status));
        }
        if !PROGRAM_CHUNK_SIZES.contains(&data.len()) {
            return Err(HalError::FlashWriteFailed(iap_status::COUNT_ERROR));
        }
        if address % 256 != 0 {
            return Err(HalError::FlashWriteFailed(iap_status::DST_ADDR_ERROR));
        }
        let offset = self
            .offset_of(address, data.len())
            .ok_or(HalError::FlashWriteFailed(iap_status::DST_ADDR_NOT_MAPPED))?;
        let last_address = address + data.len() as u32 - 1;
        let covered = match (self.sector_of(address), self.sector_of(last_address)) {
            (Some(first), Some(last)) => {
                matches!(prepared, Some((p_first, p_last)) if p_first <= first && last <= p_last)
            }
            _ => false,
        };
        if !covered {
            return Err(HalError::FlashWriteFailed(
                iap_status::SECTOR_NOT_PREPARED_FOR_WRITE_OPERATION,
            ));
        }
        // Programming can only clear bits
        for (cell, byte) in self.memory[offset..offset + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        Ok(())
    }

    fn verify(&mut self, address: u32, data: &[u8]) -> HalResult<()> {
        self.ops.push(FlashOp::Verify {
            address,
            len: data.len(),
        });
        if let Some(&status) = self.verify_failures.get(&address) {
            return Err(HalError::FlashVerifyFailed(status));
        }
        let offset = self
            .offset_of(address, data.len())
            .ok_or(HalError::FlashVerifyFailed(iap_status::DST_ADDR_NOT_MAPPED))?;
        if &self.memory[offset..offset + data.len()] == data {
            Ok(())
        } else {
            Err(HalError::FlashVerifyFailed(iap_status::COMPARE_ERROR))
        }
    }

    fn read(&self, address: u32, buffer: &mut [u8]) -> HalResult<()> {
        let offset = self
            .offset_of(address, buffer.len())
            .ok_or(HalError::FlashOutOfBounds)?;
        buffer.copy_from_slice(&self.memory[offset..offset + buffer.len()]);
        Ok(())
    }

    fn sector_of(&self, address: u32) -> Option<u32> {
        let offset = address.checked_sub(self.base)?;
        self.sectors
            .iter()
            .position(|&(start, size)| offset >= start && offset - start < size)
            .and_then(|index| u32::try_from(index).ok())
    }
}

// =============================================================================
// SD card storage
// =============================================================================

/// Open file handle of [`SimStorage`]
#[derive(Debug)]
pub struct SimFile {
    name: String,
    position: usize,
}

impl SimFile {
    /// Name the file was opened with
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Simulated FAT volume on an SD card
#[derive(Debug, Clone, Default)]
pub struct SimStorage {
    files: BTreeMap<String, Vec<u8>>,
    directories: Vec<String>,
    unmounted: bool,
    open_status: Option<u32>,
    read_failure: Option<(usize, u32)>,
    rename_status: Option<u32>,
    max_read: Option<usize>,
    open_handles: usize,
    closes: usize,
}

impl SimStorage {
    /// Empty mounted volume
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Volume that reports "not ready" for every operation
    #[must_use]
    pub fn unmounted() -> Self {
        Self {
            unmounted: true,
            ..Self::default()
        }
    }

    /// Add or replace a file
    pub fn insert_file(&mut self, name: &str, data: &[u8]) {
        self.files.insert(name.to_string(), data.to_vec());
    }

    /// Add a directory entry
    pub fn insert_dir(&mut self, name: &str) {
        self.directories.push(name.to_string());
    }

    /// Check whether a file exists
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Contents of a file
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Names of all files, sorted
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Make `open` fail with `status`
    pub fn fail_open(&mut self, status: u32) {
        self.open_status = Some(status);
    }

    /// Make reads fail with `status` once `offset` bytes have been delivered
    pub fn fail_read_after(&mut self, offset: usize, status: u32) {
        self.read_failure = Some((offset, status));
    }

    /// Make `rename` fail with `status`
    pub fn fail_rename(&mut self, status: u32) {
        self.rename_status = Some(status);
    }

    /// Deliver at most `max` bytes per read call
    pub fn limit_read(&mut self, max: usize) {
        self.max_read = Some(max);
    }

    /// Files opened and not yet closed
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.open_handles
    }

    /// Number of close calls
    #[must_use]
    pub fn closes(&self) -> usize {
        self.closes
    }

    fn check_mounted(&self) -> HalResult<()> {
        if self.unmounted {
            Err(HalError::StorageNotMounted)
        } else {
            Ok(())
        }
    }
}

impl FileStorage for SimStorage {
    type File = SimFile;

    fn stat(&mut self, name: &str) -> HalResult<Option<FileInfo>> {
        self.check_mounted()?;
        if self.directories.iter().any(|d| d == name) {
            return Ok(Some(FileInfo { size: 0, is_dir: true }));
        }
        Ok(self.files.get(name).map(|data| FileInfo {
            size: u32::try_from(data.len()).unwrap_or(u32::MAX),
            is_dir: false,
        }))
    }

    fn open(&mut self, name: &str) -> HalResult<SimFile> {
        self.check_mounted()?;
        if let Some(status) = self.open_status {
            return Err(HalError::FileOpenFailed(status));
        }
        if !self.files.contains_key(name) {
            return Err(HalError::FileOpenFailed(fat_status::FR_NO_FILE));
        }
        self.open_handles += 1;
        Ok(SimFile {
            name: name.to_string(),
            position: 0,
        })
    }

    fn read(&mut self, file: &mut SimFile, buffer: &mut [u8]) -> HalResult<usize> {
        let data = self
            .files
            .get(&file.name)
            .ok_or(HalError::FileReadFailed(fat_status::FR_INT_ERR))?;
        if let Some((offset, status)) = self.read_failure {
            if file.position >= offset {
                return Err(HalError::FileReadFailed(status));
            }
        }
        let remaining = data.len().saturating_sub(file.position);
        let mut count = remaining.min(buffer.len());
        if let Some(max) = self.max_read {
            count = count.min(max);
        }
        if let Some((offset, _)) = self.read_failure {
            count = count.min(offset - file.position);
        }
        buffer[..count].copy_from_slice(&data[file.position..file.position + count]);
        file.position += count;
        Ok(count)
    }

    fn close(&mut self, _file: SimFile) {
        self.open_handles = self.open_handles.saturating_sub(1);
        self.closes += 1;
    }

    fn rename(&mut self, old_name: &str, new_name: &str) -> HalResult<()> {
        self.check_mounted()?;
        if let Some(status) = self.rename_status {
            return Err(HalError::FileRenameFailed(status));
        }
        if self.files.contains_key(new_name) {
            return Err(HalError::FileRenameFailed(fat_status::FR_EXIST));
        }
        let data = self
            .files
            .remove(old_name)
            .ok_or(HalError::FileRenameFailed(fat_status::FR_NO_FILE))?;
        self.files.insert(new_name.to_string(), data);
        Ok(())
    }
}

// =============================================================================
// UART
// =============================================================================

#[derive(Debug, Default)]
struct UartState {
    baud_rate: Option<u32>,
    output: Vec<u8>,
}

/// Simulated transmit-only UART capturing everything written
#[derive(Debug, Clone, Default)]
pub struct SimUart {
    state: Rc<RefCell<UartState>>,
    trace: SimTrace,
}

impl SimUart {
    /// Uninitialized UART
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// UART that records flush/deinit into `trace`
    #[must_use]
    pub fn with_trace(trace: SimTrace) -> Self {
        Self {
            state: Rc::default(),
            trace,
        }
    }

    /// Everything written so far, lossily decoded
    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.state.borrow().output).into_owned()
    }

    /// Baud rate set by the last `init`, `None` when not initialized
    #[must_use]
    pub fn baud_rate(&self) -> Option<u32> {
        self.state.borrow().baud_rate
    }
}

impl UartInterface for SimUart {
    fn init(&mut self, baud_rate: u32) -> HalResult<()> {
        if baud_rate == 0 {
            return Err(HalError::InvalidParameter);
        }
        self.state.borrow_mut().baud_rate = Some(baud_rate);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> HalResult<()> {
        let mut state = self.state.borrow_mut();
        if state.baud_rate.is_none() {
            return Err(HalError::NotInitialized);
        }
        state.output.push(byte);
        Ok(())
    }

    fn is_tx_ready(&self) -> bool {
        self.state.borrow().baud_rate.is_some()
    }

    fn flush(&mut self) -> HalResult<()> {
        self.trace.record(SimEvent::UartFlush);
        Ok(())
    }

    fn deinit(&mut self) {
        self.state.borrow_mut().baud_rate = None;
        self.trace.record(SimEvent::UartDeinit);
    }
}

// =============================================================================
// GPIO
// =============================================================================

#[derive(Debug, Default)]
struct PinState {
    high: bool,
    toggles: usize,
}

/// Simulated output pin
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    state: Rc<RefCell<PinState>>,
    trace: SimTrace,
}

impl SimPin {
    /// Pin starting low
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin that records toggles into `trace`
    #[must_use]
    pub fn with_trace(trace: SimTrace) -> Self {
        Self {
            state: Rc::default(),
            trace,
        }
    }

    /// Number of toggles so far
    #[must_use]
    pub fn toggles(&self) -> usize {
        self.state.borrow().toggles
    }
}

impl GpioPin for SimPin {
    fn set_high(&mut self) -> HalResult<()> {
        self.state.borrow_mut().high = true;
        Ok(())
    }

    fn set_low(&mut self) -> HalResult<()> {
        self.state.borrow_mut().high = false;
        Ok(())
    }

    fn is_high(&self) -> HalResult<bool> {
        Ok(self.state.borrow().high)
    }

    fn toggle(&mut self) -> HalResult<()> {
        {
            let mut state = self.state.borrow_mut();
            state.high = !state.high;
            state.toggles += 1;
        }
        self.trace.record(SimEvent::PinToggle);
        Ok(())
    }
}

// =============================================================================
// Delay
// =============================================================================

/// Panic payload raised by [`SimDelay`] once its budget is used up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayBudgetExhausted {
    /// Delay calls completed before the budget ran out
    pub calls: usize,
}

#[derive(Debug, Default)]
struct DelayState {
    calls: usize,
    total_ms: u64,
}

/// Simulated busy-wait that returns immediately
///
/// After `budget` calls the next call panics with [`DelayBudgetExhausted`],
/// which ends otherwise infinite loops under test.
#[derive(Debug, Clone)]
pub struct SimDelay {
    budget: usize,
    state: Rc<RefCell<DelayState>>,
    trace: SimTrace,
}

impl SimDelay {
    /// Delay allowing `budget` calls
    #[must_use]
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget,
            state: Rc::default(),
            trace: SimTrace::default(),
        }
    }

    /// Delay allowing `budget` calls that records into `trace`
    #[must_use]
    pub fn with_trace(budget: usize, trace: SimTrace) -> Self {
        Self {
            trace,
            ..Self::with_budget(budget)
        }
    }

    /// Completed delay calls
    #[must_use]
    pub fn calls(&self) -> usize {
        self.state.borrow().calls
    }

    /// Total simulated milliseconds
    #[must_use]
    pub fn total_ms(&self) -> u64 {
        self.state.borrow().total_ms
    }
}

impl DelayInterface for SimDelay {
    fn delay_ms(&mut self, ms: u32) {
        let calls = self.state.borrow().calls;
        if calls >= self.budget {
            std::panic::panic_any(DelayBudgetExhausted { calls });
        }
        {
            let mut state = self.state.borrow_mut();
            state.calls += 1;
            state.total_ms += u64::from(ms);
        }
        self.trace.record(SimEvent::Delay(ms));
    }
}

// =============================================================================
// Handoff
// =============================================================================

/// Panic payload raised by [`SimHandoff::start_application`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Value loaded into MSP and PSP
    pub stack_pointer: u32,
    /// Branch target
    pub entry: u32,
}

/// Simulated teardown and jump
#[derive(Debug, Clone, Default)]
pub struct SimHandoff {
    trace: SimTrace,
}

impl SimHandoff {
    /// Handoff recording into `trace`
    #[must_use]
    pub fn new(trace: SimTrace) -> Self {
        Self { trace }
    }
}

impl HandoffInterface for SimHandoff {
    fn disable_interrupts(&mut self) {
        self.trace.record(SimEvent::DisableInterrupts);
    }

    fn uninit_clocks(&mut self) {
        self.trace.record(SimEvent::UninitClocks);
    }

    fn uninit_board_io(&mut self) {
        self.trace.record(SimEvent::UninitBoardIo);
    }

    fn relocate_vector_table(&mut self, base: u32) {
        self.trace.record(SimEvent::RelocateVectorTable(base));
    }

    fn start_application(self, stack_pointer: u32, entry: u32) -> ! {
        self.trace.record(SimEvent::StartApplication {
            stack_pointer,
            entry,
        });
        std::panic::panic_any(Handoff {
            stack_pointer,
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lpc4078_sector_map() {
        let flash = SimFlash::lpc4078();
        assert_eq!(flash.size(), 512 * 1024);
        assert_eq!(flash.sector_of(0x0000_0000), Some(0));
        assert_eq!(flash.sector_of(0x0000_FFFF), Some(15));
        assert_eq!(flash.sector_of(0x0001_0000), Some(16));
        assert_eq!(flash.sector_of(0x0001_8000), Some(17));
        assert_eq!(flash.sector_of(0x0007_FFFF), Some(29));
        assert_eq!(flash.sector_of(0x0008_0000), None);
    }

    #[test]
    fn test_program_requires_prepare() {
        let mut flash = SimFlash::lpc4078();
        let data = [0u8; 256];
        assert_eq!(
            flash.program(0x0001_0000, &data),
            Err(HalError::FlashWriteFailed(9))
        );
        flash.prepare_sectors(16, 16).unwrap();
        assert!(flash.program(0x0001_0000, &data).is_ok());
        // Prepare is consumed by the operation
        assert_eq!(
            flash.program(0x0001_0100, &data),
            Err(HalError::FlashWriteFailed(9))
        );
    }

    #[test]
    fn test_program_clears_bits_only() {
        let mut flash = SimFlash::lpc4078();
        flash.load(0x0001_0000, &[0x0F; 256]);
        flash.prepare_sectors(16, 16).unwrap();
        flash.program(0x0001_0000, &[0xF0; 256]).unwrap();
        assert_eq!(flash.contents(0x0001_0000, 4), &[0x00; 4]);
        assert_eq!(
            flash.verify(0x0001_0000, &[0xF0; 256]),
            Err(HalError::FlashVerifyFailed(iap_status::COMPARE_ERROR))
        );
    }

    #[test]
    fn test_program_checks_count_and_alignment() {
        let mut flash = SimFlash::lpc4078();
        flash.prepare_sectors(16, 16).unwrap();
        assert_eq!(
            flash.program(0x0001_0000, &[0u8; 100]),
            Err(HalError::FlashWriteFailed(iap_status::COUNT_ERROR))
        );
        flash.prepare_sectors(16, 16).unwrap();
        assert_eq!(
            flash.program(0x0001_0010, &[0u8; 256]),
            Err(HalError::FlashWriteFailed(iap_status::DST_ADDR_ERROR))
        );
    }

    #[test]
    fn test_erase_restores_fill() {
        let mut flash = SimFlash::lpc4078();
        flash.load(0x0001_0000, &[0u8; 64]);
        flash.prepare_sectors(16, 29).unwrap();
        flash.erase_sectors(16, 29).unwrap();
        assert!(flash.contents(0x0001_0000, 64).iter().all(|&b| b == 0xFF));
        assert_eq!(flash.erase_count(), 1);
    }

    #[test]
    fn test_injected_erase_failure_keeps_contents() {
        let mut flash = SimFlash::lpc4078();
        flash.load(0x0001_0000, &[0u8; 4]);
        flash.fail_erase(iap_status::BUSY);
        flash.prepare_sectors(16, 29).unwrap();
        assert_eq!(
            flash.erase_sectors(16, 29),
            Err(HalError::FlashEraseFailed(iap_status::BUSY))
        );
        assert_eq!(flash.contents(0x0001_0000, 4), &[0u8; 4]);
    }

    #[test]
    fn test_storage_short_reads_and_failures() {
        let mut storage = SimStorage::new();
        storage.insert_file("a.bin", &[1, 2, 3, 4, 5]);
        storage.limit_read(2);
        let mut file = storage.open("a.bin").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(storage.read(&mut file, &mut buf).unwrap(), 2);
        assert_eq!(storage.read(&mut file, &mut buf).unwrap(), 2);
        assert_eq!(storage.read(&mut file, &mut buf).unwrap(), 1);
        assert_eq!(storage.read(&mut file, &mut buf).unwrap(), 0);
        storage.close(file);
        assert_eq!(storage.open_handles(), 0);

        storage.fail_read_after(3, fat_status::FR_DISK_ERR);
        let mut file = storage.open("a.bin").unwrap();
        assert_eq!(storage.read(&mut file, &mut buf).unwrap(), 2);
        assert_eq!(storage.read(&mut file, &mut buf).unwrap(), 1);
        assert_eq!(
            storage.read(&mut file, &mut buf),
            Err(HalError::FileReadFailed(fat_status::FR_DISK_ERR))
        );
    }

    #[test]
    fn test_storage_stat_and_rename() {
        let mut storage = SimStorage::new();
        storage.insert_file("a.bin", &[0; 10]);
        storage.insert_dir("dir");
        assert_eq!(
            storage.stat("a.bin").unwrap(),
            Some(FileInfo { size: 10, is_dir: false })
        );
        assert!(storage.stat("dir").unwrap().unwrap().is_dir);
        assert_eq!(storage.stat("missing").unwrap(), None);

        storage.rename("a.bin", "a.bin.flashed").unwrap();
        assert!(!storage.exists("a.bin"));
        assert!(storage.exists("a.bin.flashed"));
        assert_eq!(
            storage.rename("a.bin", "b.bin"),
            Err(HalError::FileRenameFailed(fat_status::FR_NO_FILE))
        );
    }

    #[test]
    fn test_unmounted_storage() {
        let mut storage = SimStorage::unmounted();
        assert_eq!(storage.stat("a.bin"), Err(HalError::StorageNotMounted));
    }

    #[test]
    fn test_uart_requires_init() {
        let mut uart = SimUart::new();
        let observer = uart.clone();
        assert_eq!(uart.write_byte(b'x'), Err(HalError::NotInitialized));
        uart.init(115_200).unwrap();
        uart.write(b"ok").unwrap();
        uart.deinit();
        assert_eq!(observer.output(), "ok");
        assert_eq!(observer.baud_rate(), None);
    }

    #[test]
    fn test_delay_budget_panics() {
        let mut delay = SimDelay::with_budget(2);
        delay.delay_ms(10);
        delay.delay_ms(10);
        let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            delay.delay_ms(10);
        }))
        .unwrap_err();
        assert_eq!(
            payload.downcast_ref::<DelayBudgetExhausted>(),
            Some(&DelayBudgetExhausted { calls: 2 })
        );
    }

    #[test]
    fn test_handoff_panics_with_payload() {
        let trace = SimTrace::new();
        let handoff = SimHandoff::new(trace.clone());
        let payload = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handoff.start_application(0x1000_8000, 0x0001_0101)
        }))
        .unwrap_err();
        assert_eq!(
            payload.downcast_ref::<Handoff>(),
            Some(&Handoff { stack_pointer: 0x1000_8000, entry: 0x0001_0101 })
        );
        assert_eq!(trace.events().len(), 1);
    }
}
