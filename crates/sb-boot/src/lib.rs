// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! SD-card bootloader library
//!
//! Everything the bootloader does after board bring-up, written against the
//! `sb-hal` capability traits so the same code runs on the LPC40xx and in
//! host tests:
//!
//! - **Update**: flash an image found on the SD card, then mark it consumed
//! - **Launch**: check the application vector table and jump, or halt
//! - **Console**: log sink on the diagnostic UART
//!
//! # Boot Flow
//!
//! 1. Look for the image file on the card and copy it into the
//!    application region if present
//! 2. Read the initial stack pointer and reset vector of the application
//! 3. Hand off if the reset vector lies in the region, otherwise report and
//!    blink forever

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(test)]
extern crate std;

pub mod console;
pub mod launch;
pub mod update;

pub use console::Console;
pub use launch::{decide_and_boot, validate_application, ApplicationImage, BootDecision, BootPeripherals};
pub use update::{apply_update, run_update, CopyEnd, UpdateOutcome, UpdateReport, WriteOperation, WriteStatus};

use sb_common::{log_info, BootConfig};
use sb_hal::{DelayInterface, FileStorage, GpioPin, HandoffInterface, IapFlash, UartInterface};

/// Log module tag
const MODULE: &str = "boot";

/// Run the update step and boot whatever ends up in flash
///
/// Storage must already be mounted; an unmounted volume is treated as a
/// card without an image.
pub fn run_boot_sequence<F, S, U, P, D, H>(
    config: &BootConfig,
    flash: &mut F,
    storage: &mut S,
    mut peripherals: BootPeripherals<U, P, D, H>,
) -> !
where
    F: IapFlash,
    S: FileStorage,
    U: UartInterface,
    P: GpioPin,
    D: DelayInterface,
    H: HandoffInterface,
{
    let report = apply_update(
        flash,
        storage,
        &config.region,
        &config.update,
        &mut peripherals.console,
    );
    if report.outcome == UpdateOutcome::NoImageFound && !report.erase_attempted {
        log_info!(peripherals.console, MODULE, "keeping current application");
    }

    decide_and_boot(flash, config, peripherals)
}
