// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Application validation and handoff
//!
//! The application region starts with a Cortex-M vector table. Word 0 is
//! the initial stack pointer and word 1 the reset vector. The image is
//! accepted when its reset vector points back into the region; nothing else
//! is checked. Erased flash (`0xFFFF_FFFF`) and a zeroed table both fail.
//!
//! # Handoff sequence
//!
//! 1. Mask interrupts, stop SysTick
//! 2. Return peripheral clocks to reset configuration
//! 3. Drain and release the diagnostic UART
//! 4. Return bootloader pins to GPIO
//! 5. Point VTOR at the application vector table
//! 6. Load MSP/PSP and branch to the reset vector
//!
//! When the image is rejected the bootloader never returns either: it keeps
//! printing what it expected and blinks the status LED.

use sb_common::constants::{
    VECTOR_TABLE_RESET_OFFSET, VECTOR_TABLE_SP_OFFSET, VTOR_TBLOFF_MASK,
};
use sb_common::{log_error, log_info, log_warn, BootConfig, FlashRegion};
use sb_hal::{DelayInterface, GpioPin, HalResult, HandoffInterface, IapFlash, UartInterface};

use crate::console::Console;

/// Log module tag
const MODULE: &str = "launch";

/// Word read from erased flash
const ERASED_WORD: u32 = 0xFFFF_FFFF;

/// First two words of the application vector table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationImage {
    /// Initial main stack pointer
    pub initial_stack_pointer: u32,
    /// Reset handler address (Thumb bit included)
    pub reset_vector_address: u32,
}

impl ApplicationImage {
    /// Vector table as seen on an erased region
    pub const ERASED: Self = Self {
        initial_stack_pointer: ERASED_WORD,
        reset_vector_address: ERASED_WORD,
    };

    /// Read the vector table at the start of `region`
    ///
    /// # Errors
    ///
    /// Propagates flash read failures.
    pub fn read<F: IapFlash>(flash: &F, region: &FlashRegion) -> HalResult<Self> {
        let base = region.start_address;
        Ok(Self {
            initial_stack_pointer: flash.read_word(base + VECTOR_TABLE_SP_OFFSET)?,
            reset_vector_address: flash.read_word(base + VECTOR_TABLE_RESET_OFFSET)?,
        })
    }

    /// Check that the reset vector lands inside `region`
    #[must_use]
    pub const fn entry_in(&self, region: &FlashRegion) -> bool {
        region.contains(self.reset_vector_address)
    }
}

/// What the bootloader does with the image in flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootDecision {
    /// Hand control to the image
    Boot(ApplicationImage),
    /// Stay in the bootloader and report the image
    Halt(ApplicationImage),
}

/// Inspect the image at the start of `region`
///
/// An unreadable vector table is treated like erased flash.
pub fn validate_application<F: IapFlash>(flash: &F, region: &FlashRegion) -> BootDecision {
    let image = ApplicationImage::read(flash, region).unwrap_or(ApplicationImage::ERASED);
    if image.entry_in(region) {
        BootDecision::Boot(image)
    } else {
        BootDecision::Halt(image)
    }
}

/// Devices consumed by the boot decision
pub struct BootPeripherals<U, P, D, H>
where
    U: UartInterface,
    P: GpioPin,
    D: DelayInterface,
    H: HandoffInterface,
{
    /// Diagnostic console
    pub console: Console<U>,
    /// LED blinked while halted
    pub status_led: P,
    /// Delay between halt reports
    pub delay: D,
    /// Teardown and jump
    pub handoff: H,
}

/// Boot the application in flash, or halt reporting why not
pub fn decide_and_boot<F, U, P, D, H>(
    flash: &F,
    config: &BootConfig,
    peripherals: BootPeripherals<U, P, D, H>,
) -> !
where
    F: IapFlash,
    U: UartInterface,
    P: GpioPin,
    D: DelayInterface,
    H: HandoffInterface,
{
    let BootPeripherals {
        console,
        status_led,
        delay,
        handoff,
    } = peripherals;

    match validate_application(flash, &config.region) {
        BootDecision::Boot(image) => start(image, &config.region, console, handoff),
        BootDecision::Halt(image) => halt(image, config, console, status_led, delay),
    }
}

fn start<U, H>(image: ApplicationImage, region: &FlashRegion, mut console: Console<U>, mut handoff: H) -> !
where
    U: UartInterface,
    H: HandoffInterface,
{
    log_info!(
        console,
        MODULE,
        "starting application: SP 0x{:08X}, entry 0x{:08X}",
        image.initial_stack_pointer,
        image.reset_vector_address
    );
    // Drain while the UART clock is still configured
    console.flush();

    handoff.disable_interrupts();
    handoff.uninit_clocks();
    console.quiesce();
    handoff.uninit_board_io();
    handoff.relocate_vector_table(region.start_address & VTOR_TBLOFF_MASK);
    handoff.start_application(image.initial_stack_pointer, image.reset_vector_address)
}

fn halt<U, P, D>(
    image: ApplicationImage,
    config: &BootConfig,
    mut console: Console<U>,
    mut status_led: P,
    mut delay: D,
) -> !
where
    U: UartInterface,
    P: GpioPin,
    D: DelayInterface,
{
    let region = &config.region;
    let mut led_reported = false;
    loop {
        log_error!(
            console,
            MODULE,
            "no valid application: entry 0x{:08X} outside 0x{:08X}..=0x{:08X}",
            image.reset_vector_address,
            region.start_address,
            region.end_address
        );
        log_error!(
            console,
            MODULE,
            "copy {} to the SD card and reset",
            config.update.image_name
        );
        if let Err(e) = status_led.toggle() {
            if !led_reported {
                log_warn!(console, MODULE, "status LED unavailable: {}", e);
                led_reported = true;
            }
        }
        delay.delay_ms(config.halt_report_interval_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_hal::sim::{DelayBudgetExhausted, SimDelay, SimFlash, SimHandoff, SimTrace, SimUart};
    use sb_hal::HalError;
    use std::panic::{self, AssertUnwindSafe};

    /// LED whose driver always fails
    struct BrokenLed;

    impl GpioPin for BrokenLed {
        fn set_high(&mut self) -> HalResult<()> {
            Err(HalError::GpioError)
        }

        fn set_low(&mut self) -> HalResult<()> {
            Err(HalError::GpioError)
        }

        fn is_high(&self) -> HalResult<bool> {
            Err(HalError::GpioError)
        }

        fn toggle(&mut self) -> HalResult<()> {
            Err(HalError::GpioError)
        }
    }

    fn flash_with_table(sp: u32, reset: u32) -> SimFlash {
        let mut flash = SimFlash::lpc4078();
        let mut table = [0u8; 8];
        table[..4].copy_from_slice(&sp.to_le_bytes());
        table[4..].copy_from_slice(&reset.to_le_bytes());
        flash.load(FlashRegion::LPC4078_APPLICATION.start_address, &table);
        flash
    }

    #[test]
    fn test_erased_region_halts() {
        let flash = SimFlash::lpc4078();
        assert_eq!(
            validate_application(&flash, &FlashRegion::LPC4078_APPLICATION),
            BootDecision::Halt(ApplicationImage::ERASED)
        );
    }

    #[test]
    fn test_entry_in_region_boots() {
        let flash = flash_with_table(0x1001_0000, 0x0001_0101);
        assert_eq!(
            validate_application(&flash, &FlashRegion::LPC4078_APPLICATION),
            BootDecision::Boot(ApplicationImage {
                initial_stack_pointer: 0x1001_0000,
                reset_vector_address: 0x0001_0101,
            })
        );
    }

    #[test]
    fn test_stack_pointer_is_not_checked() {
        let flash = flash_with_table(0, 0x0007_FFF1);
        assert!(matches!(
            validate_application(&flash, &FlashRegion::LPC4078_APPLICATION),
            BootDecision::Boot(_)
        ));
    }

    #[test]
    fn test_unreadable_region_halts() {
        let region = FlashRegion {
            start_address: 0x0010_0000,
            end_address: 0x0010_FFFF,
            ..FlashRegion::LPC4078_APPLICATION
        };
        assert_eq!(
            validate_application(&SimFlash::lpc4078(), &region),
            BootDecision::Halt(ApplicationImage::ERASED)
        );
    }

    #[test]
    fn test_led_failure_reported_once_while_halted() {
        let flash = SimFlash::lpc4078();
        let mut uart = SimUart::new();
        uart.init(115_200).unwrap();
        let peripherals = BootPeripherals {
            console: Console::new(uart.clone()),
            status_led: BrokenLed,
            delay: SimDelay::with_budget(3),
            handoff: SimHandoff::new(SimTrace::new()),
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            decide_and_boot(&flash, &BootConfig::DEFAULT, peripherals)
        }));

        let payload = result.expect_err("halt loop returned");
        assert_eq!(
            payload.downcast_ref::<DelayBudgetExhausted>(),
            Some(&DelayBudgetExhausted { calls: 3 })
        );
        let output = uart.output();
        assert_eq!(output.matches("no valid application").count(), 4);
        assert_eq!(output.matches("W [launch] status LED unavailable").count(), 1);
    }
}
