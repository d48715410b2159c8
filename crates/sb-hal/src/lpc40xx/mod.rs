// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! LPC40xx Hardware Abstraction Layer
//!
//! Drivers for the NXP LPC4078 (ARM Cortex-M4) as wired on the SJ2 board.
//!
//! # Supported Features
//!
//! - Internal flash through the IAP boot ROM
//! - UART0 diagnostic console
//! - GPIO and IOCON pin functions
//! - Peripheral clock selection
//! - SD card FAT volume through the board support package
//! - Teardown and handoff to the application image

pub mod clock;
pub mod delay;
pub mod fs;
pub mod gpio;
pub mod iap;
pub mod uart;

use core::sync::atomic::{AtomicBool, Ordering};

pub use clock::SystemClock;
pub use delay::Lpc40xxDelay;
pub use fs::{SdFile, SdFileSystem};
pub use gpio::{BoardIo, Lpc40xxGpioPin, PinFunction};
pub use iap::Lpc40xxIap;
pub use uart::{BaudDivisor, Lpc40xxUart};

use crate::error::HalResult;
use crate::traits::{HandoffInterface, UartInterface};

// =============================================================================
// Register access
// =============================================================================

#[inline]
pub(crate) unsafe fn read_reg(address: u32) -> u32 {
    core::ptr::read_volatile(address as *const u32)
}

#[inline]
pub(crate) unsafe fn write_reg(address: u32, value: u32) {
    core::ptr::write_volatile(address as *mut u32, value);
}

// =============================================================================
// Core peripherals used by the handoff
// =============================================================================

/// NVIC interrupt clear-enable registers
const NVIC_ICER: u32 = 0xE000_E180;
/// NVIC interrupt clear-pending registers
const NVIC_ICPR: u32 = 0xE000_E280;
/// Number of ICER/ICPR words covering the LPC40xx interrupt lines
const NVIC_WORDS: u32 = 2;
/// SysTick control and status register
const SYST_CSR: u32 = 0xE000_E010;
/// Interrupt control and state register
const SCB_ICSR: u32 = 0xE000_ED04;
/// ICSR: clear pending SysTick
const ICSR_PENDSTCLR: u32 = 1 << 25;
/// Vector table offset register
const SCB_VTOR: u32 = 0xE000_ED08;

// =============================================================================
// Handoff
// =============================================================================

/// Teardown of bootloader state and the jump into the application
pub struct Lpc40xxHandoff {
    /// Clock configuration, restored before the jump
    pub clock: SystemClock,
    /// Bootloader pins, released before the jump
    pub board: BoardIo,
}

impl HandoffInterface for Lpc40xxHandoff {
    fn disable_interrupts(&mut self) {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "arm")] {
                cortex_m::interrupt::disable();
            }
        }
        // SAFETY: writes of all-ones to the clear registers only mask and
        // unpend interrupt lines; SysTick is owned by the bootloader
        unsafe {
            for word in 0..NVIC_WORDS {
                write_reg(NVIC_ICER + word * 4, 0xFFFF_FFFF);
                write_reg(NVIC_ICPR + word * 4, 0xFFFF_FFFF);
            }
            write_reg(SYST_CSR, 0);
            write_reg(SCB_ICSR, ICSR_PENDSTCLR);
        }
    }

    fn uninit_clocks(&mut self) {
        self.clock.uninit();
    }

    fn uninit_board_io(&mut self) {
        self.board.uninit();
    }

    fn relocate_vector_table(&mut self, base: u32) {
        // SAFETY: interrupts are masked; the caller passes an aligned base
        unsafe { write_reg(SCB_VTOR, base) };
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "arm")] {
                cortex_m::asm::dsb();
                cortex_m::asm::isb();
            }
        }
    }

    fn start_application(self, stack_pointer: u32, entry: u32) -> ! {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "arm")] {
                // SAFETY: the launcher validated `entry` against the
                // application region. All NVIC lines are masked, so clearing
                // PRIMASK leaves the application with reset interrupt state.
                unsafe {
                    core::arch::asm!(
                        "msr msp, {sp}",
                        "msr psp, {sp}",
                        "cpsie i",
                        "bx {entry}",
                        sp = in(reg) stack_pointer,
                        entry = in(reg) entry,
                        options(noreturn),
                    )
                }
            } else {
                let _ = (stack_pointer, entry);
                loop {
                    core::hint::spin_loop();
                }
            }
        }
    }
}

// =============================================================================
// Board HAL
// =============================================================================

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Every driver the bootloader uses, as owned handles
pub struct Lpc40xxHal {
    /// IAP flash driver
    pub flash: Lpc40xxIap,
    /// Diagnostic UART
    pub uart: Lpc40xxUart,
    /// Status LED
    pub led: Lpc40xxGpioPin,
    /// Busy-wait delay
    pub delay: Lpc40xxDelay,
    /// SD card volume
    pub storage: SdFileSystem,
    /// Teardown and jump
    pub handoff: Lpc40xxHandoff,
}

impl Lpc40xxHal {
    /// Claim the hardware
    ///
    /// Returns `None` on every call after the first.
    #[must_use]
    pub fn take() -> Option<Self> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        let clock = SystemClock::new();
        let cpu_hz = clock.cpu_hz();
        let pclk_hz = clock.peripheral_hz();
        Some(Self {
            flash: Lpc40xxIap::new(cpu_hz),
            uart: Lpc40xxUart::new(pclk_hz),
            led: Lpc40xxGpioPin::new_unconfigured(gpio::STATUS_LED.0, gpio::STATUS_LED.1),
            delay: Lpc40xxDelay::new(cpu_hz),
            storage: SdFileSystem::unbound(),
            handoff: Lpc40xxHandoff {
                clock,
                board: BoardIo::new(),
            },
        })
    }

    /// Bring up clocks, pins and the diagnostic UART
    ///
    /// Storage is mounted separately by [`Lpc40xxHal::mount_storage`] so
    /// that a missing card can be reported on the console.
    ///
    /// # Errors
    ///
    /// Propagates pin and UART configuration failures.
    pub fn init(&mut self, baud_rate: u32) -> HalResult<()> {
        self.handoff.clock.init();
        self.handoff.board.init()?;
        self.uart
            .set_peripheral_clock(self.handoff.clock.peripheral_hz());
        self.uart.init(baud_rate)?;
        self.led = Lpc40xxGpioPin::new(gpio::STATUS_LED.0, gpio::STATUS_LED.1)?.into_output();
        self.storage = SdFileSystem::new()?;
        Ok(())
    }

    /// Mount the SD card volume
    ///
    /// # Errors
    ///
    /// Returns `HalError::StorageNotMounted` when no usable card is present.
    pub fn mount_storage(&mut self) -> HalResult<()> {
        self.storage.mount()
    }
}
