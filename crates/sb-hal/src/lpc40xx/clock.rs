// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! LPC40xx system control: peripheral clock and power

use super::{read_reg, write_reg};

/// System control block base address
const LPC_SC_BASE: u32 = 0x400F_C000;

/// Peripheral power control register
const PCONP: u32 = LPC_SC_BASE + 0x0C4;

/// Peripheral clock selection register
const PCLKSEL: u32 = LPC_SC_BASE + 0x1A8;

/// PCLK = CCLK / 1
const PCLKSEL_DIV_1: u32 = 1;

/// Divider restored before handing over to the application
const PCLKSEL_RESET_DIV: u32 = 4;

/// Internal RC oscillator frequency, used undivided as CCLK
pub const IRC_HZ: u32 = 12_000_000;

/// Peripheral power bits in `PCONP`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Peripheral {
    /// UART0
    Uart0 = 3,
    /// GPIO
    Gpio = 15,
    /// SSP2
    Ssp2 = 20,
}

/// Owned handle to the clock configuration
pub struct SystemClock {
    peripheral_divider: u32,
}

impl SystemClock {
    pub(crate) const fn new() -> Self {
        Self {
            peripheral_divider: PCLKSEL_RESET_DIV,
        }
    }

    /// CPU clock in Hz
    #[must_use]
    pub const fn cpu_hz(&self) -> u32 {
        IRC_HZ
    }

    /// Peripheral clock in Hz
    #[must_use]
    pub const fn peripheral_hz(&self) -> u32 {
        IRC_HZ / self.peripheral_divider
    }

    /// Run peripherals at the CPU clock
    pub fn init(&mut self) {
        // SAFETY: PCLKSEL is a plain divider register owned by this handle
        unsafe { write_reg(PCLKSEL, PCLKSEL_DIV_1) };
        self.peripheral_divider = PCLKSEL_DIV_1;
    }

    /// Restore the reset peripheral divider
    pub fn uninit(&mut self) {
        // SAFETY: see `init`
        unsafe { write_reg(PCLKSEL, PCLKSEL_RESET_DIV) };
        self.peripheral_divider = PCLKSEL_RESET_DIV;
    }
}

/// Switch power on to a peripheral
pub(crate) fn power_on(peripheral: Peripheral) {
    let bit = 1u32 << peripheral as u32;
    // SAFETY: PCONP bits are only ever set during single-threaded bring-up
    unsafe { write_reg(PCONP, read_reg(PCONP) | bit) };
}
