// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! LPC40xx UART0 driver
//!
//! Polled, transmit-only driver for the diagnostic console. Pin functions
//! for P0.2 (TXD0) and P0.3 (RXD0) are set by [`BoardIo`](super::gpio::BoardIo).
//!
//! The boot ROM may leave UART0 with a fractional divider programmed, so
//! `init` rewrites every divider register instead of trusting reset values.

use super::clock::{power_on, Peripheral};
use super::{read_reg, write_reg};
use crate::error::{HalError, HalResult};
use crate::traits::UartInterface;

// ============================================================================
// UART0 Registers
// ============================================================================

/// UART0 base address
const UART0_BASE: u32 = 0x4000_C000;

/// Transmit holding register / divisor latch LSB (DLAB = 1)
const THR_DLL: u32 = UART0_BASE + 0x00;
/// Divisor latch MSB (DLAB = 1)
const DLM: u32 = UART0_BASE + 0x04;
/// FIFO control register (write-only)
const FCR: u32 = UART0_BASE + 0x08;
/// Line control register
const LCR: u32 = UART0_BASE + 0x0C;
/// Line status register
const LSR: u32 = UART0_BASE + 0x14;
/// Fractional divider register
const FDR: u32 = UART0_BASE + 0x28;

/// Divisor latch access bit
const LCR_DLAB: u32 = 1 << 7;
/// 8 data bits, no parity, 1 stop bit
const LCR_8N1: u32 = 0x03;

/// FIFO enable
const FCR_FIFO_ENABLE: u32 = 1 << 0;
/// RX trigger level: 8 characters
const FCR_RX_TRIGGER_8: u32 = 2 << 6;

/// Transmit holding register empty
const LSR_THRE: u32 = 1 << 5;
/// Transmitter empty (shift register drained)
const LSR_TEMT: u32 = 1 << 6;

/// FDR reset value: DIVADDVAL = 0, MULVAL = 1
const FDR_RESET: u32 = 1 << 4;

// ============================================================================
// Baud rate divisor
// ============================================================================

/// Divisor latch and fractional divider settings for one baud rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudDivisor {
    /// 16-bit divisor latch value
    pub latch: u16,
    /// Fractional divider DIVADDVAL (0-14)
    pub div_add: u8,
    /// Fractional divider MULVAL (1-15)
    pub mul: u8,
}

impl BaudDivisor {
    /// Pick the divisor closest to `baud_rate` for a peripheral clock
    ///
    /// Baud = PCLK / (16 * latch * (1 + div_add / mul)).
    #[must_use]
    pub fn for_baud(pclk_hz: u32, baud_rate: u32) -> Option<Self> {
        if baud_rate == 0 {
            return None;
        }
        let pclk = u64::from(pclk_hz);
        let baud = u64::from(baud_rate);
        let mut best: Option<(Self, u64)> = None;

        for mul in 1u8..=15 {
            for div_add in 0..mul {
                let num = pclk * u64::from(mul);
                let den = 16 * baud * u64::from(mul + div_add);
                let latch = (num + den / 2) / den;
                // Fractional mode requires a latch of at least 3
                if latch == 0 || latch > 0xFFFF || (div_add > 0 && latch < 3) {
                    continue;
                }
                let actual = num / (16 * latch * u64::from(mul + div_add));
                let error = actual.abs_diff(baud);
                if best.map_or(true, |(_, e)| error < e) {
                    let latch = u16::try_from(latch).ok()?;
                    best = Some((Self { latch, div_add, mul }, error));
                }
            }
        }
        best.map(|(divisor, _)| divisor)
    }

    /// Baud rate actually produced for a peripheral clock
    #[must_use]
    pub fn actual_baud(&self, pclk_hz: u32) -> u32 {
        let num = u64::from(pclk_hz) * u64::from(self.mul);
        let den = 16 * u64::from(self.latch) * u64::from(self.mul + self.div_add);
        u32::try_from(num / den).unwrap_or(u32::MAX)
    }
}

// ============================================================================
// UART0 Driver
// ============================================================================

/// LPC40xx UART0 driver
pub struct Lpc40xxUart {
    pclk_hz: u32,
    initialized: bool,
}

impl Lpc40xxUart {
    pub(crate) const fn new(pclk_hz: u32) -> Self {
        Self {
            pclk_hz,
            initialized: false,
        }
    }

    /// Update the peripheral clock used for divisor calculation
    pub fn set_peripheral_clock(&mut self, pclk_hz: u32) {
        self.pclk_hz = pclk_hz;
    }

    fn wait_for(mask: u32) {
        // SAFETY: LSR is read-only status
        while unsafe { read_reg(LSR) } & mask == 0 {
            core::hint::spin_loop();
        }
    }
}

impl UartInterface for Lpc40xxUart {
    fn init(&mut self, baud_rate: u32) -> HalResult<()> {
        let divisor =
            BaudDivisor::for_baud(self.pclk_hz, baud_rate).ok_or(HalError::InvalidParameter)?;

        power_on(Peripheral::Uart0);

        // SAFETY: UART0 registers are owned by this driver
        unsafe {
            write_reg(LCR, LCR_DLAB);
            write_reg(FDR, FDR_RESET);
            write_reg(DLM, u32::from(divisor.latch >> 8));
            write_reg(THR_DLL, u32::from(divisor.latch & 0xFF));
            write_reg(FDR, u32::from(divisor.div_add) | (u32::from(divisor.mul) << 4));

            // FCR must be written before LCR clears DLAB
            write_reg(FCR, FCR_FIFO_ENABLE);
            write_reg(FCR, FCR_FIFO_ENABLE | FCR_RX_TRIGGER_8);
            write_reg(LCR, LCR_8N1);
        }

        self.initialized = true;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        Self::wait_for(LSR_THRE);
        // SAFETY: THR write with DLAB cleared
        unsafe { write_reg(THR_DLL, u32::from(byte)) };
        Ok(())
    }

    fn is_tx_ready(&self) -> bool {
        // SAFETY: LSR is read-only status
        self.initialized && unsafe { read_reg(LSR) } & LSR_THRE != 0
    }

    fn flush(&mut self) -> HalResult<()> {
        if !self.initialized {
            return Err(HalError::NotInitialized);
        }
        Self::wait_for(LSR_TEMT);
        Ok(())
    }

    fn deinit(&mut self) {
        // SAFETY: restores UART0 registers to their reset values
        unsafe {
            write_reg(LCR, LCR_DLAB);
            write_reg(FDR, FDR_RESET);
            write_reg(THR_DLL, 0);
            write_reg(DLM, 0);
            write_reg(LCR, 0);
            write_reg(FCR, 0);
        }
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_for_115200_at_12mhz() {
        let divisor = BaudDivisor::for_baud(12_000_000, 115_200).unwrap();
        let actual = divisor.actual_baud(12_000_000);
        assert!(actual.abs_diff(115_200) * 100 < 115_200, "{divisor:?} -> {actual}");
        assert!(divisor.div_add < divisor.mul);
        if divisor.div_add > 0 {
            assert!(divisor.latch >= 3);
        }
    }

    #[test]
    fn test_integer_divisor_when_exact() {
        // 12MHz / (16 * 1) = 750000 baud exactly
        let divisor = BaudDivisor::for_baud(12_000_000, 750_000).unwrap();
        assert_eq!(divisor.actual_baud(12_000_000), 750_000);
    }

    #[test]
    fn test_zero_baud_rejected() {
        assert_eq!(BaudDivisor::for_baud(12_000_000, 0), None);
    }
}
