// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! LPC40xx GPIO and pin-function driver
//!
//! Pin functions are selected in IOCON (one register per pin, function in
//! bits 2:0). Plain GPIO lives in the AHB GPIO block, 0x20 bytes per port,
//! with atomic SET/CLR registers.
//!
//! # Board wiring
//!
//! | Pin   | Function        |
//! |-------|-----------------|
//! | P0.2  | UART0 TXD       |
//! | P0.3  | UART0 RXD       |
//! | P1.0  | SSP2 SCK        |
//! | P1.1  | SSP2 MOSI       |
//! | P1.4  | SSP2 MISO       |
//! | P1.8  | SD chip select  |
//! | P1.9  | SD card detect (active low) |
//! | P2.3  | Status LED      |

use super::clock::{power_on, Peripheral};
use super::{read_reg, write_reg};
use crate::error::{HalError, HalResult};
use crate::traits::GpioPin;

// ============================================================================
// Register Map
// ============================================================================

/// IOCON base address
const IOCON_BASE: u32 = 0x4002_C000;

/// IOCON function field
const IOCON_FUNC_MASK: u32 = 0x7;

/// GPIO base address
const GPIO_BASE: u32 = 0x2009_8000;

/// Stride between GPIO ports
const GPIO_PORT_STRIDE: u32 = 0x20;

const GPIO_DIR_OFFSET: u32 = 0x00;
const GPIO_PIN_OFFSET: u32 = 0x14;
const GPIO_SET_OFFSET: u32 = 0x18;
const GPIO_CLR_OFFSET: u32 = 0x1C;

/// Highest port number
const MAX_PORT: u8 = 5;

/// Pin function selector (IOCON FUNC field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PinFunction {
    /// Plain GPIO
    Gpio = 0,
    /// Alternate function 1
    Alt1 = 1,
    /// Alternate function 2
    Alt2 = 2,
    /// Alternate function 3
    Alt3 = 3,
    /// Alternate function 4
    Alt4 = 4,
}

fn iocon_address(port: u8, pin: u8) -> u32 {
    IOCON_BASE + (u32::from(port) * 32 + u32::from(pin)) * 4
}

fn gpio_register(port: u8, offset: u32) -> u32 {
    GPIO_BASE + u32::from(port) * GPIO_PORT_STRIDE + offset
}

/// Select the function of a pin
pub fn set_function(port: u8, pin: u8, function: PinFunction) {
    let address = iocon_address(port, pin);
    // SAFETY: each IOCON register configures exactly one pin
    unsafe {
        let value = read_reg(address) & !IOCON_FUNC_MASK;
        write_reg(address, value | function as u32);
    }
}

// ============================================================================
// GPIO Pin
// ============================================================================

/// A single LPC40xx GPIO pin
pub struct Lpc40xxGpioPin {
    port: u8,
    pin: u8,
}

impl Lpc40xxGpioPin {
    /// Claim a pin as GPIO
    ///
    /// # Errors
    ///
    /// Returns `HalError::InvalidParameter` if the port or pin does not exist.
    pub fn new(port: u8, pin: u8) -> HalResult<Self> {
        if port > MAX_PORT || pin > 31 || (port == MAX_PORT && pin > 4) {
            return Err(HalError::InvalidParameter);
        }
        set_function(port, pin, PinFunction::Gpio);
        Ok(Self { port, pin })
    }

    /// Handle for a pin whose registers have not been touched yet
    pub(crate) const fn new_unconfigured(port: u8, pin: u8) -> Self {
        Self { port, pin }
    }

    /// Pin number within its port
    #[must_use]
    pub const fn pin(&self) -> u8 {
        self.pin
    }

    /// Port number
    #[must_use]
    pub const fn port(&self) -> u8 {
        self.port
    }

    const fn mask(&self) -> u32 {
        1 << self.pin
    }

    /// Configure as output
    pub fn into_output(self) -> Self {
        self.set_direction(true);
        self
    }

    /// Configure as input
    pub fn into_input(self) -> Self {
        self.set_direction(false);
        self
    }

    fn set_direction(&self, output: bool) {
        let dir = gpio_register(self.port, GPIO_DIR_OFFSET);
        // SAFETY: only this pin's DIR bit is changed
        unsafe {
            let value = read_reg(dir);
            let value = if output {
                value | self.mask()
            } else {
                value & !self.mask()
            };
            write_reg(dir, value);
        }
    }
}

impl GpioPin for Lpc40xxGpioPin {
    fn set_high(&mut self) -> HalResult<()> {
        // SAFETY: SET only affects bits written as 1
        unsafe { write_reg(gpio_register(self.port, GPIO_SET_OFFSET), self.mask()) };
        Ok(())
    }

    fn set_low(&mut self) -> HalResult<()> {
        // SAFETY: CLR only affects bits written as 1
        unsafe { write_reg(gpio_register(self.port, GPIO_CLR_OFFSET), self.mask()) };
        Ok(())
    }

    fn is_high(&self) -> HalResult<bool> {
        // SAFETY: PIN read has no side effects
        let value = unsafe { read_reg(gpio_register(self.port, GPIO_PIN_OFFSET)) };
        Ok(value & self.mask() != 0)
    }

    fn toggle(&mut self) -> HalResult<()> {
        if self.is_high()? {
            self.set_low()
        } else {
            self.set_high()
        }
    }
}

// ============================================================================
// Board I/O
// ============================================================================

/// UART0 pins: (port, pin)
const UART0_PINS: [(u8, u8); 2] = [(0, 2), (0, 3)];

/// SSP2 pins: (port, pin)
const SSP2_PINS: [(u8, u8); 3] = [(1, 0), (1, 1), (1, 4)];

/// SD card chip select
pub const SD_CS: (u8, u8) = (1, 8);

/// SD card detect, active low
pub const SD_CARD_DETECT: (u8, u8) = (1, 9);

/// Status LED
pub const STATUS_LED: (u8, u8) = (2, 3);

/// Pins owned by the bootloader
///
/// `init` routes UART0 and SSP2 to their peripherals; `uninit` hands them
/// back as plain GPIO so the application starts from a clean pin map.
pub struct BoardIo {
    _private: (),
}

impl BoardIo {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }

    /// Configure bootloader pins
    pub fn init(&mut self) -> HalResult<()> {
        power_on(Peripheral::Gpio);
        power_on(Peripheral::Ssp2);

        for (port, pin) in UART0_PINS {
            set_function(port, pin, PinFunction::Alt1);
        }
        for (port, pin) in SSP2_PINS {
            set_function(port, pin, PinFunction::Alt4);
        }

        let mut cs = Lpc40xxGpioPin::new(SD_CS.0, SD_CS.1)?.into_output();
        cs.set_high()?;
        Lpc40xxGpioPin::new(SD_CARD_DETECT.0, SD_CARD_DETECT.1)?.into_input();
        Ok(())
    }

    /// Return UART0 and SSP2 pins to GPIO function
    pub fn uninit(&mut self) {
        for (port, pin) in UART0_PINS.into_iter().chain(SSP2_PINS) {
            set_function(port, pin, PinFunction::Gpio);
        }
    }
}
