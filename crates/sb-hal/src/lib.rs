// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Hardware Abstraction Layer for the SD-card bootloader
//!
//! The bootloader core never touches registers directly. It is written
//! against the capability traits in [`traits`], which are implemented for:
//!
//! - **LPC40xx**: ARM Cortex-M4 with IAP flash routines in boot ROM
//!   (`lpc40xx` feature)
//! - **Simulation**: in-memory flash, SD card, UART and pins for host tests
//!   (`sim` feature)
//!
//! # Architecture
//!
//! 1. **Traits**: Platform-agnostic interfaces (`traits` module)
//! 2. **Drivers**: Platform-specific implementations
//! 3. **Peripherals**: Low-level register access inside each driver
//!
//! Every driver is an owned handle created once at bring-up. There are no
//! global peripheral singletons.

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(any(test, feature = "sim"))]
extern crate std;

pub mod traits;
pub mod error;

#[cfg(feature = "lpc40xx")]
pub mod lpc40xx;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

// Re-export main traits
pub use traits::*;
pub use error::{HalError, HalResult};
