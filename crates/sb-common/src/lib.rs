// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! SD-card bootloader common library
//!
//! Types shared by the HAL and the bootloader proper:
//!
//! - **errors**: unified error enum with stable numeric codes
//! - **log**: log levels, the `LogSink` trait, a ring buffer and macros
//! - **config**: compile-time flash region, update and boot configuration
//! - **constants**: fixed values of the on-flash and on-card formats
//!
//! # Features
//!
//! - `std`: Enable standard library support (disabled by default for embedded)
//! - `defmt`: Enable defmt formatting of errors
//!
//! No heap allocations are performed - all buffers are fixed-size arrays or
//! heapless collections.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(feature = "std")]
extern crate std;

pub mod errors;
pub mod config;
pub mod log;
pub mod constants;

// Re-export commonly used items
pub use errors::{Error, Result};
pub use config::{BootConfig, FailurePolicy, FlashRegion, UpdateConfig};
pub use log::{LogBuffer, LogLevel, LogSink};
