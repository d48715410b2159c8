// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! SD-card bootloader entry point for the LPC40xx
//!
//! This is the first code that runs after reset. It occupies the first
//! 64KB of flash; the application follows at 0x0001_0000.
//!
//! # Boot Flow
//!
//! 1. Claim the hardware and bring up clocks, pins and the UART console
//! 2. Mount the SD card (a missing card is not an error)
//! 3. Flash `lpc40xx_application.bin` if present and rename it
//! 4. Jump to the application, or report and blink if there is none

#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

#[cfg(target_arch = "arm")]
mod firmware {
    use core::panic::PanicInfo;

    use sb_boot::{run_boot_sequence, BootPeripherals, Console};
    use sb_common::{log_info, log_warn, BootConfig};
    use sb_hal::lpc40xx::Lpc40xxHal;

    // =========================================================================
    // Bootloader Entry Point
    // =========================================================================

    #[cortex_m_rt::entry]
    fn main() -> ! {
        let config = BootConfig::DEFAULT;

        let Some(mut hal) = Lpc40xxHal::take() else {
            park();
        };
        // Without pins and a UART there is nothing to report on
        if hal.init(config.uart_baud_rate).is_err() {
            park();
        }
        let mounted = hal.mount_storage();

        let Lpc40xxHal {
            mut flash,
            uart,
            led,
            delay,
            mut storage,
            handoff,
        } = hal;

        let mut console = Console::new(uart);
        log_info!(
            console,
            "boot",
            "SD-card bootloader v{}, application at 0x{:08X}",
            env!("CARGO_PKG_VERSION"),
            config.region.start_address
        );
        if let Err(e) = mounted {
            log_warn!(console, "boot", "SD card not available: {}", e);
        }

        run_boot_sequence(
            &config,
            &mut flash,
            &mut storage,
            BootPeripherals {
                console,
                status_led: led,
                delay,
                handoff,
            },
        )
    }

    fn park() -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }

    #[panic_handler]
    fn panic(_info: &PanicInfo) -> ! {
        cortex_m::interrupt::disable();
        park()
    }
}

#[cfg(not(target_arch = "arm"))]
fn main() {
    eprintln!("sb-boot runs on the LPC40xx only; use the library on the host");
}
