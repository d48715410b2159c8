// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Cycle-counting busy wait

use crate::traits::DelayInterface;

/// Busy-wait delay calibrated to the CPU clock
pub struct Lpc40xxDelay {
    cycles_per_ms: u32,
}

impl Lpc40xxDelay {
    /// Create a delay for a CPU running at `cclk_hz`
    #[must_use]
    pub const fn new(cclk_hz: u32) -> Self {
        Self {
            cycles_per_ms: cclk_hz / 1000,
        }
    }
}

impl DelayInterface for Lpc40xxDelay {
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            cfg_if::cfg_if! {
                if #[cfg(target_arch = "arm")] {
                    cortex_m::asm::delay(self.cycles_per_ms);
                } else {
                    for _ in 0..self.cycles_per_ms {
                        core::hint::spin_loop();
                    }
                }
            }
        }
    }
}
