// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for sb-hal
//!
//! Tests for error conversion and the host simulation
//! driven through the capability traits, the same way the bootloader uses
//! them. Register-level drivers cannot run on the host.

mod error_tests {
    use sb_hal::error::{fat_status, iap_status};
    use sb_hal::HalError;

    #[test]
    fn test_every_flash_error_carries_status() {
        for err in [
            HalError::FlashPrepareFailed(iap_status::BUSY),
            HalError::FlashEraseFailed(iap_status::BUSY),
            HalError::FlashWriteFailed(iap_status::BUSY),
            HalError::FlashVerifyFailed(iap_status::BUSY),
        ] {
            assert_eq!(err.status(), Some(iap_status::BUSY), "{err:?}");
        }
    }

    #[test]
    fn test_storage_errors_map_to_storage_category() {
        let storage = [
            HalError::StorageNotMounted,
            HalError::FileNotFound,
            HalError::FileOpenFailed(fat_status::FR_DISK_ERR),
            HalError::FileReadFailed(fat_status::FR_DISK_ERR),
            HalError::FileRenameFailed(fat_status::FR_DENIED),
            HalError::InvalidFileName,
        ];
        for err in storage {
            let common: sb_common::Error = err.into();
            assert!(common.is_storage_error(), "{err:?} -> {common:?}");
        }
    }

    #[test]
    fn test_flash_errors_map_to_update_category() {
        let flash = [
            HalError::FlashPrepareFailed(1),
            HalError::FlashEraseFailed(1),
            HalError::FlashWriteFailed(1),
            HalError::FlashVerifyFailed(10),
        ];
        for err in flash {
            let common: sb_common::Error = err.into();
            assert!(common.is_update_error(), "{err:?} -> {common:?}");
        }
    }
}

mod sim_flash_tests {
    use sb_hal::error::iap_status;
    use sb_hal::sim::{FlashOp, SimFlash};
    use sb_hal::{HalError, IapFlash};

    /// Erase-then-program sequence as the update controller issues it
    fn write_chunk<F: IapFlash>(flash: &mut F, address: u32, data: &[u8]) -> Result<(), HalError> {
        let first = flash.sector_of(address).ok_or(HalError::FlashOutOfBounds)?;
        let last = flash
            .sector_of(address + data.len() as u32 - 1)
            .ok_or(HalError::FlashOutOfBounds)?;
        flash.prepare_sectors(first, last)?;
        flash.program(address, data)?;
        flash.verify(address, data)
    }

    #[test]
    fn test_program_verify_read_back() {
        let mut flash = SimFlash::lpc4078();
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 7) as u8).collect();
        write_chunk(&mut flash, 0x0001_0000, &data).unwrap();

        let mut back = vec![0u8; 4096];
        flash.read(0x0001_0000, &mut back).unwrap();
        assert_eq!(back, data);
        assert_eq!(
            flash.ops(),
            &[
                FlashOp::Prepare { first: 16, last: 16 },
                FlashOp::Program { address: 0x0001_0000, len: 4096 },
                FlashOp::Verify { address: 0x0001_0000, len: 4096 },
            ]
        );
    }

    #[test]
    fn test_read_word_is_little_endian() {
        let mut flash = SimFlash::lpc4078();
        flash.load(0x0001_0000, &[0x00, 0x80, 0x00, 0x10, 0x01, 0x01, 0x01, 0x00]);
        assert_eq!(flash.read_word(0x0001_0000).unwrap(), 0x1000_8000);
        assert_eq!(flash.read_word(0x0001_0004).unwrap(), 0x0001_0101);
    }

    #[test]
    fn test_program_without_erase_fails_verify() {
        let mut flash = SimFlash::lpc4078();
        flash.load(0x0001_0000, &[0x00; 256]);
        let result = write_chunk(&mut flash, 0x0001_0000, &[0xA5; 256]);
        assert_eq!(
            result,
            Err(HalError::FlashVerifyFailed(iap_status::COMPARE_ERROR))
        );
    }

    #[test]
    fn test_injected_program_failure_leaves_flash_erased() {
        let mut flash = SimFlash::lpc4078();
        flash.fail_program_at(0x0001_1000, iap_status::BUSY);
        let result = write_chunk(&mut flash, 0x0001_1000, &[0u8; 4096]);
        assert_eq!(result, Err(HalError::FlashWriteFailed(iap_status::BUSY)));
        assert!(flash.contents(0x0001_1000, 4096).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_read_outside_flash() {
        let flash = SimFlash::lpc4078();
        let mut buf = [0u8; 4];
        assert_eq!(
            flash.read(0x0007_FFFE, &mut buf),
            Err(HalError::FlashOutOfBounds)
        );
    }
}

mod sim_device_tests {
    use sb_hal::sim::{SimEvent, SimHandoff, SimPin, SimTrace, SimUart};
    use sb_hal::{GpioPin, HandoffInterface, UartInterface};

    #[test]
    fn test_pin_toggle_tracks_state() {
        let mut pin = SimPin::new();
        let observer = pin.clone();
        assert!(!pin.is_high().unwrap());
        pin.toggle().unwrap();
        assert!(pin.is_high().unwrap());
        pin.toggle().unwrap();
        assert!(!pin.is_high().unwrap());
        assert_eq!(observer.toggles(), 2);
    }

    #[test]
    fn test_trace_orders_events_across_devices() {
        let trace = SimTrace::new();
        let mut uart = SimUart::with_trace(trace.clone());
        let mut handoff = SimHandoff::new(trace.clone());

        uart.init(115_200).unwrap();
        handoff.disable_interrupts();
        uart.flush().unwrap();
        uart.deinit();
        handoff.relocate_vector_table(0x0001_0000);

        assert_eq!(
            trace.events(),
            vec![
                SimEvent::DisableInterrupts,
                SimEvent::UartFlush,
                SimEvent::UartDeinit,
                SimEvent::RelocateVectorTable(0x0001_0000),
            ]
        );
        assert_eq!(trace.count(SimEvent::UartDeinit), 1);
    }
}
