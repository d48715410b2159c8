// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! Integration tests for sb-common
//!
//! Tests for error codes, configuration invariants and the log buffer.

mod error_tests {
    use sb_common::Error;
    use std::collections::HashSet;

    const ALL: [Error; 22] = [
        Error::StorageNotMounted,
        Error::FileNotFound,
        Error::FileOpenFailed,
        Error::FileReadFailed,
        Error::RenameFailed,
        Error::FileNameTooLong,
        Error::FlashPrepareFailed,
        Error::FlashEraseFailed,
        Error::FlashProgramFailed,
        Error::FlashVerifyMismatch,
        Error::ImageTooLarge,
        Error::HardwareInitFailed,
        Error::FlashError,
        Error::GpioError,
        Error::UartError,
        Error::InvalidEntryPoint,
        Error::InvalidBootConfig,
        Error::BufferTooSmall,
        Error::InvalidParameter,
        Error::InvalidState,
        Error::NotImplemented,
        Error::InternalError,
    ];

    #[test]
    fn test_error_codes_are_unique() {
        let codes: HashSet<u16> = ALL.iter().map(Error::code).collect();
        assert_eq!(codes.len(), ALL.len());
    }

    #[test]
    fn test_error_descriptions_are_non_empty() {
        for error in ALL {
            assert!(!error.description().is_empty(), "{error:?}");
        }
    }

    #[test]
    fn test_error_display_includes_code() {
        let text = format!("{}", Error::FlashVerifyMismatch);
        assert_eq!(text, "[0x0404] flash verify mismatch");
    }
}

mod config_tests {
    use sb_common::constants::{
        CONSUMED_SUFFIX, DEFAULT_IMAGE_NAME, FLASH_FILL_BYTE, MAX_CHUNK_SIZE, MAX_FILE_NAME_LEN,
    };
    use sb_common::{BootConfig, FailurePolicy, FlashRegion, UpdateConfig};

    #[test]
    fn test_default_boot_config() {
        let config = BootConfig::default();
        assert_eq!(config.region, FlashRegion::LPC4078_APPLICATION);
        assert_eq!(config.update.image_name, DEFAULT_IMAGE_NAME);
        assert_eq!(config.update.consumed_suffix, CONSUMED_SUFFIX);
        assert!(config.halt_report_interval_ms >= 1000);
    }

    #[test]
    fn test_default_policy_tolerates_failures() {
        assert_eq!(UpdateConfig::default().failure_policy, FailurePolicy::Tolerate);
        assert_eq!(FailurePolicy::default(), FailurePolicy::Tolerate);
    }

    #[test]
    fn test_consumed_name_fits_buffer() {
        assert!(DEFAULT_IMAGE_NAME.len() + CONSUMED_SUFFIX.len() <= MAX_FILE_NAME_LEN);
    }

    #[test]
    fn test_region_sectors_cover_region() {
        let region = FlashRegion::LPC4078_APPLICATION;
        // 14 sectors of 32KB
        let sectors = region.last_sector - region.first_sector + 1;
        assert_eq!(sectors * 32 * 1024, region.size());
        assert_eq!(region.size() as usize % MAX_CHUNK_SIZE, 0);
    }

    #[test]
    fn test_fill_byte_is_erased_state() {
        assert_eq!(FLASH_FILL_BYTE, 0xFF);
    }
}

mod log_tests {
    use sb_common::log::{LogBuffer, LogLevel, LOG_BUFFER_SIZE};
    use sb_common::{log_error, log_info, log_trace};

    #[test]
    fn test_entries_keep_module_and_level() {
        let mut log = LogBuffer::new();
        log_info!(log, "update", "erasing sectors {}..={}", 16, 29);
        log_error!(log, "launch", "bad entry 0x{:08X}", 0u32);

        let entries: Vec<_> = log.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].module, "update");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message.as_str(), "erasing sectors 16..=29");
        assert_eq!(entries[1].message.as_str(), "bad entry 0x00000000");
    }

    #[test]
    fn test_entry_display() {
        let mut log = LogBuffer::new();
        log_error!(log, "update", "status {}", 9);
        let line = format!("{}", log.iter().next().unwrap());
        assert_eq!(line, "[0000] E [update] status 9");
    }

    #[test]
    fn test_trace_filtered_by_default() {
        let mut log = LogBuffer::new();
        log_trace!(log, "update", "chunk");
        assert!(log.is_empty());
        assert_eq!(log.min_level(), LogLevel::Info);
    }

    #[test]
    fn test_clear_resets_ring() {
        let mut log = LogBuffer::new();
        for i in 0..LOG_BUFFER_SIZE * 2 {
            log_info!(log, "test", "{}", i);
        }
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.iter().count(), 0);
    }
}
