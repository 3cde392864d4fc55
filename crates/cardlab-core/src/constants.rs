//! Core constants for the contactless-card subsystem.
//!
//! This module centralizes the protocol-level numbers used across the
//! workspace: NFC-A command bytes, Type-2 tag geometry, canonical
//! emulation identity bytes and the literals of the card dump text format.
//!
//! # Usage
//!
//! ```
//! use cardlab_core::constants::*;
//!
//! assert_eq!(T2T_PAGE_SIZE * T2T_PAGES_PER_READ, T2T_READ_RESPONSE_LEN);
//! assert_eq!(FILE_TYPE, "M1 NFC device");
//! ```

// ============================================================================
// UID limits
// ============================================================================

/// Minimum UID length in bytes for a physical ISO14443 card.
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (triple-size ISO14443 UID).
pub const MAX_UID_LENGTH: usize = 10;

/// Maximum ATS length accepted from a card or a dump file.
pub const MAX_ATS_LENGTH: usize = 254;

// ============================================================================
// NFC-A command bytes
// ============================================================================

/// REQA short frame (7 bits).
pub const CMD_REQA: u8 = 0x26;

/// WUPA short frame (7 bits).
pub const CMD_WUPA: u8 = 0x52;

/// Type-2 READ: returns 4 pages (16 bytes) starting at the given page.
pub const CMD_READ: u8 = 0x30;

/// NTAG FAST_READ: returns the inclusive page range `[start, end]`.
pub const CMD_FAST_READ: u8 = 0x3A;

/// NTAG GET_VERSION: returns the 8-byte version blob.
pub const CMD_GET_VERSION: u8 = 0x60;

/// Type-2 WRITE: writes one 4-byte page.
pub const CMD_WRITE: u8 = 0xA2;

/// Type-2 SECTOR_SELECT (first packet).
pub const CMD_SECTOR_SELECT: u8 = 0xC2;

/// NTAG PWD_AUTH.
pub const CMD_PWD_AUTH: u8 = 0x1B;

/// NTAG READ_CNT.
pub const CMD_READ_CNT: u8 = 0x39;

/// Vendor compatibility query seen from some phone stacks.
pub const CMD_COMPAT_53: u8 = 0x53;

/// Vendor compatibility query seen from some phone stacks.
pub const CMD_COMPAT_57: u8 = 0x57;

/// ISO14443-4 RATS.
pub const CMD_RATS: u8 = 0xE0;

/// Type-2 4-bit acknowledge.
pub const T2T_ACK: u8 = 0x0A;

// ============================================================================
// Type-2 tag geometry
// ============================================================================

/// Bytes per Type-2 page.
pub const T2T_PAGE_SIZE: usize = 4;

/// Pages returned by a single READ command.
pub const T2T_PAGES_PER_READ: usize = 4;

/// Bytes returned by a single READ command.
pub const T2T_READ_RESPONSE_LEN: usize = 16;

/// Length of the GET_VERSION response.
pub const T2T_VERSION_LEN: usize = 8;

/// Offset of the storage size code inside the GET_VERSION blob.
pub const T2T_VERSION_SIZE_INDEX: usize = 6;

/// First page of the Type-2 TLV area.
pub const T2T_TLV_FIRST_PAGE: usize = 4;

/// Highest page count addressable with a one-byte page index.
pub const T2T_MAX_PAGES: usize = 256;

/// Page count assumed when a tag does not report a known size code.
pub const T2T_DEFAULT_PAGE_COUNT: usize = 45;

// ============================================================================
// Classic geometry
// ============================================================================

/// Bytes per Classic block.
pub const CLASSIC_BLOCK_SIZE: usize = 16;

/// Blocks of a Classic Mini.
pub const CLASSIC_MINI_BLOCKS: usize = 20;

/// Blocks of a Classic 1K.
pub const CLASSIC_1K_BLOCKS: usize = 64;

/// Blocks of a Classic 4K.
pub const CLASSIC_4K_BLOCKS: usize = 256;

// ============================================================================
// Canonical NFC-A identity bytes
// ============================================================================

/// ATQA of an NTAG/Ultralight tag, as transmitted (`0x4400`).
pub const T2T_ATQA: [u8; 2] = [0x44, 0x00];

/// SAK of an NTAG/Ultralight tag.
pub const T2T_SAK: u8 = 0x00;

/// SAK bit pattern announcing ISO14443-4 compliance.
pub const SAK_ISO14443_4: u8 = 0x20;

// ============================================================================
// Dump file format
// ============================================================================

/// Value of the `Filetype` header.
pub const FILE_TYPE: &str = "M1 NFC device";

/// Value of the `Version` header.
pub const FILE_VERSION: &str = "4";

/// Line terminator used when writing dump files.
pub const LINE_ENDING: &str = "\r\n";

/// File extension for saved dumps.
pub const DUMP_EXTENSION: &str = "nfc";

/// Default size of the dump backing buffer in bytes (Classic 4K).
pub const DEFAULT_DUMP_CAPACITY: usize = CLASSIC_4K_BLOCKS * CLASSIC_BLOCK_SIZE;
