//! Type-2 TLV area scan.

use cardlab_core::constants::{T2T_PAGE_SIZE, T2T_TLV_FIRST_PAGE};

const TLV_NULL: u8 = 0x00;
const TLV_NDEF: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0xFE;
/// Length byte announcing a 2-byte big-endian length.
const TLV_LONG_LENGTH: u8 = 0xFF;

/// Payload of the first NDEF TLV in a Type-2 memory image.
///
/// `memory` starts at page 0; scanning starts at page 4. NULL TLVs are
/// skipped, a terminator ends the scan, other TLVs are skipped by length.
/// A truncated NDEF TLV yields `None`.
pub fn find_ndef(memory: &[u8]) -> Option<&[u8]> {
    let mut pos = T2T_TLV_FIRST_PAGE * T2T_PAGE_SIZE;

    while let Some(&tag) = memory.get(pos) {
        pos += 1;
        match tag {
            TLV_NULL => continue,
            TLV_TERMINATOR => return None,
            _ => {}
        }

        let len = match *memory.get(pos)? {
            TLV_LONG_LENGTH => {
                let hi = *memory.get(pos + 1)?;
                let lo = *memory.get(pos + 2)?;
                pos += 3;
                u16::from_be_bytes([hi, lo]) as usize
            }
            short => {
                pos += 1;
                short as usize
            }
        };

        if tag == TLV_NDEF {
            return memory.get(pos..pos + len);
        }
        pos += len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(tlv: &[u8]) -> Vec<u8> {
        let mut mem = vec![0u8; 16];
        mem.extend_from_slice(tlv);
        mem.resize(mem.len().max(64), 0);
        mem
    }

    #[test]
    fn test_short_ndef() {
        let mem = memory(&[0x03, 0x03, 0xD0, 0x00, 0x00, 0xFE]);
        assert_eq!(find_ndef(&mem), Some(&[0xD0, 0x00, 0x00][..]));
    }

    #[test]
    fn test_skips_null_and_lock_tlvs() {
        let mem = memory(&[0x00, 0x00, 0x01, 0x03, 0xA0, 0x0C, 0x34, 0x03, 0x02, 0xAB, 0xCD]);
        assert_eq!(find_ndef(&mem), Some(&[0xAB, 0xCD][..]));
    }

    #[test]
    fn test_long_length() {
        let mut tlv = vec![0x03, 0xFF, 0x01, 0x00];
        tlv.extend(std::iter::repeat_n(0x55, 256));
        let mem = memory(&tlv);
        assert_eq!(find_ndef(&mem).map(<[u8]>::len), Some(256));
    }

    #[test]
    fn test_terminator_stops_scan() {
        let mem = memory(&[0xFE, 0x03, 0x01, 0xAA]);
        assert_eq!(find_ndef(&mem), None);
    }

    #[test]
    fn test_truncated_ndef() {
        let mut mem = vec![0u8; 16];
        mem.extend_from_slice(&[0x03, 0x10, 0xD1]);
        assert_eq!(find_ndef(&mem), None);
    }

    #[test]
    fn test_all_zero_area() {
        assert_eq!(find_ndef(&[0u8; 64]), None);
        assert_eq!(find_ndef(&[0u8; 8]), None);
    }
}
