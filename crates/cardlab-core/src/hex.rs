//! Hex-pair parsing and formatting.
//!
//! Dump files store bytes as uppercase hex pairs. The parser is lenient about
//! layout: whitespace between pairs is skipped, so `"AA BB CC"` and
//! `"AABBCC"` decode to the same bytes. A pair itself must be two adjacent
//! hex digits.
//!
//! ```
//! use cardlab_core::hex::{parse_hex, HexError};
//!
//! let mut buf = [0u8; 4];
//! assert_eq!(parse_hex("AA BB CC", &mut buf), Ok(3));
//! assert_eq!(&buf[..3], &[0xAA, 0xBB, 0xCC]);
//!
//! assert_eq!(parse_hex("AB C", &mut buf), Err(HexError::SecondDigitMissing));
//! ```

use thiserror::Error;

/// Failure modes of [`parse_hex`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexError {
    /// Odd number of hex digits: a pair was started but not finished.
    #[error("Second hex digit missing")]
    SecondDigitMissing,

    #[error("Invalid hex character {ch:?} at position {position}")]
    InvalidCharacter { ch: char, position: usize },

    /// More bytes in the input than the destination can hold.
    #[error("Destination buffer full ({capacity} bytes)")]
    BufferFull { capacity: usize },
}

#[inline]
fn nibble(c: char) -> Option<u8> {
    c.to_digit(16).map(|d| d as u8)
}

/// Decode hex pairs from `src` into `dest`, returning the byte count.
///
/// # Errors
/// - [`HexError::SecondDigitMissing`] when a pair is cut short by whitespace or
///   end of input
/// - [`HexError::InvalidCharacter`] for any non-hex, non-whitespace character
/// - [`HexError::BufferFull`] when `src` holds more than `dest.len()` bytes
pub fn parse_hex(src: &str, dest: &mut [u8]) -> Result<usize, HexError> {
    let capacity = dest.len();
    let mut count = 0;
    let mut chars = src.char_indices();

    loop {
        let Some((position, ch)) = chars.by_ref().find(|(_, c)| !c.is_whitespace()) else {
            break;
        };
        let high = nibble(ch).ok_or(HexError::InvalidCharacter { ch, position })?;

        let low = match chars.next() {
            None => return Err(HexError::SecondDigitMissing),
            Some((_, c)) if c.is_whitespace() => return Err(HexError::SecondDigitMissing),
            Some((position, ch)) => nibble(ch).ok_or(HexError::InvalidCharacter { ch, position })?,
        };

        let slot = dest.get_mut(count).ok_or(HexError::BufferFull { capacity })?;
        *slot = (high << 4) | low;
        count += 1;
    }

    Ok(count)
}

/// Decode at most `limit` bytes of hex pairs into a fresh vector.
///
/// # Errors
/// Same as [`parse_hex`].
pub fn decode_hex(src: &str, limit: usize) -> Result<Vec<u8>, HexError> {
    let mut buf = vec![0u8; limit];
    let len = parse_hex(src, &mut buf)?;
    buf.truncate(len);
    Ok(buf)
}

/// Format bytes as space-separated uppercase hex pairs.
///
/// ```
/// assert_eq!(cardlab_core::hex::format_spaced(&[0x04, 0xAB]), "04 AB");
/// ```
#[must_use]
pub fn format_spaced(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("AA BB CC")]
    #[case("AABBCC")]
    #[case("  aa\tbbCC  ")]
    fn test_spaced_and_concatenated_forms_agree(#[case] input: &str) {
        assert_eq!(decode_hex(input, 8), Ok(vec![0xAA, 0xBB, 0xCC]));
    }

    #[test]
    fn test_odd_digit_count() {
        let mut buf = [0u8; 4];
        assert_eq!(parse_hex("AB C", &mut buf), Err(HexError::SecondDigitMissing));
        assert_eq!(parse_hex("A B", &mut buf), Err(HexError::SecondDigitMissing));
    }

    #[test]
    fn test_invalid_character() {
        let mut buf = [0u8; 4];
        assert_eq!(
            parse_hex("ZZ", &mut buf),
            Err(HexError::InvalidCharacter { ch: 'Z', position: 0 })
        );
        assert_eq!(
            parse_hex("0G", &mut buf),
            Err(HexError::InvalidCharacter { ch: 'G', position: 1 })
        );
    }

    #[test]
    fn test_buffer_full() {
        let mut buf = [0u8; 2];
        assert_eq!(
            parse_hex("01 02 03", &mut buf),
            Err(HexError::BufferFull { capacity: 2 })
        );
        // Exactly full is fine
        assert_eq!(parse_hex("01 02", &mut buf), Ok(2));
    }

    #[test]
    fn test_empty_input() {
        let mut buf = [0u8; 2];
        assert_eq!(parse_hex("   ", &mut buf), Ok(0));
        assert_eq!(parse_hex("", &mut []), Ok(0));
    }

    #[test]
    fn test_format_spaced() {
        assert_eq!(format_spaced(&[]), "");
        assert_eq!(format_spaced(&[0x00, 0x0f, 0xf0]), "00 0F F0");
    }
}
