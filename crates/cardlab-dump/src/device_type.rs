//! `Device type` header values.
//!
//! Saving derives the string from technology, family and ATS presence in a
//! fixed precedence order; loading maps it back to a technology and family.

use std::fmt;
use std::str::FromStr;

use cardlab_core::{ClassicKind, Family, Technology};

use crate::error::DumpError;

/// Strings of cards that exist in the format but are not handled here.
const UNSUPPORTED: &[&str] = &["Mifare Plus", "SLIX", "ST25TB", "NTAG4xx", "EMV"];

/// Device type written to and read from a dump header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Classic(ClassicKind),
    UltralightNtag,
    Desfire,
    /// ISO14443-4 on technology A (ATS present).
    Iso14443_4A,
    Iso14443A,
    Iso14443B,
    Felica,
    Iso15693,
}

impl DeviceType {
    /// Every variant, in precedence order.
    pub const ALL: [DeviceType; 10] = [
        DeviceType::Classic(ClassicKind::OneK),
        DeviceType::Classic(ClassicKind::FourK),
        DeviceType::Classic(ClassicKind::Mini),
        DeviceType::Iso14443_4A,
        DeviceType::Desfire,
        DeviceType::UltralightNtag,
        DeviceType::Iso14443A,
        DeviceType::Iso14443B,
        DeviceType::Felica,
        DeviceType::Iso15693,
    ];

    /// Device type of a card.
    ///
    /// Classic wins over everything, then ATS on technology A, then the
    /// DESFire and Ultralight families, then the bare technology.
    pub fn for_card(technology: Technology, family: Family, has_ats: bool) -> Self {
        match (technology, family) {
            (_, Family::Classic(kind)) => Self::Classic(kind),
            (Technology::A, _) if has_ats => Self::Iso14443_4A,
            (_, Family::Desfire) => Self::Desfire,
            (_, Family::Ultralight) => Self::UltralightNtag,
            (Technology::A, _) => Self::Iso14443A,
            (Technology::B, _) => Self::Iso14443B,
            (Technology::F, _) => Self::Felica,
            (Technology::V, _) => Self::Iso15693,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic(ClassicKind::OneK) => "Classic 1K",
            Self::Classic(ClassicKind::FourK) => "Classic 4K",
            Self::Classic(ClassicKind::Mini) => "Classic Mini",
            Self::UltralightNtag => "Ultralight/NTAG",
            Self::Desfire => "DESFire",
            Self::Iso14443_4A => "ISO14443-4A",
            Self::Iso14443A => "ISO14443A",
            Self::Iso14443B => "ISO14443B",
            Self::Felica => "Felica",
            Self::Iso15693 => "ISO15693",
        }
    }

    pub fn technology(self) -> Technology {
        match self {
            Self::Iso14443B => Technology::B,
            Self::Felica => Technology::F,
            Self::Iso15693 => Technology::V,
            _ => Technology::A,
        }
    }

    pub fn family(self) -> Family {
        match self {
            Self::Classic(kind) => Family::Classic(kind),
            Self::UltralightNtag => Family::Ultralight,
            Self::Desfire => Family::Desfire,
            Self::Iso14443_4A => Family::T4t,
            Self::Felica => Family::Felica,
            Self::Iso15693 => Family::Iso15693,
            Self::Iso14443A | Self::Iso14443B => Family::Unspecified,
        }
    }

    /// Whether `value` names a card known to the format but not handled.
    pub fn is_known_unsupported(value: &str) -> bool {
        UNSUPPORTED.contains(&value)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|device| device.as_str() == s)
            .ok_or_else(|| DumpError::UnsupportedDevice(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Technology::A, Family::Classic(ClassicKind::OneK), true, "Classic 1K")]
    #[case(Technology::A, Family::Classic(ClassicKind::FourK), false, "Classic 4K")]
    #[case(Technology::A, Family::Classic(ClassicKind::Mini), false, "Classic Mini")]
    #[case(Technology::A, Family::Desfire, true, "ISO14443-4A")]
    #[case(Technology::A, Family::Desfire, false, "DESFire")]
    #[case(Technology::A, Family::Ultralight, false, "Ultralight/NTAG")]
    #[case(Technology::A, Family::T4t, true, "ISO14443-4A")]
    #[case(Technology::A, Family::T4t, false, "ISO14443A")]
    #[case(Technology::A, Family::Unspecified, false, "ISO14443A")]
    #[case(Technology::B, Family::Unspecified, true, "ISO14443B")]
    #[case(Technology::F, Family::Felica, false, "Felica")]
    #[case(Technology::V, Family::Iso15693, false, "ISO15693")]
    fn test_precedence(
        #[case] technology: Technology,
        #[case] family: Family,
        #[case] has_ats: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(
            DeviceType::for_card(technology, family, has_ats).as_str(),
            expected
        );
    }

    #[test]
    fn test_inverse_mapping() {
        for device in DeviceType::ALL {
            let parsed: DeviceType = device.as_str().parse().unwrap();
            assert_eq!(parsed, device);
        }
        let t4 = DeviceType::from_str("ISO14443-4A").unwrap();
        assert_eq!(t4.technology(), Technology::A);
        assert_eq!(t4.family(), Family::T4t);
    }

    #[rstest]
    #[case("Mifare Plus")]
    #[case("SLIX")]
    #[case("EMV")]
    #[case("Bogus")]
    #[case("classic 1k")]
    fn test_unsupported_strings(#[case] value: &str) {
        let err = DeviceType::from_str(value).unwrap_err();
        assert!(matches!(err, DumpError::UnsupportedDevice(s) if s == value));
    }

    #[test]
    fn test_known_unsupported() {
        assert!(DeviceType::is_known_unsupported("ST25TB"));
        assert!(!DeviceType::is_known_unsupported("Classic 1K"));
    }
}
