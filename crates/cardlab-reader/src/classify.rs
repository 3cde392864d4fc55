//! Card family classification.
//!
//! NFC-A cards are classified by an ordered rule table over SAK, ATQA and
//! the type reported by the radio. The first matching rule wins; Classic
//! rules come first because their SAK values overlap the Type-4 and Type-2
//! bit patterns.

use std::fmt;

use cardlab_core::{ClassicKind, Family, Technology, constants::SAK_ISO14443_4};
use cardlab_hardware::{ActiveDevice, NfcaActivation, NfcaType};

/// Result of NFC-A classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NfcaClass {
    Classic(ClassicKind),
    /// ISO-DEP Type-4 / DESFire-class.
    Type4,
    /// Ultralight / NTAG.
    Type2,
    /// Topaz (Type-1).
    Topaz,
    Unspecified,
}

impl NfcaClass {
    /// Card family stored in the context for this class.
    pub fn family(self) -> Family {
        match self {
            NfcaClass::Classic(kind) => Family::Classic(kind),
            NfcaClass::Type4 => Family::T4t,
            NfcaClass::Type2 => Family::Ultralight,
            NfcaClass::Topaz | NfcaClass::Unspecified => Family::Unspecified,
        }
    }
}

impl fmt::Display for NfcaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NfcaClass::Classic(kind) => write!(f, "Classic {kind}"),
            NfcaClass::Type4 => write!(f, "Type 4"),
            NfcaClass::Type2 => write!(f, "Ultralight/NTAG"),
            NfcaClass::Topaz => write!(f, "Topaz"),
            NfcaClass::Unspecified => write!(f, "NFC-A"),
        }
    }
}

/// One row of the classification table.
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&NfcaActivation) -> bool,
    pub class: NfcaClass,
}

/// Classification rules in priority order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "sak-08",
        matches: |a| a.sak == 0x08,
        class: NfcaClass::Classic(ClassicKind::OneK),
    },
    Rule {
        name: "sak-18",
        matches: |a| a.sak == 0x18,
        class: NfcaClass::Classic(ClassicKind::FourK),
    },
    Rule {
        name: "sak-09",
        matches: |a| a.sak == 0x09,
        class: NfcaClass::Classic(ClassicKind::Mini),
    },
    Rule {
        name: "iso-dep",
        matches: |a| {
            a.sak == SAK_ISO14443_4 || matches!(a.kind, NfcaType::T4t | NfcaType::T4tNfcDep)
        },
        class: NfcaClass::Type4,
    },
    Rule {
        name: "type-2",
        matches: |a| (a.sak == 0x00 && a.atqa[0] == 0x44) || a.kind == NfcaType::T2t,
        class: NfcaClass::Type2,
    },
    Rule {
        name: "type-1",
        matches: |a| a.kind == NfcaType::T1t,
        class: NfcaClass::Topaz,
    },
];

/// Classify an NFC-A activation.
pub fn classify_nfca(activation: &NfcaActivation) -> NfcaClass {
    RULES
        .iter()
        .find(|rule| (rule.matches)(activation))
        .map_or(NfcaClass::Unspecified, |rule| rule.class)
}

/// Family of any activated device.
pub fn classify(device: &ActiveDevice) -> Family {
    match (device.technology, &device.nfca) {
        (Technology::A, Some(activation)) => classify_nfca(activation).family(),
        (Technology::F, _) => Family::Felica,
        (Technology::V, _) => Family::Iso15693,
        _ => Family::Unspecified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn activation(kind: NfcaType, atqa: [u8; 2], sak: u8) -> NfcaActivation {
        NfcaActivation {
            kind,
            atqa,
            sak,
            ats: None,
        }
    }

    #[rstest]
    #[case(NfcaType::T2t, [0x04, 0x00], 0x08, NfcaClass::Classic(ClassicKind::OneK))]
    #[case(NfcaType::T2t, [0x44, 0x00], 0x08, NfcaClass::Classic(ClassicKind::OneK))]
    #[case(NfcaType::T4t, [0x02, 0x00], 0x18, NfcaClass::Classic(ClassicKind::FourK))]
    #[case(NfcaType::T2t, [0x04, 0x00], 0x09, NfcaClass::Classic(ClassicKind::Mini))]
    #[case(NfcaType::NfcDep, [0x44, 0x03], 0x20, NfcaClass::Type4)]
    #[case(NfcaType::T4tNfcDep, [0x04, 0x00], 0x28, NfcaClass::Type4)]
    #[case(NfcaType::NfcDep, [0x44, 0x00], 0x00, NfcaClass::Type2)]
    #[case(NfcaType::T2t, [0x04, 0x00], 0x00, NfcaClass::Type2)]
    #[case(NfcaType::T1t, [0x0C, 0x00], 0x00, NfcaClass::Topaz)]
    #[case(NfcaType::NfcDep, [0x04, 0x00], 0x40, NfcaClass::Unspecified)]
    fn test_classification_priority(
        #[case] kind: NfcaType,
        #[case] atqa: [u8; 2],
        #[case] sak: u8,
        #[case] expected: NfcaClass,
    ) {
        assert_eq!(classify_nfca(&activation(kind, atqa, sak)), expected);
    }

    #[test]
    fn test_rule_order_puts_classic_first() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            ["sak-08", "sak-18", "sak-09", "iso-dep", "type-2", "type-1"]
        );
    }

    #[rstest]
    #[case(Technology::B, Family::Unspecified)]
    #[case(Technology::F, Family::Felica)]
    #[case(Technology::V, Family::Iso15693)]
    fn test_other_technologies(#[case] technology: Technology, #[case] expected: Family) {
        let device = ActiveDevice::other(technology, vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(classify(&device), expected);
    }

    #[test]
    fn test_nfca_family() {
        let device = ActiveDevice::nfca(vec![0x04; 7], NfcaType::T2t, [0x44, 0x00], 0x00);
        assert_eq!(classify(&device), Family::Ultralight);
    }
}
