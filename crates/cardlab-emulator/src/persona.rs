//! Emulation persona inference.
//!
//! The identity presented to a reader is derived once, when the listener
//! initializes, from the loaded card. Rules are evaluated in order and the
//! first match wins:
//!
//! | Rule          | Condition                         | Persona | ATQA / SAK           |
//! |---------------|-----------------------------------|---------|----------------------|
//! | `ultralight`  | family is Ultralight/NTAG         | T2T     | `44 00` / `00`       |
//! | `iso-dep`     | stored SAK is `0x20`              | T4T     | stored ATQA / `00`   |
//! | `t2t-values`  | stored ATQA/SAK are `44 00` / `00`| T2T     | `44 00` / `00`       |
//! | fallback      |                                   | Raw     | stored ATQA / SAK    |
//!
//! An Ultralight card always gets the canonical Type-2 identity so the
//! reader never attempts ISO-DEP, whatever the file says.

use std::fmt;

use cardlab_core::{
    CardContext, Family,
    constants::{SAK_ISO14443_4, T2T_ATQA, T2T_SAK},
};
use cardlab_hardware::ListenIdentity;
use serde::{Deserialize, Serialize};

/// UID presented when no card is loaded.
pub const DEFAULT_UID: [u8; 7] = [0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonaKind {
    /// Type-2 tag (Ultralight/NTAG).
    T2t,
    /// Type-4 tag.
    T4t,
    /// The card's own ATQA/SAK, unmodified.
    Raw,
}

impl fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonaKind::T2t => write!(f, "T2T"),
            PersonaKind::T4t => write!(f, "T4T"),
            PersonaKind::Raw => write!(f, "RAW"),
        }
    }
}

/// Identity and behavior presented to a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Persona {
    pub kind: PersonaKind,
    pub uid: Vec<u8>,
    pub atqa: [u8; 2],
    pub sak: u8,
    /// Name of the rule that produced this persona.
    pub rule: &'static str,
}

impl Persona {
    /// Persona used when no card is loaded.
    pub fn default_t2t() -> Self {
        Self {
            kind: PersonaKind::T2t,
            uid: DEFAULT_UID.to_vec(),
            atqa: T2T_ATQA,
            sak: T2T_SAK,
            rule: "default",
        }
    }

    /// Identity handed to the radio for listen-mode discovery.
    pub fn identity(&self) -> ListenIdentity {
        ListenIdentity {
            uid: self.uid.clone(),
            atqa: self.atqa,
            sak: self.sak,
        }
    }
}

/// One row of the persona table.
pub struct PersonaRule {
    pub name: &'static str,
    pub matches: fn(&CardContext) -> bool,
    pub kind: PersonaKind,
}

/// Persona rules in priority order. Contexts matching none get [`PersonaKind::Raw`].
pub const RULES: &[PersonaRule] = &[
    PersonaRule {
        name: "ultralight",
        matches: |ctx| ctx.family() == Family::Ultralight,
        kind: PersonaKind::T2t,
    },
    PersonaRule {
        name: "iso-dep",
        matches: |ctx| ctx.nfca().sak == Some(SAK_ISO14443_4),
        kind: PersonaKind::T4t,
    },
    PersonaRule {
        name: "t2t-values",
        matches: |ctx| ctx.nfca().atqa == Some(T2T_ATQA) && ctx.nfca().sak == Some(T2T_SAK),
        kind: PersonaKind::T2t,
    },
];

/// Infer the persona for `ctx`.
pub fn infer_persona(ctx: &CardContext) -> Persona {
    let Some(uid) = ctx.uid() else {
        return Persona::default_t2t();
    };

    let (kind, rule) = RULES
        .iter()
        .find(|rule| (rule.matches)(ctx))
        .map_or((PersonaKind::Raw, "raw"), |rule| (rule.kind, rule.name));

    let stored_atqa = ctx.nfca().atqa.unwrap_or(T2T_ATQA);
    let (atqa, sak) = match kind {
        PersonaKind::T2t => (T2T_ATQA, T2T_SAK),
        // SAK forced to 00 for reader compatibility.
        PersonaKind::T4t => (stored_atqa, 0x00),
        PersonaKind::Raw => (stored_atqa, ctx.nfca().sak.unwrap_or(T2T_SAK)),
    };

    Persona {
        kind,
        uid: uid.as_bytes().to_vec(),
        atqa,
        sak,
        rule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlab_core::{ClassicKind, NfcAParams, Technology, Uid};
    use rstest::rstest;

    const UID: [u8; 7] = [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

    fn loaded(family: Family, atqa: Option<[u8; 2]>, sak: Option<u8>) -> CardContext {
        let mut ctx = CardContext::new(1024);
        ctx.set_technology(Technology::A);
        ctx.set_uid(Uid::new(&UID).unwrap());
        ctx.set_family(family);
        ctx.set_nfca(NfcAParams {
            atqa,
            sak,
            ats: None,
        });
        ctx
    }

    #[test]
    fn test_no_card_uses_default_persona() {
        let persona = infer_persona(&CardContext::new(1024));
        assert_eq!(persona, Persona::default_t2t());
        assert_eq!(persona.uid, DEFAULT_UID);
    }

    #[rstest]
    #[case(Some([0x44, 0x00]), Some(0x00))]
    #[case(Some([0x04, 0x00]), Some(0x08))]
    #[case(Some([0x44, 0x03]), Some(0x20))]
    #[case(None, None)]
    fn test_ultralight_always_canonical_t2t(
        #[case] atqa: Option<[u8; 2]>,
        #[case] sak: Option<u8>,
    ) {
        let persona = infer_persona(&loaded(Family::Ultralight, atqa, sak));
        assert_eq!(persona.kind, PersonaKind::T2t);
        assert_eq!(persona.atqa, [0x44, 0x00]);
        assert_eq!(persona.sak, 0x00);
        assert_eq!(persona.rule, "ultralight");
        assert_eq!(persona.uid, UID);
    }

    #[rstest]
    #[case(Family::T4t, Some([0x44, 0x03]), Some(0x20), PersonaKind::T4t, [0x44, 0x03], 0x00)]
    #[case(Family::Desfire, Some([0x44, 0x03]), Some(0x20), PersonaKind::T4t, [0x44, 0x03], 0x00)]
    #[case(Family::Unspecified, Some([0x44, 0x00]), Some(0x00), PersonaKind::T2t, [0x44, 0x00], 0x00)]
    #[case(Family::Classic(ClassicKind::OneK), Some([0x04, 0x00]), Some(0x08), PersonaKind::Raw, [0x04, 0x00], 0x08)]
    #[case(Family::Unspecified, Some([0x04, 0x00]), None, PersonaKind::Raw, [0x04, 0x00], 0x00)]
    fn test_persona_table(
        #[case] family: Family,
        #[case] atqa: Option<[u8; 2]>,
        #[case] sak: Option<u8>,
        #[case] kind: PersonaKind,
        #[case] expected_atqa: [u8; 2],
        #[case] expected_sak: u8,
    ) {
        let persona = infer_persona(&loaded(family, atqa, sak));
        assert_eq!(persona.kind, kind);
        assert_eq!(persona.atqa, expected_atqa);
        assert_eq!(persona.sak, expected_sak);
    }

    #[test]
    fn test_identity_matches_persona() {
        let persona = infer_persona(&loaded(Family::Ultralight, None, None));
        let identity = persona.identity();
        assert_eq!(identity.uid, UID);
        assert_eq!(identity.atqa, [0x44, 0x00]);
        assert_eq!(identity.sak, 0x00);
    }
}
