use crate::{
    Result,
    constants::{
        CLASSIC_1K_BLOCKS, CLASSIC_4K_BLOCKS, CLASSIC_MINI_BLOCKS, MAX_ATS_LENGTH, MAX_UID_LENGTH,
        MIN_UID_LENGTH,
    },
    error::Error,
    hex,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Link-layer technology of a proximity card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Technology {
    /// ISO14443-A.
    #[default]
    A,
    /// ISO14443-B.
    B,
    /// FeliCa (NFC-F).
    F,
    /// ISO15693 (NFC-V).
    V,
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Technology::A => write!(f, "NFC-A"),
            Technology::B => write!(f, "NFC-B"),
            Technology::F => write!(f, "NFC-F"),
            Technology::V => write!(f, "NFC-V"),
        }
    }
}

/// Size variant of a MIFARE Classic card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassicKind {
    Mini,
    OneK,
    FourK,
}

impl ClassicKind {
    /// Number of 16-byte blocks of this variant.
    #[must_use]
    pub fn block_count(self) -> usize {
        match self {
            ClassicKind::Mini => CLASSIC_MINI_BLOCKS,
            ClassicKind::OneK => CLASSIC_1K_BLOCKS,
            ClassicKind::FourK => CLASSIC_4K_BLOCKS,
        }
    }
}

impl fmt::Display for ClassicKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClassicKind::Mini => write!(f, "Mini"),
            ClassicKind::OneK => write!(f, "1K"),
            ClassicKind::FourK => write!(f, "4K"),
        }
    }
}

/// Card family within (mostly) technology A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Family {
    /// MIFARE Classic, with its size variant.
    Classic(ClassicKind),
    /// Type-2 tags: MIFARE Ultralight and NTAG21x.
    Ultralight,
    /// DESFire-class ISO14443-4 cards.
    Desfire,
    /// Generic Type-4 tags.
    T4t,
    /// FeliCa.
    Felica,
    /// ISO15693 vicinity cards.
    Iso15693,
    #[default]
    Unspecified,
}

impl Family {
    /// Returns `true` for any Classic variant.
    #[inline]
    #[must_use]
    pub fn is_classic(self) -> bool {
        matches!(self, Family::Classic(_))
    }

    /// Bytes per addressable unit for dumps of this family.
    #[must_use]
    pub fn unit_size(self) -> usize {
        match self {
            Family::Classic(_) => crate::constants::CLASSIC_BLOCK_SIZE,
            _ => crate::constants::T2T_PAGE_SIZE,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Family::Classic(kind) => write!(f, "Classic {kind}"),
            Family::Ultralight => write!(f, "Ultralight/NTAG"),
            Family::Desfire => write!(f, "DESFire"),
            Family::T4t => write!(f, "Type 4"),
            Family::Felica => write!(f, "FeliCa"),
            Family::Iso15693 => write!(f, "ISO15693"),
            Family::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// Card unique identifier (1-10 bytes, never empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid(Vec<u8>);

impl Uid {
    /// Create a UID with length validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` if `bytes` is shorter than
    /// [`MIN_UID_LENGTH`] or longer than [`MAX_UID_LENGTH`].
    ///
    /// # Examples
    ///
    /// ```
    /// use cardlab_core::Uid;
    ///
    /// let uid = Uid::new(&[0x04, 0xA1, 0xB2, 0xC3]).unwrap();
    /// assert_eq!(uid.len(), 4);
    /// assert!(Uid::new(&[]).is_err());
    /// ```
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&bytes.len()) {
            return Err(Error::InvalidUid {
                len: bytes.len(),
                min: MIN_UID_LENGTH,
                max: MAX_UID_LENGTH,
            });
        }
        Ok(Uid(bytes.to_vec()))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Concatenated uppercase hex, e.g. `04A1B2C3`.
    #[must_use]
    pub fn to_hex_compact(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::format_spaced(&self.0))
    }
}

/// Technology-A activation parameters, each with its own presence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NfcAParams {
    /// ATQA as transmitted (`[0x44, 0x00]` for an NTAG).
    pub atqa: Option<[u8; 2]>,
    pub sak: Option<u8>,
    pub ats: Option<Vec<u8>>,
}

impl NfcAParams {
    /// Build parameters from a completed anticollision.
    #[must_use]
    pub fn new(atqa: [u8; 2], sak: u8) -> Self {
        Self {
            atqa: Some(atqa),
            sak: Some(sak),
            ats: None,
        }
    }

    /// Attach an ATS.
    ///
    /// # Errors
    /// Returns `Error::InvalidAts` if the ATS is longer than 254 bytes.
    pub fn with_ats(mut self, ats: Vec<u8>) -> Result<Self> {
        if ats.len() > MAX_ATS_LENGTH {
            return Err(Error::InvalidAts(ats.len()));
        }
        self.ats = Some(ats);
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn has_ats(&self) -> bool {
        self.ats.is_some()
    }
}
