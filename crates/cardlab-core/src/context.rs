//! The currently known card.
//!
//! [`CardContext`] is the single data model shared by the poller, the
//! listener and the dump codec. It is created once with a fixed dump
//! capacity and reset in place between sessions; it is never reallocated
//! while a session runs.
//!
//! The UI summary is derived state. Every mutating method recomputes it;
//! callers that mutate the dump through [`CardContext::dump_mut`] must call
//! [`CardContext::refresh_summary`] when done.

use crate::{
    Dump, Family, NfcAParams, Technology, Uid,
    constants::{T2T_PAGE_SIZE, T2T_VERSION_LEN},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the current card came from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Source {
    /// Nothing loaded.
    #[default]
    None,
    /// Read from a card in the field.
    LiveCard { acquired_at: DateTime<Utc> },
    /// Restored from a dump file.
    LoadFile { path: PathBuf },
}

/// Display strings derived from the card context.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CardSummary {
    /// Card kind, e.g. `NTAG215` or `Classic 1K`.
    pub title: String,
    /// UID line.
    pub subtitle: String,
    /// Memory line, e.g. `135/135 pages`.
    pub detail: String,
}

/// Product names of the NTAG21x storage size codes.
fn ntag_product(version: &[u8; T2T_VERSION_LEN]) -> Option<&'static str> {
    match version[crate::constants::T2T_VERSION_SIZE_INDEX] {
        0x0F => Some("NTAG213"),
        0x11 => Some("NTAG215"),
        0x13 => Some("NTAG216"),
        _ => None,
    }
}

/// Card identity, activation parameters and memory image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardContext {
    technology: Technology,
    family: Family,
    uid: Option<Uid>,
    nfca: NfcAParams,
    /// Cached GET_VERSION response of a Type-2 tag.
    version: Option<[u8; T2T_VERSION_LEN]>,
    /// First NDEF message found in the TLV area.
    ndef: Option<Vec<u8>>,
    dump: Dump,
    source: Source,
    summary: CardSummary,
}

impl CardContext {
    /// Create an empty context whose dump is backed by `dump_capacity` bytes.
    #[must_use]
    pub fn new(dump_capacity: usize) -> Self {
        let mut ctx = Self {
            technology: Technology::default(),
            family: Family::default(),
            uid: None,
            nfca: NfcAParams::default(),
            version: None,
            ndef: None,
            dump: Dump::with_capacity(dump_capacity),
            source: Source::None,
            summary: CardSummary::default(),
        };
        ctx.refresh_summary();
        ctx
    }

    /// Zero the card header and clear the dump, keeping the buffer.
    pub fn reset(&mut self) {
        self.technology = Technology::default();
        self.family = Family::default();
        self.uid = None;
        self.nfca = NfcAParams::default();
        self.version = None;
        self.ndef = None;
        self.dump.clear();
        self.source = Source::None;
        self.refresh_summary();
    }

    /// Whether a card identity is present.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.uid.is_some()
    }

    #[must_use]
    pub fn technology(&self) -> Technology {
        self.technology
    }

    pub fn set_technology(&mut self, technology: Technology) {
        self.technology = technology;
        self.refresh_summary();
    }

    #[must_use]
    pub fn family(&self) -> Family {
        self.family
    }

    pub fn set_family(&mut self, family: Family) {
        self.family = family;
        self.refresh_summary();
    }

    #[must_use]
    pub fn uid(&self) -> Option<&Uid> {
        self.uid.as_ref()
    }

    pub fn set_uid(&mut self, uid: Uid) {
        self.uid = Some(uid);
        self.refresh_summary();
    }

    /// Technology-A parameters (all absent for other technologies).
    #[must_use]
    pub fn nfca(&self) -> &NfcAParams {
        &self.nfca
    }

    pub fn set_nfca(&mut self, params: NfcAParams) {
        self.nfca = params;
        self.refresh_summary();
    }

    #[must_use]
    pub fn version(&self) -> Option<&[u8; T2T_VERSION_LEN]> {
        self.version.as_ref()
    }

    pub fn set_version(&mut self, version: Option<[u8; T2T_VERSION_LEN]>) {
        self.version = version;
        self.refresh_summary();
    }

    #[must_use]
    pub fn ndef(&self) -> Option<&[u8]> {
        self.ndef.as_deref()
    }

    pub fn set_ndef(&mut self, ndef: Option<Vec<u8>>) {
        self.ndef = ndef;
    }

    #[must_use]
    pub fn dump(&self) -> &Dump {
        &self.dump
    }

    /// Mutable dump access. Call [`refresh_summary`](Self::refresh_summary)
    /// after mutating.
    pub fn dump_mut(&mut self) -> &mut Dump {
        &mut self.dump
    }

    /// Page count of a registered Type-2 image, 0 if there is none.
    #[must_use]
    pub fn page_count(&self) -> usize {
        if self.dump.has_dump() && self.dump.unit_size() == T2T_PAGE_SIZE {
            self.dump.unit_count()
        } else {
            0
        }
    }

    #[must_use]
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Path of the dump file this context was loaded from.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::LoadFile { path } => Some(path),
            _ => None,
        }
    }

    pub fn set_source(&mut self, source: Source) {
        self.source = source;
    }

    #[must_use]
    pub fn summary(&self) -> &CardSummary {
        &self.summary
    }

    /// Recompute the cached [`CardSummary`].
    pub fn refresh_summary(&mut self) {
        let title = match (self.family, self.version.as_ref().and_then(ntag_product)) {
            (Family::Ultralight, Some(product)) => product.to_string(),
            (Family::Unspecified, _) => format!("{} card", self.technology),
            (family, _) => family.to_string(),
        };

        let subtitle = match &self.uid {
            Some(uid) => format!("UID: {uid}"),
            None => "No card".to_string(),
        };

        let detail = if self.dump.has_dump() {
            let unit = if self.dump.unit_size() == T2T_PAGE_SIZE {
                "pages"
            } else {
                "blocks"
            };
            format!(
                "{}/{} {unit}",
                self.dump.valid_count(),
                self.dump.unit_count()
            )
        } else {
            String::new()
        };

        self.summary = CardSummary {
            title,
            subtitle,
            detail,
        };
    }
}

impl Default for CardContext {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_DUMP_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassicKind;

    fn ntag215() -> CardContext {
        let mut ctx = CardContext::new(1024);
        ctx.set_uid(Uid::new(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]).unwrap());
        ctx.set_family(Family::Ultralight);
        ctx.set_nfca(NfcAParams::new([0x44, 0x00], 0x00));
        ctx.set_version(Some([0x00, 0x04, 0x04, 0x02, 0x01, 0x00, 0x11, 0x03]));
        ctx
    }

    #[test]
    fn test_new_context_is_empty() {
        let ctx = CardContext::new(64);
        assert!(!ctx.is_loaded());
        assert_eq!(ctx.summary().subtitle, "No card");
        assert_eq!(ctx.dump().capacity(), 64);
        assert_eq!(ctx.path(), None);
    }

    #[test]
    fn test_summary_tracks_mutation() {
        let mut ctx = ntag215();
        assert_eq!(ctx.summary().title, "NTAG215");
        assert_eq!(ctx.summary().subtitle, "UID: 04 11 22 33 44 55 66");

        ctx.dump_mut().configure(4, 135).unwrap();
        ctx.dump_mut().write_unit(0, &[0; 4]).unwrap();
        ctx.dump_mut().set_has_dump(true);
        ctx.refresh_summary();
        assert_eq!(ctx.summary().detail, "1/135 pages");
        assert_eq!(ctx.page_count(), 135);
    }

    #[test]
    fn test_summary_for_classic_and_generic() {
        let mut ctx = CardContext::new(64);
        ctx.set_family(Family::Classic(ClassicKind::FourK));
        assert_eq!(ctx.summary().title, "Classic 4K");

        ctx.set_family(Family::Unspecified);
        ctx.set_technology(Technology::B);
        assert_eq!(ctx.summary().title, "NFC-B card");
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut ctx = ntag215();
        ctx.set_source(Source::LoadFile {
            path: PathBuf::from("/ext/nfc/tag.nfc"),
        });
        assert_eq!(ctx.path(), Some(Path::new("/ext/nfc/tag.nfc")));

        ctx.reset();

        assert!(!ctx.is_loaded());
        assert_eq!(ctx.family(), Family::Unspecified);
        assert_eq!(ctx.version(), None);
        assert_eq!(ctx.dump().capacity(), 1024);
        assert_eq!(ctx.source(), &Source::None);
    }

    #[test]
    fn test_page_count_requires_registered_page_dump() {
        let mut ctx = CardContext::new(1024);
        ctx.dump_mut().configure(4, 10).unwrap();
        assert_eq!(ctx.page_count(), 0);

        ctx.dump_mut().set_has_dump(true);
        assert_eq!(ctx.page_count(), 10);

        ctx.dump_mut().configure(16, 4).unwrap();
        ctx.dump_mut().set_has_dump(true);
        assert_eq!(ctx.page_count(), 0);
    }
}
