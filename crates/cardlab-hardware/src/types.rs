//! Common types shared by transceiver implementations.
//!
//! This module defines discovery configuration, link states and the
//! description of an activated peer device.

use cardlab_core::Technology;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

use crate::error::RadioError;

/// Set of technologies to poll for or listen as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TechMask(u8);

impl TechMask {
    pub const NONE: Self = Self(0);
    pub const A: Self = Self(1 << 0);
    pub const B: Self = Self(1 << 1);
    pub const F: Self = Self(1 << 2);
    pub const V: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    /// Mask with the single bit of `technology`.
    pub fn of(technology: Technology) -> Self {
        match technology {
            Technology::A => Self::A,
            Technology::B => Self::B,
            Technology::F => Self::F,
            Technology::V => Self::V,
        }
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for TechMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Which side of the link the transceiver plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Reader mode: generate the field and poll for cards.
    Poller,
    /// Card emulation mode: wait for a reader's field.
    Listener,
}

/// Identity presented while listening as an NFC-A card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenIdentity {
    pub uid: Vec<u8>,
    /// ATQA as transmitted.
    pub atqa: [u8; 2],
    pub sak: u8,
}

/// Discovery configuration handed to [`Transceiver::configure_discovery`].
///
/// [`Transceiver::configure_discovery`]: crate::traits::Transceiver::configure_discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryParams {
    /// Technologies to poll for (poller) or answer to (listener).
    pub techs: TechMask,
    pub role: Role,
    /// Length of one discovery round in milliseconds.
    pub total_duration_ms: u32,
    /// Listen identity; `None` in poller role.
    pub identity: Option<ListenIdentity>,
}

impl DiscoveryParams {
    /// Reader-only discovery of every supported technology.
    pub fn reader(total_duration_ms: u32) -> Self {
        Self {
            techs: TechMask::ALL,
            role: Role::Poller,
            total_duration_ms,
            identity: None,
        }
    }

    /// NFC-A card emulation with the given identity.
    pub fn listener(identity: ListenIdentity, total_duration_ms: u32) -> Self {
        Self {
            techs: TechMask::A,
            role: Role::Listener,
            total_duration_ms,
            identity: Some(identity),
        }
    }
}

/// Coarse state of the transceiver link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    NotInitialized,
    /// Initialized, field off / not listening.
    Idle,
    /// Discovery round in progress.
    Discovering,
    /// A peer has been activated (card found, or reader selected us).
    Activated,
}

/// Type reported for an activated NFC-A device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NfcaType {
    /// Topaz / Type-1.
    T1t,
    /// Type-2 (Ultralight / NTAG).
    T2t,
    /// ISO-DEP Type-4.
    T4t,
    /// NFC-DEP (P2P).
    NfcDep,
    /// Both ISO-DEP and NFC-DEP.
    T4tNfcDep,
}

/// Activation data of an NFC-A device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfcaActivation {
    pub kind: NfcaType,
    pub atqa: [u8; 2],
    pub sak: u8,
    pub ats: Option<Vec<u8>>,
}

/// Peer device found by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDevice {
    pub technology: Technology,
    pub uid: Vec<u8>,
    /// Present for technology A only.
    pub nfca: Option<NfcaActivation>,
}

impl ActiveDevice {
    pub fn nfca(uid: Vec<u8>, kind: NfcaType, atqa: [u8; 2], sak: u8) -> Self {
        Self {
            technology: Technology::A,
            uid,
            nfca: Some(NfcaActivation {
                kind,
                atqa,
                sak,
                ats: None,
            }),
        }
    }

    pub fn other(technology: Technology, uid: Vec<u8>) -> Self {
        Self {
            technology,
            uid,
            nfca: None,
        }
    }

    pub fn with_ats(mut self, ats: Vec<u8>) -> Self {
        if let Some(nfca) = self.nfca.as_mut() {
            nfca.ats = Some(ats);
        }
        self
    }
}

/// How far to tear the link down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeactivateMode {
    /// Field off, stop discovery.
    Idle,
    /// Put the peer to sleep (HLTA) and stay in discovery.
    Sleep,
    /// Restart discovery.
    Discovery,
}

/// Progress of a non-blocking exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeStatus {
    /// Nothing received yet.
    Pending,
    /// A complete frame arrived.
    Received(Vec<u8>),
    /// The exchange ended with an error.
    Failed(RadioError),
}
