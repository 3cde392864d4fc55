//! Platform collaborators for the card engines.
//!
//! The engines talk to the outside world through three traits: a radio
//! [`Transceiver`], a line-oriented [`Storage`] and a UI [`Notifier`].
//! This crate defines them together with a filesystem store and mocks.

pub mod error;
pub mod fs;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{FramingKind, RadioError, Result};
pub use fs::FsStorage;
pub use traits::{Notifier, NullNotifier, Storage, Transceiver};
pub use types::{
    ActiveDevice, DeactivateMode, DiscoveryParams, ExchangeStatus, LinkState, ListenIdentity,
    NfcaActivation, NfcaType, Role, TechMask,
};
