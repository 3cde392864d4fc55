//! Reader-mode engine: discovery, classification and Type-2 acquisition.

pub mod classify;
pub mod poller;
pub mod tlv;
pub mod type2;

pub use classify::{NfcaClass, classify, classify_nfca};
pub use poller::{HandledCard, Poller, PollerConfig, PollerState, page_dump_lines};
pub use type2::{AcquireParams, AcquisitionReport, acquire_type2_image, page_count_for_size_code};
