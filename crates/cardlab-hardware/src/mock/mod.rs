//! Mock collaborator implementations for testing and development.
//!
//! This module provides a simulated radio, an in-memory file store and a
//! recording notifier that can be controlled programmatically without
//! requiring physical hardware.

pub mod radio;
pub mod storage;

pub use radio::{MockRadio, MockRadioHandle, MockTag, ReaderEvent};
pub use storage::{MemoryStorage, RecordingNotifier};
